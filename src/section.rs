//! Fixed-shape groups of label/value rows for the interface and each peer.

use std::fmt::Display;

use crate::{
    conf::{Interface, Key, Peer},
    error::Error,
    toolkit::{Toolkit, WidgetId},
};

pub const LABEL_COLUMN: usize = 0;
pub const VALUE_COLUMN: usize = 2;

/// Row order of an interface section.
pub const INTERFACE_FIELDS: [&str; 5] = [
    "Public key",
    "Listen port",
    "MTU",
    "Addresses",
    "DNS servers",
];

/// Row order of a peer section.
pub const PEER_FIELDS: [&str; 7] = [
    "Public key",
    "Preshared key",
    "Allowed IPs",
    "Endpoint",
    "Persistent keepalive",
    "Latest handshake",
    "Transfer",
];

/// A label and a read-only value that are always shown or hidden together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRow {
    pub label: WidgetId,
    pub value: WidgetId,
}

impl FieldRow {
    pub fn new<T: Toolkit>(
        tk: &mut T,
        parent: WidgetId,
        name: &str,
        row: usize,
    ) -> Result<Self, Error> {
        let label = tk.new_label(parent)?;
        tk.set_text(label, &format!("{name}:"));
        tk.set_visible(label, false);
        tk.set_grid_cell(label, row, LABEL_COLUMN);

        let value = tk.new_line_edit(parent)?;
        tk.set_visible(value, false);
        tk.set_grid_cell(value, row, VALUE_COLUMN);
        Ok(Self { label, value })
    }

    /// Replaces the value, keeping whatever range the user had selected.
    pub fn show<T: Toolkit>(&self, tk: &mut T, text: &str) {
        let (start, end) = tk.text_selection(self.value);
        tk.set_text(self.value, text);
        tk.set_visible(self.label, true);
        tk.set_visible(self.value, true);
        tk.set_text_selection(self.value, start, end);
    }

    pub fn hide<T: Toolkit>(&self, tk: &mut T) {
        tk.set_text(self.value, "");
        tk.set_visible(self.label, false);
        tk.set_visible(self.value, false);
    }

    pub fn show_if<T: Toolkit>(&self, tk: &mut T, text: Option<String>) {
        match text {
            Some(text) => self.show(tk, &text),
            None => self.hide(tk),
        }
    }

    pub fn is_visible<T: Toolkit>(&self, tk: &T) -> bool {
        tk.is_visible(self.value)
    }

    pub fn text<'a, T: Toolkit>(&self, tk: &'a T) -> &'a str {
        tk.text(self.value)
    }
}

fn build_rows<T: Toolkit, const N: usize>(
    tk: &mut T,
    parent: WidgetId,
    names: &[&str; N],
) -> Result<[FieldRow; N], Error> {
    let rows = names
        .iter()
        .enumerate()
        .map(|(row, name)| FieldRow::new(tk, parent, name, row))
        .collect::<Result<Vec<_>, _>>()?;
    // Exactly N rows were built from N names.
    rows.try_into().map_err(|_| Error::UnknownWidget(parent))
}

pub(crate) fn join<D: Display>(items: &[D]) -> Option<String> {
    (!items.is_empty()).then(|| {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })
}

fn positive(n: u16) -> Option<String> {
    (n > 0).then(|| n.to_string())
}

#[derive(Debug)]
pub struct InterfaceSection {
    public_key: FieldRow,
    listen_port: FieldRow,
    mtu: FieldRow,
    addresses: FieldRow,
    dns: FieldRow,
}

impl InterfaceSection {
    pub fn new<T: Toolkit>(tk: &mut T, parent: WidgetId) -> Result<Self, Error> {
        let [public_key, listen_port, mtu, addresses, dns] =
            build_rows(tk, parent, &INTERFACE_FIELDS)?;
        Ok(Self {
            public_key,
            listen_port,
            mtu,
            addresses,
            dns,
        })
    }

    /// Rows in display order.
    pub fn rows(&self) -> [FieldRow; 5] {
        [self.public_key, self.listen_port, self.mtu, self.addresses, self.dns]
    }

    pub fn apply<T: Toolkit>(&self, tk: &mut T, iface: &Interface) {
        self.public_key.show(tk, &iface.private_key.public().to_string());
        self.listen_port.show_if(tk, positive(iface.listen_port));
        self.mtu.show_if(tk, positive(iface.mtu));
        self.addresses.show_if(tk, join(&iface.addresses));
        self.dns.show_if(tk, join(&iface.dns));
    }
}

/// Rows for one peer inside their own group box.
#[derive(Debug)]
pub struct PeerSection {
    key: Key,
    group: WidgetId,
    public_key: FieldRow,
    preshared_key: FieldRow,
    allowed_ips: FieldRow,
    endpoint: FieldRow,
    persistent_keepalive: FieldRow,
    latest_handshake: FieldRow,
    transfer: FieldRow,
}

impl PeerSection {
    /// Builds the rows inside `group`. The caller owns the group and removes
    /// it if this fails.
    pub fn new<T: Toolkit>(tk: &mut T, group: WidgetId, key: Key) -> Result<Self, Error> {
        let [
            public_key,
            preshared_key,
            allowed_ips,
            endpoint,
            persistent_keepalive,
            latest_handshake,
            transfer,
        ] = build_rows(tk, group, &PEER_FIELDS)?;
        Ok(Self {
            key,
            group,
            public_key,
            preshared_key,
            allowed_ips,
            endpoint,
            persistent_keepalive,
            latest_handshake,
            transfer,
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn group(&self) -> WidgetId {
        self.group
    }

    /// Rows in display order.
    pub fn rows(&self) -> [FieldRow; 7] {
        [
            self.public_key,
            self.preshared_key,
            self.allowed_ips,
            self.endpoint,
            self.persistent_keepalive,
            self.latest_handshake,
            self.transfer,
        ]
    }

    pub fn apply<T: Toolkit>(&self, tk: &mut T, peer: &Peer) {
        self.public_key.show(tk, &peer.public_key.to_string());
        // Never render secret material.
        self.preshared_key
            .show_if(tk, (!peer.preshared_key.is_zero()).then(|| "enabled".into()));
        self.allowed_ips.show_if(tk, join(&peer.allowed_ips));
        self.endpoint
            .show_if(tk, peer.endpoint.as_ref().map(ToString::to_string));
        self.persistent_keepalive
            .show_if(tk, positive(peer.persistent_keepalive));
        self.latest_handshake
            .show_if(tk, peer.last_handshake.as_ref().map(ToString::to_string));

        let (rx, tx) = (peer.rx_bytes, peer.tx_bytes);
        self.transfer.show_if(
            tk,
            (rx.0 > 0 || tx.0 > 0).then(|| format!("{rx} received, {tx} sent")),
        );
    }
}
