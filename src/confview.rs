use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    conf::{Config, Key, Peer},
    dispatch::Reconcile,
    error::Error,
    section::{InterfaceSection, PeerSection},
    toolkit::{Toolkit, WidgetId},
};

/// What a single reconcile changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Whether layout was suspended (and resumed once) during the call.
    pub suspended: bool,
}

/// Live view of one interface and its peers.
///
/// Peer sections are matched by public key across snapshots: known peers are
/// updated in place, new ones get a fresh group, and missing ones are removed.
/// Structural changes happen under one layout suspension per call.
pub struct ConfView<T: Toolkit> {
    toolkit: T,
    name: WidgetId,
    interface: InterfaceSection,
    peers: HashMap<Key, PeerSection>,
}

impl<T: Toolkit> ConfView<T> {
    pub fn new(mut toolkit: T) -> Result<Self, Error> {
        let name = new_section_group(&mut toolkit)?;
        let interface = match InterfaceSection::new(&mut toolkit, name) {
            Ok(section) => section,
            Err(e) => {
                toolkit.remove(name);
                return Err(e);
            }
        };
        Ok(Self {
            toolkit,
            name,
            interface,
            peers: HashMap::new(),
        })
    }

    pub fn toolkit(&self) -> &T {
        &self.toolkit
    }

    pub fn toolkit_mut(&mut self) -> &mut T {
        &mut self.toolkit
    }

    pub fn title(&self) -> &str {
        self.toolkit.title(self.name)
    }

    pub fn interface(&self) -> &InterfaceSection {
        &self.interface
    }

    pub fn peer(&self, key: &Key) -> Option<&PeerSection> {
        self.peers.get(key)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Brings the widgets in line with `config`. Must run on the owning
    /// thread; use [`crate::Dispatcher::submit`] from anywhere else.
    pub fn set_configuration(&mut self, config: &Config) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let tk = &mut self.toolkit;

        let title = format!("Interface: {}", config.name);
        if tk.title(self.name) != title {
            tk.set_title(self.name, &title);
        }
        self.interface.apply(tk, &config.interface);

        let mut unconfirmed: HashSet<Key> = self.peers.keys().copied().collect();
        for peer in &config.peers {
            if let Some(section) = self.peers.get(&peer.public_key) {
                section.apply(tk, peer);
                unconfirmed.remove(&peer.public_key);
                stats.updated += 1;
                continue;
            }

            suspend_once(tk, &mut stats.suspended);
            match new_peer_section(tk, peer) {
                Ok(section) => {
                    self.peers.insert(peer.public_key, section);
                    stats.created += 1;
                }
                Err(e) => {
                    warn!(peer = ?peer.public_key, error = %e, "could not create peer section")
                }
            }
        }

        for key in unconfirmed {
            let Some(section) = self.peers.remove(&key) else {
                continue;
            };
            suspend_once(tk, &mut stats.suspended);
            tk.remove(section.group());
            stats.removed += 1;
        }

        if stats.suspended {
            tk.set_suspended(false);
        }
        debug!(
            interface = %config.name,
            created = stats.created,
            updated = stats.updated,
            removed = stats.removed,
            "reconciled configuration"
        );
        stats
    }
}

impl<T: Toolkit> Reconcile for ConfView<T> {
    fn reconcile(&mut self, config: &Config) {
        self.set_configuration(config);
    }
}

fn suspend_once<T: Toolkit>(tk: &mut T, suspended: &mut bool) {
    if !*suspended {
        tk.set_suspended(true);
        *suspended = true;
    }
}

fn new_section_group<T: Toolkit>(tk: &mut T) -> Result<WidgetId, Error> {
    let root = tk.root();
    tk.new_group(root)
}

fn new_peer_section<T: Toolkit>(tk: &mut T, peer: &Peer) -> Result<PeerSection, Error> {
    let group = new_section_group(tk)?;
    tk.set_title(group, "Peer");
    let section = match PeerSection::new(tk, group, peer.public_key) {
        Ok(section) => section,
        Err(e) => {
            tk.remove(group);
            return Err(e);
        }
    };
    section.apply(tk, peer);
    Ok(section)
}
