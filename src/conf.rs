//! Immutable configuration snapshots: one interface and its ordered peers.

use std::{
    fmt,
    net::IpAddr,
    str::FromStr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use ipnetwork::IpNetwork;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::Error;

pub const KEY_LEN: usize = 32;

/// A Curve25519 key as used by WireGuard, displayed in base64.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Derives the public half, treating `self` as a private key.
    pub fn public(&self) -> Key {
        let secret = StaticSecret::from(self.0);
        Key(PublicKey::from(&secret).to_bytes())
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| {
                Error::InvalidKey(format!("expected 32 bytes, got {}", b.len()))
            })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_string();
        write!(f, "Key({}…)", &s[..8])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidValue {
            what: "endpoint",
            value: s.into(),
        };
        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(rest) => rest.strip_suffix(']').ok_or_else(invalid)?,
            None if host.contains(':') => return Err(invalid()),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            host: host.into(),
            port: port.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Byte counter shown with binary units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bytes(pub u64);

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&humansize::format_size(self.0, humansize::BINARY))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTime(SystemTime);

impl HandshakeTime {
    pub fn new(at: SystemTime) -> Self {
        Self(at)
    }

    /// `wg` reports zero when no handshake happened yet.
    pub fn from_unix_secs(secs: u64) -> Option<Self> {
        (secs > 0).then(|| Self(UNIX_EPOCH + Duration::from_secs(secs)))
    }

    pub fn format_since(&self, now: SystemTime) -> String {
        let Ok(elapsed) = now.duration_since(self.0) else {
            return "System clock wound backward!".into();
        };
        let mut secs = elapsed.as_secs();
        if secs == 0 {
            return "Now".into();
        }

        const UNITS: [(&str, u64); 5] = [
            ("year", 365 * 24 * 3600),
            ("day", 24 * 3600),
            ("hour", 3600),
            ("minute", 60),
            ("second", 1),
        ];
        let parts: Vec<_> = UNITS
            .iter()
            .filter_map(|&(name, size)| {
                let n = secs / size;
                secs %= size;
                (n > 0).then(|| format!("{n} {name}{}", if n == 1 { "" } else { "s" }))
            })
            .collect();
        format!("{} ago", parts.join(", "))
    }
}

impl fmt::Display for HandshakeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_since(SystemTime::now()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    pub private_key: Key,
    pub listen_port: u16,
    pub mtu: u16,
    pub addresses: Vec<IpNetwork>,
    pub dns: Vec<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
    pub public_key: Key,
    /// All zeroes when unset.
    pub preshared_key: Key,
    pub allowed_ips: Vec<IpNetwork>,
    pub endpoint: Option<Endpoint>,
    pub persistent_keepalive: u16,
    pub last_handshake: Option<HandshakeTime>,
    pub rx_bytes: Bytes,
    pub tx_bytes: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub name: String,
    pub interface: Interface,
    pub peers: Vec<Peer>,
}
