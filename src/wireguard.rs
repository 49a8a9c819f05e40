use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

use ipnetwork::IpNetwork;
use tracing::debug;

use crate::{
    conf::{Bytes, Config, Endpoint, HandshakeTime, Key, Peer},
    error::Error,
};

pub const CONFIG_DIR: &str = "/etc/wireguard";

/// Live state reported by `wg show <iface> dump`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Runtime {
    pub listen_port: u16,
    pub peers: Vec<Peer>,
}

pub fn discover_tunnels(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return vec![];
    };

    let mut names: Vec<_> = entries
        .flatten()
        .filter_map(|e| {
            let path = e.path();
            (path.extension()? == "conf").then_some(())?;
            Some(path.file_stem()?.to_string_lossy().into_owned())
        })
        .collect();

    names.sort();
    names
}

pub fn config_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.conf"))
}

pub fn is_interface_active(name: &str) -> bool {
    Command::new("ip")
        .args(["link", "show", name])
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Reads the tunnel's file and, when the interface is up, overlays the live
/// peer state from `wg`.
pub fn load_config(dir: &Path, name: &str) -> Result<Config, Error> {
    let text = fs::read_to_string(config_path(dir, name))?;
    let mut config = parse_conf(name, &text)?;

    if which::which("wg").is_ok() && is_interface_active(name) {
        match show_dump(name) {
            Ok(runtime) => merge_runtime(&mut config, runtime),
            Err(e) => debug!(tunnel = name, error = %e, "no runtime state"),
        }
    }
    Ok(config)
}

fn show_dump(name: &str) -> Result<Runtime, Error> {
    let out = Command::new("wg").args(["show", name, "dump"]).output()?;
    if !out.status.success() {
        return Err(Error::Command {
            command: format!("wg show {name} dump"),
            stderr: String::from_utf8_lossy(&out.stderr).trim().into(),
        });
    }
    parse_dump(&String::from_utf8_lossy(&out.stdout))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
    Unknown,
}

/// Parses a wg-quick style configuration file.
pub fn parse_conf(name: &str, text: &str) -> Result<Config, Error> {
    let mut config = Config {
        name: name.into(),
        ..Default::default()
    };
    let mut section = Section::None;
    // The peer being filled in, with the line of its `[Peer]` header.
    let mut peer: Option<(usize, Peer)> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            finish_peer(&mut config, peer.take())?;
            section = match line.to_ascii_lowercase().as_str() {
                "[interface]" => Section::Interface,
                "[peer]" => {
                    peer = Some((line_no, Peer::default()));
                    Section::Peer
                }
                _ => Section::Unknown,
            };
            continue;
        }

        let Some((key, val)) = line.split_once('=') else {
            return Err(Error::parse(line_no, "expected `key = value`"));
        };
        let key = key.trim().to_ascii_lowercase();
        let val = val.trim();
        let at = |e: Error| Error::parse(line_no, e.to_string());

        let iface = &mut config.interface;
        match (section, key.as_str(), peer.as_mut()) {
            (Section::Interface, "privatekey", _) => iface.private_key = val.parse().map_err(at)?,
            (Section::Interface, "listenport", _) => {
                iface.listen_port = number(val, "listen port").map_err(at)?
            }
            (Section::Interface, "mtu", _) => iface.mtu = number(val, "MTU").map_err(at)?,
            (Section::Interface, "address", _) => {
                for part in list(val) {
                    iface.addresses.push(parse_value(part, "address").map_err(at)?);
                }
            }
            // Non-address entries are search domains.
            (Section::Interface, "dns", _) => iface
                .dns
                .extend(list(val).filter_map(|p| p.parse::<IpAddr>().ok())),
            (Section::Peer, "publickey", Some((_, p))) => p.public_key = val.parse().map_err(at)?,
            (Section::Peer, "presharedkey", Some((_, p))) => {
                p.preshared_key = val.parse().map_err(at)?
            }
            (Section::Peer, "allowedips", Some((_, p))) => {
                for part in list(val) {
                    p.allowed_ips
                        .push(parse_value::<IpNetwork>(part, "allowed IP").map_err(at)?);
                }
            }
            (Section::Peer, "endpoint", Some((_, p))) => {
                p.endpoint = Some(val.parse().map_err(at)?)
            }
            (Section::Peer, "persistentkeepalive", Some((_, p))) => {
                p.persistent_keepalive = match val {
                    "off" => 0,
                    _ => number(val, "persistent keepalive").map_err(at)?,
                }
            }
            _ => {}
        }
    }

    finish_peer(&mut config, peer)?;
    Ok(config)
}

fn finish_peer(config: &mut Config, peer: Option<(usize, Peer)>) -> Result<(), Error> {
    let Some((line, peer)) = peer else {
        return Ok(());
    };
    if peer.public_key.is_zero() {
        return Err(Error::parse(line, "peer has no public key"));
    }
    config.peers.push(peer);
    Ok(())
}

fn list(val: &str) -> impl Iterator<Item = &str> {
    val.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_value<T: FromStr>(val: &str, what: &'static str) -> Result<T, Error> {
    val.parse().map_err(|_| Error::InvalidValue {
        what,
        value: val.into(),
    })
}

fn number(val: &str, what: &'static str) -> Result<u16, Error> {
    parse_value(val, what)
}

fn none_or(val: &str) -> Option<&str> {
    (val != "(none)").then_some(val)
}

/// Parses `wg show <iface> dump`: one tab-separated interface line followed by
/// one line per peer.
pub fn parse_dump(output: &str) -> Result<Runtime, Error> {
    let mut runtime = Runtime::default();
    let mut lines = output.lines().filter(|l| !l.trim().is_empty()).enumerate();

    let Some((_, first)) = lines.next() else {
        return Ok(runtime);
    };
    let fields: Vec<_> = first.split('\t').collect();
    let [_, _, port, _] = fields[..] else {
        return Err(Error::parse(1, "expected 4 interface fields"));
    };
    runtime.listen_port = number(port, "listen port").map_err(|e| Error::parse(1, e.to_string()))?;

    for (i, line) in lines {
        let line_no = i + 1;
        let at = |e: Error| Error::parse(line_no, e.to_string());
        let fields: Vec<_> = line.split('\t').collect();
        let [public, preshared, endpoint, allowed, handshake, rx, tx, keepalive] = fields[..] else {
            return Err(Error::parse(line_no, "expected 8 peer fields"));
        };

        runtime.peers.push(Peer {
            public_key: public.parse().map_err(at)?,
            preshared_key: none_or(preshared)
                .map(Key::from_str)
                .transpose()
                .map_err(at)?
                .unwrap_or_default(),
            allowed_ips: none_or(allowed)
                .map(|a| {
                    list(a)
                        .map(|p| parse_value(p, "allowed IP"))
                        .collect::<Result<Vec<IpNetwork>, _>>()
                })
                .transpose()
                .map_err(at)?
                .unwrap_or_default(),
            endpoint: none_or(endpoint)
                .map(Endpoint::from_str)
                .transpose()
                .map_err(at)?,
            persistent_keepalive: match keepalive {
                "off" => 0,
                _ => number(keepalive, "persistent keepalive").map_err(at)?,
            },
            last_handshake: HandshakeTime::from_unix_secs(
                parse_value(handshake, "handshake").map_err(at)?,
            ),
            rx_bytes: Bytes(parse_value(rx, "byte count").map_err(at)?),
            tx_bytes: Bytes(parse_value(tx, "byte count").map_err(at)?),
        });
    }
    Ok(runtime)
}

/// Overlays live state onto a parsed file. Peers are matched by public key;
/// peers only known to the running interface are appended.
pub fn merge_runtime(config: &mut Config, runtime: Runtime) {
    if runtime.listen_port > 0 {
        config.interface.listen_port = runtime.listen_port;
    }
    for live in runtime.peers {
        match config
            .peers
            .iter_mut()
            .find(|p| p.public_key == live.public_key)
        {
            Some(p) => {
                if live.endpoint.is_some() {
                    p.endpoint = live.endpoint;
                }
                p.last_handshake = live.last_handshake;
                p.rx_bytes = live.rx_bytes;
                p.tx_bytes = live.tx_bytes;
            }
            None => config.peers.push(live),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const PEER_A: &str = "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=";
    const PEER_B: &str = "TrMvSoP4jYQlY6RIzBgbssQqY3vxI2Pi+y71lOWWXX0=";
    const PRIVATE: &str = "yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";

    fn sample() -> String {
        format!(
            "# office tunnel
[Interface]
PrivateKey = {PRIVATE}
ListenPort = 51820
Address = 10.0.0.2/24, fd00::2/64
DNS = 1.1.1.1, corp.example.com
MTU = 1420

[Peer]
PublicKey = {PEER_A}
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = vpn.example.com:51820
PersistentKeepalive = 25

[Peer]
publickey = {PEER_B}
PresharedKey = {PEER_A}
AllowedIPs = 10.0.0.3/32
"
        )
    }

    #[test]
    fn parses_wg_quick_file() {
        let config = parse_conf("office", &sample()).unwrap();
        assert_eq!(config.name, "office");

        let iface = &config.interface;
        assert_eq!(iface.private_key.to_string(), PRIVATE);
        assert_eq!(iface.listen_port, 51820);
        assert_eq!(iface.mtu, 1420);
        assert_eq!(iface.addresses.len(), 2);
        assert_eq!(iface.dns, vec!["1.1.1.1".parse::<IpAddr>().unwrap()]);

        assert_eq!(config.peers.len(), 2);
        let a = &config.peers[0];
        assert_eq!(a.public_key.to_string(), PEER_A);
        assert_eq!(a.allowed_ips.len(), 2);
        assert_eq!(a.endpoint.as_ref().unwrap().to_string(), "vpn.example.com:51820");
        assert_eq!(a.persistent_keepalive, 25);
        assert!(a.preshared_key.is_zero());

        let b = &config.peers[1];
        assert_eq!(b.public_key.to_string(), PEER_B);
        assert!(!b.preshared_key.is_zero());
        assert_eq!(b.endpoint, None);
    }

    #[test]
    fn bad_value_reports_line() {
        let text = "[Interface]\nPrivateKey = AAAA\n";
        assert!(matches!(parse_conf("x", text), Err(Error::Parse { line: 2, .. })));

        let text = format!("[Interface]\nPrivateKey = {PRIVATE}\nMTU = big\n");
        assert!(matches!(parse_conf("x", &text), Err(Error::Parse { line: 3, .. })));

        let text = "[Interface]\nnonsense\n";
        assert!(matches!(parse_conf("x", text), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn peer_without_key_is_rejected() {
        let text = "[Interface]\n\n[Peer]\nAllowedIPs = 10.0.0.0/8\n";
        assert!(matches!(parse_conf("x", text), Err(Error::Parse { line: 3, .. })));
    }

    #[test]
    fn parses_dump() {
        let dump = format!(
            "{PRIVATE}\t{PEER_A}\t51821\toff\n\
             {PEER_A}\t(none)\t203.0.113.5:51820\t0.0.0.0/0,::/0\t1700000000\t1024\t2048\t25\n\
             {PEER_B}\t(none)\t(none)\t(none)\t0\t0\t0\toff\n"
        );
        let runtime = parse_dump(&dump).unwrap();
        assert_eq!(runtime.listen_port, 51821);
        assert_eq!(runtime.peers.len(), 2);

        let a = &runtime.peers[0];
        assert_eq!(a.endpoint.as_ref().unwrap().to_string(), "203.0.113.5:51820");
        assert_eq!(a.allowed_ips.len(), 2);
        assert!(a.last_handshake.is_some());
        assert_eq!((a.rx_bytes, a.tx_bytes), (Bytes(1024), Bytes(2048)));
        assert_eq!(a.persistent_keepalive, 25);

        let b = &runtime.peers[1];
        assert_eq!(b.endpoint, None);
        assert!(b.allowed_ips.is_empty());
        assert_eq!(b.last_handshake, None);
        assert_eq!(b.persistent_keepalive, 0);
    }

    #[test]
    fn short_dump_line_is_an_error() {
        let dump = format!("{PRIVATE}\t{PEER_A}\t51821\toff\n{PEER_A}\t(none)\n");
        assert!(matches!(parse_dump(&dump), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn runtime_overlays_file_by_key() {
        let mut config = parse_conf("office", &sample()).unwrap();
        let extra = Peer {
            public_key: Key::from_bytes([3; 32]),
            ..Default::default()
        };
        let runtime = Runtime {
            listen_port: 40000,
            peers: vec![
                Peer {
                    public_key: PEER_B.parse().unwrap(),
                    rx_bytes: Bytes(5),
                    ..Default::default()
                },
                extra.clone(),
            ],
        };
        merge_runtime(&mut config, runtime);

        assert_eq!(config.interface.listen_port, 40000);
        assert_eq!(config.peers.len(), 3);
        assert_eq!(config.peers[1].rx_bytes, Bytes(5));
        // file data survives when the dump has nothing better
        assert_eq!(config.peers[1].allowed_ips.len(), 1);
        assert_eq!(config.peers[2], extra);
    }

    #[test]
    fn discovers_sorted_tunnels() {
        let dir = std::env::temp_dir().join(format!("wg-confview-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["b.conf", "a.conf", "notes.txt"] {
            fs::write(dir.join(name), "").unwrap();
        }
        assert_eq!(discover_tunnels(&dir), ["a", "b"]);
        fs::remove_dir_all(&dir).unwrap();
    }
}
