//! WireGuard peer config parser (§4.4.1): a minimal INI-style grammar with
//! `[Interface]`/`[Peer]` sections, shared by the Surge bulk parser and a
//! standalone `.conf` bulk form.

use crate::model::{Node, ProxyType};
use std::collections::HashMap;

/// Parses one WireGuard client config into a node. Endpoint host/port come
/// from `Peer.Endpoint`; everything else maps field-for-field.
pub fn parse_wireguard_conf(text: &str, remark: &str) -> Node {
    let mut interface: HashMap<String, String> = HashMap::new();
    let mut peer: HashMap<String, String> = HashMap::new();
    let mut section = "";

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                s if s.eq_ignore_ascii_case("interface") => "interface",
                s if s.eq_ignore_ascii_case("peer") => "peer",
                _ => "",
            };
            continue;
        }
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim().to_ascii_lowercase();
        let value = v.trim().to_string();
        match section {
            "interface" => {
                interface.insert(key, value);
            }
            "peer" => {
                peer.insert(key, value);
            }
            _ => {}
        }
    }

    let endpoint = peer.get("endpoint").cloned().unwrap_or_default();
    let (host, port) = match endpoint.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.parse::<u16>().unwrap_or(0)),
        None => (String::new(), 0),
    };

    let mut node = Node::new(ProxyType::WireGuard, host, port);
    node.remark = remark.to_string();
    node.private_key = interface.get("privatekey").cloned().unwrap_or_default();
    node.public_key = peer.get("publickey").cloned().unwrap_or_default();
    node.pre_shared_key = peer.get("presharedkey").cloned().unwrap_or_default();
    node.mtu = interface
        .get("mtu")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    node.keep_alive = peer
        .get("persistentkeepalive")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    node.allowed_ips = peer.get("allowedips").cloned().unwrap_or_else(|| "0.0.0.0/0,::/0".to_string());

    if let Some(addr) = interface.get("address") {
        for part in addr.split(',') {
            let part = part.trim();
            if part.contains(':') && !part.contains('.') {
                node.self_ipv6 = part.split('/').next().unwrap_or(part).to_string();
            } else if !part.is_empty() {
                node.self_ip = part.split('/').next().unwrap_or(part).to_string();
            }
        }
    }
    if let Some(dns) = interface.get("dns") {
        node.dns_servers = dns.split(',').map(|s| s.trim().to_string()).collect();
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interface_and_peer_sections() {
        let text = "\
[Interface]
PrivateKey = cHJpdg==
Address = 10.0.0.2/32
DNS = 1.1.1.1

[Peer]
PublicKey = cHVidg==
Endpoint = wg.example.com:51820
AllowedIPs = 0.0.0.0/0
PersistentKeepalive = 25
";
        let node = parse_wireguard_conf(text, "WG Node");
        assert_eq!(node.node_type, ProxyType::WireGuard);
        assert_eq!(node.hostname, "wg.example.com");
        assert_eq!(node.port, 51820);
        assert_eq!(node.private_key, "cHJpdg==");
        assert_eq!(node.public_key, "cHVidg==");
        assert_eq!(node.self_ip, "10.0.0.2");
        assert_eq!(node.keep_alive, 25);
        assert_eq!(node.dns_servers, vec!["1.1.1.1".to_string()]);
    }
}
