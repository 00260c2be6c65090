//! Surge/Surfboard `.conf` bulk parser (§4.4): reads the `[Proxy]` section,
//! one `name = type, host, port, key=value, ...` line per node. WireGuard
//! entries reference a `[WireGuard <section>]` block by name (§4.4.1).

use crate::model::{Node, ProxyType, TransferProtocol};
use crate::tribool::TriBool;
use std::collections::HashMap;

pub fn parse_surge_ini(content: &str) -> Vec<Node> {
    let sections = split_sections(content);
    let Some(proxy_lines) = sections.get("proxy") else {
        return Vec::new();
    };

    proxy_lines
        .iter()
        .filter_map(|line| parse_proxy_line(line, &sections))
        .collect()
}

/// Splits the document into lower-cased section name -> body lines.
fn split_sections(content: &str) -> HashMap<String, Vec<String>> {
    let mut sections: HashMap<String, Vec<String>> = HashMap::new();
    let mut current = String::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with("//") {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            current = line[1..line.len() - 1].to_ascii_lowercase();
            sections.entry(current.clone()).or_default();
            continue;
        }
        if !current.is_empty() {
            sections.get_mut(&current).unwrap().push(line.to_string());
        }
    }
    sections
}

fn parse_proxy_line(line: &str, sections: &HashMap<String, Vec<String>>) -> Option<Node> {
    let (name, rest) = line.split_once('=')?;
    let name = name.trim();
    let fields: Vec<&str> = rest.split(',').map(|f| f.trim()).collect();
    if fields.is_empty() {
        return None;
    }
    let kind = fields[0].to_lowercase();
    let kv = parse_kv(&fields[1..]);

    let mut node = match kind.as_str() {
        "ss" | "shadowsocks" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(ProxyType::Shadowsocks, host, port);
            n.encrypt_method = kv.get("encrypt-method").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n.plugin = kv
                .get("obfs")
                .map(|_| "obfs-local".to_string())
                .unwrap_or_default();
            n.plugin_option = kv
                .get("obfs")
                .map(|o| format!("obfs={};obfs-host={}", o, kv.get("obfs-host").cloned().unwrap_or_default()))
                .unwrap_or_default();
            n
        }
        "vmess" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(ProxyType::VMess, host, port);
            n.user_id = kv.get("username").cloned().unwrap_or_default();
            n.tls_secure = kv.get("tls").map(|v| v == "true").unwrap_or(false);
            n.transfer_protocol = kv
                .get("ws")
                .filter(|v| *v == "true")
                .map(|_| TransferProtocol::Ws)
                .unwrap_or(TransferProtocol::Tcp);
            n.path = kv.get("ws-path").cloned().unwrap_or_default();
            n.host = kv
                .get("ws-headers")
                .map(|h| h.split(':').nth(1).unwrap_or("").trim().to_string())
                .unwrap_or_default();
            n.server_name = kv.get("sni").cloned().unwrap_or_default();
            n.ensure_vmess_defaults();
            n
        }
        "trojan" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(ProxyType::Trojan, host, port);
            n.password = kv.get("password").cloned().unwrap_or_default();
            n.server_name = kv.get("sni").cloned().unwrap_or_default();
            n
        }
        "socks5" | "socks5-tls" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(ProxyType::Socks5, host, port);
            n.username = kv.get("username").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n
        }
        "http" | "https" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(
                if kind == "https" { ProxyType::Https } else { ProxyType::Http },
                host,
                port,
            );
            n.username = kv.get("username").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n
        }
        "snell" => {
            let (host, port) = positional_host_port(&fields)?;
            let mut n = Node::new(ProxyType::Snell, host, port);
            n.password = kv.get("psk").cloned().unwrap_or_default();
            n.obfs = kv.get("obfs").cloned().unwrap_or_default();
            n
        }
        "wireguard" => {
            let section_name = kv.get("section-name")?.to_ascii_lowercase();
            let key = format!("wireguard {}", section_name);
            let body = sections.get(&key)?;
            return Some(parse_wireguard_peer_section(body, name));
        }
        _ => return None,
    };
    node.remark = name.to_string();
    node.allow_insecure = kv
        .get("skip-cert-verify")
        .map(|v| TriBool::from_str_loose(v))
        .unwrap_or_default();
    node.tcp_fast_open = kv.get("tfo").map(|v| TriBool::from_str_loose(v)).unwrap_or_default();
    node.udp = kv.get("udp-relay").map(|v| TriBool::from_str_loose(v)).unwrap_or_default();
    Some(node)
}

/// Surge's flat `[WireGuard <name>]` section: `key = value` lines with no
/// `[Interface]`/`[Peer]` sub-headers, unlike a standard `.conf` export.
fn parse_wireguard_peer_section(body: &[String], remark: &str) -> Node {
    let kv = parse_kv(&body.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    let endpoint = kv.get("endpoint").cloned().unwrap_or_default();
    let (host, port) = endpoint
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.parse().unwrap_or(0)))
        .unwrap_or_default();
    let mut node = Node::new(ProxyType::WireGuard, host, port);
    node.remark = remark.to_string();
    node.private_key = kv.get("private-key").cloned().unwrap_or_default();
    node.public_key = kv.get("public-key").cloned().unwrap_or_default();
    node.pre_shared_key = kv.get("preshared-key").cloned().unwrap_or_default();
    node.self_ip = kv.get("self-ip").cloned().unwrap_or_default();
    node.self_ipv6 = kv.get("self-ip-v6").cloned().unwrap_or_default();
    node.mtu = kv.get("mtu").and_then(|s| s.parse().ok()).unwrap_or(0);
    node.allowed_ips = kv.get("allowed-ips").cloned().unwrap_or_else(|| "0.0.0.0/0,::/0".to_string());
    if let Some(dns) = kv.get("dns-server") {
        node.dns_servers = dns.split(',').map(|s| s.trim().to_string()).collect();
    }
    node
}

fn positional_host_port(fields: &[&str]) -> Option<(String, u16)> {
    let host = fields.get(1)?.trim().to_string();
    let port: u16 = fields.get(2)?.trim().parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some((host, port))
}

fn parse_kv(fields: &[&str]) -> HashMap<String, String> {
    fields
        .iter()
        .filter_map(|f| f.split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ss_line_with_obfs() {
        let content = "\
[Proxy]
HK-01 = ss, 1.2.3.4, 443, encrypt-method=aes-256-gcm, password=pw, obfs=tls, obfs-host=www.example.com
";
        let nodes = parse_surge_ini(content);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, ProxyType::Shadowsocks);
        assert_eq!(nodes[0].remark, "HK-01");
        assert!(nodes[0].plugin_option.contains("obfs=tls"));
    }

    #[test]
    fn parses_wireguard_line_via_referenced_section() {
        let content = "\
[Proxy]
WG-01 = wireguard, section-name=Peer1

[WireGuard Peer1]
private-key = cHJpdg==
self-ip = 10.0.0.2
public-key = cHVidg==
endpoint = wg.example.com:51820
";
        let nodes = parse_surge_ini(content);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, ProxyType::WireGuard);
        assert_eq!(nodes[0].hostname, "wg.example.com");
        assert_eq!(nodes[0].remark, "WG-01");
    }
}
