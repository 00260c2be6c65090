//! QuantumultX bulk config parser (§4.4): `type=host:port,tag=...,key=val,...`
//! lines, one node each.

use crate::model::{Node, ProxyType, TransferProtocol};
use std::collections::HashMap;

pub fn parse_quantumultx_lines(content: &str) -> Vec<Node> {
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(parse_one_line)
        .collect()
}

fn parse_one_line(line: &str) -> Option<Node> {
    let (kind, rest) = line.split_once('=')?;
    let kind = kind.trim().to_lowercase();
    let mut fields = rest.split(',').map(|f| f.trim());
    let hostport = fields.next()?;
    let (host, port) = hostport.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }

    let kv: HashMap<String, String> = fields
        .filter_map(|f| f.split_once('='))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let mut node = match kind.as_str() {
        "shadowsocks" => {
            let mut n = Node::new(ProxyType::Shadowsocks, host, port);
            n.encrypt_method = kv.get("method").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n.plugin = kv.get("obfs").cloned().unwrap_or_default();
            n.plugin_option = kv.get("obfs-host").cloned().unwrap_or_default();
            n
        }
        "vmess" => {
            let mut n = Node::new(ProxyType::VMess, host, port);
            n.user_id = kv.get("password").or_else(|| kv.get("id")).cloned().unwrap_or_default();
            n.encrypt_method = kv.get("method").cloned().unwrap_or_else(|| "auto".to_string());
            n.transfer_protocol = TransferProtocol::parse(kv.get("obfs").map(|s| s.as_str()).unwrap_or("tcp"));
            n.path = kv.get("obfs-path").cloned().unwrap_or_default();
            n.host = kv.get("obfs-host").cloned().unwrap_or_default();
            n.tls_secure = kv.get("obfs").map(|v| v == "wss" || v == "over-tls").unwrap_or(false);
            n.ensure_vmess_defaults();
            n
        }
        "trojan" => {
            let mut n = Node::new(ProxyType::Trojan, host, port);
            n.password = kv.get("password").cloned().unwrap_or_default();
            n.server_name = kv.get("tls-host").cloned().unwrap_or_default();
            n
        }
        "socks5" => {
            let mut n = Node::new(ProxyType::Socks5, host, port);
            n.username = kv.get("username").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n
        }
        "http" => {
            let mut n = Node::new(ProxyType::Http, host, port);
            n.username = kv.get("username").cloned().unwrap_or_default();
            n.password = kv.get("password").cloned().unwrap_or_default();
            n
        }
        _ => return None,
    };
    node.remark = kv.get("tag").cloned().unwrap_or_default();
    node.finalize_remark();
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shadowsocks_line() {
        let line = "shadowsocks=1.2.3.4:443, method=aes-256-gcm, password=pw, tag=HK";
        let nodes = parse_quantumultx_lines(line);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, ProxyType::Shadowsocks);
        assert_eq!(nodes[0].remark, "HK");
    }

    #[test]
    fn malformed_line_is_skipped() {
        assert!(parse_quantumultx_lines("not a valid line").is_empty());
    }
}
