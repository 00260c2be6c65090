//! Clash YAML proxies parser: reads the `proxies:` list, one entry per
//! node, keyed by its `type` field.

use crate::model::{Node, ProxyType, TransferProtocol};
use crate::tribool::TriBool;
use serde_yaml::Value;

fn s(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str().map(|s| s.to_string()).or_else(|| x.as_bool().map(|b| b.to_string())).or_else(|| x.as_i64().map(|i| i.to_string())))
        .unwrap_or_default()
}

fn u16_v(v: &Value, key: &str) -> u16 {
    v.get(key).and_then(|x| x.as_u64()).unwrap_or(0) as u16
}

fn bool_v(v: &Value, key: &str) -> TriBool {
    v.get(key).and_then(|x| x.as_bool()).map(TriBool::from).unwrap_or_default()
}

pub fn parse_clash_yaml(content: &str) -> Vec<Node> {
    let Ok(doc) = serde_yaml::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(proxies) = doc.get("proxies").and_then(|p| p.as_sequence()) else {
        return Vec::new();
    };
    proxies.iter().filter_map(parse_one_proxy).collect()
}

fn parse_one_proxy(v: &Value) -> Option<Node> {
    let host = s(v, "server");
    let port = u16_v(v, "port");
    if host.is_empty() || port == 0 {
        return None;
    }
    let type_str = s(v, "type").to_lowercase();
    let mut node = match type_str.as_str() {
        "ss" | "shadowsocks" => {
            let mut n = Node::new(ProxyType::Shadowsocks, host, port);
            n.encrypt_method = s(v, "cipher");
            n.password = s(v, "password");
            if let Some(plugin) = v.get("plugin").and_then(|x| x.as_str()) {
                n.plugin = plugin.to_string();
                if let Some(opts) = v.get("plugin-opts") {
                    n.plugin_option = opts
                        .as_mapping()
                        .map(|m| {
                            m.iter()
                                .map(|(k, val)| format!("{}={}", yaml_key(k), yaml_scalar(val)))
                                .collect::<Vec<_>>()
                                .join(";")
                        })
                        .unwrap_or_default();
                }
            }
            n
        }
        "ssr" | "shadowsocksr" => {
            let mut n = Node::new(ProxyType::ShadowsocksR, host, port);
            n.encrypt_method = s(v, "cipher");
            n.password = s(v, "password");
            n.protocol = s(v, "protocol");
            n.protocol_param = s(v, "protocol-param");
            n.obfs = s(v, "obfs");
            n.obfs_param = s(v, "obfs-param");
            n
        }
        "vmess" => {
            let mut n = Node::new(ProxyType::VMess, host, port);
            n.user_id = s(v, "uuid");
            n.encrypt_method = {
                let c = s(v, "cipher");
                if c.is_empty() { "auto".to_string() } else { c }
            };
            n.transfer_protocol = TransferProtocol::parse(&s(v, "network"));
            n.tls_secure = v.get("tls").and_then(|x| x.as_bool()).unwrap_or(false);
            n.server_name = s(v, "servername");
            match n.transfer_protocol {
                TransferProtocol::Ws => {
                    n.path = v
                        .get("ws-opts")
                        .and_then(|o| o.get("path"))
                        .and_then(|x| x.as_str())
                        .unwrap_or("/")
                        .to_string();
                    n.host = v
                        .get("ws-opts")
                        .and_then(|o| o.get("headers"))
                        .and_then(|h| h.get("Host"))
                        .and_then(|x| x.as_str())
                        .unwrap_or_default()
                        .to_string();
                }
                TransferProtocol::Grpc => {
                    n.path = v
                        .get("grpc-opts")
                        .and_then(|o| o.get("grpc-service-name"))
                        .and_then(|x| x.as_str())
                        .unwrap_or_default()
                        .to_string();
                }
                _ => {}
            }
            n.ensure_vmess_defaults();
            n
        }
        "trojan" => {
            let mut n = Node::new(ProxyType::Trojan, host, port);
            n.password = s(v, "password");
            n.server_name = s(v, "sni");
            n.allow_insecure = bool_v(v, "skip-cert-verify");
            n
        }
        "http" => {
            let mut n = Node::new(ProxyType::Http, host, port);
            n.username = s(v, "username");
            n.password = s(v, "password");
            n
        }
        "socks5" => {
            let mut n = Node::new(ProxyType::Socks5, host, port);
            n.username = s(v, "username");
            n.password = s(v, "password");
            n
        }
        "snell" => {
            let mut n = Node::new(ProxyType::Snell, host, port);
            n.password = s(v, "psk");
            n.obfs = v
                .get("obfs-opts")
                .and_then(|o| o.get("mode"))
                .and_then(|x| x.as_str())
                .unwrap_or_default()
                .to_string();
            n
        }
        "wireguard" => {
            let mut n = Node::new(ProxyType::WireGuard, host, port);
            n.private_key = s(v, "private-key");
            n.public_key = s(v, "public-key");
            n.self_ip = s(v, "ip");
            n.self_ipv6 = s(v, "ipv6");
            n
        }
        "hysteria" => {
            let mut n = Node::new(ProxyType::Hysteria, host, port);
            n.auth_str = s(v, "auth-str");
            n.up = s(v, "up");
            n.down = s(v, "down");
            n.sni = s(v, "sni");
            n
        }
        "hysteria2" => {
            let mut n = Node::new(ProxyType::Hysteria2, host, port);
            n.password = s(v, "password");
            n.up = s(v, "up");
            n.down = s(v, "down");
            n.sni = s(v, "sni");
            n
        }
        _ => return None,
    };
    node.remark = s(v, "name");
    node.udp = bool_v(v, "udp");
    node.tcp_fast_open = bool_v(v, "tfo");
    node.finalize_remark();
    Some(node)
}

fn yaml_key(k: &Value) -> String {
    k.as_str().map(|s| s.to_string()).unwrap_or_default()
}

fn yaml_scalar(v: &Value) -> String {
    v.as_str()
        .map(|s| s.to_string())
        .or_else(|| v.as_i64().map(|i| i.to_string()))
        .or_else(|| v.as_bool().map(|b| b.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ss_and_vmess_entries() {
        let content = "\
proxies:
  - {name: A, type: ss, server: 1.2.3.4, port: 443, cipher: aes-256-gcm, password: pw}
  - {name: B, type: vmess, server: v.example, port: 443, uuid: u, alterId: 0, cipher: auto, network: ws, ws-opts: {path: /ray, headers: {Host: cdn.example}}}
";
        let nodes = parse_clash_yaml(content);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_type, ProxyType::Shadowsocks);
        assert_eq!(nodes[1].node_type, ProxyType::VMess);
        assert_eq!(nodes[1].path, "/ray");
        assert_eq!(nodes[1].host, "cdn.example");
    }

    #[test]
    fn missing_proxies_key_yields_empty() {
        assert!(parse_clash_yaml("foo: bar").is_empty());
    }
}
