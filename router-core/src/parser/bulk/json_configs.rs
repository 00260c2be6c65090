//! JSON bulk dialects: SS native `gui-config.json`, SSR native config,
//! SS-Android, SSTap, and Netch's server-list export.

use crate::model::{Node, ProxyType, TransferProtocol};
use serde_json::Value;

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(|x| x.as_str()).unwrap_or_default().to_string()
}

fn u16_field(v: &Value, key: &str) -> u16 {
    v.get(key)
        .and_then(|x| x.as_u64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0) as u16
}

/// `{"configs":[{server, server_port, password, method, remarks, plugin, plugin_opts}, ...]}`
pub fn parse_ss_native_json(content: &str) -> Vec<Node> {
    let Ok(v) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(arr) = v.get("configs").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| {
            let host = str_field(entry, "server");
            let port = u16_field(entry, "server_port");
            if host.is_empty() || port == 0 {
                return None;
            }
            let mut node = Node::new(ProxyType::Shadowsocks, host, port);
            node.password = str_field(entry, "password");
            node.encrypt_method = str_field(entry, "method");
            node.remark = str_field(entry, "remarks");
            node.plugin = str_field(entry, "plugin");
            node.plugin_option = str_field(entry, "plugin_opts");
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

/// SSR native config shares the SS schema plus `protocol`/`obfs` fields,
/// with the server list under `servers` rather than `configs`.
pub fn parse_ssr_native_json(content: &str) -> Vec<Node> {
    let Ok(v) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(arr) = v.get("servers").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| {
            let host = str_field(entry, "server");
            let port = u16_field(entry, "server_port");
            if host.is_empty() || port == 0 {
                return None;
            }
            let mut node = Node::new(ProxyType::ShadowsocksR, host, port);
            node.password = str_field(entry, "password");
            node.encrypt_method = str_field(entry, "method");
            node.protocol = str_field(entry, "protocol");
            node.protocol_param = str_field(entry, "protocol_param");
            node.obfs = str_field(entry, "obfs");
            node.obfs_param = str_field(entry, "obfs_param");
            node.remark = str_field(entry, "remarks");
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

/// SS-Android exports a bare JSON array of server objects.
pub fn parse_ss_android_json(content: &str) -> Vec<Node> {
    let Ok(v) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(arr) = v.as_array() else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| {
            let host = str_field(entry, "server");
            let port = u16_field(entry, "server_port");
            if host.is_empty() || port == 0 {
                return None;
            }
            let mut node = Node::new(ProxyType::Shadowsocks, host, port);
            node.password = str_field(entry, "password");
            node.encrypt_method = str_field(entry, "method");
            node.remark = str_field(entry, "remarks");
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

/// SSTap nests each entry's connection info under a `server` sub-object.
pub fn parse_sstap_json(content: &str) -> Vec<Node> {
    let Ok(v) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(arr) = v.get("configs").and_then(|c| c.as_array()) else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| {
            let server = entry.get("server")?;
            let host = str_field(server, "host");
            let port = u16_field(server, "port");
            if host.is_empty() || port == 0 {
                return None;
            }
            let mut node = Node::new(ProxyType::Shadowsocks, host, port);
            node.password = str_field(server, "password");
            node.encrypt_method = str_field(server, "method");
            node.remark = str_field(entry, "remarks");
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

/// Netch's server-list export: a bare JSON array tagged with PascalCase
/// `Type` values.
pub fn parse_netch_json(content: &str) -> Vec<Node> {
    let Ok(v) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let Some(arr) = v.as_array() else {
        return Vec::new();
    };
    arr.iter()
        .filter_map(|entry| {
            let host = str_field(entry, "Hostname");
            let port = u16_field(entry, "Port");
            if host.is_empty() || port == 0 {
                return None;
            }
            let node_type = str_field(entry, "Type").to_lowercase();
            let mut node = match node_type.as_str() {
                "shadowsocks" | "ss" => {
                    let mut n = Node::new(ProxyType::Shadowsocks, host, port);
                    n.encrypt_method = str_field(entry, "EncryptMethod");
                    n.password = str_field(entry, "Password");
                    n
                }
                "vmess" => {
                    let mut n = Node::new(ProxyType::VMess, host, port);
                    n.user_id = str_field(entry, "UserID");
                    n.transfer_protocol = TransferProtocol::parse(&str_field(entry, "TransferProtocol"));
                    n.path = str_field(entry, "Path");
                    n.host = str_field(entry, "Host");
                    n.ensure_vmess_defaults();
                    n
                }
                "socks5" | "socks" => {
                    let mut n = Node::new(ProxyType::Socks5, host, port);
                    n.username = str_field(entry, "Username");
                    n.password = str_field(entry, "Password");
                    n
                }
                "trojan" => {
                    let mut n = Node::new(ProxyType::Trojan, host, port);
                    n.password = str_field(entry, "Password");
                    n
                }
                _ => return None,
            };
            node.remark = str_field(entry, "Remark");
            node.group = str_field(entry, "Group");
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ss_native_json_parses_configs_array() {
        let content = r#"{"configs":[{"server":"1.2.3.4","server_port":443,"password":"pw","method":"aes-256-gcm","remarks":"A"}]}"#;
        let nodes = parse_ss_native_json(content);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].hostname, "1.2.3.4");
        assert_eq!(nodes[0].remark, "A");
    }

    #[test]
    fn netch_json_parses_vmess_entry() {
        let content = r#"[{"Type":"VMess","Hostname":"v.example","Port":443,"UserID":"uuid","Remark":"B"}]"#;
        let nodes = parse_netch_json(content);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, ProxyType::VMess);
        assert_eq!(nodes[0].user_id, "uuid");
    }

    #[test]
    fn malformed_json_yields_empty_not_panic() {
        assert!(parse_ss_native_json("not json").is_empty());
    }
}
