//! SSD subscription format (`ssd://<base64 JSON>`, §4.4): an airport-wide
//! JSON object carrying shared defaults plus a `servers` array of
//! Shadowsocks entries that may override them.

use crate::model::{Node, ProxyType};
use serde_json::Value;

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(|s| s.to_string())
}

fn u16_field(v: &Value, key: &str) -> Option<u16> {
    v.get(key)
        .and_then(|x| x.as_u64().or_else(|| x.as_str().and_then(|s| s.parse().ok())))
        .map(|n| n as u16)
}

pub fn parse_ssd_link(link: &str) -> Vec<Node> {
    let Some(rest) = link.strip_prefix("ssd://") else {
        return Vec::new();
    };
    let Some(json_text) = crate::parser::link::decode_base64_string_lenient(rest) else {
        return Vec::new();
    };
    let Ok(root) = serde_json::from_str::<Value>(&json_text) else {
        return Vec::new();
    };

    let default_port = u16_field(&root, "port");
    let default_method = str_field(&root, "encryption");
    let default_password = str_field(&root, "password");
    let airport = str_field(&root, "airport").unwrap_or_default();

    let Some(servers) = root.get("servers").and_then(|s| s.as_array()) else {
        return Vec::new();
    };

    servers
        .iter()
        .filter_map(|entry| {
            let host = str_field(entry, "server")?;
            let port = u16_field(entry, "port").or(default_port)?;
            if host.is_empty() || port == 0 {
                return None;
            }
            let mut node = Node::new(ProxyType::Shadowsocks, host, port);
            node.encrypt_method = str_field(entry, "encryption").or(default_method.clone()).unwrap_or_default();
            node.password = str_field(entry, "password").or(default_password.clone()).unwrap_or_default();
            node.plugin = str_field(entry, "plugin").unwrap_or_default();
            node.plugin_option = str_field(entry, "plugin_options").unwrap_or_default();
            node.remark = str_field(entry, "remarks").unwrap_or_default();
            if node.remark.is_empty() && !airport.is_empty() {
                node.remark = format!("{}-{}", airport, node.hostname);
            }
            node.finalize_remark();
            Some(node)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn parses_servers_with_shared_defaults() {
        let json = r#"{"airport":"Test","port":443,"encryption":"aes-256-gcm","password":"shared","servers":[{"server":"1.2.3.4","remarks":"A"},{"server":"5.6.7.8","password":"override","remarks":"B"}]}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let nodes = parse_ssd_link(&format!("ssd://{}", encoded));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].password, "shared");
        assert_eq!(nodes[1].password, "override");
        assert_eq!(nodes[0].port, 443);
    }
}
