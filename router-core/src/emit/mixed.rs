//! Mixed / SSD / SSSub / single-protocol link emitters (§4.9): re-encodes
//! each node back into its URI form and joins the whole document in
//! base64, as a "simple subscription" consumer expects.

use super::EmitTarget;
use crate::model::{Node, ProxyType};
use base64::Engine as _;

/// Re-encodes `nodes` into link form, filtered to the protocols `target`
/// accepts, and base64-joins the whole document.
pub fn emit_mixed_links(nodes: &[Node], target: EmitTarget) -> String {
    let lines: Vec<String> = nodes
        .iter()
        .filter(|n| accepts(target, n.node_type))
        .filter_map(to_link)
        .collect();
    let joined = lines.join("\n");
    base64::engine::general_purpose::STANDARD.encode(joined)
}

fn accepts(target: EmitTarget, t: ProxyType) -> bool {
    match target {
        EmitTarget::Ss => matches!(t, ProxyType::Shadowsocks),
        EmitTarget::Ssr => matches!(t, ProxyType::ShadowsocksR),
        EmitTarget::V2ray => matches!(t, ProxyType::VMess),
        EmitTarget::Trojan => matches!(t, ProxyType::Trojan),
        EmitTarget::Ssd | EmitTarget::Sssub | EmitTarget::Mixed => matches!(
            t,
            ProxyType::Shadowsocks | ProxyType::ShadowsocksR | ProxyType::VMess | ProxyType::Trojan
        ),
        _ => false,
    }
}

fn to_link(node: &Node) -> Option<String> {
    match node.node_type {
        ProxyType::Shadowsocks => {
            let inner = format!("{}:{}@{}:{}", node.encrypt_method, node.password, node.hostname, node.port);
            let encoded = base64::engine::general_purpose::STANDARD.encode(inner);
            Some(format!("ss://{}#{}", encoded, urlencoding::encode(&node.remark)))
        }
        ProxyType::ShadowsocksR => {
            let main = format!(
                "{}:{}:{}:{}:{}:{}",
                node.hostname,
                node.port,
                node.protocol,
                node.encrypt_method,
                node.obfs,
                base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&node.password)
            );
            let params = format!(
                "obfsparam={}&protoparam={}&remarks={}",
                base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&node.obfs_param),
                base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&node.protocol_param),
                base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&node.remark)
            );
            let full = format!("{}/?{}", main, params);
            Some(format!("ssr://{}", base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(full)))
        }
        ProxyType::VMess => {
            let json = serde_json::json!({
                "v": "2",
                "ps": node.remark,
                "add": node.hostname,
                "port": node.port.to_string(),
                "id": node.user_id,
                "aid": "0",
                "net": node.transfer_protocol.as_str(),
                "type": "none",
                "host": node.host,
                "path": node.path,
                "tls": if node.tls_secure { "tls" } else { "" },
            });
            let encoded = base64::engine::general_purpose::STANDARD.encode(json.to_string());
            Some(format!("vmess://{}", encoded))
        }
        ProxyType::Trojan => {
            let mut link = format!("trojan://{}@{}:{}", node.password, node.hostname, node.port);
            if !node.server_name.is_empty() {
                link.push_str(&format!("?sni={}", node.server_name));
            }
            link.push('#');
            link.push_str(&urlencoding::encode(&node.remark));
            Some(link)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_output_decodes_to_link_list() {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.remark = "A".to_string();
        n.encrypt_method = "aes-256-gcm".to_string();
        n.password = "pw".to_string();
        let out = emit_mixed_links(&[n], EmitTarget::Mixed);
        let decoded = base64::engine::general_purpose::STANDARD.decode(out).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.starts_with("ss://"));
    }

    #[test]
    fn ss_target_filters_out_other_types() {
        let mut ss = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        ss.encrypt_method = "aes-256-gcm".to_string();
        ss.password = "pw".to_string();
        let mut trojan = Node::new(ProxyType::Trojan, "5.6.7.8", 443);
        trojan.password = "pw".to_string();
        let out = emit_mixed_links(&[ss, trojan], EmitTarget::Ss);
        let decoded = base64::engine::general_purpose::STANDARD.decode(out).unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(!text.contains("trojan://"));
    }
}
