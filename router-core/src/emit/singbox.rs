//! SingBox JSON emitter (§4.9): `outbounds` + `route.rules`, `final` taken
//! from the `MATCH` rule's policy, with the optional clash-mode selectors.

use super::render_rules;
use crate::group_builder::BuiltGroup;
use crate::model::{Node, ProxyType, TransferProtocol};
use crate::ruleset::{RulesetContent, Target};
use crate::settings::ExtraSettings;
use serde_json::{json, Value};

pub fn emit_singbox(nodes: &[Node], groups: &[BuiltGroup], rulesets: &mut [RulesetContent], ext: &ExtraSettings) -> String {
    let mut outbounds: Vec<Value> = Vec::new();
    for node in nodes {
        if let Some(v) = render_outbound(node, ext) {
            outbounds.push(v);
        }
    }
    for g in groups {
        outbounds.push(json!({
            "type": "selector",
            "tag": g.config.name,
            "outbounds": g.members,
        }));
    }
    outbounds.push(json!({"type": "dns", "tag": "dns-out"}));
    outbounds.push(json!({"type": "direct", "tag": "direct"}));

    let lines = render_rules(rulesets, Target::SingBox, 32_000);
    let mut rules: Vec<Value> = Vec::new();
    let mut final_policy = String::new();
    for line in &lines {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.is_empty() {
            continue;
        }
        if fields[0] == "MATCH" {
            final_policy = fields.get(1).unwrap_or(&"").to_string();
            continue;
        }
        rules.push(json!({ "raw": line }));
    }
    rules.push(json!({"protocol": "dns", "outbound": "dns-out"}));
    if ext.singbox_add_clash_modes {
        rules.push(json!({"clash-mode": "Direct", "outbound": "direct"}));
        rules.push(json!({"clash-mode": "Global", "outbound": final_policy}));
    }

    let doc = json!({
        "outbounds": outbounds,
        "route": {
            "rules": rules,
            "final": final_policy,
        },
    });
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}

fn render_outbound(node: &Node, ext: &ExtraSettings) -> Option<Value> {
    let base = match node.node_type {
        ProxyType::Shadowsocks => json!({
            "type": "shadowsocks",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "method": node.encrypt_method,
            "password": node.password,
        }),
        ProxyType::VMess => json!({
            "type": "vmess",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "uuid": node.user_id,
            "security": node.encrypt_method,
            "transport": vmess_transport(node),
        }),
        ProxyType::Trojan => json!({
            "type": "trojan",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "password": node.password,
        }),
        ProxyType::Http => json!({
            "type": "http",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "username": node.username,
            "password": node.password,
        }),
        ProxyType::Socks5 => json!({
            "type": "socks",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "username": node.username,
            "password": node.password,
        }),
        ProxyType::WireGuard => json!({
            "type": "wireguard",
            "tag": node.remark,
            "server": node.hostname,
            "server_port": node.port,
            "private_key": node.private_key,
            "peer_public_key": node.public_key,
            "local_address": [node.self_ip.clone()],
        }),
        _ => return None,
    };
    let mut v = base;
    v["tls"] = json!({
        "enabled": node.tls_secure,
        "insecure": ext.resolve_scv(node.allow_insecure),
        "server_name": node.server_name,
    });
    Some(v)
}

fn vmess_transport(node: &Node) -> Value {
    match node.transfer_protocol {
        TransferProtocol::Ws => json!({"type": "ws", "path": node.path, "headers": {"Host": node.host}}),
        TransferProtocol::Grpc => json!({"type": "grpc", "service_name": node.path}),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_valid_json_with_outbounds() {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.remark = "A".to_string();
        n.encrypt_method = "aes-256-gcm".to_string();
        n.password = "pw".to_string();
        let out = emit_singbox(&[n], &[], &mut [], &ExtraSettings::default());
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert!(parsed["outbounds"].as_array().unwrap().len() >= 1);
    }
}
