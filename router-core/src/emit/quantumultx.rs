//! QuantumultX emitter (§4.9): server-local `key = value` lines per node, a
//! base64-encoded policy section, and surge-shaped rules rewritten to the
//! QuantumultX rule head dialect.

use super::render_rules;
use crate::group::GroupType;
use crate::group_builder::BuiltGroup;
use crate::model::{Node, ProxyType};
use crate::ruleset::{RulesetContent, Target};
use crate::settings::ExtraSettings;
use base64::Engine as _;
use std::fmt::Write as _;

pub fn emit_quantumultx(nodes: &[Node], groups: &[BuiltGroup], rulesets: &mut [RulesetContent], ext: &ExtraSettings) -> String {
    let mut out = String::new();
    out.push_str("[server_local]\n");
    for node in nodes {
        if let Some(line) = render_server_line(node, ext) {
            let _ = writeln!(out, "{}", line);
        }
    }

    out.push_str("\n[policy]\n");
    for g in groups {
        let head = match g.config.group_type {
            GroupType::UrlTest => "available",
            GroupType::LoadBalance => "round-robin",
            GroupType::Ssid => "ssid",
            _ => "static",
        };
        let body = format!("{}={}, {}", head, g.config.name, g.members.join(", "));
        let encoded = base64::engine::general_purpose::STANDARD.encode(&body);
        let _ = writeln!(out, "{}", encoded);
    }

    if !rulesets.is_empty() {
        out.push_str("\n[filter_remote]\n");
        for line in render_rules(rulesets, Target::QuantumultX, 32_000) {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
}

fn render_server_line(node: &Node, ext: &ExtraSettings) -> Option<String> {
    let tfo = ext.resolve_tfo(node.tcp_fast_open);
    let scv = ext.resolve_scv(node.allow_insecure);

    let line = match node.node_type {
        ProxyType::Shadowsocks => format!(
            "shadowsocks={}:{}, method={}, password={}, fast-open={}, tag={}",
            node.hostname, node.port, node.encrypt_method, node.password, tfo, node.remark
        ),
        ProxyType::VMess => format!(
            "vmess={}:{}, method=chacha20-poly1305, password={}, obfs={}, fast-open={}, tls-verification={}, tag={}",
            node.hostname,
            node.port,
            node.user_id,
            node.transfer_protocol.as_str(),
            tfo,
            !scv,
            node.remark
        ),
        ProxyType::Trojan => format!(
            "trojan={}:{}, password={}, over-tls=true, tls-host={}, tls-verification={}, tag={}",
            node.hostname, node.port, node.password, node.server_name, !scv, node.remark
        ),
        ProxyType::Http => format!(
            "http={}:{}, username={}, password={}, fast-open={}, tag={}",
            node.hostname, node.port, node.username, node.password, tfo, node.remark
        ),
        ProxyType::Socks5 => format!(
            "socks5={}:{}, username={}, password={}, fast-open={}, tag={}",
            node.hostname, node.port, node.username, node.password, tfo, node.remark
        ),
        _ => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_shadowsocks_server_line() {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.remark = "A".to_string();
        n.encrypt_method = "aes-256-gcm".to_string();
        n.password = "pw".to_string();
        let out = emit_quantumultx(&[n], &[], &mut [], &ExtraSettings::default());
        assert!(out.contains("shadowsocks=1.2.3.4:443"));
        assert!(out.contains("tag=A"));
    }
}
