//! Clash YAML emitter (§4.9).

use super::render_rules;
use crate::group::GroupType;
use crate::group_builder::BuiltGroup;
use crate::model::{Node, ProxyType, TransferProtocol};
use crate::ruleset::{RulesetContent, Target};
use crate::settings::ExtraSettings;
use std::collections::HashSet;
use std::fmt::Write as _;

const DEPRECATED_SS_CIPHERS: &[&str] = &["chacha20"];
const ALLOWED_SSR_CIPHERS: &[&str] = &[
    "rc4-md5",
    "aes-128-ctr",
    "aes-192-ctr",
    "aes-256-ctr",
    "aes-128-cfb",
    "aes-192-cfb",
    "aes-256-cfb",
    "chacha20-ietf",
    "xchacha20",
    "none",
];
const ALLOWED_SSR_PROTOCOLS: &[&str] = &[
    "origin",
    "auth_sha1_v4",
    "auth_aes128_md5",
    "auth_aes128_sha1",
    "auth_chain_a",
    "auth_chain_b",
];
const ALLOWED_SSR_OBFS: &[&str] = &[
    "plain",
    "http_simple",
    "http_post",
    "random_head",
    "tls1.2_ticket_auth",
    "tls1.2_ticket_fastauth",
];

fn yaml_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// All-digit passwords need the `!!str` tag so YAML parsers don't coerce
/// them to a number.
fn yaml_password(s: &str) -> String {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        format!("!!str {}", yaml_quote(s))
    } else {
        yaml_quote(s)
    }
}

pub fn emit_clash(nodes: &[Node], groups: &[BuiltGroup], rulesets: &mut [RulesetContent], ext: &ExtraSettings) -> String {
    let mut out = String::new();
    out.push_str("proxies:\n");

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut emitted_names: Vec<String> = Vec::new();

    for node in nodes {
        let Some(body) = render_proxy(node, ext) else { continue };
        let name = dedup_name(&node.remark, &mut seen_names);
        emitted_names.push(name.clone());
        let _ = writeln!(out, "  - name: {}", yaml_quote(&name));
        for line in body.lines() {
            let _ = writeln!(out, "    {}", line);
        }
    }

    let proxy_key = if ext.clash_new_field_name { "proxy-groups" } else { "Proxy Group" };
    out.push_str(&format!("{}:\n", proxy_key));
    for g in groups {
        let _ = writeln!(out, "  - name: {}", yaml_quote(&g.config.name));
        let _ = writeln!(out, "    type: {}", group_type_str(g.config.group_type));
        let (provider_refs, plain_members): (Vec<&String>, Vec<&String>) =
            g.members.iter().partition(|m| m.starts_with("!!PROVIDER="));
        if !plain_members.is_empty() {
            out.push_str("    proxies:\n");
            for m in &plain_members {
                let _ = writeln!(out, "      - {}", yaml_quote(m));
            }
        }
        if !provider_refs.is_empty() {
            out.push_str("    use:\n");
            for m in &provider_refs {
                let name = m.trim_start_matches("!!PROVIDER=");
                let _ = writeln!(out, "      - {}", yaml_quote(name));
            }
        }
        if let Some(url) = &g.config.url {
            let _ = writeln!(out, "    url: {}", yaml_quote(url));
        }
        if let Some(interval) = g.config.interval {
            let _ = writeln!(out, "    interval: {}", interval);
        }
    }

    if !rulesets.is_empty() {
        let rule_key = if ext.clash_new_field_name { "rules" } else { "Rule" };
        out.push_str(&format!("{}:\n", rule_key));
        for line in render_rules(rulesets, Target::Clash, 32_000.min(usize::MAX)) {
            let _ = writeln!(out, "  - {}", line);
        }
    }

    out
}

fn group_type_str(t: GroupType) -> &'static str {
    match t {
        GroupType::Select => "select",
        GroupType::UrlTest => "url-test",
        GroupType::Fallback => "fallback",
        GroupType::LoadBalance => "load-balance",
        GroupType::Relay => "relay",
        GroupType::Ssid => "select",
    }
}

fn dedup_name(remark: &str, seen: &mut HashSet<String>) -> String {
    let base = if remark.is_empty() { "Node".to_string() } else { remark.to_string() };
    if seen.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{} {}", base, n);
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Renders one node's type-specific YAML body (everything after `name:`),
/// or `None` when Clash can't encode this node at all.
fn render_proxy(node: &Node, ext: &ExtraSettings) -> Option<String> {
    let mut out = String::new();
    match node.node_type {
        ProxyType::Shadowsocks => {
            if ext.filter_deprecated && DEPRECATED_SS_CIPHERS.contains(&node.encrypt_method.as_str()) {
                return None;
            }
            let _ = writeln!(out, "type: ss");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "cipher: {}", node.encrypt_method);
            let _ = write!(out, "password: {}", yaml_password(&node.password));
            if !node.plugin.is_empty() {
                let _ = write!(out, "\nplugin: {}", node.plugin);
            }
        }
        ProxyType::ShadowsocksR => {
            if !ALLOWED_SSR_CIPHERS.contains(&node.encrypt_method.as_str())
                || !ALLOWED_SSR_PROTOCOLS.contains(&node.protocol.as_str())
                || !ALLOWED_SSR_OBFS.contains(&node.obfs.as_str())
            {
                return None;
            }
            let _ = writeln!(out, "type: ssr");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "cipher: {}", node.encrypt_method);
            let _ = writeln!(out, "password: {}", yaml_password(&node.password));
            let _ = writeln!(out, "protocol: {}", node.protocol);
            let _ = writeln!(out, "protocol-param: {}", yaml_quote(&node.protocol_param));
            let _ = writeln!(out, "obfs: {}", node.obfs);
            let _ = write!(out, "obfs-param: {}", yaml_quote(&node.obfs_param));
        }
        ProxyType::VMess => {
            if !matches!(node.transfer_protocol, TransferProtocol::Tcp | TransferProtocol::Ws | TransferProtocol::Http) {
                return None;
            }
            let _ = writeln!(out, "type: vmess");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "uuid: {}", node.user_id);
            let _ = writeln!(out, "alterId: 0");
            let _ = writeln!(out, "cipher: {}", node.encrypt_method);
            let _ = writeln!(out, "tls: {}", node.tls_secure);
            let _ = writeln!(out, "network: {}", node.transfer_protocol.as_str());
            if matches!(node.transfer_protocol, TransferProtocol::Ws) {
                let _ = writeln!(out, "ws-opts:");
                let _ = writeln!(out, "  path: {}", yaml_quote(&node.path));
                if !node.host.is_empty() {
                    let _ = writeln!(out, "  headers:");
                    let _ = write!(out, "    Host: {}", yaml_quote(&node.host));
                }
            }
        }
        ProxyType::Trojan => {
            let _ = writeln!(out, "type: trojan");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "password: {}", yaml_password(&node.password));
            if !node.server_name.is_empty() {
                let _ = write!(out, "sni: {}", yaml_quote(&node.server_name));
            }
        }
        ProxyType::Http | ProxyType::Https => {
            let _ = writeln!(out, "type: http");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "username: {}", yaml_quote(&node.username));
            let _ = write!(out, "password: {}", yaml_password(&node.password));
            if matches!(node.node_type, ProxyType::Https) {
                let _ = write!(out, "\ntls: true");
            }
        }
        ProxyType::Socks5 => {
            let _ = writeln!(out, "type: socks5");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = writeln!(out, "username: {}", yaml_quote(&node.username));
            let _ = write!(out, "password: {}", yaml_password(&node.password));
        }
        ProxyType::Snell => {
            let _ = writeln!(out, "type: snell");
            let _ = writeln!(out, "server: {}", yaml_quote(&node.hostname));
            let _ = writeln!(out, "port: {}", node.port);
            let _ = write!(out, "psk: {}", yaml_password(&node.password));
        }
        _ => return None,
    }
    let _ = write!(out, "\nudp: {}", ext.resolve_udp(node.udp));
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{GroupType, ProxyGroupConfig};
    use crate::group_builder::BuiltGroup;

    fn node(remark: &str) -> Node {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.remark = remark.to_string();
        n.encrypt_method = "aes-256-gcm".to_string();
        n.password = "pw".to_string();
        n
    }

    #[test]
    fn emits_ss_proxy_and_group() {
        let nodes = vec![node("A")];
        let groups = vec![BuiltGroup {
            config: ProxyGroupConfig::new("Auto", GroupType::Select),
            members: vec!["A".to_string()],
        }];
        let ext = ExtraSettings::default();
        let out = emit_clash(&nodes, &groups, &mut [], &ext);
        assert!(out.contains("proxies:"));
        assert!(out.contains("name: \"A\""));
        assert!(out.contains("proxy-groups:"));
    }

    #[test]
    fn numeric_password_gets_str_tag() {
        let mut n = node("A");
        n.password = "12345".to_string();
        let body = render_proxy(&n, &ExtraSettings::default()).unwrap();
        assert!(body.contains("!!str \"12345\""));
    }

    #[test]
    fn deprecated_cipher_dropped_when_filter_deprecated() {
        let mut n = node("A");
        n.encrypt_method = "chacha20".to_string();
        let mut ext = ExtraSettings::default();
        ext.filter_deprecated = true;
        assert!(render_proxy(&n, &ext).is_none());
    }
}
