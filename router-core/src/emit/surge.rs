//! Surge 2/3/4 and Surfboard emitter (§4.9): shared INI-section structure,
//! differing only in version-gated capability and rule-head whitelist.

use super::render_rules;
use crate::group::GroupType;
use crate::group_builder::{collapse_surge_single_member_aliases, BuiltGroup};
use crate::model::{Node, ProxyType, TransferProtocol};
use crate::ruleset::{RulesetContent, Target};
use crate::settings::ExtraSettings;
use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurgeDialect {
    Surge(u8),
    Surfboard,
}

impl SurgeDialect {
    fn ruleset_target(self) -> Target {
        match self {
            SurgeDialect::Surge(v) => Target::Surge(v),
            SurgeDialect::Surfboard => Target::Surfboard,
        }
    }

    fn supports_vmess(self) -> bool {
        matches!(self, SurgeDialect::Surge(v) if v >= 4) || matches!(self, SurgeDialect::Surfboard)
    }

    fn supports_trojan(self) -> bool {
        matches!(self, SurgeDialect::Surge(v) if v >= 4) || matches!(self, SurgeDialect::Surfboard)
    }

    fn ss_native(self) -> bool {
        matches!(self, SurgeDialect::Surge(v) if v >= 3) || matches!(self, SurgeDialect::Surfboard)
    }
}

pub fn emit_surge(nodes: &[Node], groups: &[BuiltGroup], rulesets: &mut [RulesetContent], ext: &ExtraSettings, dialect: SurgeDialect) -> String {
    let mut out = String::new();
    out.push_str("[Proxy]\n");

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut local_port = 1080u32;

    for node in nodes {
        let Some(line) = render_proxy_line(node, ext, dialect, &mut local_port) else {
            continue;
        };
        let name = dedup_name(&node.remark, &mut seen_names);
        let _ = writeln!(out, "{} = {}", name, line);
    }

    out.push_str("\n[Proxy Group]\n");
    let collapsed = collapse_surge_single_member_aliases(groups);
    for g in &collapsed {
        let kind = match g.config.group_type {
            GroupType::Select => "select",
            GroupType::UrlTest => "url-test",
            GroupType::Fallback => "fallback",
            GroupType::LoadBalance => "load-balance",
            GroupType::Relay | GroupType::Ssid => "select",
        };
        let members = g.members.join(", ");
        let mut line = format!("{} = {}, {}", g.config.name, kind, members);
        if let Some(url) = &g.config.url {
            let _ = write!(line, ", url={}", url);
        }
        if let Some(interval) = g.config.interval {
            let _ = write!(line, ", interval={}", interval);
        }
        let _ = writeln!(out, "{}", line);
    }

    if !rulesets.is_empty() {
        out.push_str("\n[Rule]\n");
        for line in render_rules(rulesets, dialect.ruleset_target(), 32_000) {
            let _ = writeln!(out, "{}", line);
        }
    }

    out
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

fn render_proxy_line(node: &Node, ext: &ExtraSettings, dialect: SurgeDialect, local_port: &mut u32) -> Option<String> {
    let udp = ext.resolve_udp(node.udp);
    let tfo = ext.resolve_tfo(node.tcp_fast_open);
    let scv = ext.resolve_scv(node.allow_insecure);

    let line = match node.node_type {
        ProxyType::Shadowsocks => {
            if dialect.ss_native() {
                format!(
                    "ss, {}, {}, encrypt-method={}, password={}, udp-relay={}, tfo={}",
                    node.hostname, node.port, node.encrypt_method, node.password, udp, tfo
                )
            } else {
                format!(
                    "custom, {}, {}, {}, {}, https://raw.githubusercontent.com/surge-networks/ssencrypt/master/ssencrypt.module, udp-relay={}",
                    node.hostname, node.port, node.encrypt_method, node.password, udp
                )
            }
        }
        ProxyType::VMess => {
            if !dialect.supports_vmess() {
                return None;
            }
            if !matches!(node.transfer_protocol, TransferProtocol::Tcp | TransferProtocol::Ws) {
                return None;
            }
            let mut l = format!(
                "vmess, {}, {}, username={}, tls={}",
                node.hostname, node.port, node.user_id, node.tls_secure
            );
            if matches!(node.transfer_protocol, TransferProtocol::Ws) {
                let _ = write!(l, ", ws=true, ws-path={}", node.path);
                if !node.host.is_empty() {
                    let _ = write!(l, ", ws-headers=Host:{}", node.host);
                }
            }
            let _ = write!(l, ", skip-cert-verify={}, tfo={}", scv, tfo);
            l
        }
        ProxyType::Trojan => {
            if !dialect.supports_trojan() {
                return None;
            }
            let mut l = format!("trojan, {}, {}, password={}", node.hostname, node.port, node.password);
            if !node.server_name.is_empty() {
                let _ = write!(l, ", sni={}", node.server_name);
            }
            let _ = write!(l, ", skip-cert-verify={}", scv);
            l
        }
        ProxyType::Socks5 => format!(
            "socks5, {}, {}, {}, {}, udp-relay={}",
            node.hostname, node.port, node.username, node.password, udp
        ),
        ProxyType::Http => format!("http, {}, {}, {}, {}", node.hostname, node.port, node.username, node.password),
        ProxyType::Https => format!(
            "https, {}, {}, {}, {}, skip-cert-verify={}",
            node.hostname, node.port, node.username, node.password, scv
        ),
        ProxyType::Snell => format!("snell, {}, {}, psk={}, obfs={}", node.hostname, node.port, node.password, node.obfs),
        ProxyType::ShadowsocksR => {
            // Surge has no native SSR proxy type; it shells out to an
            // external `ssr-local` binary bound to a synthesized local port.
            let port = *local_port;
            *local_port += 1;
            format!(
                "external, exec=\"ssr-local\", args=\"-s {} -p {} -m {} -k {} -o {} -O {}\", local-port={}, addresses={}",
                node.hostname, node.port, node.encrypt_method, node.password, node.obfs, node.protocol, port, node.hostname
            )
        }
        _ => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ProxyGroupConfig;

    fn node() -> Node {
        let mut n = Node::new(ProxyType::Shadowsocks, "1.2.3.4", 443);
        n.remark = "A".to_string();
        n.encrypt_method = "aes-256-gcm".to_string();
        n.password = "pw".to_string();
        n
    }

    #[test]
    fn surge3_uses_native_ss() {
        let out = emit_surge(&[node()], &[], &mut [], &ExtraSettings::default(), SurgeDialect::Surge(3));
        assert!(out.contains("A = ss, 1.2.3.4, 443, encrypt-method=aes-256-gcm"));
    }

    #[test]
    fn vmess_rejected_below_surge4() {
        let mut n = node();
        n.node_type = ProxyType::VMess;
        n.user_id = "uuid".to_string();
        let out = emit_surge(&[n], &[], &mut [], &ExtraSettings::default(), SurgeDialect::Surge(3));
        assert!(!out.contains("vmess"));
    }

    #[test]
    fn single_member_group_collapses_to_alias() {
        let groups = vec![BuiltGroup {
            config: ProxyGroupConfig::new("Alias", GroupType::Select),
            members: vec!["A".to_string()],
        }];
        let out = emit_surge(&[node()], &groups, &mut [], &ExtraSettings::default(), SurgeDialect::Surge(4));
        assert!(!out.contains("Alias = select"));
    }
}
