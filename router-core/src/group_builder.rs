//! Group builder (C8, §4.8): expands each [`ProxyGroupConfig`]'s member
//! patterns against the preprocessed node list into a concrete member list,
//! handling the `!!PROVIDER=` and `script:` member forms and the
//! empty-group-becomes-DIRECT fallback.

use crate::group::ProxyGroupConfig;
use crate::model::Node;
use crate::regex_match::Matcher;
use crate::script::{EntryPoint, ScriptEngine, ScriptOptions};

#[derive(Debug)]
pub struct BuiltGroup {
    pub config: ProxyGroupConfig,
    pub members: Vec<String>,
}

/// Expands every group's `proxies` pattern list against `nodes`, in the
/// groups' declared order. A pattern list entirely made of `[]LITERAL`
/// forms is taken verbatim (no node matching performed); otherwise members
/// accumulate in node order, deduped, in first-match order.
pub fn build_groups(configs: &[ProxyGroupConfig], nodes: &[Node], script_engine: &dyn ScriptEngine) -> Vec<BuiltGroup> {
    configs
        .iter()
        .map(|cfg| BuiltGroup {
            config: cfg.clone(),
            members: build_one_group(cfg, nodes, script_engine),
        })
        .collect()
}

fn build_one_group(cfg: &ProxyGroupConfig, nodes: &[Node], script_engine: &dyn ScriptEngine) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();

    for pattern in &cfg.proxies {
        if let Some(literal) = pattern.strip_prefix("[]") {
            if !members.iter().any(|m| m == literal) {
                members.push(literal.to_string());
            }
            continue;
        }
        if let Some(rest) = pattern.strip_prefix("!!PROVIDER=") {
            // Provider-sourced members are resolved by name reference at
            // emission time (the emitter wires up `use:` providers); record
            // the provider tag itself as a passthrough member here.
            for provider in rest.split(',') {
                let tag = format!("!!PROVIDER={}", provider.trim());
                if !members.iter().any(|m| m == &tag) {
                    members.push(tag);
                }
            }
            continue;
        }
        if let Some(src) = pattern.strip_prefix("script:") {
            for node in nodes {
                let ok = script_engine
                    .call(src, EntryPoint::Filter, Some(node), &[], ScriptOptions::default())
                    .map(|r| r == "true" || r == "1")
                    .unwrap_or(false);
                if ok && !members.iter().any(|m| m == &node.remark) {
                    members.push(node.remark.clone());
                }
            }
            continue;
        }

        let matcher = Matcher::parse(pattern);
        for node in nodes {
            if matcher.is_match(node) && !members.iter().any(|m| m == &node.remark) {
                members.push(node.remark.clone());
            }
        }
    }

    if members.is_empty() {
        members.push("DIRECT".to_string());
    }
    members
}

/// Collapses groups whose member list is a single real node into the bare
/// node reference — Surge's convention for a "group" that's really just an
/// alias, avoiding a redundant proxy-group stanza.
pub fn collapse_surge_single_member_aliases(groups: &[BuiltGroup]) -> Vec<BuiltGroup> {
    groups
        .iter()
        .filter(|g| g.members.len() > 1 || g.members[0] == "DIRECT")
        .cloned()
        .collect()
}

impl Clone for BuiltGroup {
    fn clone(&self) -> Self {
        BuiltGroup {
            config: self.config.clone(),
            members: self.members.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupType;
    use crate::model::ProxyType;
    use crate::script::DisabledEngine;

    fn node(remark: &str, group: &str) -> Node {
        let mut n = Node::new(ProxyType::Shadowsocks, "h", 443);
        n.remark = remark.to_string();
        n.group = group.to_string();
        n
    }

    #[test]
    fn expands_group_pattern_in_node_order() {
        let nodes = vec![node("HK-1", "a"), node("US-1", "a"), node("HK-2", "a")];
        let mut cfg = ProxyGroupConfig::new("Auto", GroupType::UrlTest);
        cfg.proxies = vec!["HK.*".to_string()];
        let built = build_groups(&[cfg], &nodes, &DisabledEngine);
        assert_eq!(built[0].members, vec!["HK-1".to_string(), "HK-2".to_string()]);
    }

    #[test]
    fn empty_match_falls_back_to_direct() {
        let nodes = vec![node("HK-1", "a")];
        let mut cfg = ProxyGroupConfig::new("Empty", GroupType::Select);
        cfg.proxies = vec!["NoMatch".to_string()];
        let built = build_groups(&[cfg], &nodes, &DisabledEngine);
        assert_eq!(built[0].members, vec!["DIRECT".to_string()]);
    }

    #[test]
    fn literal_bypass_is_taken_verbatim() {
        let nodes = vec![node("HK-1", "a")];
        let mut cfg = ProxyGroupConfig::new("G", GroupType::Select);
        cfg.proxies = vec!["[]DIRECT".to_string(), "[]REJECT".to_string()];
        let built = build_groups(&[cfg], &nodes, &DisabledEngine);
        assert_eq!(built[0].members, vec!["DIRECT".to_string(), "REJECT".to_string()]);
    }
}
