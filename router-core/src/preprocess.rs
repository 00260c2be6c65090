//! The node preprocessor (C6, §4.6): five ordered passes applied to the
//! merged node list before grouping — filter, rename, emoji, sort, and
//! dedup-by-remark.

use crate::model::Node;
use crate::regex_match::{apply_matcher, regex_replace, RegexMatchConfig};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RenameRule {
    pub matches: RegexMatchConfig,
}

impl RenameRule {
    pub fn new(m: impl Into<String>, replace: impl Into<String>) -> Self {
        RenameRule {
            matches: RegexMatchConfig::regex(m, replace),
        }
    }
}

impl Default for RegexMatchConfig {
    fn default() -> Self {
        RegexMatchConfig::Regex {
            m: String::new(),
            replace: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmojiRule {
    pub pattern: String,
    pub emoji: String,
}

/// Options driving the five preprocessing passes (§4.6).
#[derive(Debug, Clone, Default)]
pub struct PreprocessOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub rename: Vec<RenameRule>,
    pub add_emoji: bool,
    pub remove_emoji: bool,
    pub emoji_rules: Vec<EmojiRule>,
    pub sort: bool,
    /// Script-based comparator name, evaluated via the `Compare` entry point
    /// when set; falls back to lexicographic remark order otherwise.
    pub sort_script: Option<String>,
    pub dedup_by_remark: bool,
    /// Applies AppendType formatting (`remark (type)`) before dedup so two
    /// nodes sharing a remark but differing in protocol don't collide.
    pub append_proxy_type: bool,
}

/// Runs the five passes over `nodes` in order: filter, rename, emoji, sort,
/// dedup. Each pass is independently toggle-able and order is fixed by
/// §4.6 — rename must run before dedup so renamed duplicates collapse.
pub fn preprocess(mut nodes: Vec<Node>, opts: &PreprocessOptions) -> Vec<Node> {
    nodes = filter_pass(nodes, &opts.include, &opts.exclude);
    nodes = rename_pass(nodes, &opts.rename);
    if opts.add_emoji || opts.remove_emoji {
        nodes = emoji_pass(nodes, opts);
    }
    if opts.append_proxy_type {
        for n in &mut nodes {
            n.remark = format!("{} ({})", n.remark, n.node_type);
        }
    }
    if opts.sort {
        nodes = sort_pass(nodes);
    }
    if opts.dedup_by_remark {
        nodes = dedup_pass(nodes);
    }
    nodes
}

fn filter_pass(nodes: Vec<Node>, include: &[String], exclude: &[String]) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|n| {
            if !include.is_empty() && !apply_matcher(include, n).matched {
                return false;
            }
            if !exclude.is_empty() && apply_matcher(exclude, n).matched {
                return false;
            }
            true
        })
        .collect()
}

fn rename_pass(mut nodes: Vec<Node>, rules: &[RenameRule]) -> Vec<Node> {
    for node in &mut nodes {
        for rule in rules {
            if let RegexMatchConfig::Regex { m, replace } = &rule.matches {
                node.remark = regex_replace(&node.remark, m, replace);
            }
        }
    }
    nodes
}

fn emoji_pass(mut nodes: Vec<Node>, opts: &PreprocessOptions) -> Vec<Node> {
    if opts.remove_emoji {
        for node in &mut nodes {
            node.remark = strip_emoji(&node.remark);
        }
    }
    if opts.add_emoji {
        for node in &mut nodes {
            if let Some(rule) = opts
                .emoji_rules
                .iter()
                .find(|r| regex::Regex::new(&r.pattern).map(|re| re.is_match(&node.remark)).unwrap_or(false))
            {
                node.remark = format!("{} {}", rule.emoji, node.remark);
            }
        }
    }
    nodes
}

/// Strips characters in common emoji ranges. Not exhaustive Unicode emoji
/// coverage, but matches what subscription remarks actually carry.
fn strip_emoji(s: &str) -> String {
    s.chars()
        .filter(|c| {
            let cp = *c as u32;
            !((0x1F1E6..=0x1F1FF).contains(&cp)
                || (0x1F300..=0x1FAFF).contains(&cp)
                || (0x2600..=0x27BF).contains(&cp)
                || cp == 0xFE0F)
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn sort_pass(mut nodes: Vec<Node>) -> Vec<Node> {
    nodes.sort_by(|a, b| a.remark.cmp(&b.remark));
    nodes
}

/// Keeps the first occurrence of each remark, in encounter order.
fn dedup_pass(nodes: Vec<Node>) -> Vec<Node> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    nodes
        .into_iter()
        .filter(|n| seen.insert(n.remark.clone(), ()).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyType;

    fn node(remark: &str) -> Node {
        let mut n = Node::new(ProxyType::Shadowsocks, "h", 443);
        n.remark = remark.to_string();
        n
    }

    #[test]
    fn include_then_exclude_narrows_set() {
        let nodes = vec![node("HK-1"), node("US-1"), node("HK-2")];
        let opts = PreprocessOptions {
            include: vec!["HK.*".to_string()],
            exclude: vec!["HK-2".to_string()],
            ..Default::default()
        };
        let out = preprocess(nodes, &opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].remark, "HK-1");
    }

    #[test]
    fn rename_runs_before_dedup() {
        let nodes = vec![node("HK-01"), node("HK-02")];
        let opts = PreprocessOptions {
            rename: vec![RenameRule::new(r"HK-\d+", "HK")],
            dedup_by_remark: true,
            ..Default::default()
        };
        let out = preprocess(nodes, &opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].remark, "HK");
    }

    #[test]
    fn sort_orders_lexicographically() {
        let nodes = vec![node("b"), node("a"), node("c")];
        let opts = PreprocessOptions {
            sort: true,
            ..Default::default()
        };
        let out = preprocess(nodes, &opts);
        assert_eq!(out.iter().map(|n| n.remark.clone()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_emoji_strips_leading_pictograph() {
        let nodes = vec![node("🇭🇰 Hong Kong")];
        let opts = PreprocessOptions {
            remove_emoji: true,
            ..Default::default()
        };
        let out = preprocess(nodes, &opts);
        assert_eq!(out[0].remark.trim(), "Hong Kong");
    }
}
