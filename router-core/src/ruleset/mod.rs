//! The ruleset engine (C7, §4.7): template config, fetched content,
//! dialect conversion, and per-target emission rules.

mod content;
mod convert;
mod engine;

pub use content::RulesetContent;
pub use convert::{accepted_heads, convert_ruleset, Target};
pub use engine::{load_rulesets, RulesetEngine};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RulesetType {
    SurgeRuleset,
    QuantumultX,
    ClashDomain,
    ClashIpCidr,
    ClashClassical,
}

/// Infers a ruleset's dialect from its URL prefix (§3.3). `surge:` is the
/// default when no recognized prefix is present.
pub fn infer_type(url: &str) -> (RulesetType, &str) {
    const PREFIXES: &[(&str, RulesetType)] = &[
        ("clashdomain:", RulesetType::ClashDomain),
        ("clashipcidr:", RulesetType::ClashIpCidr),
        ("clash-domain:", RulesetType::ClashDomain),
        ("clash-ipcidr:", RulesetType::ClashIpCidr),
        ("classical:", RulesetType::ClashClassical),
        ("quanx:", RulesetType::QuantumultX),
        ("surge:", RulesetType::SurgeRuleset),
    ];
    for (prefix, ty) in PREFIXES {
        if let Some(rest) = url.strip_prefix(prefix) {
            return (*ty, rest);
        }
    }
    (RulesetType::SurgeRuleset, url)
}

/// A ruleset template (§3.3): where to fetch it from (or an inline `[]rule`
/// sentinel) and which target policy it feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesetConfig {
    pub group: String,
    pub url: String,
    pub interval: u32,
    /// `,flags=a|b|c` tail parsed off the URL, or an explicit `.flags` list.
    pub flags: Vec<String>,
}

impl RulesetConfig {
    pub fn new(group: impl Into<String>, url: impl Into<String>) -> Self {
        let mut url = url.into();
        let mut flags = Vec::new();
        if let Some(pos) = url.find(",flags=") {
            let tail = url[pos + 7..].to_string();
            flags = tail.split('|').map(|s| s.to_string()).collect();
            url.truncate(pos);
        }
        RulesetConfig {
            group: group.into(),
            url,
            interval: 0,
            flags,
        }
    }

    pub fn is_inline(&self) -> bool {
        self.url.starts_with("[]")
    }

    pub fn inline_rule(&self) -> Option<&str> {
        self.url.strip_prefix("[]")
    }

    pub fn ruleset_type(&self) -> RulesetType {
        infer_type(&self.url).0
    }

    pub fn fetch_url(&self) -> &str {
        infer_type(&self.url).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_clash_domain_prefix() {
        let cfg = RulesetConfig::new("Proxy", "clashdomain:https://example.com/x.yaml");
        assert_eq!(cfg.ruleset_type(), RulesetType::ClashDomain);
        assert_eq!(cfg.fetch_url(), "https://example.com/x.yaml");
    }

    #[test]
    fn defaults_to_surge_ruleset() {
        let cfg = RulesetConfig::new("Proxy", "https://example.com/x.list");
        assert_eq!(cfg.ruleset_type(), RulesetType::SurgeRuleset);
    }

    #[test]
    fn flags_tail_is_split_and_stripped() {
        let cfg = RulesetConfig::new("Proxy", "https://e.com/x.list,flags=a|b");
        assert_eq!(cfg.flags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cfg.url, "https://e.com/x.list");
    }

    #[test]
    fn inline_rule_is_detected() {
        let cfg = RulesetConfig::new("Proxy", "[]DOMAIN-SUFFIX,example.com");
        assert!(cfg.is_inline());
        assert_eq!(cfg.inline_rule(), Some("DOMAIN-SUFFIX,example.com"));
    }
}
