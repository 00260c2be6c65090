//! Resolved ruleset bodies (§3.5). The raw fetched text is normalized to
//! the surge-shaped dialect once and shared by every emitter that reads it.

use super::{convert_ruleset, RulesetType};

#[derive(Debug, Clone)]
pub struct RulesetContent {
    pub group: String,
    pub url: String,
    pub ruleset_type: RulesetType,
    pub update_interval: u32,
    pub flags: Vec<String>,
    /// Raw text as fetched (or the inline rule body), before normalization.
    raw: String,
    /// Lazily normalized surge-shaped text, computed once on first access.
    normalized: Option<String>,
}

impl RulesetContent {
    pub fn new(url: impl Into<String>, group: impl Into<String>, ruleset_type: RulesetType) -> Self {
        RulesetContent {
            group: group.into(),
            url: url.into(),
            ruleset_type,
            update_interval: 0,
            flags: Vec::new(),
            raw: String::new(),
            normalized: None,
        }
    }

    pub fn set_rule_content(&mut self, content: &str) {
        self.raw = content.to_string();
        self.normalized = None;
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Surge-shaped normalized lines, computed (and cached) on demand.
    /// Idempotent per invariant 4 in §8: re-normalizing already-Surge text
    /// returns it unchanged.
    pub fn normalized(&mut self) -> &str {
        if self.normalized.is_none() {
            self.normalized = Some(convert_ruleset(&self.raw, self.ruleset_type));
        }
        self.normalized.as_deref().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_cached_and_idempotent() {
        let mut rc = RulesetContent::new("", "Proxy", RulesetType::SurgeRuleset);
        rc.set_rule_content("DOMAIN-SUFFIX,example.com,Proxy");
        let first = rc.normalized().to_string();
        let second = rc.normalized().to_string();
        assert_eq!(first, second);
        assert_eq!(convert_ruleset(&first, RulesetType::SurgeRuleset), first);
    }
}
