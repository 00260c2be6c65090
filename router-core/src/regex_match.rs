//! Regex rename/emoji transforms (§3.4) and the include/exclude matcher
//! grammar used by filtering (§4.6) and group-member expansion (§4.8).

use regex::Regex;

use crate::model::Node;

/// Either a `Match`/`Replace` regex substitution or a `Script` fragment —
/// mutually exclusive per §3.4.
#[derive(Debug, Clone)]
pub enum RegexMatchConfig {
    Regex { m: String, replace: String },
    Script(String),
}

impl RegexMatchConfig {
    pub fn regex(m: impl Into<String>, replace: impl Into<String>) -> Self {
        RegexMatchConfig::Regex {
            m: m.into(),
            replace: replace.into(),
        }
    }

    pub fn script(src: impl Into<String>) -> Self {
        RegexMatchConfig::Script(src.into())
    }
}

/// Converts the `(?i)` leading-flag PCRE idiom to the `(?i:...)` form the
/// Rust `regex` crate understands, since `regex` rejects a bare leading
/// `(?i)` outside of a group in some positions but is happy with an inline
/// flag group wrapping the whole pattern.
pub fn compile_pcre_ish(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(rest) = pattern.strip_prefix("(?i)") {
        Regex::new(&format!("(?i){}", rest))
    } else {
        Regex::new(pattern)
    }
}

/// Applies a single regex rename rule to `remark`, returning the
/// substituted text. Non-matching input is returned unchanged.
pub fn regex_replace(remark: &str, pattern: &str, replace: &str) -> String {
    match compile_pcre_ish(pattern) {
        Ok(re) => re.replace_all(remark, replace).into_owned(),
        Err(_) => remark.to_string(),
    }
}

/// Result of [`apply_matcher`]: whether the pre-filter (group / group-id)
/// matched, and the residual regex (if any) still to be applied against the
/// node's remark.
pub struct MatcherResult {
    pub matched: bool,
}

/// A parsed `include`/`exclude`/group-member pattern.
///
/// Grammar (§4.6):
/// - `[]LITERAL` — bypasses matching entirely, always "matches" as a literal
///   passthrough (used by group builder for `[]DIRECT`).
/// - `!!GROUP:<regex>` — negated: matches nodes whose `group` does *not*
///   match `<regex>`.
/// - `GROUP:<regex>` — matches nodes whose `group` matches `<regex>`.
/// - `!!GROUPID:<n>` — negated group-id match.
/// - bare `<regex>` — matched directly against `remark`.
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Group { regex: String, negate: bool },
    GroupId { id: i32, negate: bool },
    Bare(String),
}

impl Matcher {
    pub fn parse(pattern: &str) -> Self {
        if let Some(lit) = pattern.strip_prefix("[]") {
            return Matcher::Literal(lit.to_string());
        }
        let (negate, body) = match pattern.strip_prefix("!!") {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        if let Some(rest) = body.strip_prefix("GROUPID:") {
            if let Ok(id) = rest.trim().parse::<i32>() {
                return Matcher::GroupId { id, negate };
            }
        }
        if let Some(rest) = body.strip_prefix("GROUP:") {
            return Matcher::Group {
                regex: rest.to_string(),
                negate,
            };
        }
        Matcher::Bare(pattern.to_string())
    }

    /// Returns `true` if `node` is matched by this pattern.
    pub fn is_match(&self, node: &Node) -> bool {
        match self {
            Matcher::Literal(_) => false, // handled specially by group builder
            Matcher::Group { regex, negate } => {
                let hit = compile_pcre_ish(regex)
                    .map(|re| re.is_match(&node.group))
                    .unwrap_or(false);
                hit != *negate
            }
            Matcher::GroupId { id, negate } => {
                let hit = node.group_id == *id;
                hit != *negate
            }
            Matcher::Bare(regex) => compile_pcre_ish(regex)
                .map(|re| re.is_match(&node.remark))
                .unwrap_or(false),
        }
    }
}

/// `applyMatcher(pat, node)` from §4.6: evaluates a whole list of patterns
/// as an OR, honoring the literal-bypass and group pre-filter forms.
pub fn apply_matcher(patterns: &[String], node: &Node) -> MatcherResult {
    if patterns.is_empty() {
        return MatcherResult { matched: false };
    }
    let matched = patterns
        .iter()
        .map(|p| Matcher::parse(p))
        .any(|m| m.is_match(node));
    MatcherResult { matched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyType;

    fn node_with(remark: &str, group: &str, group_id: i32) -> Node {
        let mut n = Node::new(ProxyType::Shadowsocks, "h", 1);
        n.remark = remark.to_string();
        n.group = group.to_string();
        n.group_id = group_id;
        n
    }

    #[test]
    fn bare_pattern_matches_remark() {
        let n = node_with("Hong Kong 01", "g", 0);
        let m = Matcher::parse("Hong.*");
        assert!(m.is_match(&n));
    }

    #[test]
    fn negated_group_excludes_matching_group() {
        let n = node_with("x", "airport-a", 0);
        let m = Matcher::parse("!!GROUP:airport-a");
        assert!(!m.is_match(&n));
        let n2 = node_with("x", "airport-b", 0);
        assert!(m.is_match(&n2));
    }

    #[test]
    fn groupid_matches_exact_id() {
        let n = node_with("x", "g", 3);
        assert!(Matcher::parse("GROUPID:3").is_match(&n));
        assert!(!Matcher::parse("!!GROUPID:3").is_match(&n));
    }

    #[test]
    fn case_insensitive_prefix_is_honored() {
        let n = node_with("HongKong", "g", 0);
        assert!(Matcher::parse("(?i)hongkong").is_match(&n));
    }
}
