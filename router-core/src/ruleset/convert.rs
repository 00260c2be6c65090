//! Ruleset dialect conversion (§4.7) and per-target accepted-head filtering.

use super::RulesetType;
use once_cell::sync::Lazy;
use regex::Regex;

/// Output targets that consume rulesets, used to select the accepted-heads
/// whitelist and the quirks noted in §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Clash,
    Surge(u8),
    Surfboard,
    QuantumultX,
    SingBox,
}

const BASIC_HEADS: &[&str] = &[
    "DOMAIN",
    "DOMAIN-SUFFIX",
    "DOMAIN-KEYWORD",
    "IP-CIDR",
    "GEOIP",
    "FINAL",
    "MATCH",
];

/// The accepted-heads whitelist per target (§4.7 table). Unsupported heads
/// are silently dropped during emission.
pub fn accepted_heads(target: Target) -> Vec<&'static str> {
    let mut heads: Vec<&'static str> = BASIC_HEADS.to_vec();
    match target {
        Target::Clash => heads.extend([
            "IP-CIDR6",
            "SRC-PORT",
            "DST-PORT",
            "PROCESS-NAME",
            "DOMAIN-REGEX",
        ]),
        Target::Surge(v) if v >= 3 => heads.extend([
            "IP-CIDR6",
            "USER-AGENT",
            "URL-REGEX",
            "AND",
            "OR",
            "NOT",
            "PROCESS-NAME",
            "IN-PORT",
            "DEST-PORT",
            "SRC-IP",
            "DOMAIN-WILDCARD",
        ]),
        Target::Surge(_) => heads.extend([
            "IP-CIDR6",
            "USER-AGENT",
            "URL-REGEX",
            "PROCESS-NAME",
            "IN-PORT",
            "DEST-PORT",
            "SRC-IP",
        ]),
        Target::Surfboard => {
            heads.extend(["IP-CIDR6", "PROCESS-NAME", "IN-PORT", "DEST-PORT", "SRC-IP"])
        }
        Target::QuantumultX => heads.extend(["USER-AGENT", "HOST", "HOST-WILDCARD", "HOST-SUFFIX", "IP6-CIDR"]),
        Target::SingBox => heads.extend([
            "IP-VERSION",
            "INBOUND",
            "PROTOCOL",
            "NETWORK",
            "GEOSITE",
            "SRC-GEOIP",
            "DOMAIN-REGEX",
            "PROCESS-NAME",
            "PROCESS-PATH",
            "PACKAGE-NAME",
            "PORT",
            "PORT-RANGE",
            "SRC-PORT",
            "SRC-PORT-RANGE",
            "USER",
            "USER-ID",
        ]),
    }
    heads
}

fn is_accepted(target: Target, head: &str) -> bool {
    accepted_heads(target).contains(&head)
}

static IP_CIDR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F.:]+/\d+$").unwrap());

/// Escapes regex metacharacters and translates `*`/`?` wildcards, used both
/// by the Clash YAML `payload:` classifier and by `DOMAIN-WILDCARD` ->
/// `DOMAIN-REGEX` rewriting.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::new();
    for c in pattern.chars() {
        match c {
            '.' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' | '+' => {
                out.push('\\');
                out.push(c);
            }
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push(other),
        }
    }
    out
}

/// One normalized rule line: a head, a value, and an ordered list of
/// trailing options (`no-resolve`, `extended-matching`, user flags, ...).
/// Normalized form carries no policy — that's supplied by the ruleset's
/// `Group` at emission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRule {
    pub head: String,
    pub value: String,
    pub options: Vec<String>,
}

impl NormalizedRule {
    fn render(&self) -> String {
        if self.value.is_empty() {
            let mut parts = vec![self.head.clone()];
            parts.extend(self.options.clone());
            parts.join(",")
        } else {
            let mut parts = vec![self.head.clone(), self.value.clone()];
            parts.extend(self.options.clone());
            parts.join(",")
        }
    }
}

/// `ConvertRuleset(text, type) -> surge-shaped text` (§4.7).
pub fn convert_ruleset(text: &str, ruleset_type: RulesetType) -> String {
    let rules = match ruleset_type {
        RulesetType::SurgeRuleset => parse_surge_lines(text),
        RulesetType::QuantumultX => parse_quantumultx_lines(text),
        RulesetType::ClashDomain | RulesetType::ClashIpCidr | RulesetType::ClashClassical => {
            parse_clash_payload(text)
        }
    };
    rules
        .iter()
        .map(NormalizedRule::render)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_comment(line: &str) -> &str {
    let line = line.trim();
    if line.starts_with('#') || line.starts_with(';') || line.starts_with("//") {
        ""
    } else {
        line
    }
}

fn parse_surge_lines(text: &str) -> Vec<NormalizedRule> {
    text.lines()
        .filter_map(|line| {
            let line = strip_comment(line);
            if line.is_empty() {
                return None;
            }
            let fields: Vec<&str> = line.splitn(4, ',').map(|f| f.trim()).collect();
            if fields.is_empty() {
                return None;
            }
            let head = fields[0].to_uppercase();
            if head == "MATCH" || head == "FINAL" {
                return Some(NormalizedRule {
                    head,
                    value: String::new(),
                    options: Vec::new(),
                });
            }
            let value = fields.get(1).unwrap_or(&"").to_string();
            // drop the embedded policy field (3rd) — carried by the
            // referencing RulesetConfig's Group instead; keep trailing
            // option-looking tokens (anything after the policy slot).
            let options = fields
                .get(3)
                .map(|rest| rest.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            Some(NormalizedRule {
                head,
                value,
                options,
            })
        })
        .collect()
}

fn parse_quantumultx_lines(text: &str) -> Vec<NormalizedRule> {
    text.lines()
        .filter_map(|line| {
            let line = strip_comment(line);
            if line.is_empty() {
                return None;
            }
            let mut fields: Vec<String> = line.split(',').map(|f| f.trim().to_string()).collect();
            if fields.is_empty() {
                return None;
            }
            let mut head = fields[0].to_uppercase();
            head = match head.as_str() {
                "HOST-WILDCARD" => "DOMAIN-WILDCARD".to_string(),
                "HOST" => "DOMAIN".to_string(),
                "HOST-SUFFIX" => "DOMAIN-SUFFIX".to_string(),
                "HOST-KEYWORD" => "DOMAIN-KEYWORD".to_string(),
                "IP6-CIDR" => "IP-CIDR6".to_string(),
                other => other.to_string(),
            };
            if head == "MATCH" || head == "FINAL" {
                return Some(NormalizedRule {
                    head,
                    value: String::new(),
                    options: Vec::new(),
                });
            }
            let value = fields.get(1).cloned().unwrap_or_default();
            // Strip a `no-resolve` token unless it is the last field of the
            // original line (§4.7).
            let last_idx = fields.len().saturating_sub(1);
            let mut options = Vec::new();
            for (i, f) in fields.drain(..).enumerate() {
                if i < 2 {
                    continue;
                }
                if f.eq_ignore_ascii_case("no-resolve") && i != last_idx {
                    continue;
                }
                options.push(f);
            }
            Some(NormalizedRule {
                head,
                value,
                options,
            })
        })
        .collect()
}

fn parse_clash_payload(text: &str) -> Vec<NormalizedRule> {
    let mut rules = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line == "payload:" || line.starts_with('#') {
            continue;
        }
        let Some(rest) = line.strip_prefix('-') else {
            continue;
        };
        let mut value = rest.trim().to_string();
        // strip '...' or "..." decoration
        if (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
            || (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        {
            value = value[1..value.len() - 1].to_string();
        }
        if value.is_empty() {
            continue;
        }
        rules.push(infer_clash_value(&value));
    }
    rules
}

/// Infers a surge head for one bare Clash payload value (§4.7).
fn infer_clash_value(value: &str) -> NormalizedRule {
    if IP_CIDR_RE.is_match(value) {
        let head = if value.contains(':') {
            "IP-CIDR6"
        } else {
            "IP-CIDR"
        };
        return NormalizedRule {
            head: head.to_string(),
            value: value.to_string(),
            options: Vec::new(),
        };
    }
    if value == "*:*" {
        return NormalizedRule {
            head: "IP-CIDR6".to_string(),
            value: value.to_string(),
            options: Vec::new(),
        };
    }
    if let Some(rest) = value.strip_prefix("+.") {
        return NormalizedRule {
            head: "DOMAIN-SUFFIX".to_string(),
            value: rest.to_string(),
            options: Vec::new(),
        };
    }
    if let Some(rest) = value.strip_prefix('.') {
        return NormalizedRule {
            head: "DOMAIN-SUFFIX".to_string(),
            value: rest.to_string(),
            options: Vec::new(),
        };
    }
    if let Some(rest) = value.strip_suffix(".*") {
        return NormalizedRule {
            head: "DOMAIN-KEYWORD".to_string(),
            value: rest.trim_end_matches(".*").to_string(),
            options: Vec::new(),
        };
    }
    if value.contains('*') || value.contains('?') {
        return NormalizedRule {
            head: "DOMAIN-WILDCARD".to_string(),
            value: value.to_string(),
            options: Vec::new(),
        };
    }
    NormalizedRule {
        head: "DOMAIN".to_string(),
        value: value.to_string(),
        options: Vec::new(),
    }
}

/// Rewrites one normalized rule for a specific emission target: applies the
/// `DOMAIN-WILDCARD` -> `DOMAIN-REGEX` translation for Clash/SingBox, the
/// `FINAL`/`MATCH` head swap, drops heads the target can't express, and
/// appends the ruleset's policy and any passthrough flags.
///
/// Returns `None` when the target doesn't accept this rule's head at all.
pub fn render_for_target(
    rule: &NormalizedRule,
    policy: &str,
    target: Target,
    extra_flags: &[String],
) -> Option<String> {
    let mut head = rule.head.clone();
    let mut value = rule.value.clone();

    if head == "MATCH" || head == "FINAL" {
        head = match target {
            Target::Clash => "MATCH".to_string(),
            Target::SingBox => "MATCH".to_string(),
            _ => "FINAL".to_string(),
        };
    } else if head == "DOMAIN-WILDCARD" {
        match target {
            Target::Clash | Target::SingBox => {
                head = "DOMAIN-REGEX".to_string();
                value = format!("^{}$", wildcard_to_regex(&value));
            }
            Target::Surge(v) if v < 3 => return None,
            _ => {}
        }
    }

    if !is_accepted(target, &head) {
        return None;
    }

    if head == "MATCH" || head == "FINAL" {
        return Some(format!("{},{}", head, policy));
    }

    let mut fields = vec![head, value, policy.to_string()];
    fields.extend(rule.options.iter().cloned());
    if matches!(target, Target::Surge(v) if v >= 3) {
        let mut seen: Vec<&str> = fields.iter().map(|s| s.as_str()).collect();
        for flag in extra_flags {
            if !seen.contains(&flag.as_str()) {
                fields.push(flag.clone());
                seen.push(flag.as_str());
            }
        }
    }
    Some(fields.join(","))
}

/// Parses one raw ruleset body into its normalized rule list (used by the
/// emitters so they can apply `render_for_target` per rule with a running
/// rule-count budget).
pub fn parse_normalized(text: &str) -> Vec<NormalizedRule> {
    // `text` here is already the output of `convert_ruleset`, i.e. surge-shaped.
    parse_surge_lines(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clash_payload_drops_ip_rule_for_domain_ruleset_type() {
        let text = "payload:\n  - 'google.com'\n";
        let out = convert_ruleset(text, RulesetType::ClashDomain);
        assert_eq!(out, "DOMAIN,google.com");
    }

    #[test]
    fn clash_payload_classifies_ip_cidr() {
        let text = "payload:\n  - '1.1.1.1/32'\n";
        let out = convert_ruleset(text, RulesetType::ClashIpCidr);
        assert_eq!(out, "IP-CIDR,1.1.1.1/32");
    }

    #[test]
    fn quantumultx_strips_middle_no_resolve_but_keeps_trailing() {
        let text = "ip-cidr,1.1.1.1/32,no-resolve,direct";
        let rules = parse_quantumultx_lines(text);
        assert_eq!(rules[0].options, vec!["direct".to_string()]);

        let text2 = "ip-cidr,1.1.1.1/32,direct,no-resolve";
        let rules2 = parse_quantumultx_lines(text2);
        assert_eq!(
            rules2[0].options,
            vec!["direct".to_string(), "no-resolve".to_string()]
        );
    }

    #[test]
    fn domain_wildcard_becomes_domain_regex_for_clash() {
        let rule = NormalizedRule {
            head: "DOMAIN-WILDCARD".to_string(),
            value: "*.foo.com".to_string(),
            options: Vec::new(),
        };
        let rendered = render_for_target(&rule, "Proxy", Target::Clash, &[]).unwrap();
        assert_eq!(rendered, "DOMAIN-REGEX,^.*\\.foo\\.com$,Proxy");
    }

    #[test]
    fn domain_wildcard_is_dropped_for_surge2() {
        let rule = NormalizedRule {
            head: "DOMAIN-WILDCARD".to_string(),
            value: "*.foo.com".to_string(),
            options: Vec::new(),
        };
        assert!(render_for_target(&rule, "Proxy", Target::Surge(2), &[]).is_none());
    }

    #[test]
    fn final_becomes_match_for_clash_and_stays_final_for_surge() {
        let rule = NormalizedRule {
            head: "FINAL".to_string(),
            value: String::new(),
            options: Vec::new(),
        };
        assert_eq!(
            render_for_target(&rule, "Proxy", Target::Clash, &[]).unwrap(),
            "MATCH,Proxy"
        );
        assert_eq!(
            render_for_target(&rule, "Proxy", Target::Surge(4), &[]).unwrap(),
            "FINAL,Proxy"
        );
    }

    #[test]
    fn second_pass_through_surge_is_idempotent() {
        let text = "DOMAIN-SUFFIX,example.com,Proxy";
        let once = convert_ruleset(text, RulesetType::SurgeRuleset);
        let twice = convert_ruleset(&once, RulesetType::SurgeRuleset);
        assert_eq!(once, twice);
    }
}
