//! Emitters (C9, §4.9): one function per output target, each total over
//! `(NodeList, GroupConfig[], RulesetContent[], ExtraSettings) -> text`.

mod clash;
mod mixed;
mod quantumultx;
mod singbox;
mod surge;

pub use clash::emit_clash;
pub use mixed::emit_mixed_links;
pub use quantumultx::emit_quantumultx;
pub use singbox::emit_singbox;
pub use surge::{emit_surge, SurgeDialect};

use crate::group_builder::BuiltGroup;
use crate::model::Node;
use crate::ruleset::{parse_normalized, render_for_target, RulesetContent, Target};
use crate::settings::ExtraSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    Clash,
    ClashR,
    Surge(u8),
    Surfboard,
    QuantumultX,
    Quantumult,
    Loon,
    Mellow,
    SingBox,
    Ssd,
    Sssub,
    Mixed,
    Ss,
    Ssr,
    V2ray,
    Trojan,
}

/// Renders every ruleset's final lines for one `target`, honoring the
/// `MaxAllowedRules` cap (§4.7): appending stops once the cap is hit, but
/// all configured rulesets still contribute their policy/reference lines
/// up to that point, in input order.
pub fn render_rules(rulesets: &mut [RulesetContent], target: Target, max_rules: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut match_line: Option<String> = None;

    'outer: for content in rulesets.iter_mut() {
        if content.is_empty() {
            continue;
        }
        let normalized = content.normalized().to_string();
        for rule in parse_normalized(&normalized) {
            if out.len() >= max_rules {
                break 'outer;
            }
            let Some(rendered) = render_for_target(&rule, &content.group, target, &content.flags) else {
                continue;
            };
            if rule.head == "MATCH" || rule.head == "FINAL" {
                match_line = Some(rendered);
                continue;
            }
            out.push(rendered);
        }
    }
    if let Some(line) = match_line {
        out.push(line);
    }
    out
}

/// Top-level dispatcher used by the request façade (C11 step 11).
pub fn emit(
    target: EmitTarget,
    nodes: &[Node],
    groups: &[BuiltGroup],
    rulesets: &mut [RulesetContent],
    ext: &ExtraSettings,
) -> String {
    match target {
        EmitTarget::Clash | EmitTarget::ClashR => emit_clash(nodes, groups, rulesets, ext),
        EmitTarget::Surge(v) => emit_surge(nodes, groups, rulesets, ext, SurgeDialect::Surge(v)),
        EmitTarget::Surfboard => emit_surge(nodes, groups, rulesets, ext, SurgeDialect::Surfboard),
        EmitTarget::QuantumultX => emit_quantumultx(nodes, groups, rulesets, ext),
        EmitTarget::SingBox => emit_singbox(nodes, groups, rulesets, ext),
        EmitTarget::Ssd | EmitTarget::Sssub | EmitTarget::Mixed | EmitTarget::Ss | EmitTarget::Ssr | EmitTarget::V2ray | EmitTarget::Trojan => {
            emit_mixed_links(nodes, target)
        }
        EmitTarget::Quantumult | EmitTarget::Loon | EmitTarget::Mellow => {
            // Simpler line-oriented dialects, proportionate to their
            // narrower real-world usage versus the targets above.
            emit_quantumultx(nodes, groups, rulesets, ext)
        }
    }
}
