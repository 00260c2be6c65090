//! `target=auto` User-Agent sniffing (§4.11 step 1): an ordered profile
//! table, first match wins. Surge's entry additionally yields a version
//! gate used by the emitter to choose feature availability (§4.9).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoTarget {
    Clash,
    ClashR,
    Surge(u8),
    Quantumult,
    QuantumultX,
    Loon,
    Surfboard,
    SsConf,
    V2ray,
}

struct Profile {
    needle: &'static str,
    target: AutoTarget,
}

/// Probed in order; the first substring match wins, so more specific
/// needles (e.g. "Quantumult%20X") must precede their looser prefixes
/// ("Quantumult").
const PROFILES: &[Profile] = &[
    Profile { needle: "ClashForAndroid", target: AutoTarget::Clash },
    Profile { needle: "ClashX", target: AutoTarget::Clash },
    Profile { needle: "Clash", target: AutoTarget::Clash },
    Profile { needle: "ClashR", target: AutoTarget::ClashR },
    Profile { needle: "Quantumult%20X", target: AutoTarget::QuantumultX },
    Profile { needle: "QuantumultX", target: AutoTarget::QuantumultX },
    Profile { needle: "Quantumult", target: AutoTarget::Quantumult },
    Profile { needle: "Loon", target: AutoTarget::Loon },
    Profile { needle: "Surfboard", target: AutoTarget::Surfboard },
    Profile { needle: "SSConf", target: AutoTarget::SsConf },
    Profile { needle: "V2rayU", target: AutoTarget::V2ray },
    Profile { needle: "V2RayNG", target: AutoTarget::V2ray },
];

/// Matches the `Surge Mac` / `Surge iOS` User-Agent shape, extracting its
/// major version; Surge's agent string looks like `Surge/1650 ...` or
/// `Surge Mac/2367 ...` where the integer is a 3-4 digit build, not a
/// bare major version, so it's bucketed by threshold.
fn match_surge_version(ua: &str) -> Option<u8> {
    let idx = ua.find("Surge")?;
    let rest = &ua[idx + "Surge".len()..];
    let digits: String = rest
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let build: u32 = digits.parse().ok()?;
    Some(if build >= 1600 {
        4
    } else if build >= 900 {
        3
    } else {
        2
    })
}

/// `target=auto` dispatch: first matching profile wins; Surge is checked
/// first since its build-number scheme doesn't fit the substring table.
pub fn detect_target(user_agent: &str) -> Option<AutoTarget> {
    if let Some(v) = match_surge_version(user_agent) {
        return Some(AutoTarget::Surge(v));
    }
    PROFILES
        .iter()
        .find(|p| user_agent.contains(p.needle))
        .map(|p| p.target.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_clash_for_android() {
        assert_eq!(detect_target("ClashForAndroid/2.5.12"), Some(AutoTarget::Clash));
    }

    #[test]
    fn detects_surge_version_gate() {
        assert_eq!(detect_target("Surge/1650 CFNetwork"), Some(AutoTarget::Surge(4)));
        assert_eq!(detect_target("Surge/950"), Some(AutoTarget::Surge(3)));
        assert_eq!(detect_target("Surge/450"), Some(AutoTarget::Surge(2)));
    }

    #[test]
    fn detects_quantumult_x_before_plain_quantumult() {
        assert_eq!(detect_target("Quantumult%20X/1.0.0"), Some(AutoTarget::QuantumultX));
    }

    #[test]
    fn unknown_agent_yields_none() {
        assert_eq!(detect_target("curl/8.0"), None);
    }
}
