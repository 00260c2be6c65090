//! Three-valued boolean used wherever a setting must distinguish "absent"
//! from "explicitly false" — node-level overrides of global defaults being
//! the dominant use case (`udp`, `tfo`, `scv`, `tls13`, ...).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriBool {
    #[default]
    Undef,
    False,
    True,
}

impl TriBool {
    pub fn from_bool(b: bool) -> Self {
        if b {
            TriBool::True
        } else {
            TriBool::False
        }
    }

    /// Parses the handful of string spellings that show up in query params
    /// and external-config YAML (`"true"`, `"1"`, `"false"`, `"0"`, ...).
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => TriBool::True,
            "false" | "0" | "no" | "off" => TriBool::False,
            _ => TriBool::Undef,
        }
    }

    pub fn is_undef(self) -> bool {
        matches!(self, TriBool::Undef)
    }

    pub fn is_true(self) -> bool {
        matches!(self, TriBool::True)
    }

    pub fn is_false(self) -> bool {
        matches!(self, TriBool::False)
    }

    /// Adopts `other` only if `self` is still undefined. Used to merge
    /// layered settings, lowest-precedence layer first: `result.define(layer)`
    /// for each successive, higher-precedence layer.
    pub fn define(self, other: TriBool) -> Self {
        if self.is_undef() {
            other
        } else {
            self
        }
    }

    /// Resolves to a concrete bool, falling back to `default` if undefined.
    pub fn get(self, default: bool) -> bool {
        match self {
            TriBool::Undef => default,
            TriBool::False => false,
            TriBool::True => true,
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            TriBool::Undef => TriBool::Undef,
            TriBool::False => TriBool::True,
            TriBool::True => TriBool::False,
        }
    }
}

impl From<bool> for TriBool {
    fn from(b: bool) -> Self {
        TriBool::from_bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_only_adopts_when_self_undef() {
        assert_eq!(TriBool::Undef.define(TriBool::True), TriBool::True);
        assert_eq!(TriBool::False.define(TriBool::True), TriBool::False);
    }

    #[test]
    fn get_falls_back_to_default() {
        assert!(TriBool::Undef.get(true));
        assert!(!TriBool::False.get(true));
        assert!(TriBool::True.get(false));
    }

    #[test]
    fn reverse_flips_defined_values_only() {
        assert_eq!(TriBool::True.reverse(), TriBool::False);
        assert_eq!(TriBool::Undef.reverse(), TriBool::Undef);
    }

    #[test]
    fn loose_parse_handles_common_spellings() {
        assert_eq!(TriBool::from_str_loose("1"), TriBool::True);
        assert_eq!(TriBool::from_str_loose("off"), TriBool::False);
        assert_eq!(TriBool::from_str_loose("maybe"), TriBool::Undef);
    }
}
