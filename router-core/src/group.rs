//! Proxy group templates (§3.2) — immutable for the life of one request.

use crate::tribool::TriBool;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupType {
    Select,
    UrlTest,
    Fallback,
    LoadBalance,
    Relay,
    Ssid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadBalanceStrategy {
    ConsistentHashing,
    RoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyGroupConfig {
    pub name: String,
    pub group_type: GroupType,
    /// Raw member match patterns — see `regex_match::Matcher`, plus the
    /// `!!PROVIDER=a,b,c` and `script:<path>` forms handled by the group
    /// builder directly.
    pub proxies: Vec<String>,
    pub using_provider: Vec<String>,
    pub url: Option<String>,
    pub interval: Option<u32>,
    pub timeout: Option<u32>,
    pub tolerance: Option<u32>,
    pub strategy: Option<LoadBalanceStrategy>,
    pub lazy: TriBool,
    pub disable_udp: TriBool,
    pub persistent: TriBool,
    pub evaluate_before_use: TriBool,
}

impl ProxyGroupConfig {
    pub fn new(name: impl Into<String>, group_type: GroupType) -> Self {
        ProxyGroupConfig {
            name: name.into(),
            group_type,
            proxies: Vec::new(),
            using_provider: Vec::new(),
            url: None,
            interval: None,
            timeout: None,
            tolerance: None,
            strategy: None,
            lazy: TriBool::Undef,
            disable_udp: TriBool::Undef,
            persistent: TriBool::Undef,
            evaluate_before_use: TriBool::Undef,
        }
    }
}
