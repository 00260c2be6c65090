//! Process-wide `Settings` and the per-request `ExtraSettings` merge
//! (§3.6, §4.12): built-in defaults < preference file < external config <
//! query string < matched User-Agent profile.

use crate::group::ProxyGroupConfig;
use crate::ruleset::RulesetConfig;
use crate::tribool::TriBool;

/// Copy-on-read process-wide preference snapshot, mutated only by
/// `reload()`. Cloned cheaply per request rather than locked for the
/// duration of a conversion.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_mode: bool,
    pub api_access_token: String,
    pub default_ext_config: Option<String>,
    pub base_path: String,
    pub cache_dir: String,
    pub cache_ttl: u64,
    pub serve_cache_on_fetch_fail: bool,
    pub max_allowed_download_size: u64,
    pub max_allowed_rules: usize,
    pub max_concur_threads: usize,
    pub enable_script: bool,
    pub managed_config_prefix: String,
    pub clash_new_field_name: bool,
    pub filter_deprecated: bool,
    pub append_type: bool,
    pub singbox_add_clash_modes: bool,
    pub quanx_dev_id: Option<String>,
    pub template_root: String,
    pub skip_failed_links: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_mode: true,
            api_access_token: String::new(),
            default_ext_config: None,
            base_path: ".".to_string(),
            cache_dir: router_common::DEFAULT_CACHE_DIR.to_string(),
            cache_ttl: router_common::DEFAULT_CACHE_TTL,
            serve_cache_on_fetch_fail: false,
            max_allowed_download_size: router_common::DEFAULT_MAX_DOWNLOAD_SIZE,
            max_allowed_rules: 32_000,
            max_concur_threads: 4,
            enable_script: false,
            managed_config_prefix: String::new(),
            clash_new_field_name: true,
            filter_deprecated: true,
            append_type: false,
            singbox_add_clash_modes: false,
            quanx_dev_id: None,
            template_root: "templates".to_string(),
            skip_failed_links: true,
        }
    }
}

/// Per-request preferences, built by merging `Settings` defaults with
/// external config and query-string layers, per §4.12.
#[derive(Debug, Clone, Default)]
pub struct ExtraSettings {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub rename: Vec<crate::preprocess::RenameRule>,
    pub add_emoji: bool,
    pub remove_emoji: bool,
    pub append_proxy_type: bool,
    pub sort_flag: bool,
    pub sort_script: Option<String>,
    pub filter_deprecated: bool,
    pub udp: TriBool,
    pub tcp_fast_open: TriBool,
    pub skip_cert_verify: TriBool,
    pub tls13: TriBool,
    pub clash_new_field_name: bool,
    pub nodelist: bool,
    pub proxy_groups: Vec<ProxyGroupConfig>,
    pub rulesets: Vec<RulesetConfig>,
    pub enable_rule_generator: bool,
    pub surge_ssr_path: Option<String>,
    pub quanx_dev_id: Option<String>,
    pub singbox_add_clash_modes: bool,
    pub managed_config_prefix: String,
    pub script: Option<String>,
}

impl ExtraSettings {
    /// Seeds the request-scoped settings from the process-wide defaults;
    /// query-string and external-config layers are then merged on top by
    /// the façade, each overriding only the fields they actually set.
    pub fn from_settings(settings: &Settings) -> Self {
        ExtraSettings {
            filter_deprecated: settings.filter_deprecated,
            append_proxy_type: settings.append_type,
            clash_new_field_name: settings.clash_new_field_name,
            enable_rule_generator: true,
            quanx_dev_id: settings.quanx_dev_id.clone(),
            singbox_add_clash_modes: settings.singbox_add_clash_modes,
            managed_config_prefix: settings.managed_config_prefix.clone(),
            ..Default::default()
        }
    }

    /// `node.Foo.Define(ext.Foo)` (§4.9): the node's own value wins when
    /// present, falling back to this request's default otherwise.
    pub fn resolve_udp(&self, node_value: TriBool) -> bool {
        node_value.define(self.udp).get(false)
    }

    pub fn resolve_tfo(&self, node_value: TriBool) -> bool {
        node_value.define(self.tcp_fast_open).get(false)
    }

    pub fn resolve_scv(&self, node_value: TriBool) -> bool {
        node_value.define(self.skip_cert_verify).get(false)
    }

    pub fn resolve_tls13(&self, node_value: TriBool) -> bool {
        node_value.define(self.tls13).get(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_tribool_wins_over_request_default() {
        let mut ext = ExtraSettings::default();
        ext.udp = TriBool::False;
        assert!(ext.resolve_udp(TriBool::True));
        assert!(!ext.resolve_udp(TriBool::Undef));
    }

    #[test]
    fn from_settings_carries_process_defaults() {
        let settings = Settings::default();
        let ext = ExtraSettings::from_settings(&settings);
        assert_eq!(ext.filter_deprecated, settings.filter_deprecated);
        assert_eq!(ext.clash_new_field_name, settings.clash_new_field_name);
    }
}
