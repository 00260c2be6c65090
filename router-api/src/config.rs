//! Preference file loading (§6.3) and the couple of runtime-settable values
//! the server needs to mutate without a full settings reload.

use mini_config::Configure;
use router_core::Settings;
use std::path::Path;

/// Process-wide values cheap enough to read/write without going through a
/// full `Settings` reload — the access token gate checked on every
/// token-protected endpoint.
#[derive(Debug, Clone, Configure)]
pub enum Api {
    AccessToken,
}

pub fn init(settings: &Settings) {
    Api::AccessToken.set(&settings.api_access_token);
}

pub fn current_access_token() -> String {
    Api::AccessToken.get::<String>()
}

/// INI / YAML / TOML preference file detection (§6.3): YAML if it has a
/// top-level `common:` key, TOML if it has a top-level `version=` line,
/// INI otherwise.
fn detect_and_parse(text: &str) -> Settings {
    if text.lines().any(|l| l.trim_start().starts_with("common:")) {
        return parse_yaml(text);
    }
    if text.lines().any(|l| l.trim_start().starts_with("version")) {
        return parse_toml(text);
    }
    parse_ini(text)
}

fn parse_yaml(text: &str) -> Settings {
    let mut settings = Settings::default();
    let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return settings;
    };
    let Some(common) = doc.get("common").and_then(|v| v.as_mapping()) else {
        return settings;
    };
    apply_str(common, "api_access_token", &mut settings.api_access_token);
    apply_bool(common, "api_mode", &mut settings.api_mode);
    apply_str(common, "base_path", &mut settings.base_path);
    apply_str(common, "cache_dir", &mut settings.cache_dir);
    apply_u64(common, "cache_ttl", &mut settings.cache_ttl);
    apply_bool(common, "serve_cache_on_fetch_fail", &mut settings.serve_cache_on_fetch_fail);
    apply_usize(common, "max_allowed_rules", &mut settings.max_allowed_rules);
    apply_usize(common, "max_concur_threads", &mut settings.max_concur_threads);
    apply_bool(common, "enable_script", &mut settings.enable_script);
    apply_str(common, "managed_config_prefix", &mut settings.managed_config_prefix);
    apply_bool(common, "clash_new_field_name", &mut settings.clash_new_field_name);
    apply_bool(common, "filter_deprecated", &mut settings.filter_deprecated);
    apply_bool(common, "singbox_add_clash_modes", &mut settings.singbox_add_clash_modes);
    apply_str(common, "template_root", &mut settings.template_root);
    apply_bool(common, "skip_failed_links", &mut settings.skip_failed_links);
    settings
}

fn apply_str(mapping: &serde_yaml::Mapping, key: &str, field: &mut String) {
    if let Some(v) = mapping.get(key).and_then(|v| v.as_str()) {
        *field = v.to_string();
    }
}

fn apply_bool(mapping: &serde_yaml::Mapping, key: &str, field: &mut bool) {
    if let Some(v) = mapping.get(key).and_then(|v| v.as_bool()) {
        *field = v;
    }
}

fn apply_u64(mapping: &serde_yaml::Mapping, key: &str, field: &mut u64) {
    if let Some(v) = mapping.get(key).and_then(|v| v.as_u64()) {
        *field = v;
    }
}

fn apply_usize(mapping: &serde_yaml::Mapping, key: &str, field: &mut usize) {
    if let Some(v) = mapping.get(key).and_then(|v| v.as_u64()) {
        *field = v as usize;
    }
}

fn parse_toml(text: &str) -> Settings {
    let mut settings = Settings::default();
    let Ok(doc) = text.parse::<toml::Table>() else {
        return settings;
    };
    if let Some(v) = doc.get("api_access_token").and_then(|v| v.as_str()) {
        settings.api_access_token = v.to_string();
    }
    if let Some(v) = doc.get("api_mode").and_then(|v| v.as_bool()) {
        settings.api_mode = v;
    }
    if let Some(v) = doc.get("base_path").and_then(|v| v.as_str()) {
        settings.base_path = v.to_string();
    }
    if let Some(v) = doc.get("cache_ttl").and_then(|v| v.as_integer()) {
        settings.cache_ttl = v as u64;
    }
    if let Some(v) = doc.get("enable_script").and_then(|v| v.as_bool()) {
        settings.enable_script = v;
    }
    settings
}

fn parse_ini(text: &str) -> Settings {
    let mut settings = Settings::default();
    let mut ini = configparser::ini::Ini::new();
    if ini.read(text.to_string()).is_err() {
        return settings;
    }
    if let Some(v) = ini.get("common", "api_access_token") {
        settings.api_access_token = v;
    }
    if let Some(v) = ini.getbool("common", "api_mode").ok().flatten() {
        settings.api_mode = v;
    }
    if let Some(v) = ini.get("common", "base_path") {
        settings.base_path = v;
    }
    if let Some(v) = ini.getuint("common", "cache_ttl").ok().flatten() {
        settings.cache_ttl = v;
    }
    if let Some(v) = ini.getbool("common", "enable_script").ok().flatten() {
        settings.enable_script = v;
    }
    settings
}

/// Loads and parses the preference file at `path`, falling back to
/// built-in defaults if it doesn't exist — a missing preference file is
/// not an error, per §6.3 being entirely optional layering.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(text) => detect_and_parse(&text),
        Err(_) => Settings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_preference_file_parses_common_section() {
        let text = "common:\n  api_mode: true\n  cache_ttl: 120\n  enable_script: true\n";
        let settings = detect_and_parse(text);
        assert!(settings.api_mode);
        assert_eq!(settings.cache_ttl, 120);
        assert!(settings.enable_script);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = load_settings(Path::new("/nonexistent/preference.yaml"));
        assert_eq!(settings.cache_ttl, Settings::default().cache_ttl);
    }
}
