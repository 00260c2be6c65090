//! The request façade (C11, §4.11): `Subconvert(req) -> resp`, the single
//! entry point shared by the HTTP service and the one-shot generator.

use crate::emit::{self, EmitTarget};
use crate::error::{CoreError, CoreResult};
use crate::fetch::{FetchOptions, Fetcher};
use crate::group::ProxyGroupConfig;
use crate::group_builder::build_groups;
use crate::model::Node;
use crate::parser;
use crate::preprocess::{self, PreprocessOptions, RenameRule};
use crate::ruleset::{load_rulesets, RulesetConfig};
use crate::script::{DisabledEngine, EntryPoint, ScriptEngine, ScriptOptions};
use crate::settings::{ExtraSettings, Settings};
use crate::tribool::TriBool;
use crate::useragent::{self, AutoTarget};
use base64::Engine as _;
use router_common::SUBSCRIPTION_USERINFO_HEADER;
use std::collections::HashMap;
use std::time::Duration;

/// Everything one `/sub`-shaped conversion needs, already parsed out of
/// whatever transport carried it in (HTTP query string, CLI flags, a
/// stored profile file). Unrecognized fields from the original query
/// surface are carried in `extra_query` so templates can still read them
/// as `request.*` (§6.2).
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub target: String,
    pub user_agent: String,
    pub urls: Vec<String>,
    pub insert_urls: Vec<String>,
    pub prepend_insert: bool,
    pub group_name: Option<String>,

    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub rename: Vec<RenameRule>,
    pub add_emoji: bool,
    pub remove_emoji: bool,
    pub append_type: bool,
    pub sort: bool,
    pub sort_script: Option<String>,
    pub filter_deprecated: Option<bool>,
    pub filter_script: Option<String>,

    pub tfo: TriBool,
    pub udp: TriBool,
    pub scv: TriBool,
    pub tls13: TriBool,

    pub groups_base64: Option<String>,
    pub ruleset_base64: Option<String>,

    pub external_config_url: Option<String>,

    pub managed_config: bool,
    pub interval: Option<u32>,
    pub strict: bool,
    pub self_url: Option<String>,

    pub extra_query: HashMap<String, String>,
}

/// The façade's output: the rendered body plus the headers a caller
/// embedding this over HTTP should forward.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub body: String,
    pub content_type: &'static str,
    pub subscription_userinfo: Option<String>,
}

fn resolve_target(req: &Request) -> CoreResult<(EmitTarget, Option<u8>)> {
    let resolved = if req.target.eq_ignore_ascii_case("auto") {
        useragent::detect_target(&req.user_agent).ok_or_else(|| CoreError::InputInvalid("could not auto-detect target from User-Agent".to_string()))?
    } else {
        return Ok((parse_target_name(&req.target)?, None));
    };
    Ok(match resolved {
        AutoTarget::Clash => (EmitTarget::Clash, None),
        AutoTarget::ClashR => (EmitTarget::ClashR, None),
        AutoTarget::Surge(v) => (EmitTarget::Surge(v), Some(v)),
        AutoTarget::Quantumult => (EmitTarget::Quantumult, None),
        AutoTarget::QuantumultX => (EmitTarget::QuantumultX, None),
        AutoTarget::Loon => (EmitTarget::Loon, None),
        AutoTarget::Surfboard => (EmitTarget::Surfboard, None),
        AutoTarget::SsConf => (EmitTarget::Ssd, None),
        AutoTarget::V2ray => (EmitTarget::Mixed, None),
    })
}

fn parse_target_name(name: &str) -> CoreResult<EmitTarget> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "clash" => EmitTarget::Clash,
        "clashr" => EmitTarget::ClashR,
        "surge" => EmitTarget::Surge(4),
        "surge2" => EmitTarget::Surge(2),
        "surge3" => EmitTarget::Surge(3),
        "surge4" => EmitTarget::Surge(4),
        "surfboard" => EmitTarget::Surfboard,
        "quan" => EmitTarget::Quantumult,
        "quanx" => EmitTarget::QuantumultX,
        "loon" => EmitTarget::Loon,
        "mellow" => EmitTarget::Mellow,
        "singbox" => EmitTarget::SingBox,
        "ssd" => EmitTarget::Ssd,
        "sssub" => EmitTarget::Sssub,
        "mixed" => EmitTarget::Mixed,
        "ss" => EmitTarget::Ss,
        "ssr" => EmitTarget::Ssr,
        "v2ray" => EmitTarget::V2ray,
        "trojan" => EmitTarget::Trojan,
        other => return Err(CoreError::InputInvalid(format!("unknown target: {}", other))),
    })
}

/// "Simple subscription" targets re-encode a flat link list; "full" targets
/// need proxy groups and rulesets (§4.11 step 2).
fn is_simple_target(target: EmitTarget) -> bool {
    matches!(
        target,
        EmitTarget::Ss | EmitTarget::Ssr | EmitTarget::V2ray | EmitTarget::Trojan | EmitTarget::Mixed | EmitTarget::Sssub | EmitTarget::Ssd
    )
}

fn content_type_for(target: EmitTarget) -> &'static str {
    match target {
        EmitTarget::Clash | EmitTarget::ClashR => "text/yaml; charset=utf-8",
        EmitTarget::SingBox => "application/json; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

fn decode_base64_groups(encoded: &str) -> Vec<ProxyGroupConfig> {
    use crate::group::GroupType;
    let Ok(bytes) = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded))
    else {
        return Vec::new();
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return Vec::new();
    };
    // One group per line: `name\`type\`member1\`member2...` (§3.2 wire form).
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split('`');
            let name = parts.next()?;
            let type_str = parts.next()?;
            let group_type = match type_str {
                "select" => GroupType::Select,
                "url-test" => GroupType::UrlTest,
                "fallback" => GroupType::Fallback,
                "load-balance" => GroupType::LoadBalance,
                "relay" => GroupType::Relay,
                "ssid" => GroupType::Ssid,
                _ => GroupType::Select,
            };
            let mut cfg = ProxyGroupConfig::new(name, group_type);
            cfg.proxies = parts.map(|s| s.to_string()).collect();
            Some(cfg)
        })
        .collect()
}

fn decode_base64_rulesets(encoded: &str, default_group: &str) -> Vec<RulesetConfig> {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(encoded))
    else {
        return Vec::new();
    };
    let Ok(text) = String::from_utf8(bytes) else {
        return Vec::new();
    };
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| match line.split_once(',') {
            Some((group, url)) => RulesetConfig::new(group, url),
            None => RulesetConfig::new(default_group, line),
        })
        .collect()
}

/// Fetches one URL, parses it into nodes, and assigns `group_id`/`group` —
/// negative ids for insert-URLs, non-negative for the main `url=` list
/// (§4.11 step 6, §5 ordering guarantee).
async fn fetch_and_parse(
    fetcher: &Fetcher,
    url: &str,
    group_id: i32,
    group_name: &str,
    fetch_opts: &FetchOptions<'_>,
) -> CoreResult<Vec<Node>> {
    let bytes = fetcher
        .fetch_with(url, fetch_opts)
        .await
        .map_err(|e| CoreError::FetchFailure { url: url.to_string(), reason: e.to_string() })?;
    let text = String::from_utf8_lossy(&bytes);
    let mut nodes = parser::parse_subscription(&text);
    for n in &mut nodes {
        n.group_id = group_id;
        n.group = group_name.to_string();
        n.finalize_remark();
        n.ensure_vmess_defaults();
    }
    Ok(nodes)
}

/// Runs the full 12-step conversion (§4.11). `settings` is assumed already
/// fresh — reload gating (step 3) is the caller's responsibility since it
/// touches process-wide state this crate doesn't own.
pub async fn subconvert(
    req: &Request,
    settings: &Settings,
    fetcher: &Fetcher,
    script_engine: &dyn ScriptEngine,
) -> CoreResult<Response> {
    // Step 1-2: target resolution.
    let (target, _surge_ver) = resolve_target(req)?;
    let simple = is_simple_target(target);

    // Step 4: per-request settings, seeded from process defaults then
    // overridden by the query-string layer (external-config merge happens
    // just below, at the correct precedence — between defaults and query).
    let mut ext = ExtraSettings::from_settings(settings);

    if let Some(config_url) = &req.external_config_url {
        let fetch_opts = FetchOptions {
            ttl: Duration::from_secs(settings.cache_ttl),
            base_path: Some(std::path::Path::new(&settings.base_path)),
            serve_cache_on_fail: settings.serve_cache_on_fetch_fail,
            max_size: settings.max_allowed_download_size,
            proxy: None,
        };
        if let Ok(bytes) = fetcher.fetch_with(config_url, &fetch_opts).await {
            apply_external_config(&String::from_utf8_lossy(&bytes), &mut ext);
        }
    }

    if let Some(encoded) = &req.groups_base64 {
        ext.proxy_groups = decode_base64_groups(encoded);
    }
    if let Some(encoded) = &req.ruleset_base64 {
        ext.rulesets = decode_base64_rulesets(encoded, "Proxy");
    }

    // Step 5: query-string overrides win over whatever external config set.
    if !req.include.is_empty() {
        ext.include = req.include.clone();
    }
    if !req.exclude.is_empty() {
        ext.exclude = req.exclude.clone();
    }
    if !req.rename.is_empty() {
        ext.rename = req.rename.clone();
    }
    ext.add_emoji = ext.add_emoji || req.add_emoji;
    ext.remove_emoji = ext.remove_emoji || req.remove_emoji;
    ext.append_proxy_type = ext.append_proxy_type || req.append_type;
    ext.sort_flag = ext.sort_flag || req.sort;
    if req.sort_script.is_some() {
        ext.sort_script = req.sort_script.clone();
    }
    if let Some(fdn) = req.filter_deprecated {
        ext.filter_deprecated = fdn;
    }
    // Query string outranks whatever external config set (§4.12): check it
    // first, falling back to the already-merged `ext` value when undefined.
    ext.udp = req.udp.define(ext.udp);
    ext.tcp_fast_open = req.tfo.define(ext.tcp_fast_open);
    ext.skip_cert_verify = req.scv.define(ext.skip_cert_verify);
    ext.tls13 = req.tls13.define(ext.tls13);

    if req.urls.is_empty() {
        return Err(CoreError::InputInvalid("at least one url= is required".to_string()));
    }

    // Step 6: fetch insert-urls (negative groupIDs) then urls (groupID >= 0).
    let fetch_opts = FetchOptions {
        ttl: Duration::from_secs(settings.cache_ttl),
        base_path: Some(std::path::Path::new(&settings.base_path)),
        serve_cache_on_fail: settings.serve_cache_on_fetch_fail,
        max_size: settings.max_allowed_download_size,
        proxy: None,
    };

    let mut insert_nodes: Vec<Node> = Vec::new();
    for (i, url) in req.insert_urls.iter().enumerate() {
        let group_id = -1 - i as i32;
        match fetch_and_parse(fetcher, url, group_id, "Insert", &fetch_opts).await {
            Ok(nodes) => insert_nodes.extend(nodes),
            Err(e) if settings.skip_failed_links => {
                log::warn!("skipping failed insert url {}: {}", url, e);
            }
            Err(e) => return Err(e),
        }
    }

    let mut main_nodes: Vec<Node> = Vec::new();
    let mut userinfo: Option<String> = None;
    for (i, url) in req.urls.iter().enumerate() {
        let group_id = i as i32;
        let group_name = req.group_name.clone().unwrap_or_else(|| format!("Group{}", group_id));

        let entry = fetcher.fetch_entry(url, &fetch_opts).await;
        match entry {
            Ok(entry) => {
                if userinfo.is_none() {
                    userinfo = entry
                        .headers
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(SUBSCRIPTION_USERINFO_HEADER))
                        .map(|(_, v)| v.clone());
                }
                let text = String::from_utf8_lossy(&entry.body);
                let mut nodes = parser::parse_subscription(&text);
                if nodes.is_empty() && !settings.skip_failed_links {
                    return Err(CoreError::InputInvalid(format!("url produced no nodes: {}", url)));
                }
                for n in &mut nodes {
                    n.group_id = group_id;
                    n.group = group_name.clone();
                    n.finalize_remark();
                    n.ensure_vmess_defaults();
                }
                main_nodes.extend(nodes);
            }
            Err(e) => {
                if settings.skip_failed_links {
                    log::warn!("skipping failed url {}: {}", url, e);
                    continue;
                }
                return Err(CoreError::FetchFailure { url: url.clone(), reason: e.to_string() });
            }
        }
    }

    if main_nodes.is_empty() && insert_nodes.is_empty() {
        return Err(CoreError::InputInvalid("no nodes produced by any url".to_string()));
    }

    // Step 8: prepend or append insert-nodes.
    let mut nodes = if req.prepend_insert {
        let mut combined = insert_nodes;
        combined.extend(main_nodes);
        combined
    } else {
        let mut combined = main_nodes;
        combined.extend(insert_nodes);
        combined
    };

    // Step 9: optional filter-script pass — drops nodes the script rejects.
    if let Some(script_src) = req.filter_script.as_deref().or(ext.script.as_deref()) {
        if script_engine.authorized() {
            nodes.retain(|n| {
                script_engine
                    .call(script_src, EntryPoint::Filter, Some(n), &[], ScriptOptions::default())
                    .map(|r| r != "false" && r != "0")
                    .unwrap_or(true)
            });
        }
    }

    // Step 10: preprocessor.
    let preprocess_opts = PreprocessOptions {
        include: ext.include.clone(),
        exclude: ext.exclude.clone(),
        rename: ext.rename.clone(),
        add_emoji: ext.add_emoji,
        remove_emoji: ext.remove_emoji,
        emoji_rules: Vec::new(),
        sort: ext.sort_flag,
        sort_script: ext.sort_script.clone(),
        dedup_by_remark: true,
        append_proxy_type: ext.append_proxy_type,
    };
    let mut nodes = preprocess::preprocess(nodes, &preprocess_opts);
    for (i, n) in nodes.iter_mut().enumerate() {
        n.id = i;
    }

    // Step 11: dispatch to the emitter. Full targets also build groups and
    // load rulesets; simple targets skip both entirely.
    let body = if simple {
        emit::emit(target, &nodes, &[], &mut [], &ext)
    } else {
        let groups = build_groups(&ext.proxy_groups, &nodes, script_engine);
        let mut rulesets = load_rulesets(fetcher, &ext.rulesets, settings.max_concur_threads).await;
        let rendered = emit::emit(target, &nodes, &groups, &mut rulesets, &ext);
        if req.managed_config && matches!(target, EmitTarget::Surge(_) | EmitTarget::Surfboard) {
            let self_url = req.self_url.clone().unwrap_or_default();
            let interval = req.interval.unwrap_or(settings.cache_ttl as u32 / 60);
            format!("#!MANAGED-CONFIG {} interval={} strict={}\n{}", self_url, interval, req.strict, rendered)
        } else {
            rendered
        }
    };

    Ok(Response {
        body,
        content_type: content_type_for(target),
        subscription_userinfo: userinfo,
    })
}

/// Parses an external config document (YAML/TOML/INI, §6.3) and merges its
/// `include`/`exclude`/`rename`/`proxy_groups`/`rulesets` sections into
/// `ext`, sitting between built-in defaults and the query string in the
/// precedence chain (§4.12).
fn apply_external_config(text: &str, ext: &mut ExtraSettings) {
    if let Ok(yaml) = serde_yaml::from_str::<serde_yaml::Value>(text) {
        if let Some(mapping) = yaml.as_mapping() {
            if let Some(include) = mapping.get("include").and_then(|v| v.as_sequence()) {
                ext.include = include.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect();
            }
            if let Some(exclude) = mapping.get("exclude").and_then(|v| v.as_sequence()) {
                ext.exclude = exclude.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect();
            }
            if let Some(rename) = mapping.get("rename").and_then(|v| v.as_sequence()) {
                ext.rename = rename
                    .iter()
                    .filter_map(|v| {
                        let m = v.as_mapping()?;
                        let from = m.get("match")?.as_str()?;
                        let to = m.get("replace").and_then(|r| r.as_str()).unwrap_or("");
                        Some(RenameRule::new(from, to))
                    })
                    .collect();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_target_is_rejected() {
        let req = Request {
            target: "not-a-real-target".to_string(),
            urls: vec!["https://example.com/sub".to_string()],
            ..Default::default()
        };
        assert!(resolve_target(&req).is_err());
    }

    #[test]
    fn surge_is_a_full_target_clash_and_ssd_are_simple() {
        assert!(!is_simple_target(EmitTarget::Surge(4)));
        assert!(!is_simple_target(EmitTarget::Clash));
        assert!(is_simple_target(EmitTarget::Ssd));
        assert!(is_simple_target(EmitTarget::Mixed));
    }

    #[test]
    fn auto_target_resolves_surge_version_from_user_agent() {
        let req = Request {
            target: "auto".to_string(),
            user_agent: "Surge/1650 CFNetwork".to_string(),
            urls: vec!["https://example.com/sub".to_string()],
            ..Default::default()
        };
        let (target, ver) = resolve_target(&req).unwrap();
        assert_eq!(target, EmitTarget::Surge(4));
        assert_eq!(ver, Some(4));
    }

    #[test]
    fn base64_groups_decode_member_list() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("Proxy`select`A`B\n");
        let groups = decode_base64_groups(&encoded);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Proxy");
        assert_eq!(groups[0].proxies, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn external_config_rename_section_merges() {
        let mut ext = ExtraSettings::default();
        apply_external_config("rename:\n  - match: \"HK-\\\\d+\"\n    replace: \"HK\"\n", &mut ext);
        assert_eq!(ext.rename.len(), 1);
    }
}

/// Picks the script engine a caller should construct for a given
/// `Settings.enable_script` flag: the QuickJS VM when both the feature and
/// the setting are on, the no-op engine otherwise (§4.2 policy).
#[cfg(feature = "script")]
pub fn build_script_engine(settings: &Settings) -> Box<dyn ScriptEngine> {
    if settings.enable_script {
        Box::new(crate::script::QuickJsEngine::new())
    } else {
        Box::new(DisabledEngine)
    }
}

#[cfg(not(feature = "script"))]
pub fn build_script_engine(_settings: &Settings) -> Box<dyn ScriptEngine> {
    Box::new(DisabledEngine)
}
