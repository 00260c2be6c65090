//! HTTP endpoints (§6.1): thin actix-web wrappers around
//! `router_core::facade`. All state mutation (settings reload, cache
//! flush) lives in `AppState`; the handlers themselves stay stateless.

use crate::config;
use crate::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use router_core::facade::{self, Request as CoreRequest, Response as CoreResponse};
use router_core::fetch::FetchOptions;
use router_core::preprocess::RenameRule;
use router_core::ruleset::{convert_ruleset, infer_type, RulesetType};
use router_core::tribool::TriBool;
use router_core::CoreError;
use std::collections::HashMap;
use std::time::Duration;

fn error_response(err: &CoreError) -> HttpResponse {
    HttpResponse::build(actix_web::http::StatusCode::from_u16(err.status_code()).unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR))
        .content_type("text/plain; charset=utf-8")
        .body(err.to_string())
}

/// `token=` gate shared by every token-protected endpoint (§6.1).
fn check_token(q: &HashMap<String, String>) -> Result<(), HttpResponse> {
    let expected = config::current_access_token();
    if expected.is_empty() {
        return Ok(());
    }
    match q.get("token") {
        Some(t) if t == &expected => Ok(()),
        _ => Err(error_response(&CoreError::Unauthorized("bad or missing token".to_string()))),
    }
}

fn split_pipe(raw: &str) -> Vec<String> {
    raw.split('|').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn parse_rename(raw: &str) -> Vec<RenameRule> {
    raw.split('`')
        .filter_map(|entry| entry.split_once('@'))
        .map(|(m, r)| RenameRule::new(m, r))
        .collect()
}

/// Builds a `facade::Request` from the raw `/sub` query string, routing
/// every recognized field and carrying the rest through as `extra_query`
/// so templates can still read them (§6.2).
fn build_core_request(ua: &str, mut q: HashMap<String, String>) -> CoreRequest {
    let mut req = CoreRequest {
        user_agent: ua.to_string(),
        ..Default::default()
    };

    req.target = q.remove("target").unwrap_or_default();
    req.urls = q.remove("url").map(|v| split_pipe(&v)).unwrap_or_default();
    req.insert_urls = q.remove("insert").map(|v| split_pipe(&v)).unwrap_or_default();
    req.prepend_insert = q.remove("prepend").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.group_name = q.remove("group");
    req.include = q.remove("include").map(|v| split_pipe(&v)).unwrap_or_default();
    req.exclude = q.remove("exclude").map(|v| split_pipe(&v)).unwrap_or_default();
    req.rename = q.remove("rename").map(|v| parse_rename(&v)).unwrap_or_default();
    req.add_emoji = q.remove("add_emoji").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.remove_emoji = q.remove("remove_emoji").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.append_type = q.remove("append_type").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.sort = q.remove("sort").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.sort_script = q.remove("sort_script");
    req.filter_deprecated = q.remove("fdn").map(|v| v == "true" || v == "1");
    req.filter_script = q.remove("filter_script");

    req.tfo = q.remove("tfo").map(|v| TriBool::from_str_loose(&v)).unwrap_or_default();
    req.udp = q.remove("udp").map(|v| TriBool::from_str_loose(&v)).unwrap_or_default();
    req.scv = q.remove("scv").map(|v| TriBool::from_str_loose(&v)).unwrap_or_default();
    req.tls13 = q.remove("tls13").map(|v| TriBool::from_str_loose(&v)).unwrap_or_default();

    req.groups_base64 = q.remove("groups");
    req.ruleset_base64 = q.remove("ruleset");
    req.external_config_url = q.remove("config");

    req.managed_config = q.remove("classic").map(|v| v != "true" && v != "1").unwrap_or(true);
    req.interval = q.remove("interval").and_then(|v| v.parse().ok());
    req.strict = q.remove("strict").map(|v| v == "true" || v == "1").unwrap_or(false);
    req.self_url = None;

    // Drop transport-only params that are never meaningful as `request.*`.
    q.remove("token");
    q.remove("ver");
    req.extra_query = q;
    req
}

fn respond(resp: CoreResponse) -> HttpResponse {
    let mut builder = HttpResponse::Ok();
    builder.content_type(resp.content_type);
    if let Some(info) = resp.subscription_userinfo {
        builder.insert_header((router_common::SUBSCRIPTION_USERINFO_HEADER, info));
    }
    builder.body(resp.body)
}

pub async fn version() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(router_common::VERSION)
}

pub async fn sub(req: HttpRequest, state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let ua = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut core_req = build_core_request(&ua, query.into_inner());
    if core_req.managed_config {
        let conn = req.connection_info();
        core_req.self_url = Some(format!("{}://{}{}", conn.scheme(), conn.host(), req.uri()));
    }
    let settings = state.settings.read().unwrap().clone();
    let engine = state.script_engine.read().unwrap().clone();

    match facade::subconvert(&core_req, &settings, &state.fetcher, engine.as_ref()).await {
        Ok(resp) => respond(resp),
        Err(e) => error_response(&e),
    }
}

pub async fn sub2clashr(req: HttpRequest, state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let mut q = query.into_inner();
    q.insert("target".to_string(), "clashr".to_string());
    sub(req, state, web::Query(q)).await
}

pub async fn surge2clash(req: HttpRequest, state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let mut q = query.into_inner();
    q.insert("target".to_string(), "clash".to_string());
    sub(req, state, web::Query(q)).await
}

pub async fn getprofile(req: HttpRequest, state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let mut q = query.into_inner();
    let Some(name) = q.remove("name") else {
        return error_response(&CoreError::InputInvalid("name= is required".to_string()));
    };
    let settings = state.settings.read().unwrap().clone();
    let path = std::path::Path::new(&settings.base_path).join("profiles").join(&name);
    match std::fs::read_to_string(&path) {
        Ok(profile_query) => {
            let parsed: HashMap<String, String> = url::form_urlencoded::parse(profile_query.trim().as_bytes())
                .into_owned()
                .collect();
            let mut merged = parsed;
            merged.extend(q);
            sub(req, state, web::Query(merged)).await
        }
        Err(_) => error_response(&CoreError::InputInvalid(format!("no such profile: {}", name))),
    }
}

pub async fn refreshrules(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    if let Err(resp) = check_token(&query) {
        return resp;
    }
    let settings = state.settings.read().unwrap().clone();
    let ruleset_urls: Vec<String> = settings.default_ext_config.iter().cloned().collect();
    for url in ruleset_urls {
        let opts = FetchOptions {
            ttl: Duration::from_secs(0),
            base_path: Some(std::path::Path::new(&settings.base_path)),
            serve_cache_on_fail: false,
            max_size: settings.max_allowed_download_size,
            proxy: None,
        };
        let _ = state.fetcher.fetch_with(&url, &opts).await;
    }
    HttpResponse::Ok().body("rulesets refreshed")
}

pub async fn readconf(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    if let Err(resp) = check_token(&query) {
        return resp;
    }
    let new_settings = config::load_settings(&state.pref_path);
    *state.settings.write().unwrap() = new_settings.clone();
    *state.script_engine.write().unwrap() = std::sync::Arc::from(facade::build_script_engine(&new_settings));
    config::init(&new_settings);
    HttpResponse::Ok().body("preference file reloaded")
}

pub async fn updateconf(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>, body: web::Bytes) -> HttpResponse {
    if let Err(resp) = check_token(&query) {
        return resp;
    }
    let content = if let Some(content) = query.get("content") {
        content.clone()
    } else {
        String::from_utf8_lossy(&body).into_owned()
    };
    if std::fs::write(&state.pref_path, content).is_err() {
        return error_response(&CoreError::Internal("failed to write preference file".to_string()));
    }
    readconf(state, query).await
}

pub async fn flushcache(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    if let Err(resp) = check_token(&query) {
        return resp;
    }
    match state.fetcher.flush_cache() {
        Ok(()) => HttpResponse::Ok().body("cache flushed"),
        Err(e) => error_response(&CoreError::Internal(e.to_string())),
    }
}

/// `type=1..6` maps onto the ruleset dialects in `RulesetType` (§3.3); the
/// output is always normalized to the surge-shaped dialect, matching how
/// rulesets are cached internally once fetched.
fn ruleset_type_from_param(t: &str) -> RulesetType {
    match t {
        "2" => RulesetType::QuantumultX,
        "3" => RulesetType::ClashDomain,
        "4" => RulesetType::ClashIpCidr,
        "5" => RulesetType::ClashClassical,
        _ => RulesetType::SurgeRuleset,
    }
}

pub async fn getruleset(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let q = query.into_inner();
    let Some(raw_url) = q.get("url") else {
        return error_response(&CoreError::InputInvalid("url= is required".to_string()));
    };
    let (inferred_type, fetch_url) = infer_type(raw_url);
    let ruleset_type = q.get("type").map(|t| ruleset_type_from_param(t)).unwrap_or(inferred_type);

    let settings = state.settings.read().unwrap().clone();
    let opts = FetchOptions {
        ttl: Duration::from_secs(settings.cache_ttl),
        base_path: Some(std::path::Path::new(&settings.base_path)),
        serve_cache_on_fail: settings.serve_cache_on_fetch_fail,
        max_size: settings.max_allowed_download_size,
        proxy: None,
    };
    match state.fetcher.fetch_with(fetch_url, &opts).await {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let normalized = convert_ruleset(&text, ruleset_type);
            HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(normalized)
        }
        Err(e) => error_response(&CoreError::FetchFailure { url: raw_url.clone(), reason: e.to_string() }),
    }
}

pub async fn convert(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let q = query.into_inner();
    let Some(text) = q.get("text") else {
        return error_response(&CoreError::InputInvalid("text= is required".to_string()));
    };
    let ruleset_type = q.get("type").map(|t| ruleset_type_from_param(t)).unwrap_or(RulesetType::SurgeRuleset);
    let normalized = convert_ruleset(text, ruleset_type);
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(normalized)
}

pub async fn render(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let mut q = query.into_inner();
    let Some(name) = q.remove("name") else {
        return error_response(&CoreError::InputInvalid("name= is required".to_string()));
    };
    let settings = state.settings.read().unwrap().clone();
    let path = std::path::Path::new(&settings.template_root).join(&name);
    let raw = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(_) => return error_response(&CoreError::TemplateError(format!("template not found: {}", name))),
    };

    let renderer = router_core::template::TemplateRenderer::new(&state.fetcher, settings.template_root.as_str());
    let mut vars = router_core::template::TemplateVars::new();
    for (k, v) in q {
        vars.request.insert(k, serde_json::Value::String(v));
    }
    match renderer.render(&raw, vars).await {
        Ok(out) => HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(out),
        Err(e) => error_response(&e),
    }
}

pub async fn get(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let settings = state.settings.read().unwrap().clone();
    if settings.api_mode {
        return HttpResponse::Forbidden().body("disabled when APIMode is on");
    }
    let q = query.into_inner();
    let Some(url) = q.get("url") else {
        return error_response(&CoreError::InputInvalid("url= is required".to_string()));
    };
    let opts = FetchOptions {
        ttl: Duration::from_secs(settings.cache_ttl),
        base_path: Some(std::path::Path::new(&settings.base_path)),
        serve_cache_on_fail: settings.serve_cache_on_fetch_fail,
        max_size: settings.max_allowed_download_size,
        proxy: None,
    };
    match state.fetcher.fetch_with(url, &opts).await {
        Ok(bytes) => HttpResponse::Ok().body(bytes),
        Err(e) => error_response(&CoreError::FetchFailure { url: url.clone(), reason: e.to_string() }),
    }
}

pub async fn getlocal(state: web::Data<AppState>, query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let settings = state.settings.read().unwrap().clone();
    if settings.api_mode {
        return HttpResponse::Forbidden().body("disabled when APIMode is on");
    }
    let q = query.into_inner();
    let Some(path) = q.get("path") else {
        return error_response(&CoreError::InputInvalid("path= is required".to_string()));
    };
    match std::fs::read(std::path::Path::new(&settings.base_path).join(path)) {
        Ok(bytes) => HttpResponse::Ok().body(bytes),
        Err(e) => error_response(&CoreError::Internal(e.to_string())),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/version", web::get().to(version))
        .route("/refreshrules", web::get().to(refreshrules))
        .route("/readconf", web::get().to(readconf))
        .route("/updateconf", web::post().to(updateconf))
        .route("/flushcache", web::get().to(flushcache))
        .route("/sub", web::get().to(sub))
        .route("/sub", web::head().to(sub))
        .route("/sub2clashr", web::get().to(sub2clashr))
        .route("/surge2clash", web::get().to(surge2clash))
        .route("/getruleset", web::get().to(getruleset))
        .route("/getprofile", web::get().to(getprofile))
        .route("/render", web::get().to(render))
        .route("/convert", web::get().to(convert))
        .route("/get", web::get().to(get))
        .route("/getlocal", web::get().to(getlocal));
}
