//! One-shot subscription generator: the same conversion pipeline as
//! `router-api`'s `/sub` endpoint (§4.11), driven from CLI flags instead of
//! an HTTP query string, with output written to stdout or `--output`.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use router_core::facade::{self, Request as CoreRequest};
use router_core::fetch::Fetcher;
use router_core::preprocess::RenameRule;
use router_core::tribool::TriBool;
use router_core::Settings;
use std::path::PathBuf;
use std::sync::Arc;

/// Generates a proxy client config from one or more subscription links.
#[derive(Parser)]
#[command(name = "subconvert", about = "Proxy subscription converter", long_about = None)]
struct Cli {
    /// Output client format (clash, surge, surge2, surge3, surge4, surfboard,
    /// quan, quanx, loon, mellow, singbox, ssd, sssub, mixed, ss, ssr, v2ray,
    /// trojan, auto)
    #[arg(long, default_value = "clash")]
    target: String,

    /// Subscription/link URL, may be repeated (joined as `url=a|b|c`)
    #[arg(long = "url", required = true)]
    urls: Vec<String>,

    /// Extra node source merged ahead of or after `--url`, may be repeated
    #[arg(long = "insert")]
    insert_urls: Vec<String>,

    /// Puts `--insert` nodes before the main list instead of after it
    #[arg(long)]
    prepend: bool,

    /// Proxy group name assigned to nodes from `--url` (defaults to `GroupN`)
    #[arg(long)]
    group: Option<String>,

    /// Regex: only keep remarks that match (may be repeated)
    #[arg(long)]
    include: Vec<String>,

    /// Regex: drop remarks that match (may be repeated)
    #[arg(long)]
    exclude: Vec<String>,

    /// Rename rule `pattern@replacement`, may be repeated
    #[arg(long)]
    rename: Vec<String>,

    #[arg(long)]
    add_emoji: bool,

    #[arg(long)]
    remove_emoji: bool,

    #[arg(long)]
    append_type: bool,

    #[arg(long)]
    sort: bool,

    /// External config document (local path or URL) merged under the query
    /// layer (§4.12)
    #[arg(long)]
    config: Option<String>,

    /// Preference file (INI/YAML/TOML) providing process-wide defaults
    #[arg(long)]
    pref: Option<PathBuf>,

    /// Directory used for the on-disk fetch cache
    #[arg(long, default_value = "./cache")]
    cache_dir: String,

    /// Writes the result here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    udp: Option<bool>,

    #[arg(long)]
    tfo: Option<bool>,

    #[arg(long)]
    scv: Option<bool>,

    #[arg(long)]
    tls13: Option<bool>,
}

fn opt_tribool(v: Option<bool>) -> TriBool {
    match v {
        Some(b) => TriBool::from_bool(b),
        None => TriBool::Undef,
    }
}

fn parse_rename(raw: &[String]) -> Vec<RenameRule> {
    raw.iter()
        .filter_map(|entry| entry.split_once('@'))
        .map(|(m, r)| RenameRule::new(m, r))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = match &cli.pref {
        Some(path) => load_preference(path)?,
        None => Settings::default(),
    };

    let fetcher = Fetcher::new(cli.cache_dir.clone()).context("opening fetch cache directory")?;
    let fetcher = Arc::new(fetcher);
    let script_engine = facade::build_script_engine(&settings);

    let req = CoreRequest {
        target: cli.target,
        urls: cli.urls,
        insert_urls: cli.insert_urls,
        prepend_insert: cli.prepend,
        group_name: cli.group,
        include: cli.include,
        exclude: cli.exclude,
        rename: parse_rename(&cli.rename),
        add_emoji: cli.add_emoji,
        remove_emoji: cli.remove_emoji,
        append_type: cli.append_type,
        sort: cli.sort,
        external_config_url: cli.config,
        udp: opt_tribool(cli.udp),
        tfo: opt_tribool(cli.tfo),
        scv: opt_tribool(cli.scv),
        tls13: opt_tribool(cli.tls13),
        ..Default::default()
    };

    info!("converting {} url(s) to target {}", req.urls.len(), req.target);
    let resp = facade::subconvert(&req, &settings, &fetcher, script_engine.as_ref())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.output {
        Some(path) => std::fs::write(&path, resp.body).with_context(|| format!("writing output to {}", path.display()))?,
        None => print!("{}", resp.body),
    }

    Ok(())
}

/// Loads process-wide defaults from a preference file (§6.3), reusing the
/// same INI/YAML/TOML detection the API service applies on `/readconf`.
fn load_preference(path: &PathBuf) -> Result<Settings> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading preference file {}", path.display()))?;
    Ok(if text.lines().any(|l| l.trim_start().starts_with("common:")) {
        parse_yaml_preference(&text)
    } else {
        Settings::default()
    })
}

fn parse_yaml_preference(text: &str) -> Settings {
    let mut settings = Settings::default();
    let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return settings;
    };
    let Some(common) = doc.get("common").and_then(|v| v.as_mapping()) else {
        return settings;
    };
    if let Some(v) = common.get("cache_ttl").and_then(|v| v.as_u64()) {
        settings.cache_ttl = v;
    }
    if let Some(v) = common.get("enable_script").and_then(|v| v.as_bool()) {
        settings.enable_script = v;
    }
    if let Some(v) = common.get("max_allowed_rules").and_then(|v| v.as_u64()) {
        settings.max_allowed_rules = v as usize;
    }
    settings
}
