//! # Router API
//!
//! The HTTP front end for the subscription converter (§6.1): a thin
//! actix-web service wrapping `router_core::facade::subconvert`. All
//! process-wide mutable state (the active `Settings` snapshot, the script
//! engine it implies, and the fetch cache) lives in `AppState`, rebuilt
//! wholesale on `/readconf`/`/updateconf` rather than patched in place.

mod config;
mod handlers;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use router_core::facade;
use router_core::fetch::Fetcher;
use router_core::script::ScriptEngine;
use router_core::Settings;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

pub struct AppState {
    pub settings: RwLock<Settings>,
    pub script_engine: RwLock<Arc<dyn ScriptEngine>>,
    pub fetcher: Arc<Fetcher>,
    pub pref_path: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    std::env::set_var("RUST_LOG", std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    env_logger::init();

    let matches = clap::Command::new("Router API")
        .version(router_common::VERSION)
        .about("Subscription conversion HTTP service")
        .arg(
            clap::Arg::new("bind")
                .long("bind")
                .help("address to bind the server to")
                .value_name("ADDR")
                .default_value(router_common::DEFAULT_API_ADDR),
        )
        .arg(
            clap::Arg::new("pref")
                .long("pref")
                .help("path to the preference file (INI/YAML/TOML)")
                .value_name("PATH")
                .default_value("pref.yaml"),
        )
        .arg(
            clap::Arg::new("workers")
                .long("workers")
                .help("number of HTTP worker threads")
                .value_name("N")
                .default_value("4")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let bind_address = matches.get_one::<String>("bind").unwrap().clone();
    let pref_path = PathBuf::from(matches.get_one::<String>("pref").unwrap());
    let workers = *matches.get_one::<usize>("workers").unwrap();

    let settings = config::load_settings(&pref_path);
    config::init(&settings);

    let fetcher = Arc::new(Fetcher::new(settings.cache_dir.clone()).expect("cache directory is writable"));
    let script_engine: Arc<dyn ScriptEngine> = Arc::from(facade::build_script_engine(&settings));

    let state = web::Data::new(AppState {
        settings: RwLock::new(settings),
        script_engine: RwLock::new(script_engine),
        fetcher,
        pref_path,
    });

    log::info!("starting router-api on {}", bind_address);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "HEAD", "POST"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(handlers::configure)
    })
    .bind(&bind_address)?
    .workers(workers)
    .run()
    .await
}
