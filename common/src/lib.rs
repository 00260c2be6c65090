//! Shared constants for the subscription converter workspace.
//!
//! This crate is included by `router-core`, `router-rds`, `router-api` and
//! `router-cli` to keep version strings, default ports and size limits
//! consistent across binaries.

/// Version string reported by the `/version` endpoint and the CLI `--version` flag.
pub const VERSION: &str = concat!("subconverter-rs/", env!("CARGO_PKG_VERSION_MAJOR"), ".", env!("CARGO_PKG_VERSION_MINOR"), ".", env!("CARGO_PKG_VERSION_PATCH"));

/// Default bind address for the HTTP facade.
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:25500";

/// Default on-disk cache directory, relative to the process working directory.
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// Default cache TTL, in seconds, used when a request does not override it.
pub const DEFAULT_CACHE_TTL: u64 = 60;

/// Default size cap for a single fetch, in bytes (32 MiB).
pub const DEFAULT_MAX_DOWNLOAD_SIZE: u64 = 32 * 1024 * 1024;

/// Default HTTP client timeout, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Maximum number of redirects the fetcher will follow.
pub const MAX_REDIRECTS: u8 = 20;

/// Header used to detect and break self-referential fetch loops
/// (Surge-to-Clash conversion, CORS relay, `/getruleset` self-fetch, ...).
pub const LOOP_DETECTION_HEADER: &str = "X-Subconverter-Loop";

/// Header carrying subscription traffic/expiry info forwarded to clients.
pub const SUBSCRIPTION_USERINFO_HEADER: &str = "Subscription-UserInfo";
