//! The fetcher (C1, §4.1): URL/file/data-URI retrieval backed by
//! `router_rds::Cache`, with a size cap, redirect bound, and an optional
//! CORS-relay prefix for loop-protected front-end proxying.

use base64::Engine as _;
use router_common::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_DOWNLOAD_SIZE, LOOP_DETECTION_HEADER, MAX_REDIRECTS};
use router_rds::{Cache, CacheEntry};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download exceeded the {0}-byte size cap")]
    TooLarge(u64),
    #[error("path escapes the configured base directory")]
    PathEscape,
    #[error("network error: {0}")]
    Network(String),
    #[error("loop detected")]
    LoopDetected,
    #[error("local file error: {0}")]
    Io(String),
}

pub struct FetchOptions<'a> {
    pub ttl: Duration,
    pub base_path: Option<&'a Path>,
    pub serve_cache_on_fail: bool,
    pub max_size: u64,
    pub proxy: Option<&'a str>,
}

impl Default for FetchOptions<'_> {
    fn default() -> Self {
        FetchOptions {
            ttl: Duration::from_secs(router_common::DEFAULT_CACHE_TTL),
            base_path: None,
            serve_cache_on_fail: false,
            max_size: DEFAULT_MAX_DOWNLOAD_SIZE,
            proxy: None,
        }
    }
}

pub struct Fetcher {
    cache: Cache,
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(cache_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let cache = Cache::new(cache_dir)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS as usize))
            .build()
            .expect("reqwest client builds with default TLS backend");
        Ok(Fetcher { cache, client })
    }

    /// A fetcher over a throwaway temp directory cache, handy for tests and
    /// for the one-shot CLI in stateless mode.
    pub fn new_default() -> Arc<Fetcher> {
        Arc::new(Fetcher::new(router_common::DEFAULT_CACHE_DIR).expect("cache dir is writable"))
    }

    pub fn flush_cache(&self) -> std::io::Result<()> {
        self.cache.flush()
    }

    /// `Fetch(url, opts) -> bytes` (§4.1, §C1 contract).
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch_with(url, &FetchOptions::default()).await
    }

    pub async fn fetch_with(&self, url: &str, opts: &FetchOptions<'_>) -> Result<Vec<u8>, FetchError> {
        self.fetch_entry(url, opts).await.map(|entry| entry.body)
    }

    /// Same contract as `fetch_with`, but returns the response headers
    /// alongside the body — the façade needs these to forward
    /// `Subscription-UserInfo` (§4.11 step 7).
    pub async fn fetch_entry(&self, url: &str, opts: &FetchOptions<'_>) -> Result<CacheEntry, FetchError> {
        if let Some(entry) = self.cache.get_if_fresh(url, opts.ttl) {
            return Ok(entry);
        }

        let result = self.fetch_uncached(url, opts).await;
        match result {
            Ok(entry) => {
                let _ = self.cache.put(url, &entry);
                Ok(entry)
            }
            Err(e) => {
                if opts.serve_cache_on_fail {
                    if let Some(entry) = self.cache.get_stale(url) {
                        return Ok(entry);
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch_uncached(&self, url: &str, opts: &FetchOptions<'_>) -> Result<CacheEntry, FetchError> {
        if let Some(relayed) = url.strip_prefix("cors:") {
            return self.fetch_cors(relayed, opts).await;
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url, opts).await;
        }
        if let Some(rest) = url.strip_prefix("data:") {
            return fetch_data_uri(rest);
        }
        self.fetch_file(url, opts)
    }

    async fn fetch_http(&self, url: &str, opts: &FetchOptions<'_>) -> Result<CacheEntry, FetchError> {
        let req = if let Some(proxy_url) = opts.proxy {
            let client = reqwest::Proxy::all(proxy_url)
                .and_then(|proxy| {
                    reqwest::Client::builder()
                        .timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
                        .proxy(proxy)
                        .build()
                })
                .map_err(|e| FetchError::Network(e.to_string()))?;
            client.get(url)
        } else {
            self.client.get(url)
        };
        let resp = req.send().await.map_err(|e| FetchError::Network(e.to_string()))?;
        if resp
            .headers()
            .get(LOOP_DETECTION_HEADER)
            .is_some()
        {
            return Err(FetchError::LoopDetected);
        }
        let headers: Vec<(String, String)> = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        if let Some(len) = resp.content_length() {
            if len > opts.max_size {
                return Err(FetchError::TooLarge(opts.max_size));
            }
        }
        let bytes = resp.bytes().await.map_err(|e| FetchError::Network(e.to_string()))?;
        if bytes.len() as u64 > opts.max_size {
            return Err(FetchError::TooLarge(opts.max_size));
        }
        Ok(CacheEntry {
            body: bytes.to_vec(),
            headers,
        })
    }

    async fn fetch_cors(&self, relay_target: &str, opts: &FetchOptions<'_>) -> Result<CacheEntry, FetchError> {
        // The relay prepends `relay_target` to its own front-end URL and
        // attaches the loop-detection header; here we simply perform the
        // underlying fetch and stamp the header so a peer relay can reject
        // a cycle if this response is itself relayed onward.
        let mut entry = self.fetch_http(relay_target, opts).await?;
        entry
            .headers
            .push((LOOP_DETECTION_HEADER.to_string(), "1".to_string()));
        Ok(entry)
    }

    fn fetch_file(&self, path_str: &str, opts: &FetchOptions<'_>) -> Result<CacheEntry, FetchError> {
        let base = opts.base_path.ok_or(FetchError::PathEscape)?;
        let candidate = base.join(path_str);
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(FetchError::PathEscape);
        }
        let canonical_base = base.canonicalize().map_err(|e| FetchError::Io(e.to_string()))?;
        let canonical = candidate
            .canonicalize()
            .map_err(|e| FetchError::Io(e.to_string()))?;
        if !canonical.starts_with(&canonical_base) {
            return Err(FetchError::PathEscape);
        }
        let meta = std::fs::metadata(&canonical).map_err(|e| FetchError::Io(e.to_string()))?;
        if meta.len() > opts.max_size {
            return Err(FetchError::TooLarge(opts.max_size));
        }
        let body = std::fs::read(&canonical).map_err(|e| FetchError::Io(e.to_string()))?;
        Ok(CacheEntry {
            body,
            headers: Vec::new(),
        })
    }
}

fn fetch_data_uri(rest: &str) -> Result<CacheEntry, FetchError> {
    // `[;base64],<data>` — the only two forms this service needs to support.
    let (meta, data) = rest.split_once(',').ok_or(FetchError::Io("malformed data: URI".into()))?;
    let body = if meta.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
            .map_err(|e| FetchError::Io(e.to_string()))?
    } else {
        urlencoding::decode(data)
            .map(|s| s.into_owned().into_bytes())
            .map_err(|e| FetchError::Io(e.to_string()))?
    };
    Ok(CacheEntry {
        body,
        headers: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn data_uri_base64_decodes() {
        let fetcher = Fetcher::new(tempfile::tempdir().unwrap().path()).unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hello world");
        let bytes = fetcher
            .fetch(&format!("data:text/plain;base64,{}", encoded))
            .await
            .unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn file_fetch_rejects_parent_dir_escape() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(dir.path().join("cache")).unwrap();
        let opts = FetchOptions {
            base_path: Some(dir.path()),
            ..Default::default()
        };
        let result = fetcher.fetch_with("../etc/passwd", &opts).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn file_fetch_reads_under_base_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rules.list"), b"DOMAIN,example.com").unwrap();
        let fetcher = Fetcher::new(dir.path().join("cache")).unwrap();
        let opts = FetchOptions {
            base_path: Some(dir.path()),
            ..Default::default()
        };
        let bytes = fetcher.fetch_with("rules.list", &opts).await.unwrap();
        assert_eq!(bytes, b"DOMAIN,example.com");
    }
}
