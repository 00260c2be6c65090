//! On-disk fetch cache.
//!
//! Bodies and headers fetched by the core's `Fetcher` are persisted under a
//! cache directory, keyed by the MD5 hash of the source URL. A file newer
//! than its TTL is served without touching the network; stale or missing
//! entries fall through to a fresh fetch.
//!
//! Access is guarded by a writer-preferring lock per cache directory so that
//! a burst of concurrent readers cannot starve a writer trying to refresh an
//! entry (readers briefly pause while a writer is queued).

use md5::{Digest, Md5};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One cache entry: the response body plus any headers worth remembering
/// (currently just serialized as `key: value` lines, one per header).
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

/// A writer-preferring reader/writer lock scoped to one cache directory.
///
/// Readers increment `readers` and proceed as long as `writer_waiting` is
/// false; a writer sets `writer_waiting` first so that new readers block
/// behind it, then waits for in-flight readers to drain.
struct WriterPreferring {
    state: Mutex<LockState>,
    cond: Condvar,
}

#[derive(Default)]
struct LockState {
    readers: usize,
    writer_active: bool,
    writer_waiting: bool,
}

impl WriterPreferring {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
        }
    }

    fn read<R>(&self, f: impl FnOnce() -> R) -> R {
        {
            let mut s = self.state.lock();
            while s.writer_active || s.writer_waiting {
                self.cond.wait(&mut s);
            }
            s.readers += 1;
        }
        let result = f();
        {
            let mut s = self.state.lock();
            s.readers -= 1;
            if s.readers == 0 {
                self.cond.notify_all();
            }
        }
        result
    }

    fn write<R>(&self, f: impl FnOnce() -> R) -> R {
        {
            let mut s = self.state.lock();
            s.writer_waiting = true;
            while s.readers > 0 || s.writer_active {
                self.cond.wait(&mut s);
            }
            s.writer_waiting = false;
            s.writer_active = true;
        }
        let result = f();
        {
            let mut s = self.state.lock();
            s.writer_active = false;
            self.cond.notify_all();
        }
        result
    }
}

/// Disk-backed cache keyed by MD5(url). One [`WriterPreferring`] lock guards
/// the whole directory; entries are small enough (subscription/ruleset
/// bodies) that per-key locking would add complexity without real gain.
pub struct Cache {
    dir: PathBuf,
    lock: Arc<WriterPreferring>,
}

fn md5_hex(key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Arc::new(WriterPreferring::new()),
        })
    }

    fn body_path(&self, key: &str) -> PathBuf {
        self.dir.join(md5_hex(key))
    }

    fn header_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}_header", md5_hex(key)))
    }

    /// Returns a cached entry if its body file exists and is newer than
    /// `ttl` seconds, regardless of content. `ttl == 0` disables the cache.
    pub fn get_if_fresh(&self, key: &str, ttl: Duration) -> Option<CacheEntry> {
        if ttl.is_zero() {
            return None;
        }
        self.lock.read(|| self.read_entry(key, Some(ttl)))
    }

    /// Returns a cached entry regardless of age — used for
    /// `ServeCacheOnFetchFail` fallback after a failed live fetch.
    pub fn get_stale(&self, key: &str) -> Option<CacheEntry> {
        self.lock.read(|| self.read_entry(key, None))
    }

    fn read_entry(&self, key: &str, max_age: Option<Duration>) -> Option<CacheEntry> {
        let body_path = self.body_path(key);
        let meta = fs::metadata(&body_path).ok()?;
        if let Some(ttl) = max_age {
            let modified = meta.modified().ok()?;
            let age = SystemTime::now().duration_since(modified).ok()?;
            if age > ttl {
                return None;
            }
        }
        let body = fs::read(&body_path).ok()?;
        let headers = fs::read_to_string(self.header_path(key))
            .map(|text| parse_headers(&text))
            .unwrap_or_default();
        Some(CacheEntry { body, headers })
    }

    /// Persists a fresh entry, overwriting any previous body/header files.
    pub fn put(&self, key: &str, entry: &CacheEntry) -> std::io::Result<()> {
        self.lock.write(|| {
            fs::write(self.body_path(key), &entry.body)?;
            let header_text: String = entry
                .headers
                .iter()
                .map(|(k, v)| format!("{}: {}\n", k, v))
                .collect();
            fs::write(self.header_path(key), header_text)
        })
    }

    /// Removes every entry below the cache directory (`/flushcache`).
    pub fn flush(&self) -> std::io::Result<()> {
        self.lock.write(|| {
            for entry in fs::read_dir(&self.dir)?.flatten() {
                let _ = fs::remove_file(entry.path());
            }
            Ok(())
        })
    }
}

fn parse_headers(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Convenience used by callers that only ever track cache freshness by
/// epoch seconds instead of `SystemTime`, matching the `ttl` query params
/// that flow in from HTTP.
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Thin in-process index of which keys exist, useful for callers that want
/// to list cache occupancy without touching the filesystem lock per key.
#[derive(Default)]
pub struct CacheIndex {
    seen: Mutex<HashMap<String, ()>>,
}

impl CacheIndex {
    pub fn mark(&self, key: &str) {
        self.seen.lock().insert(key.to_string(), ());
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_fresh_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path()).unwrap();
        let entry = CacheEntry {
            body: b"hello".to_vec(),
            headers: vec![("Content-Type".into(), "text/plain".into())],
        };
        cache.put("https://example.com/a", &entry).unwrap();
        let got = cache
            .get_if_fresh("https://example.com/a", Duration::from_secs(60))
            .unwrap();
        assert_eq!(got.body, b"hello");
        assert_eq!(got.headers[0].0, "Content-Type");
    }

    #[test]
    fn expired_entry_is_not_returned_as_fresh_but_stale_works() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path()).unwrap();
        cache
            .put(
                "k",
                &CacheEntry {
                    body: b"x".to_vec(),
                    headers: vec![],
                },
            )
            .unwrap();
        assert!(cache.get_if_fresh("k", Duration::from_secs(0)).is_none());
        assert!(cache.get_stale("k").is_some());
    }

    #[test]
    fn flush_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path()).unwrap();
        cache
            .put(
                "k",
                &CacheEntry {
                    body: b"x".to_vec(),
                    headers: vec![],
                },
            )
            .unwrap();
        cache.flush().unwrap();
        assert!(cache.get_stale("k").is_none());
    }
}
