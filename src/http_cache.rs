use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "power_terminal";
const CACHE_FILE: &str = "http_cache.json";

static CACHE: Mutex<Option<HttpCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: String,
    /// Unix seconds of the last successful contact with the server.
    pub fetched_at: u64,
    /// Served from the cache without a request.
    pub from_cache: bool,
}

/// GET `url` as text, reusing a cached body for `ttl` after each successful fetch.
///
/// Stale entries are revalidated with `If-None-Match` / `If-Modified-Since`.
pub fn fetch_text_cached(client: &Client, url: &str, ttl: Duration) -> Result<Fetched> {
    let now = system_time_to_secs(SystemTime::now()).unwrap_or_default();
    let cached_entry = {
        let mut guard = lock_cache();
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.entries.get(url).cloned()
    };

    if let Some(entry) = cached_entry.as_ref() {
        if is_fresh(entry.fetched_at, now, ttl) {
            tracing::debug!(url, age_secs = now.saturating_sub(entry.fetched_at), "http cache hit");
            return Ok(Fetched {
                body: entry.body.clone(),
                fetched_at: entry.fetched_at,
                from_cache: true,
            });
        }
    }

    let mut req = client.get(url);
    if let Some(entry) = cached_entry.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().context("request failed")?;
    let status = resp.status();
    let headers = resp.headers().clone();
    if status == StatusCode::NOT_MODIFIED {
        if let Some(mut entry) = cached_entry {
            tracing::debug!(url, "http cache revalidated");
            entry.fetched_at = now;
            refresh_cache_entry(url, entry.clone());
            return Ok(Fetched {
                body: entry.body,
                fetched_at: now,
                from_cache: false,
            });
        }
        return Err(anyhow!("received 304 without cache body"));
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow!("http {}: {}", status, body.trim()));
    }

    let etag = headers
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    let last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let entry = CacheEntry {
        body: body.clone(),
        etag,
        last_modified,
        fetched_at: now,
    };
    refresh_cache_entry(url, entry);
    Ok(Fetched {
        body,
        fetched_at: now,
        from_cache: false,
    })
}

/// Entries younger than `ttl` are served without contacting the server.
pub fn is_fresh(fetched_at: u64, now: u64, ttl: Duration) -> bool {
    fetched_at <= now && now - fetched_at < ttl.as_secs()
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn lock_cache() -> MutexGuard<'static, Option<HttpCacheFile>> {
    CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn refresh_cache_entry(key: &str, entry: CacheEntry) {
    let mut guard = lock_cache();
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.entries.insert(key.to_string(), entry);
    if let Err(err) = save_cache_file(cache) {
        tracing::warn!("http cache not saved: {err:#}");
    }
}

fn load_cache_file() -> HttpCacheFile {
    let Some(path) = cache_path() else {
        return HttpCacheFile::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &HttpCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).context("create cache dir")?;
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, &path).context("swap http cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
