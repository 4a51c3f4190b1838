//! Content-addressed cache of model-call results.
//!
//! A translation of a long paper is dozens of rate-limited, billed calls.
//! Keying every result by `sha256(operation, canonical JSON arguments)` and
//! storing it on disk lets a crashed or quota-interrupted run be replayed
//! from the start: completed calls come back from disk, only the missing
//! ones reach the provider.
//!
//! ## Layout
//!
//! ```text
//! <cache_dir>/<operation>/<sha256 hex>.json
//! ```
//!
//! Entries are never invalidated; deleting the directory is the only
//! eviction. Writes go to a temporary file that is renamed into place, so a
//! crash mid-write never leaves a truncated entry behind.

use crate::error::TranslateError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Deterministic key of one cached operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    digest: String,
}

impl CacheKey {
    /// Hash the operation identity together with its serialised arguments.
    ///
    /// Arguments must serialise deterministically (structs and `BTreeMap`s,
    /// no timestamps); identical inputs across runs produce identical keys.
    pub fn new<A: Serialize + ?Sized>(operation: &str, args: &A) -> Result<Self, TranslateError> {
        let to_key_err =
            |e: serde_json::Error| TranslateError::CacheKey(format!("{operation}: {e}"));
        let args = serde_json::to_value(args).map_err(to_key_err)?;
        let payload = serde_json::to_vec(&serde_json::json!({
            "op": operation,
            "args": args,
        }))
        .map_err(to_key_err)?;

        Ok(Self {
            operation: sanitize_component(operation),
            digest: hex::encode(Sha256::digest(&payload)),
        })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// Directory-backed key → JSON value store.
///
/// A store without a directory is disabled: every lookup misses and nothing
/// is written, so callers use one code path whether caching is on or off.
#[derive(Debug, Default)]
pub struct CacheStore {
    dir: Option<PathBuf>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_option(dir: Option<&Path>) -> Self {
        match dir {
            Some(d) => Self::new(d),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|d| d.join(&key.operation).join(format!("{}.json", key.digest)))
    }

    /// Read a stored value. Missing, unreadable or undecodable entries miss.
    pub async fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = self.entry_path(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist a value under `key` (temp file + rename).
    ///
    /// A failed write is logged, not returned: losing a cache entry costs a
    /// repeated call on the next run, not this run's result.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        if let Err(e) = write_atomic(&path, value).await {
            warn!("Cache write failed for {}: {}", path.display(), e);
        }
    }

    /// Return the cached result for `(operation, args)`, computing and
    /// storing it on a miss.
    ///
    /// Only `Ok` results are stored, so a failed computation is attempted
    /// again on the next call.
    pub async fn get_or_compute<A, T, E, F, Fut>(
        &self,
        operation: &str,
        args: &A,
        compute: F,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        E: From<TranslateError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.is_enabled() {
            return compute().await;
        }

        let key = CacheKey::new(operation, args)?;
        if let Some(hit) = self.load::<T>(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: {}/{}", key.operation, &key.digest[..12]);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute().await?;
        self.store(&key, &value).await;
        Ok(value)
    }
}

async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(value).map_err(std::io::Error::other)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Keep operation names usable as a single directory component.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "op".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_and_argument_sensitive() {
        let a = CacheKey::new("translate", &("text", 1)).unwrap();
        let b = CacheKey::new("translate", &("text", 1)).unwrap();
        let c = CacheKey::new("translate", &("text", 2)).unwrap();
        let d = CacheKey::new("normalize", &("text", 1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.digest(), c.digest());
        assert_ne!(a.digest(), d.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn operation_names_are_sanitised() {
        let k = CacheKey::new("../evil/op name", &()).unwrap();
        assert_eq!(k.operation(), "___evil_op_name");
    }

    #[tokio::test]
    async fn computes_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let first: String = cache
            .get_or_compute("op", &"args", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TranslateError>("translated".to_string())
            })
            .await
            .unwrap();
        let second: String = cache
            .get_or_compute("op", &"args", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TranslateError>("different".to_string())
            })
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn persists_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<u32> = CacheStore::new(dir.path())
            .get_or_compute("op", &42, || async { Ok::<_, TranslateError>(vec![1, 2, 3]) })
            .await
            .unwrap();

        let reopened = CacheStore::new(dir.path());
        let again: Vec<u32> = reopened
            .get_or_compute("op", &42, || async {
                Err::<Vec<u32>, _>(TranslateError::Internal("should not run".into()))
            })
            .await
            .unwrap();
        assert_eq!(value, again);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());

        let failed: Result<String, TranslateError> = cache
            .get_or_compute("op", &1, || async { Err(TranslateError::Internal("boom".into())) })
            .await;
        assert!(failed.is_err());

        let ok: String = cache
            .get_or_compute("op", &1, || async { Ok::<_, TranslateError>("fine".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok, "fine");
    }

    #[tokio::test]
    async fn corrupt_entry_is_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let key = CacheKey::new("op", &"x").unwrap();
        let path = dir.path().join("op").join(format!("{}.json", key.digest()));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{not json").unwrap();

        let v: String = cache
            .get_or_compute("op", &"x", || async { Ok::<_, TranslateError>("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(v, "fresh");
        assert_eq!(cache.load::<String>(&key).await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn disabled_store_always_computes() {
        let cache = CacheStore::disabled();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        for _ in 0..2 {
            let _: u8 = cache
                .get_or_compute("op", &(), || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TranslateError>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
