//! Content addressing and the in-process render cache.
//!
//! Encoding is the bottleneck of a blog build: a single photo at five widths
//! in two formats is ten Lanczos resizes and ten encodes. This module makes
//! sure each distinct image is processed at most once per process, and that
//! files already on disk from a previous build are reused.
//!
//! # Design
//!
//! ## Content keys
//!
//! Derived files are named after a [`ContentKey`]: the SHA-256 of the source
//! file's bytes, hex encoded and truncated to [`KEY_LEN`] characters. Content
//! based rather than path or mtime based, so
//!
//! - two references (different paths, or a path and a URL) to the same bytes
//!   share one set of derived files,
//! - editing an image changes its key, which busts browser caches for free,
//! - a `git checkout` (which resets mtimes) does not trigger re-encoding.
//!
//! Twenty hex characters is 80 bits. For the few hundred images a blog
//! carries the collision odds are negligible.
//!
//! ## Two cache layers
//!
//! 1. **On disk**: before encoding a variant the generator checks whether
//!    `<key>-<width>.<ext>` already exists. A rebuild against a persisted
//!    output directory therefore encodes nothing.
//! 2. **In memory**: [`ImageCache`] maps `(ContentKey, WidthPolicy)` to the
//!    finished [`RenderSet`]. It lives as long as the owning
//!    [`Materializer`](crate::materialize::Materializer) and is never
//!    invalidated; a new process starts empty.
//!
//! The width policy is part of the memory key because the same photo used
//! once as a fixed-width image and once responsively needs two different
//! artifact sets.
//!
//! ## Concurrency
//!
//! Each cache key owns a slot behind its own mutex. The first caller for a
//! key builds the set while holding the slot; concurrent callers for the same
//! key block on it and then read the finished value, so a key is never
//! generated twice. Callers for different keys never wait on each other.
//! A failed build leaves the slot empty and the next caller retries.

use crate::imaging::WidthPolicy;
use crate::types::RenderSet;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Number of hex characters kept from the digest.
pub const KEY_LEN: usize = 20;

/// Truncated SHA-256 of an image's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let digest = format!("{:x}", Sha256::digest(bytes));
        Self(digest[..KEY_LEN].to_string())
    }

    /// Hash a file's full contents.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Memory cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content: ContentKey,
    pub policy: WidthPolicy,
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Built,
}

type Slot = Arc<Mutex<Option<Arc<RenderSet>>>>;

/// Process-lifetime map from [`CacheKey`] to finished render sets.
#[derive(Default)]
pub struct ImageCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a finished set without building.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<RenderSet>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.get(key)?)
        };
        let value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        value.clone()
    }

    /// Return the cached set for `key`, building it with `build` on a miss.
    ///
    /// At most one `build` runs per key at a time. Errors are returned to
    /// the caller and nothing is cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> Result<RenderSet, E>,
    ) -> Result<(Arc<RenderSet>, CacheOutcome), E> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };

        let mut value = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(set) = value.as_ref() {
            return Ok((Arc::clone(set), CacheOutcome::Hit));
        }

        let set = Arc::new(build()?);
        *value = Some(Arc::clone(&set));
        Ok((set, CacheOutcome::Built))
    }

    /// Number of finished entries.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.values().cloned().collect()
        };
        slots
            .iter()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Work counters for a materializer.
///
/// Atomic so they can be bumped from rayon workers. Tests use them as the
/// write-count hook: a rebuild against a warm output directory must report
/// zero encodes.
#[derive(Debug, Default)]
pub struct MaterializeStats {
    memory_hits: AtomicU32,
    encoded: AtomicU32,
    existing: AtomicU32,
    placeholders: AtomicU32,
    fetched: AtomicU32,
}

impl MaterializeStats {
    pub fn memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encoded(&self, n: u32) {
        self.encoded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn existing(&self, n: u32) {
        self.existing.fetch_add(n, Ordering::Relaxed);
    }

    pub fn placeholder(&self) {
        self.placeholders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            encoded: self.encoded.load(Ordering::Relaxed),
            existing: self.existing.load(Ordering::Relaxed),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MaterializeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub memory_hits: u32,
    pub encoded: u32,
    pub existing: u32,
    pub placeholders: u32,
    pub fetched: u32,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} encoded", self.encoded)?;
        if self.existing > 0 {
            write!(f, ", {} on disk", self.existing)?;
        }
        if self.memory_hits > 0 {
            write!(f, ", {} memory hits", self.memory_hits)?;
        }
        if self.fetched > 0 {
            write!(f, ", {} fetched", self.fetched)?;
        }
        Ok(())
    }
}
