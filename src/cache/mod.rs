//! Bounded, shared cache of parsed tables.
//!
//! Tables are keyed by normalized path, file identity (size and mtime), sheet
//! and header row. The index lock is only held for bookkeeping; decoding and
//! header detection run outside of it, and concurrent requests for the same
//! table wait on the single build in flight.
pub(crate) mod clock;
pub(crate) mod config;
pub(crate) mod entry;
pub(crate) mod memory;
pub(crate) mod pending;
pub(crate) mod reaper;

use crate::cache::clock::Clock;
use crate::cache::clock::SystemClock;
use crate::cache::config::CacheConfig;
use crate::cache::entry::BuildKey;
use crate::cache::entry::CacheEntry;
use crate::cache::entry::CacheKey;
use crate::cache::entry::EvictionReason;
use crate::cache::entry::HeaderSelection;
use crate::cache::entry::SheetKey;
use crate::cache::pending::BuildResult;
use crate::cache::pending::PendingBuild;
use crate::cache::reaper::Reaper;
use crate::decoder::DecodeError;
use crate::decoder::FileIdentity;
use crate::decoder::TableDecoder;
use crate::detector::DetectError;
use crate::detector::HeaderDetector;
use crate::spreadsheet::format_of;
use crate::table::Table;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum CacheError {
    #[error("Source '{path}' is unavailable: {cause}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        cause: DecodeError,
    },

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("Header row {row} is out of range for sheet '{sheet}' with {row_count} rows")]
    InvalidHeaderRow { sheet: String, row: usize, row_count: usize },

    #[error("Timed out waiting for sheet '{sheet}' of '{path}' to be built")]
    BuildTimeout { path: PathBuf, sheet: String },

    #[error("Build of sheet '{sheet}' of '{path}' was abandoned")]
    BuildAbandoned { path: PathBuf, sheet: String },
}

/// Point-in-time view of the cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_memory_bytes: usize,
    pub max_memory_bytes: usize,
    /// Idle time of the least recently used entry
    pub oldest_idle_seconds: f64,
    pub hits: u64,
    pub misses: u64,
    pub decodes: u64,
    pub evictions: u64,
    /// Builds currently running
    pub in_flight: usize,
}

/// Format, size and sheets of a spreadsheet file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    /// Lowercased file extension
    pub format: String,
    pub identity: FileIdentity,
    pub sheet_names: Vec<String>,
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Header row chosen by detection for each sheet version
    detected: HashMap<SheetKey, usize>,
    pending: HashMap<BuildKey, Arc<PendingBuild>>,
    total_bytes: usize,
    access_seq: u64,
}

impl CacheIndex {
    fn next_seq(&mut self) -> u64 {
        self.access_seq = self.access_seq.wrapping_add(1);
        self.access_seq
    }
}

struct CacheInner {
    config: CacheConfig,
    decoder: Box<dyn TableDecoder>,
    detector: HeaderDetector,
    clock: Arc<dyn Clock>,
    index: Mutex<CacheIndex>,
    hits: AtomicU64,
    misses: AtomicU64,
    decodes: AtomicU64,
    evictions: AtomicU64,
}

enum Slot {
    Build(Arc<PendingBuild>),
    Wait(Arc<PendingBuild>),
    /// Wait for the detection build of the same sheet, then look again
    Follow(Arc<PendingBuild>),
}

/// Get-or-load cache of [`Table`]s.
///
/// Cloning the cache is cheap and every clone shares the same entries.
/// Returned tables stay valid after eviction for as long as a caller holds them.
#[derive(Clone)]
pub struct TableCache {
    inner: Arc<CacheInner>,
}

impl TableCache {
    pub fn new<D: TableDecoder + 'static>(config: CacheConfig, decoder: D) -> Self {
        Self::with_clock(config, decoder, Arc::new(SystemClock))
    }

    /// Cache whose idle tracking reads `clock`.
    pub fn with_clock<D: TableDecoder + 'static>(config: CacheConfig, decoder: D, clock: Arc<dyn Clock>) -> Self {
        TableCache {
            inner: Arc::new(CacheInner {
                detector: HeaderDetector::new(config.detector.clone()),
                config,
                decoder: Box::new(decoder),
                clock,
                index: Mutex::new(CacheIndex::default()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                decodes: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the table for `sheet_name` of `path`, decoding it on a miss.
    ///
    /// With `header_row` the given row is applied as the header; otherwise it
    /// is detected. Waits without bound for a build of the same table that
    /// another caller started.
    pub fn get(&self, path: impl AsRef<Path>, sheet_name: &str, header_row: Option<usize>) -> Result<Arc<Table>, CacheError> {
        self.inner.fetch(path.as_ref(), sheet_name, header_row, None)
    }

    /// Like [`get`](TableCache::get), but gives up with
    /// [`CacheError::BuildTimeout`] if another caller's build of the same
    /// table is still running at `deadline`. That build is not cancelled.
    pub fn get_with_deadline(
        &self,
        path: impl AsRef<Path>,
        sheet_name: &str,
        header_row: Option<usize>,
        deadline: Instant,
    ) -> Result<Arc<Table>, CacheError> {
        self.inner.fetch(path.as_ref(), sheet_name, header_row, Some(deadline))
    }

    /// Drops every entry of `path`, whatever its sheet or header row.
    pub fn invalidate(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut index = self.inner.index.lock();
        let keys = index
            .entries
            .keys()
            .filter(|key| key.path == path)
            .cloned()
            .collect::<Vec<_>>();
        for key in keys {
            self.inner.evict_locked(&mut index, &key, EvictionReason::Invalidated);
        }
        index.detected.retain(|sheet, _| sheet.path != path);
    }

    /// Drops every entry. Builds in flight still complete and insert their result.
    pub fn clear(&self) {
        let mut index = self.inner.index.lock();
        let keys = index.entries.keys().cloned().collect::<Vec<_>>();
        for key in keys {
            self.inner.evict_locked(&mut index, &key, EvictionReason::Cleared);
        }
        index.detected.clear();
        debug_assert_eq!(index.total_bytes, 0, "memory accounting drift");
    }

    /// Evicts entries idle for longer than the idle timeout; returns how many.
    pub fn evict_idle(&self) -> usize {
        self.inner.evict_idle()
    }

    /// Starts a background thread sweeping idle entries every `interval`.
    ///
    /// The thread stops when the returned handle is dropped, or once every
    /// clone of the cache is gone.
    pub fn spawn_reaper(&self, interval: Duration) -> std::io::Result<Reaper> {
        let inner: Weak<CacheInner> = Arc::downgrade(&self.inner);
        Reaper::spawn(interval, move || match inner.upgrade() {
            Some(inner) => {
                inner.evict_idle();
                true
            }
            None => false,
        })
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.inner.clock.now();
        let index = self.inner.index.lock();
        CacheStats {
            entry_count: index.entries.len(),
            total_memory_bytes: index.total_bytes,
            max_memory_bytes: self.inner.config.max_memory_bytes,
            oldest_idle_seconds: index
                .entries
                .values()
                .map(|entry| now.saturating_duration_since(entry.last_access).as_secs_f64())
                .fold(0.0, f64::max),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            decodes: self.inner.decodes.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            in_flight: index.pending.len(),
        }
    }

    /// Sheet names of `path`, read from the file on every call.
    pub fn sheet_names(&self, path: impl AsRef<Path>) -> Result<Vec<String>, CacheError> {
        let path = normalize(path.as_ref());
        self.inner
            .decoder
            .list_sheets(&path)
            .map_err(|cause| source_unavailable(&path, cause))
    }

    /// Describes `path` without caching anything.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<FileInfo, CacheError> {
        let path = normalize(path.as_ref());
        let identity = self
            .inner
            .decoder
            .identity(&path)
            .map_err(|cause| source_unavailable(&path, cause))?;
        let sheet_names = self.sheet_names(&path)?;
        Ok(FileInfo {
            format: format_of(&path),
            path,
            identity,
            sheet_names,
        })
    }
}

impl CacheInner {
    fn fetch(&self, path: &Path, sheet_name: &str, header_row: Option<usize>, deadline: Option<Instant>) -> Result<Arc<Table>, CacheError> {
        self.evict_idle();
        let path = normalize(path);
        let identity = self
            .decoder
            .identity(&path)
            .map_err(|cause| source_unavailable(&path, cause))?;
        let key = BuildKey {
            sheet: SheetKey {
                path,
                identity,
                sheet_name: sheet_name.to_owned(),
            },
            selection: header_row.map_or(HeaderSelection::Detect, HeaderSelection::Row),
        };

        // set once this caller has waited on a detection build of the same sheet
        let mut followed = false;
        loop {
            let slot = {
                let mut index = self.index.lock();
                self.evict_stale_locked(&mut index, &key.sheet);
                if let Some(table) = self.lookup_locked(&mut index, &key) {
                    if !followed {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::debug!(path = %key.sheet.path.display(), sheet = sheet_name, "cache hit");
                    return Ok(table);
                }
                if !followed {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                }
                match index.pending.get(&key) {
                    Some(pending) => Slot::Wait(Arc::clone(pending)),
                    None => match index.pending.get(&key.detecting()) {
                        // the detected header may be the requested row
                        Some(pending) if !followed && key.selection != HeaderSelection::Detect => {
                            Slot::Follow(Arc::clone(pending))
                        }
                        _ => {
                            let pending = PendingBuild::new();
                            index.pending.insert(key.clone(), Arc::clone(&pending));
                            Slot::Build(pending)
                        }
                    },
                }
            };

            match slot {
                Slot::Follow(pending) => {
                    tracing::debug!(path = %key.sheet.path.display(), sheet = sheet_name, "waiting for header detection in flight");
                    if pending.wait(deadline).is_none() {
                        return Err(self.timeout(&key));
                    }
                    followed = true;
                }
                Slot::Wait(pending) => {
                    tracing::debug!(path = %key.sheet.path.display(), sheet = sheet_name, "waiting for build in flight");
                    return pending.wait(deadline).unwrap_or_else(|| Err(self.timeout(&key)));
                }
                Slot::Build(pending) => {
                    tracing::debug!(path = %key.sheet.path.display(), sheet = sheet_name, "cache miss");
                    return self.build(key, pending);
                }
            }
        }
    }

    fn timeout(&self, key: &BuildKey) -> CacheError {
        CacheError::BuildTimeout {
            path: key.sheet.path.to_owned(),
            sheet: key.sheet.sheet_name.to_owned(),
        }
    }

    fn lookup_locked(&self, index: &mut CacheIndex, key: &BuildKey) -> Option<Arc<Table>> {
        let header_row = match key.selection {
            HeaderSelection::Row(row) => row,
            HeaderSelection::Detect => *index.detected.get(&key.sheet)?,
        };
        let now = self.clock.now();
        let seq = index.next_seq();
        index
            .entries
            .get_mut(&key.sheet.with_header_row(header_row))
            .map(|entry| entry.touch(now, seq))
    }

    /// Runs the build as the single builder of `key` and publishes its result.
    fn build(&self, key: BuildKey, pending: Arc<PendingBuild>) -> BuildResult {
        let guard = BuildGuard {
            inner: self,
            key: &key,
            pending: &pending,
            armed: true,
        };
        let constructed = self.construct(&key);
        guard.disarm();

        let result = {
            let mut index = self.index.lock();
            if index.pending.get(&key).is_some_and(|slot| Arc::ptr_eq(slot, &pending)) {
                index.pending.remove(&key);
            }
            constructed.map(|table| self.install_locked(&mut index, &key, table))
        };
        pending.publish(result.clone());
        result
    }

    /// Decodes, picks the header and builds the table. Never holds the index lock.
    fn construct(&self, key: &BuildKey) -> Result<Table, CacheError> {
        let started = Instant::now();
        let sheet = &key.sheet;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let grid = self
            .decoder
            .decode(&sheet.path, &sheet.sheet_name)
            .map_err(|cause| source_unavailable(&sheet.path, cause))?;
        let decision = match key.selection {
            HeaderSelection::Row(row) => {
                if row >= grid.row_count() {
                    Err(CacheError::InvalidHeaderRow {
                        sheet: sheet.sheet_name.to_owned(),
                        row,
                        row_count: grid.row_count(),
                    })?
                }
                self.detector.decide_at(&grid, row)?
            }
            HeaderSelection::Detect => self.detector.detect(&grid)?,
        };
        let table = Table::from_grid(grid, sheet.identity, decision);
        tracing::info!(
            path = %sheet.path.display(),
            sheet = %sheet.sheet_name,
            rows = table.row_count(),
            columns = table.column_count(),
            bytes = table.estimated_bytes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table built"
        );
        Ok(table)
    }

    fn install_locked(&self, index: &mut CacheIndex, key: &BuildKey, table: Table) -> Arc<Table> {
        let header_row = table.provenance().header_row;
        let cache_key = key.sheet.with_header_row(header_row);
        if key.selection == HeaderSelection::Detect {
            index.detected.insert(key.sheet.clone(), header_row);
        }
        let now = self.clock.now();
        let seq = index.next_seq();
        // A detected and an explicit request can race to the same key.
        if let Some(entry) = index.entries.get_mut(&cache_key) {
            return entry.touch(now, seq);
        }

        let table = Arc::new(table);
        let memory_bytes = memory::estimate_entry_bytes(table.estimated_bytes(), key.sheet.key_bytes());
        index.entries.insert(
            cache_key.clone(),
            CacheEntry {
                table: Arc::clone(&table),
                memory_bytes,
                last_access: now,
                access_seq: seq,
            },
        );
        index.total_bytes = index.total_bytes.saturating_add(memory_bytes);
        self.enforce_limits_locked(index, &cache_key, now);
        table
    }

    /// Idle sweep, then LRU eviction down to the memory budget and the entry
    /// bound. `keep` is never evicted.
    fn enforce_limits_locked(&self, index: &mut CacheIndex, keep: &CacheKey, now: Instant) {
        self.evict_idle_locked(index, now);
        while index.total_bytes > self.config.max_memory_bytes {
            match least_recently_used(index, keep) {
                Some(victim) => self.evict_locked(index, &victim, EvictionReason::MemoryPressure),
                None => break,
            }
        }
        if let Some(max_entries) = self.config.max_entries {
            while index.entries.len() > max_entries.max(1) {
                match least_recently_used(index, keep) {
                    Some(victim) => self.evict_locked(index, &victim, EvictionReason::EntryLimit),
                    None => break,
                }
            }
        }
    }

    fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let mut index = self.index.lock();
        self.evict_idle_locked(&mut index, now)
    }

    fn evict_idle_locked(&self, index: &mut CacheIndex, now: Instant) -> usize {
        let timeout = self.config.idle_timeout();
        let mut idle = index
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_access) > timeout)
            .map(|(key, entry)| (entry.recency(), key.clone()))
            .collect::<Vec<_>>();
        idle.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, key) in &idle {
            self.evict_locked(index, key, EvictionReason::Idle);
        }
        idle.len()
    }

    /// Drops entries of the same path whose file identity differs from the current one.
    fn evict_stale_locked(&self, index: &mut CacheIndex, current: &SheetKey) {
        let stale = index
            .entries
            .keys()
            .filter(|key| key.path == current.path && key.identity != current.identity)
            .cloned()
            .collect::<Vec<_>>();
        for key in stale {
            self.evict_locked(index, &key, EvictionReason::Stale);
        }
        index
            .detected
            .retain(|sheet, _| sheet.path != current.path || sheet.identity == current.identity);
    }

    fn evict_locked(&self, index: &mut CacheIndex, key: &CacheKey, reason: EvictionReason) {
        let Some(entry) = index.entries.remove(key) else {
            return;
        };
        debug_assert!(index.total_bytes >= entry.memory_bytes, "memory accounting drift");
        index.total_bytes = index.total_bytes.saturating_sub(entry.memory_bytes);
        index
            .detected
            .retain(|sheet, row| !(sheet.matches(key) && *row == key.header_row));
        self.evictions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %key.path.display(),
            sheet = %key.sheet_name,
            header_row = key.header_row,
            bytes = entry.memory_bytes,
            ?reason,
            "cache entry evicted"
        );
    }
}

/// Releases the pending slot if the builder unwinds before publishing.
struct BuildGuard<'a> {
    inner: &'a CacheInner,
    key: &'a BuildKey,
    pending: &'a Arc<PendingBuild>,
    armed: bool,
}

impl BuildGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(path = %self.key.sheet.path.display(), sheet = %self.key.sheet.sheet_name, "table build abandoned");
        {
            let mut index = self.inner.index.lock();
            if index.pending.get(self.key).is_some_and(|slot| Arc::ptr_eq(slot, self.pending)) {
                index.pending.remove(self.key);
            }
        }
        self.pending.publish(Err(CacheError::BuildAbandoned {
            path: self.key.sheet.path.to_owned(),
            sheet: self.key.sheet.sheet_name.to_owned(),
        }));
    }
}

fn least_recently_used(index: &CacheIndex, keep: &CacheKey) -> Option<CacheKey> {
    index
        .entries
        .iter()
        .filter(|(key, _)| *key != keep)
        .min_by_key(|(_, entry)| entry.recency())
        .map(|(key, _)| key.clone())
}

fn source_unavailable(path: &Path, cause: DecodeError) -> CacheError {
    tracing::warn!(path = %path.display(), error = %cause, "spreadsheet unavailable");
    CacheError::SourceUnavailable {
        path: path.to_path_buf(),
        cause,
    }
}

/// Canonical path when the file exists, otherwise the absolute form.
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests;
