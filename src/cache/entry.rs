use crate::decoder::FileIdentity;
use crate::table::Table;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Identity of a cached table: the file as probed, the sheet, and the header
/// row actually applied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey {
    /// Normalized absolute path
    pub path: PathBuf,
    pub identity: FileIdentity,
    pub sheet_name: String,
    pub header_row: usize,
}

/// A sheet of one version of a file, before a header row is chosen.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SheetKey {
    pub(crate) path: PathBuf,
    pub(crate) identity: FileIdentity,
    pub(crate) sheet_name: String,
}

impl SheetKey {
    pub(crate) fn with_header_row(&self, header_row: usize) -> CacheKey {
        CacheKey {
            path: self.path.to_owned(),
            identity: self.identity,
            sheet_name: self.sheet_name.to_owned(),
            header_row,
        }
    }

    pub(crate) fn matches(&self, key: &CacheKey) -> bool {
        self.path == key.path && self.identity == key.identity && self.sheet_name == key.sheet_name
    }

    /// Bytes of key material charged to the entry.
    pub(crate) fn key_bytes(&self) -> usize {
        self.path.as_os_str().len().saturating_add(self.sheet_name.len())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum HeaderSelection {
    Detect,
    Row(usize),
}

/// What a `get` asks for; at most one build runs per build key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BuildKey {
    pub(crate) sheet: SheetKey,
    pub(crate) selection: HeaderSelection,
}

impl BuildKey {
    /// The header-detecting build of the same sheet.
    pub(crate) fn detecting(&self) -> BuildKey {
        BuildKey {
            sheet: self.sheet.clone(),
            selection: HeaderSelection::Detect,
        }
    }
}

/// Why an entry left the cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum EvictionReason {
    Idle,
    MemoryPressure,
    EntryLimit,
    /// The file changed on disk
    Stale,
    Invalidated,
    Cleared,
}

/// A live cached table with its bookkeeping.
#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub(crate) table: Arc<Table>,
    pub(crate) memory_bytes: usize,
    pub(crate) last_access: Instant,
    /// Tie-breaker for entries touched at the same instant
    pub(crate) access_seq: u64,
}

impl CacheEntry {
    pub(crate) fn touch(&mut self, now: Instant, seq: u64) -> Arc<Table> {
        self.last_access = now;
        self.access_seq = seq;
        Arc::clone(&self.table)
    }

    /// Recency order: least recently used first.
    pub(crate) fn recency(&self) -> (Instant, u64) {
        (self.last_access, self.access_seq)
    }
}
