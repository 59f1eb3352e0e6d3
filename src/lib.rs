//! # Rusty Sheet Cache
//!
//! A bounded, thread-safe cache of parsed spreadsheet tables with heuristic
//! header detection, for query layers that read the same Excel and
//! OpenDocument files over and over.
//!
//! ## Features
//!
//! - **Multi-format support**: Read Excel Open XML files (`.xlsx`, `.xlsm`, `.xlam`),
//!   legacy Excel 97-2003 files (`.xls`) and OpenDocument spreadsheet files (`.ods`)
//! - **Header detection**: Score the first rows of a sheet and pick the header row,
//!   including multi-level and merged headers, with a confidence in `[0, 1]`
//! - **Typed columns**: Every column reports the most specific type shared by its values
//! - **Shared tables**: Tables are immutable and handed out as `Arc`s, so readers never
//!   lock and an evicted table stays readable for whoever still holds it
//! - **Bounded memory**: Idle timeout, LRU eviction under a memory budget and an
//!   optional entry limit
//! - **Single flight**: Concurrent requests for the same table decode the file once
//! - **Change aware**: File size and modification time are part of every cache key
//!
//! ## Example
//!
//! ```no_run
//! use rusty_sheet_cache::{CacheConfig, SpreadsheetDecoder, TableCache};
//!
//! let cache = TableCache::new(CacheConfig::from_env(), SpreadsheetDecoder::new());
//! let table = cache.get("sales.xlsx", "Q1", None)?;
//! println!("{:?} ({} rows)", table.column_names(), table.row_count());
//! # Ok::<(), rusty_sheet_cache::CacheError>(())
//! ```
mod cache;
mod decoder;
mod detector;
mod error;
mod grid;
mod helpers;
mod spreadsheet;
mod table;

pub use crate::cache::clock::Clock;
pub use crate::cache::clock::ManualClock;
pub use crate::cache::clock::SystemClock;
pub use crate::cache::config::CacheConfig;
pub use crate::cache::entry::CacheKey;
pub use crate::cache::reaper::Reaper;
pub use crate::cache::CacheError;
pub use crate::cache::CacheStats;
pub use crate::cache::FileInfo;
pub use crate::cache::TableCache;
pub use crate::decoder::DecodeError;
pub use crate::decoder::FileIdentity;
pub use crate::decoder::TableDecoder;
pub use crate::detector::config::DetectorConfig;
pub use crate::detector::config::SignalWeights;
pub use crate::detector::Candidate;
pub use crate::detector::DetectError;
pub use crate::detector::HeaderDecision;
pub use crate::detector::HeaderDetector;
pub use crate::detector::HeaderShape;
pub use crate::grid::CellValue;
pub use crate::grid::RawGrid;
pub use crate::spreadsheet::SpreadsheetDecoder;
pub use crate::table::column::Column;
pub use crate::table::column::ColumnKind;
pub use crate::table::Provenance;
pub use crate::table::Table;
pub use crate::table::TableError;
