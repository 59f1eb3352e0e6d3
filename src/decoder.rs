//! The decoding seam between the cache and spreadsheet file formats.

use crate::grid::RawGrid;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

/// Failures reported by a [`TableDecoder`].
#[derive(Error, Clone, Debug, PartialEq)]
pub enum DecodeError {
    #[error("File not found: '{0}'")]
    FileNotFound(PathBuf),

    #[error("Unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt spreadsheet '{path}': {message}")]
    CorruptFile { path: PathBuf, message: String },

    #[error("Sheet '{sheet}' not found in '{path}'")]
    SheetNotFound { path: PathBuf, sheet: String },
}

impl DecodeError {
    /// Maps an I/O failure on `path` to the closest decode failure.
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::NotFound => DecodeError::FileNotFound(path.to_path_buf()),
            _ => DecodeError::CorruptFile {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        }
    }
}

/// Cheap file-identity probe: size plus modification time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FileIdentity {
    pub size: u64,
    pub modified_at: SystemTime,
}

impl FileIdentity {
    /// Reads size and mtime from file metadata without opening the file.
    pub fn probe(path: &Path) -> Result<FileIdentity, DecodeError> {
        let metadata = fs::metadata(path).map_err(|error| DecodeError::from_io(path, error))?;
        if !metadata.is_file() {
            Err(DecodeError::FileNotFound(path.to_path_buf()))?
        }
        let modified_at = metadata
            .modified()
            .map_err(|error| DecodeError::from_io(path, error))?;
        Ok(FileIdentity {
            size: metadata.len(),
            modified_at,
        })
    }
}

/// Turns a spreadsheet file into raw cell grids.
///
/// Implementations must be shareable across threads: the cache calls
/// `decode` from whichever caller misses first.
pub trait TableDecoder: Send + Sync {
    /// Decodes one sheet into a grid.
    fn decode(&self, path: &Path, sheet_name: &str) -> Result<RawGrid, DecodeError>;

    /// Sheet names in workbook order.
    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, DecodeError>;

    /// Identity probe that must not require a full decode.
    fn identity(&self, path: &Path) -> Result<FileIdentity, DecodeError> {
        FileIdentity::probe(path)
    }
}
