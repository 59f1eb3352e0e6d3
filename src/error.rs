use crate::decoder::DecodeError;
use std::path::Path;
use thiserror::Error;

/// Internal error type of the spreadsheet readers.
/// Aggregates errors from the standard library, dependencies, and reader modules,
/// and is folded into a [`DecodeError`] at the decoder boundary.
#[derive(Error, Debug)]
pub(crate) enum SheetError {
    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    ParseDateTimeError(#[from] chrono::ParseError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    CfbError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    RecordError(#[from] crate::helpers::biff8::RecordError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),
}

impl SheetError {
    /// Folds a reader failure on `path` into the public decode taxonomy.
    pub(crate) fn into_decode_error(self, path: &Path) -> DecodeError {
        use crate::spreadsheet::SpreadsheetError;
        match self {
            SheetError::IoError(error) => DecodeError::from_io(path, error),
            SheetError::SpreadsheetError(SpreadsheetError::UnsupportedFormat(name)) => {
                DecodeError::UnsupportedFormat(name)
            }
            SheetError::SpreadsheetError(SpreadsheetError::PasswordProtected(name)) => {
                DecodeError::UnsupportedFormat(format!("'{name}' is password protected"))
            }
            SheetError::SpreadsheetError(SpreadsheetError::SheetNotFound(sheet)) => DecodeError::SheetNotFound {
                path: path.to_path_buf(),
                sheet,
            },
            error => DecodeError::CorruptFile {
                path: path.to_path_buf(),
                message: error.to_string(),
            },
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, DecodeError> {
    /// Prefixes the message of corrupt-file failures with where decoding stopped.
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|error| match error {
            DecodeError::CorruptFile { path, message: cause } => DecodeError::CorruptFile {
                path,
                message: format!("{}: {}", message, cause),
            },
            error => error,
        })
    }
}
