//! Reader for legacy Excel 97-2003 and Excel 5/95 `.xls` (BIFF8 and BIFF5/7) workbooks.
//!
//! The workbook stream is framed into logical records, decoded into typed records and fed
//! through a BOF/EOF handler stack that fills a [`swinder_model::Workbook`]: sheets, cell values,
//! formula text, interned formats, notes, hyperlinks and chart objects. Malformed records and
//! unresolvable lookups never abort a load; they are reported as [`ImportWarning`]s.
//!
//! RC4 encrypted workbooks (legacy and CryptoAPI) are decrypted with the caller's password, or
//! with Excel's built-in default password when none is given.

use std::io;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use swinder_model::Workbook;
use thiserror::Error;
use zeroize::Zeroizing;

mod biff;
mod chart;
mod ct;
mod globals;
mod reader;
mod warnings;
mod worksheet;

pub use biff::encryption::DEFAULT_PASSWORD;
pub use biff::{decode_rk, BiffVersion, DecryptError, FramingError, RkValue, StringError, Truncated};
pub use warnings::DEFAULT_MAX_WARNINGS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    pub message: String,
}

impl ImportWarning {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read `.xls`: {0}")]
    Io(#[from] io::Error),
    #[error("not an OLE2 compound file: {0}")]
    Cfb(io::Error),
    #[error("compound file has no `Workbook` or `Book` stream")]
    MissingWorkbookStream,
    #[error("workbook stream does not start with a BIFF BOF record")]
    NotBiff,
    #[error("load cancelled")]
    Cancelled,
}

/// Encryption state of a loaded workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionStatus {
    /// The stream carried a FILEPASS record.
    pub password_protected: bool,
    /// The encryption scheme is one this reader can decrypt.
    pub encryption_type_supported: bool,
}

impl Default for EncryptionStatus {
    fn default() -> Self {
        Self {
            password_protected: false,
            encryption_type_supported: true,
        }
    }
}

/// Options for a single load.
#[derive(Clone)]
pub struct LoadOptions {
    password: Option<Zeroizing<String>>,
    cancel: Option<Arc<AtomicBool>>,
    max_warnings: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            password: None,
            cancel: None,
            max_warnings: DEFAULT_MAX_WARNINGS,
        }
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cancel", &self.cancel.is_some())
            .field("max_warnings", &self.max_warnings)
            .finish()
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Password for RC4 encrypted workbooks. Defaults to [`DEFAULT_PASSWORD`].
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Flag checked before every record; setting it aborts the load with
    /// [`LoadError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Cap on collected warnings; later warnings are only logged.
    pub fn with_max_warnings(mut self, max_warnings: usize) -> Self {
        self.max_warnings = max_warnings;
        self
    }
}

#[derive(Debug)]
pub struct LoadResult {
    pub workbook: Workbook,
    pub warnings: Vec<ImportWarning>,
    pub encryption: EncryptionStatus,
    pub biff_version: BiffVersion,
}

/// Load a `.xls` workbook from disk.
pub fn load_xls_path(path: impl AsRef<Path>, options: &LoadOptions) -> Result<LoadResult, LoadError> {
    let bytes = std::fs::read(path.as_ref())?;
    load_xls_bytes(&bytes, options)
}

/// Load a `.xls` workbook from memory: either an OLE2 compound file or a bare BIFF stream.
pub fn load_xls_bytes(bytes: &[u8], options: &LoadOptions) -> Result<LoadResult, LoadError> {
    if biff::is_compound_file(bytes) {
        let stream = biff::read_workbook_stream_from_bytes(bytes)?;
        parse_workbook_stream(&stream, options)
    } else {
        parse_workbook_stream(bytes, options)
    }
}

/// Parse the contents of a `Workbook`/`Book` stream.
pub fn parse_workbook_stream(stream: &[u8], options: &LoadOptions) -> Result<LoadResult, LoadError> {
    let version = biff::detect_biff_version(stream).ok_or(LoadError::NotBiff)?;
    log::debug!("parsing {version:?} workbook stream ({} bytes)", stream.len());
    reader::WorkbookReader::new(stream, version, options).run()
}
