use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool reads billing extracts, extracts subtotals, or assembles the output
/// workbook.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when a JSON configuration or report fails to (de)serialise.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when an input cannot be parsed as a spreadsheet container.
    #[error("cannot read spreadsheet: {reason}")]
    SourceUnreadable { reason: String },

    /// Raised when required canonical columns cannot be matched to any raw
    /// header. `headers` holds a sample of the headers that were present.
    #[error("missing required columns {missing:?} (headers present: {headers:?})")]
    MissingRequiredFields {
        missing: Vec<String>,
        headers: Vec<String>,
    },

    /// Raised when no free disambiguation suffix is left for a sheet name.
    #[error("no free sheet name left for '{0}'")]
    SheetNameCollisionExhausted(String),

    /// Raised when at least one file of a batch failed. Every file has been
    /// attempted before this is reported.
    #[error("{} of the input files failed:\n{}", .0.len(), FileErrorList(.0))]
    BatchFailed(Vec<FileError>),

    /// Raised when a batch is started without any input file.
    #[error("no input files supplied")]
    NoInputs,

    /// Raised when the pipeline configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the output layout cannot be represented in a worksheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// A failure attached to the input file that caused it.
#[derive(Debug, Error)]
#[error("[{file}] {error}")]
pub struct FileError {
    pub file: String,
    #[source]
    pub error: ToolError,
}

impl FileError {
    pub fn new(file: impl Into<String>, error: ToolError) -> Self {
        Self {
            file: file.into(),
            error,
        }
    }
}

struct FileErrorList<'a>(&'a [FileError]);

impl fmt::Display for FileErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "- {error}")?;
        }
        Ok(())
    }
}
