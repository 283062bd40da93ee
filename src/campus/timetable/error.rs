use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, TimetableError>;

/// Error type covering the different failure cases that can occur while a
/// timetable is read, extracted, reconciled, or written back.
#[derive(Debug, Error)]
pub enum TimetableError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON serialization fails or when ad-hoc JSON input is invalid.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the course configuration file cannot be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Raised when the temporary store file cannot be moved over the original.
    #[error("failed to replace store file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Raised when a workbook does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when no row of the grid carries the weekday header.
    #[error("no weekday header row found in the timetable grid")]
    MissingHeader,

    /// Raised when the user provides a grid path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the canonical store file does not exist.
    #[error("canonical store not found: {0}")]
    MissingStore(PathBuf),

    /// Raised when the canonical store exists but is not a valid record array.
    #[error("malformed canonical store {path}: {source}")]
    MalformedStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Raised when a configuration file names a course that has no scope.
    #[error("unknown course code '{0}' in configuration")]
    UnknownCourse(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
