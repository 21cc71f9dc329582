use thiserror::Error;

/// The failure taxonomy raised across every RPC boundary in this system.
///
/// Nothing is silently swallowed between a component and the RPC layer
/// that serializes it back to a caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("path already exists: {path}")]
    FileAlreadyExist { path: String },

    #[error("file does not exist: {what}")]
    FileDoesNotExist { what: String },

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error(
        "suspected file size for file {file_id}: already {existing} bytes, got {attempted}"
    )]
    SuspectedFileSize {
        file_id: i32,
        existing: i64,
        attempted: i64,
    },

    #[error("invalid column count {columns} (must be in [1, {max}])")]
    TableColumn { columns: i64, max: u32 },

    #[error("not a raw table: {what}")]
    TableDoesNotExist { what: String },

    #[error("no local worker available{}", host.as_ref().map(|h| format!(" for host {h}")).unwrap_or_default())]
    NoLocalWorker { host: Option<String> },

    #[error("worker cannot admit pinned file {file_id}: out of memory")]
    OutOfMemoryForPinFile { file_id: i32 },

    #[error("checkpoint of file {file_id} to {path} failed: {reason}")]
    FailedToCheckpoint {
        file_id: i32,
        path: String,
        reason: String,
    },

    /// Local filesystem failure outside the named taxonomy above (temp
    /// folder lifecycle, data-folder bookkeeping). Not part of the wire
    /// contract in section 7; worker-internal only.
    #[error("local I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
