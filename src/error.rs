//! Error types for the folder_tree crate.

use std::fmt;

use thiserror::Error;

/// Adapter call that was in progress when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetFolder,
    ListFolders,
    ListProjects,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::GetFolder => "get folder",
            Operation::ListFolders => "list child folders",
            Operation::ListProjects => "list child projects",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`HierarchyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Transient,
    MalformedResponse,
    Cancelled,
    Other,
}

/// Errors that can occur while walking the folder hierarchy.
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Folder not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Transient API failure ({status}): {message}")]
    Transient { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to {operation} for folders/{folder_id}: {source}")]
    Folder {
        folder_id: String,
        operation: Operation,
        #[source]
        source: Box<HierarchyError>,
    },

    #[error("Traversal cancelled")]
    Cancelled,

    #[error("Traversal task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Invalid folder ID: {0}")]
    InvalidFolderId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read credentials file: {0}")]
    CredentialsFileError(#[from] std::io::Error),

    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParseError(#[from] serde_json::Error),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),
}

impl HierarchyError {
    /// Classify the error, looking through folder context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HierarchyError::NotFound(_) => ErrorKind::NotFound,
            HierarchyError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            HierarchyError::Transient { .. } => ErrorKind::Transient,
            HierarchyError::HttpError(e) if e.is_timeout() || e.is_connect() => {
                ErrorKind::Transient
            }
            HierarchyError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            HierarchyError::Cancelled => ErrorKind::Cancelled,
            HierarchyError::Folder { source, .. } => source.kind(),
            _ => ErrorKind::Other,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// The folder whose adapter call failed, if known.
    pub fn failing_folder(&self) -> Option<&str> {
        match self {
            HierarchyError::Folder { folder_id, .. } => Some(folder_id),
            _ => None,
        }
    }

    /// The adapter call that failed, if known.
    pub fn failing_operation(&self) -> Option<Operation> {
        match self {
            HierarchyError::Folder { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    pub(crate) fn in_folder(self, folder_id: &str, operation: Operation) -> Self {
        match self {
            err @ (HierarchyError::Folder { .. } | HierarchyError::Cancelled) => err,
            err => HierarchyError::Folder {
                folder_id: folder_id.to_string(),
                operation,
                source: Box::new(err),
            },
        }
    }
}

/// Result type alias for HierarchyError.
pub type Result<T> = std::result::Result<T, HierarchyError>;
