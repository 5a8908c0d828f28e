use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CivicError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("A worker with phone number {0} already exists.")]
    DuplicatePhone(String),

    #[error("Worker {worker} is already assigned to issue {issue}.")]
    AlreadyAssigned { issue: String, worker: String },

    #[error(
        "Worker {worker} is occupied ({active} active issues) and cannot be assigned more issues until some are resolved."
    )]
    WorkerOccupied { worker: String, active: usize },

    #[error("Failed to read {path}: {source}")]
    RemoteRead {
        path: String,
        #[source]
        source: Box<CivicError>,
    },

    #[error("Failed to write {path}: {source}")]
    RemoteWrite {
        path: String,
        #[source]
        source: Box<CivicError>,
    },

    #[error("Failed to create worker: {0}")]
    WorkerCreation(#[source] Box<CivicError>),

    #[error("Subscription to {0} was closed by the server")]
    SubscriptionClosed(String),

    #[error("Failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to encode config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error(
        "No database URL found. Set CIVIC_DATABASE_URL env var or add database_url to ~/.config/civic/config.toml"
    )]
    MissingDatabaseUrl,

    #[error(
        "No API key found. Set CIVIC_API_KEY env var or add api_key to ~/.config/civic/config.toml"
    )]
    MissingApiKey,

    #[error("Not signed in. Run 'civic login' first")]
    NotSignedIn,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),
}

/// Coarse classification used when reporting failures to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Duplicate,
    Capacity,
    Remote,
    Other,
}

impl CivicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CivicError::Validation { .. } => ErrorKind::Validation,
            CivicError::DuplicatePhone(_) | CivicError::AlreadyAssigned { .. } => {
                ErrorKind::Duplicate
            }
            CivicError::WorkerOccupied { .. } => ErrorKind::Capacity,
            CivicError::Http(_)
            | CivicError::Api { .. }
            | CivicError::RemoteRead { .. }
            | CivicError::RemoteWrite { .. }
            | CivicError::SubscriptionClosed(_) => ErrorKind::Remote,
            CivicError::WorkerCreation(inner) => inner.kind(),
            _ => ErrorKind::Other,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CivicError::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn read(path: &str, source: CivicError) -> Self {
        CivicError::RemoteRead {
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn write(path: &str, source: CivicError) -> Self {
        CivicError::RemoteWrite {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, CivicError>;
