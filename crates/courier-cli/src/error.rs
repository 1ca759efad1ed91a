//! Error types and handling for the CLI
//!
//! Every failure maps to a distinct process exit code so scripts can
//! branch on the class of problem without parsing messages.

use courier_core::{ApiError, ErrorKind};
use std::io;
use std::path::PathBuf;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error from courier-core (configuration, URLs, catalog lookups)
    #[error("Core error: {0}")]
    Core(#[from] courier_core::Error),

    /// A request failed after the pipeline gave up
    #[error("{0}")]
    Api(#[from] ApiError),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Invalid argument combination
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Core(_) => 2,
            Self::FileNotFound { .. } => 3,
            Self::InvalidArgs(_) => 6,
            Self::Api(e) => api_exit_code(e.kind),
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

fn api_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Construction => 2,
        ErrorKind::MissingCredential | ErrorKind::Unauthorized => 7,
        ErrorKind::Client => 8,
        ErrorKind::RateLimited | ErrorKind::Server => 9,
        ErrorKind::Network => 10,
        ErrorKind::Timeout | ErrorKind::RequestTimeout => 11,
        ErrorKind::Decode => 14,
        ErrorKind::Cancelled => 130,
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let mut message = if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), error)
    } else {
        format!("Error: {}", error)
    };

    if let Error::Api(api) = error {
        if let Some(code) = &api.code {
            message.push_str(&format!("\n  code: {}", code));
        }
        if api.kind == ErrorKind::MissingCredential {
            message.push_str("\n  hint: set COURIER_ACCESS_TOKEN or add auth.access_token to the config file");
        }
    }

    message
}
