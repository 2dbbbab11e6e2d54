//! CLI error types with exit code handling
//!
//! Library errors are mapped onto a small set of diagnostics, each carrying
//! the process exit code.

use ackrgd_convert::ConvertError;
use ackrgd_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// graphs.yaml could not be loaded or normalized
    #[error("Configuration error: {message}")]
    #[diagnostic(code(ackrgd::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A service failed somewhere in its pipeline
    #[error("{message}")]
    #[diagnostic(code(ackrgd::cli::generate))]
    Generation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The batch deadline expired
    #[error("{message}")]
    #[diagnostic(
        code(ackrgd::cli::timeout),
        help("raise --timeout-minutes or lower the number of services")
    )]
    Timeout { message: String },

    /// IO error, including refused output paths
    #[error("IO error: {message}")]
    #[diagnostic(code(ackrgd::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("Invalid usage: {message}")]
    #[diagnostic(code(ackrgd::cli::usage))]
    Usage { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(ackrgd::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Generation { .. } => exit_codes::GENERATION_ERROR,
            CliError::Timeout { .. } => exit_codes::TIMEOUT_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            missing @ CoreError::MissingField { .. } => Self::config_with_help(
                missing.to_string(),
                "every graphs entry needs `service` and `version`",
            ),
            other => CliError::Config {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<ConvertError> for CliError {
    fn from(err: ConvertError) -> Self {
        let root = match &err {
            ConvertError::Service { source, .. } => source.as_ref(),
            other => other,
        };
        match root {
            ConvertError::Io(_) | ConvertError::PathEscape { .. } => CliError::Io {
                message: err.to_string(),
            },
            ConvertError::Timeout { .. } => CliError::Timeout {
                message: err.to_string(),
            },
            ConvertError::Render { .. } => CliError::Generation {
                message: err.to_string(),
                help: Some("check that --rendered holds a <service>/ directory per graph".to_string()),
            },
            ConvertError::TaskFailed { .. } => CliError::internal(err.to_string()),
            _ => CliError::Generation {
                message: err.to_string(),
                help: None,
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
