//! Error types for graph generation
//!
//! Every fatal condition aborts only the owning service. [`ConvertError::Service`]
//! carries the service name and the [`Stage`] that failed so batch callers can
//! localize the failure.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use ackrgd_core::CoreError;
use thiserror::Error;

/// Pipeline stage of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Render,
    Parse,
    Classify,
    Schema,
    Assemble,
    Write,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Parse => "parse",
            Self::Classify => "classify",
            Self::Schema => "schema",
            Self::Assemble => "assemble",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Converter error
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest ({context}): {source}")]
    ManifestParse {
        context: String,
        #[source]
        source: CoreError,
    },

    #[error("Refusing to write {path} outside the output directory {out_dir}")]
    PathEscape { path: PathBuf, out_dir: PathBuf },

    #[error("Failed to render {service}: {message}")]
    Render { service: String, message: String },

    #[error("Service {service} failed at {stage}: {source}")]
    Service {
        service: String,
        stage: Stage,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("Generation timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Generation task failed: {message}")]
    TaskFailed { message: String },
}

impl ConvertError {
    /// Attach the owning service and stage to an error
    pub fn in_service(self, service: impl Into<String>, stage: Stage) -> Self {
        match self {
            already @ ConvertError::Service { .. } => already,
            other => ConvertError::Service {
                service: service.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage of a service-scoped error
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ConvertError::Service { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Service name of a service-scoped error
    pub fn service(&self) -> Option<&str> {
        match self {
            ConvertError::Service { service, .. } => Some(service),
            ConvertError::Render { service, .. } => Some(service),
            _ => None,
        }
    }
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;
