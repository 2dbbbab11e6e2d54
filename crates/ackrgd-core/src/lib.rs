//! ackrgd Core - shared types for turning rendered ACK charts into KRO graphs
//!
//! This crate provides the foundational types used throughout ackrgd:
//! - `Node`: Tagged document tree (scalar | sequence | mapping) with explicit traversal
//! - `ServiceConfig`: Per-service configuration loaded from `graphs.yaml`
//! - `ManifestObject`: One parsed manifest document, bucketed by `classify`

pub mod config;
pub mod error;
pub mod manifest;
pub mod tree;

pub use config::{GraphsFile, ServiceConfig};
pub use error::{CoreError, Result};
pub use manifest::{ClassificationGroups, ManifestGroup, ManifestObject, classify, split_documents};
pub use tree::{Node, Scalar};
