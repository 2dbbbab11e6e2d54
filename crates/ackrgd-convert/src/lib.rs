//! ackrgd Convert - rendered ACK chart to KRO ResourceGraphDefinition converter
//!
//! Each service yields two graphs: a CRD graph (`ack-<service>-crds.kro.run`)
//! and a controller graph (`ack-<service>-ctrl.kro.run`). Concrete values in
//! the rendered chart are turned back into `${schema.spec...}` references, and
//! the chart's `{{ if }}` blocks become CEL `includeWhen` gates:
//!
//! | Rendered / template                   | Graph                                          |
//! |---------------------------------------|------------------------------------------------|
//! | `namespace: ack-system`               | `namespace: ${schema.spec.namespace}`          |
//! | `image: .../s3-controller:1.2.3`      | `image: ${...image.repository}:${...image.tag}`|
//! | `{{ if .Values.serviceAccount.create }}` | `includeWhen: [${schema.spec.values.serviceAccount.create}]` |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ackrgd_core::GraphsFile;
//! use ackrgd_convert::{DirectoryRenderSource, GenerateOptions, generate_all};
//!
//! # async fn run() -> ackrgd_convert::Result<()> {
//! let graphs = GraphsFile::load("graphs.yaml")?;
//! let source = Arc::new(DirectoryRenderSource::new("rendered"));
//! let outputs = generate_all(graphs.graphs, source, GenerateOptions::new("out")).await?;
//!
//! for output in &outputs {
//!     println!("{} -> {}", output.service, output.controller_graph.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod conditions;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod placeholders;
pub mod render;
pub mod resolver;
pub mod rgd;
pub mod schema;

pub use batch::generate_all;
pub use conditions::{Condition, extract_conditions, simplify, to_cel};
pub use error::{ConvertError, Result, Stage};
pub use output::OutputLayout;
pub use pipeline::{
    GenerateOptions, GraphCounts, ServiceGraphs, ServiceOutput, build_graphs, generate_service,
};
pub use placeholders::{MaterializedDefaults, SentinelMap};
pub use render::{DirectoryRenderSource, RenderOutput, RenderSource};
pub use resolver::{ControllerValues, resolve_controller_values};
pub use rgd::{Resource, ResourceGraphDefinition, make_id};
pub use schema::{SchemaDefault, SchemaType};
