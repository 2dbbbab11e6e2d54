//! Per-service generation pipeline
//!
//! render → sentinel phase 1 → parse → classify → schema → assemble → write.
//! Each call builds its own sentinel map, groups and schema tree; nothing is
//! shared between services.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use ackrgd_core::{ManifestObject, ServiceConfig, classify, split_documents};
use tracing::{debug, info};

use crate::conditions::{Condition, extract_conditions};
use crate::error::{ConvertError, Result, Stage};
use crate::output::OutputLayout;
use crate::placeholders::SentinelMap;
use crate::render::{RenderOutput, RenderSource};
use crate::resolver::resolve_controller_values;
use crate::rgd::{
    ResourceGraphDefinition, controller_graph, controller_resources, crd_graph, crd_resources,
};

/// Deadline shared by a whole batch
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Options for a generation run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Output directory; graphs land in `<out_dir>/ack/`
    pub out_dir: PathBuf,
    /// Also write `<service>-defaults.yaml` with references resolved
    pub defaults_example: bool,
    /// Maximum services generated at once
    pub concurrency: usize,
    /// Deadline for the whole batch
    pub timeout: Duration,
}

impl GenerateOptions {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ..Default::default()
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            defaults_example: false,
            concurrency: default_concurrency(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// `max(2, available parallelism)`
pub fn default_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(2)
}

/// Summary numbers for one service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphCounts {
    pub crds: usize,
    /// Controller graph resources, including the leading CRD graph instance
    pub controller_resources: usize,
    /// Controller resources with at least one `includeWhen` gate
    pub gated: usize,
    pub conditions: usize,
    /// Controller values that differ from their defaults
    pub overrides: usize,
}

/// Both graphs of one service, before writing
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceGraphs {
    pub crd_graph: ResourceGraphDefinition,
    pub controller_graph: ResourceGraphDefinition,
    pub counts: GraphCounts,
}

/// Files written for one service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOutput {
    pub service: String,
    pub crd_graph: PathBuf,
    pub controller_graph: PathBuf,
    pub defaults_example: Option<PathBuf>,
    pub counts: GraphCounts,
}

fn parse_documents(
    path: &str,
    text: &str,
    sentinels: &SentinelMap,
    origin: Option<&str>,
) -> Result<Vec<ManifestObject>> {
    split_documents(&sentinels.apply(text))
        .iter()
        .enumerate()
        .map(|(index, doc)| {
            let object =
                ManifestObject::parse(doc).map_err(|source| ConvertError::ManifestParse {
                    context: format!("{} document {}", path, index + 1),
                    source,
                })?;
            Ok(match origin {
                Some(origin) => object.with_source(origin),
                None => object,
            })
        })
        .collect()
}

fn count_overrides(node: &ackrgd_core::Node) -> usize {
    match node.as_mapping() {
        Some(map) => map.values().map(count_overrides).sum(),
        None => 1,
    }
}

/// Build both graphs from a service's render output
///
/// Pure: no filesystem access. Errors carry the service and stage.
pub fn build_graphs(config: &ServiceConfig, output: &RenderOutput) -> Result<ServiceGraphs> {
    let service = config.service.as_str();
    let sentinels = SentinelMap::for_service(config);
    debug!(service, count = sentinels.len(), "built sentinel map");

    let mut objects = Vec::new();
    for (path, text) in &output.rendered {
        let docs = parse_documents(path, text, &sentinels, Some(path))
            .map_err(|e| e.in_service(service, Stage::Parse))?;
        objects.extend(docs);
    }
    for (index, text) in output.crds.iter().enumerate() {
        let docs = parse_documents(&format!("crds[{}]", index), text, &sentinels, None)
            .map_err(|e| e.in_service(service, Stage::Parse))?;
        objects.extend(docs);
    }

    let groups = classify(objects);
    debug!(
        service,
        stage = %Stage::Classify,
        crds = groups.crds.len(),
        core = groups.core.len(),
        rbac = groups.rbac.len(),
        deployments = groups.deployments.len(),
        others = groups.others.len(),
        "classified manifests"
    );

    let conditions: Vec<Condition> = output
        .template_sources
        .iter()
        .flat_map(|(path, text)| extract_conditions(path, text))
        .collect();

    let crd_kinds = groups.crd_kinds();
    let values = resolve_controller_values(config, output.chart_defaults.as_ref(), &crd_kinds);
    debug!(
        service,
        stage = %Stage::Schema,
        count = conditions.len(),
        overrides = values.has_overrides(),
        "resolved schema values"
    );

    let assemble = || -> Result<ServiceGraphs> {
        let crd_resources = crd_resources(&groups.crds)?;
        let ctrl_resources = controller_resources(config, &groups, &conditions)?;
        let counts = GraphCounts {
            crds: crd_resources.len(),
            controller_resources: ctrl_resources.len(),
            gated: ctrl_resources
                .iter()
                .filter(|r| !r.include_when.is_empty())
                .count(),
            conditions: conditions.len(),
            overrides: if values.has_overrides() {
                count_overrides(&values.overrides)
            } else {
                0
            },
        };
        Ok(ServiceGraphs {
            crd_graph: crd_graph(config, crd_resources, &crd_kinds),
            controller_graph: controller_graph(config, ctrl_resources, values.values()),
            counts,
        })
    };
    assemble().map_err(|e| e.in_service(service, Stage::Assemble))
}

/// Render, build and write one service's graphs
pub fn generate_service(
    config: &ServiceConfig,
    source: &dyn RenderSource,
    options: &GenerateOptions,
) -> Result<ServiceOutput> {
    let service = config.service.as_str();
    info!(service, stage = %Stage::Render, "rendering chart");
    let output = source
        .render(config)
        .map_err(|e| e.in_service(service, Stage::Render))?;

    let graphs = build_graphs(config, &output)?;

    let emit = |graph: &ResourceGraphDefinition, resolved: bool| {
        let yaml = if resolved {
            graph.to_defaults_yaml()
        } else {
            graph.to_yaml()
        };
        yaml.map_err(|e| e.in_service(service, Stage::Assemble))
    };
    let crd_yaml = emit(&graphs.crd_graph, false)?;
    let ctrl_yaml = emit(&graphs.controller_graph, false)?;
    let defaults_yaml = if options.defaults_example {
        Some(emit(&graphs.controller_graph, true)?)
    } else {
        None
    };

    let write = || -> Result<ServiceOutput> {
        let layout = OutputLayout::new(&options.out_dir)?;
        let name = config.service_lower();

        let crd_graph = layout.write(&layout.crd_graph_path(&name), &crd_yaml)?;
        let controller_graph = layout.write(&layout.controller_graph_path(&name), &ctrl_yaml)?;
        let defaults_example = match &defaults_yaml {
            Some(yaml) => Some(layout.write(&layout.defaults_path(&name), yaml)?),
            None => None,
        };

        Ok(ServiceOutput {
            service: service.to_string(),
            crd_graph,
            controller_graph,
            defaults_example,
            counts: graphs.counts,
        })
    };
    let written = write().map_err(|e| e.in_service(service, Stage::Write))?;

    info!(
        service,
        stage = %Stage::Write,
        path = %written.controller_graph.display(),
        count = written.counts.controller_resources,
        "wrote graphs"
    );
    Ok(written)
}
