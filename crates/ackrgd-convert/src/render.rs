//! Rendering collaborator seam
//!
//! Chart fetching and template evaluation happen outside this crate. A
//! [`RenderSource`] hands the pipeline what they produced: rendered
//! documents, raw CRDs, the template text they came from and the chart's
//! default values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ackrgd_core::{Node, ServiceConfig};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ConvertError, Result};

/// Rendered output of one service's chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    /// Template path (`templates/deployment.yaml`) to multi-document YAML
    pub rendered: BTreeMap<String, String>,
    /// Raw CRD documents, in file order
    pub crds: Vec<String>,
    /// Template path to unrendered template text, used for condition extraction
    pub template_sources: BTreeMap<String, String>,
    /// Chart `values.yaml`
    pub chart_defaults: Option<Node>,
}

/// Source of rendered charts
pub trait RenderSource: Send + Sync {
    fn render(&self, service: &ServiceConfig) -> Result<RenderOutput>;
}

/// Reads charts pre-rendered to disk
///
/// ```text
/// <root>/<service>/templates/**.yaml   rendered documents
/// <root>/<service>/crds/**.yaml        raw CRDs
/// <root>/<service>/sources/**          template text, same paths as templates/
/// <root>/<service>/values.yaml         chart defaults
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryRenderSource {
    root: PathBuf,
}

impl DirectoryRenderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RenderSource for DirectoryRenderSource {
    fn render(&self, service: &ServiceConfig) -> Result<RenderOutput> {
        let service_dir = self.root.join(&service.service);
        if !service_dir.is_dir() {
            return Err(ConvertError::Render {
                service: service.service.clone(),
                message: format!("no rendered chart at {}", service_dir.display()),
            });
        }

        let rendered = read_tree(&service_dir.join("templates"), "templates", true)?;
        let crds = read_tree(&service_dir.join("crds"), "crds", true)?
            .into_values()
            .collect();
        let template_sources = read_tree(&service_dir.join("sources"), "templates", false)?;

        let values_path = service_dir.join("values.yaml");
        let chart_defaults = if values_path.is_file() {
            let text = fs::read_to_string(&values_path)?;
            Some(Node::from_yaml(&text)?)
        } else {
            None
        };

        debug!(
            service = %service.service,
            rendered = rendered.len(),
            sources = template_sources.len(),
            "read rendered chart"
        );

        Ok(RenderOutput {
            rendered,
            crds,
            template_sources,
            chart_defaults,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Read every file under `dir`, keyed `<prefix>/<relative path>`
///
/// A missing directory yields an empty map.
fn read_tree(dir: &Path, prefix: &str, yaml_only: bool) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || (yaml_only && !is_yaml(path)) {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path);
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(format!("{}/{}", prefix, rel), fs::read_to_string(path)?);
    }
    Ok(files)
}
