//! ResourceGraphDefinition assembly
//!
//! Two graphs are emitted per service:
//!
//! - `ack-<service>-crds.kro.run`: one resource per CRD, gated on the
//!   resource kind being listed in `reconcile.resources`
//! - `ack-<service>-ctrl.kro.run`: a leading instance of the CRD graph,
//!   followed by core, RBAC, deployment and remaining controller objects

use std::collections::HashSet;

use ackrgd_core::{ClassificationGroups, ManifestObject, Node, ServiceConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::conditions::{Condition, gates_for};
use crate::error::{ConvertError, Result};
use crate::placeholders::{MaterializedDefaults, replace_yaml_scalars};
use crate::schema::SchemaDefault;

pub const KRO_API_VERSION: &str = "kro.run/v1alpha1";
pub const RGD_KIND: &str = "ResourceGraphDefinition";
pub const SCHEMA_API_VERSION: &str = "v1alpha1";
pub const KRO_NAMESPACE: &str = "kro";

/// API group suffix shared by ACK service CRDs
pub const ACK_GROUP_SUFFIX: &str = ".services.k8s.aws";
/// Shared ACK group (adopted resources, field exports); never gated
pub const ACK_SHARED_GROUP: &str = "services.k8s.aws";

const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
const MANAGED_BY_VALUE: &str = "Kro";

static NON_ID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]").expect("valid regex"));

/// A ResourceGraphDefinition document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraphDefinition {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: GraphSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSpec {
    pub schema: Schema,
    pub resources: Vec<Resource>,
}

/// Input schema of a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub api_version: String,
    pub kind: String,
    /// `name`, `namespace` and optional `values`, as schema default leaves
    pub spec: Node,
}

/// One templated resource of a graph
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_when: Vec<String>,
    pub template: Node,
}

impl ResourceGraphDefinition {
    fn new(name: String, schema: Schema, resources: Vec<Resource>) -> Self {
        Self {
            api_version: KRO_API_VERSION.to_string(),
            kind: RGD_KIND.to_string(),
            metadata: Metadata {
                name,
                namespace: KRO_NAMESPACE.to_string(),
            },
            spec: GraphSpec { schema, resources },
        }
    }

    /// Resource ids in order
    pub fn resource_ids(&self) -> Vec<&str> {
        self.spec.resources.iter().map(|r| r.id.as_str()).collect()
    }

    /// Emit as YAML with sentinel tokens turned into schema references
    pub fn to_yaml(&self) -> Result<String> {
        let raw = serde_yaml::to_string(self)?;
        Ok(replace_yaml_scalars(&raw, None)?)
    }

    /// Emit as YAML with schema references resolved to their defaults
    pub fn to_defaults_yaml(&self) -> Result<String> {
        let defaults = MaterializedDefaults::from_schema_spec(&self.spec.schema.spec);
        let raw = serde_yaml::to_string(self)?;
        Ok(replace_yaml_scalars(&raw, Some(&defaults))?)
    }
}

/// Lower-case an identifier and replace anything outside `[a-z0-9-]`
pub fn make_id(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let id = NON_ID_CHARS.replace_all(&lower, "-");
    let id = id.trim_matches('-');
    if id.is_empty() {
        "res".to_string()
    } else {
        id.to_string()
    }
}

/// Hands out unique resource ids within one graph
///
/// A taken id gets the first free numeric suffix, starting at `-2`.
#[derive(Debug, Default)]
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| self.taken.insert(candidate.clone()))
            .unwrap_or_else(|| base.to_string())
    }
}

fn parse_template(object: &ManifestObject) -> Result<Node> {
    object.template().map_err(|source| ConvertError::ManifestParse {
        context: format!("{} {}", object.kind, object.name),
        source,
    })
}

/// Kind gated by a CRD, when the CRD belongs to a service API group
pub fn crd_gate_kind(template: &Node) -> Option<&str> {
    let group = template.str_at("spec.group")?;
    if group == ACK_SHARED_GROUP || !group.ends_with(ACK_GROUP_SUFFIX) {
        return None;
    }
    template.str_at("spec.names.kind").filter(|k| !k.is_empty())
}

/// `includeWhen` expression requiring `kind` in the reconcile resource list
pub fn reconcile_gate(kind: &str) -> String {
    format!(
        "${{\"{}\" in schema.spec.values.reconcile.resources}}",
        kind
    )
}

/// One resource per CRD, ids from the plural name before the first dot
pub fn crd_resources(crds: &[ManifestObject]) -> Result<Vec<Resource>> {
    let mut ids = IdAllocator::new();
    crds.iter()
        .map(|crd| {
            let template = parse_template(crd)?;
            let base = crd.name.split('.').next().unwrap_or_default();
            let id = ids.allocate(&format!("graph-{}", make_id(base)));
            let include_when = crd_gate_kind(&template)
                .map(|kind| vec![reconcile_gate(kind)])
                .unwrap_or_default();
            Ok(Resource {
                id,
                include_when,
                template,
            })
        })
        .collect()
}

/// Strip generated metadata and hand ownership labels to kro
pub fn normalize_template(template: &mut Node) {
    template.walk_mappings_mut(&mut |map| {
        if let Some(metadata) = map.get_mut("metadata").and_then(Node::as_mapping_mut) {
            metadata.shift_remove("creationTimestamp");
        }
        if let Some(labels) = map.get_mut("labels").and_then(Node::as_mapping_mut) {
            if let Some(value) = labels.get_mut(MANAGED_BY_LABEL) {
                *value = Node::from(MANAGED_BY_VALUE);
            }
        }
    });
}

/// Id of the controller graph's leading CRD graph instance
pub fn crd_graph_resource_id(config: &ServiceConfig) -> String {
    format!("graph-{}-crds", config.service_lower())
}

fn crd_graph_instance(config: &ServiceConfig) -> Resource {
    let name = "${schema.spec.name}-crd-graph";

    let mut template = Node::mapping();
    template.insert("apiVersion", Node::from(KRO_API_VERSION));
    template.insert("kind", Node::from(crd_graph_kind(config)));
    template.set_dotted("metadata.name", Node::from(name));
    template.set_dotted("spec.name", Node::from(name));
    template.set_dotted("spec.namespace", Node::from("${schema.spec.namespace}"));
    template.set_dotted(
        "spec.values.reconcile.resources",
        Node::from("${schema.spec.values.reconcile.resources}"),
    );

    Resource {
        id: crd_graph_resource_id(config),
        include_when: Vec::new(),
        template,
    }
}

/// Controller resources in graph order, led by the CRD graph instance
///
/// Each object is gated by the conditions extracted from the template it
/// was rendered from.
pub fn controller_resources(
    config: &ServiceConfig,
    groups: &ClassificationGroups,
    conditions: &[Condition],
) -> Result<Vec<Resource>> {
    let leading = crd_graph_instance(config);
    let mut ids = IdAllocator::new();
    ids.allocate(&leading.id);

    let mut resources = vec![leading];
    for object in groups.controller_objects() {
        let mut template = parse_template(object)?;
        normalize_template(&mut template);
        let id = ids.allocate(&format!("graph-{}", make_id(&object.kind)));
        resources.push(Resource {
            id,
            include_when: gates_for(conditions, object.source.as_deref(), &object.kind),
            template,
        });
    }
    Ok(resources)
}

/// Schema `spec` with `name`, `namespace` and optional `values`
pub fn schema_spec(config: &ServiceConfig, values: Option<Node>) -> Node {
    let mut spec = Node::mapping();
    spec.insert(
        "name",
        SchemaDefault::string(&config.release_name(), &config.controller_name()).to_node(),
    );
    spec.insert(
        "namespace",
        SchemaDefault::string(&config.namespace(), ackrgd_core::config::DEFAULT_NAMESPACE).to_node(),
    );
    if let Some(values) = values.filter(|v| !v.is_empty()) {
        spec.insert("values", values);
    }
    spec
}

/// Schema kind of the CRD graph (`S3crdgraph`)
pub fn crd_graph_kind(config: &ServiceConfig) -> String {
    format!("{}crdgraph", config.service_upper())
}

/// Schema kind of the controller graph (`S3controller`)
pub fn controller_graph_kind(config: &ServiceConfig) -> String {
    format!("{}controller", config.service_upper())
}

/// Assemble the CRD graph
pub fn crd_graph(
    config: &ServiceConfig,
    resources: Vec<Resource>,
    crd_kinds: &[String],
) -> ResourceGraphDefinition {
    let mut values = Node::mapping();
    values.set_dotted(
        "reconcile.resources",
        SchemaDefault::string_array(crd_kinds).to_node(),
    );

    let schema = Schema {
        api_version: SCHEMA_API_VERSION.to_string(),
        kind: crd_graph_kind(config),
        spec: schema_spec(config, Some(values)),
    };
    ResourceGraphDefinition::new(
        format!("ack-{}-crds.kro.run", config.service_lower()),
        schema,
        resources,
    )
}

/// Assemble the controller graph
pub fn controller_graph(
    config: &ServiceConfig,
    resources: Vec<Resource>,
    values: Node,
) -> ResourceGraphDefinition {
    let schema = Schema {
        api_version: SCHEMA_API_VERSION.to_string(),
        kind: controller_graph_kind(config),
        spec: schema_spec(config, Some(values)),
    };
    ResourceGraphDefinition::new(
        format!("ack-{}-ctrl.kro.run", config.service_lower()),
        schema,
        resources,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ackrgd_core::classify;
    use crate::conditions::extract_conditions;

    fn s3() -> ServiceConfig {
        ServiceConfig::new("s3", "1.2.3").unwrap()
    }

    fn object(doc: &str) -> ManifestObject {
        ManifestObject::parse(doc).unwrap()
    }

    const BUCKET_CRD: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: buckets.s3.services.k8s.aws
  creationTimestamp: null
spec:
  group: s3.services.k8s.aws
  names:
    kind: Bucket
"#;

    const ADOPTED_CRD: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: adoptedresources.services.k8s.aws
spec:
  group: services.k8s.aws
  names:
    kind: AdoptedResource
"#;

    #[test]
    fn test_make_id() {
        assert_eq!(make_id("Buckets"), "buckets");
        assert_eq!(make_id("Cluster Role_Binding"), "cluster-role-binding");
        assert_eq!(make_id("--x--"), "x");
        assert_eq!(make_id("***"), "res");
        assert_eq!(make_id(""), "res");
    }

    #[test]
    fn test_id_allocator_suffixes() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate("graph-role"), "graph-role");
        assert_eq!(ids.allocate("graph-role"), "graph-role-2");
        assert_eq!(ids.allocate("graph-role-3"), "graph-role-3");
        assert_eq!(ids.allocate("graph-role"), "graph-role-4");
    }

    #[test]
    fn test_crd_resources_ids_and_gates() {
        let resources = crd_resources(&[object(BUCKET_CRD), object(ADOPTED_CRD)]).unwrap();
        assert_eq!(resources[0].id, "graph-buckets");
        assert_eq!(
            resources[0].include_when,
            [r#"${"Bucket" in schema.spec.values.reconcile.resources}"#]
        );
        assert_eq!(resources[1].id, "graph-adoptedresources");
        assert!(resources[1].include_when.is_empty());
    }

    #[test]
    fn test_normalize_template() {
        let mut template = Node::from_yaml(
            r#"
metadata:
  name: x
  creationTimestamp: null
  labels:
    app.kubernetes.io/managed-by: Helm
spec:
  template:
    metadata:
      creationTimestamp: null
      labels:
        app: x
"#,
        )
        .unwrap();
        normalize_template(&mut template);

        assert!(template.get_dotted("metadata.creationTimestamp").is_none());
        assert!(template.get_dotted("spec.template.metadata.creationTimestamp").is_none());
        assert_eq!(
            template.get_dotted("metadata.labels").and_then(|l| l.get(MANAGED_BY_LABEL)),
            Some(&Node::from("Kro"))
        );
        // Absent labels are not added
        assert!(template
            .get_dotted("spec.template.metadata.labels")
            .and_then(|l| l.get(MANAGED_BY_LABEL))
            .is_none());
    }

    #[test]
    fn test_controller_resources_order_and_ids() {
        let sa = "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: ack-s3-controller\n";
        let role_a = "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: a\n";
        let role_b = "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: b\n";
        let deployment = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: d\n";

        let groups = classify(
            [deployment, role_b, sa, role_a]
                .into_iter()
                .map(object)
                .collect::<Vec<_>>(),
        );
        let resources = controller_resources(&s3(), &groups, &[]).unwrap();
        let ids: Vec<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "graph-s3-crds",
                "graph-serviceaccount",
                "graph-role",
                "graph-role-2",
                "graph-deployment"
            ]
        );
        assert_eq!(resources[0].template.str_at("kind"), Some("S3crdgraph"));
        assert_eq!(
            resources[0].template.str_at("spec.values.reconcile.resources"),
            Some("${schema.spec.values.reconcile.resources}")
        );
    }

    #[test]
    fn test_controller_resources_gated_by_source_template() {
        let template = "{{- if .Values.serviceAccount.create }}\nkind: ServiceAccount\n{{- end }}\n";
        let conditions = extract_conditions("templates/sa.yaml", template);

        let sa = object("apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: s\n")
            .with_source("templates/sa.yaml");
        let groups = classify(vec![sa]);
        let resources = controller_resources(&s3(), &groups, &conditions).unwrap();
        assert_eq!(
            resources[1].include_when,
            ["${schema.spec.values.serviceAccount.create}"]
        );
    }

    #[test]
    fn test_graph_metadata_and_schema() {
        let config = s3();
        let crd = crd_graph(&config, Vec::new(), &["Bucket".to_string()]);
        assert_eq!(crd.metadata.name, "ack-s3-crds.kro.run");
        assert_eq!(crd.metadata.namespace, "kro");
        assert_eq!(crd.spec.schema.kind, "S3crdgraph");
        assert_eq!(
            crd.spec.schema.spec.str_at("values.reconcile.resources"),
            Some(r#"string[] | default=["Bucket"]"#)
        );
        assert_eq!(
            crd.spec.schema.spec.str_at("name"),
            Some("string | default=ack-s3-controller")
        );

        let ctrl = controller_graph(&config, Vec::new(), Node::mapping());
        assert_eq!(ctrl.metadata.name, "ack-s3-ctrl.kro.run");
        assert_eq!(ctrl.spec.schema.kind, "S3controller");
        assert!(ctrl.spec.schema.spec.get("values").is_none());
    }

    #[test]
    fn test_to_yaml_resolves_sentinels_and_omits_empty_gates() {
        let config = s3();
        let mut template = Node::mapping();
        template.set_dotted("metadata.name", Node::from("_NAME_"));
        let resources = vec![Resource {
            id: "graph-serviceaccount".to_string(),
            include_when: Vec::new(),
            template,
        }];
        let yaml = controller_graph(&config, resources, Node::mapping())
            .to_yaml()
            .unwrap();

        let node = Node::from_yaml(&yaml).unwrap();
        let first = &node.get_dotted("spec.resources").unwrap().as_sequence().unwrap()[0];
        assert_eq!(first.str_at("template.metadata.name"), Some("${schema.spec.name}"));
        assert!(first.get("includeWhen").is_none());
        assert_eq!(node.str_at("kind"), Some("ResourceGraphDefinition"));
    }
}
