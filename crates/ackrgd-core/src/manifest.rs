//! Manifest documents and role classification
//!
//! A rendered chart is a flat set of YAML documents. Each one is parsed into a
//! [`ManifestObject`] and bucketed by role so the graph builders can emit CRDs
//! and controller resources separately, in a stable order.

use phf::phf_map;

use crate::error::{CoreError, Result};
use crate::tree::Node;

/// API group prefix of CustomResourceDefinitions
pub const API_EXTENSIONS_PREFIX: &str = "apiextensions.k8s.io/";

/// Kind of a CustomResourceDefinition
pub const CRD_KIND: &str = "CustomResourceDefinition";

/// Role bucket a manifest belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestGroup {
    Crds,
    /// ServiceAccount, Service, ConfigMap, Namespace
    Core,
    /// ClusterRole, Role, ClusterRoleBinding, RoleBinding
    Rbac,
    Deployments,
    /// Anything not matched by the other rules
    Others,
}

static KIND_GROUPS: phf::Map<&'static str, ManifestGroup> = phf_map! {
    "ServiceAccount" => ManifestGroup::Core,
    "Service" => ManifestGroup::Core,
    "ConfigMap" => ManifestGroup::Core,
    "Namespace" => ManifestGroup::Core,
    "ClusterRole" => ManifestGroup::Rbac,
    "Role" => ManifestGroup::Rbac,
    "ClusterRoleBinding" => ManifestGroup::Rbac,
    "RoleBinding" => ManifestGroup::Rbac,
    "Deployment" => ManifestGroup::Deployments,
};

impl ManifestGroup {
    /// Assign a document to its group
    ///
    /// The CRD test is composite (API group and kind) and runs before the
    /// kind table.
    pub fn of(api_version: &str, kind: &str) -> Self {
        if api_version.starts_with(API_EXTENSIONS_PREFIX) && kind == CRD_KIND {
            return ManifestGroup::Crds;
        }
        KIND_GROUPS
            .get(kind)
            .copied()
            .unwrap_or(ManifestGroup::Others)
    }
}

/// One parsed manifest document
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// May be empty for cluster-scoped objects
    pub namespace: String,
    /// Document text, trimmed with a single trailing newline
    pub raw: String,
    /// Template path the document was rendered from, when known
    pub source: Option<String>,
}

impl ManifestObject {
    /// Parse one YAML document
    ///
    /// Missing identity fields are left empty; a document that is not a
    /// mapping is rejected.
    pub fn parse(doc: &str) -> Result<Self> {
        let node = Node::from_yaml(doc)?;
        if node.as_mapping().is_none() {
            return Err(CoreError::InvalidDocument {
                context: first_line(doc),
                message: "expected a YAML mapping at the document root".to_string(),
            });
        }

        let field = |path: &str| node.str_at(path).unwrap_or_default().to_string();

        Ok(Self {
            api_version: field("apiVersion"),
            kind: field("kind"),
            name: field("metadata.name"),
            namespace: field("metadata.namespace"),
            raw: format!("{}\n", doc.trim()),
            source: None,
        })
    }

    /// Record the template path this document came from
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Parse the raw text into a document tree
    pub fn template(&self) -> Result<Node> {
        Ok(Node::from_yaml(&self.raw)?)
    }

    pub fn group(&self) -> ManifestGroup {
        ManifestGroup::of(&self.api_version, &self.kind)
    }

    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.kind, &self.namespace, &self.name)
    }
}

fn first_line(doc: &str) -> String {
    doc.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("<empty document>")
        .to_string()
}

/// Manifests bucketed by role, each bucket sorted by `(kind, namespace, name)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationGroups {
    pub crds: Vec<ManifestObject>,
    pub core: Vec<ManifestObject>,
    pub rbac: Vec<ManifestObject>,
    pub deployments: Vec<ManifestObject>,
    pub others: Vec<ManifestObject>,
}

impl ClassificationGroups {
    /// Non-CRD objects in controller graph order: core, RBAC, deployments, others
    pub fn controller_objects(&self) -> impl Iterator<Item = &ManifestObject> {
        self.core
            .iter()
            .chain(&self.rbac)
            .chain(&self.deployments)
            .chain(&self.others)
    }

    /// Total number of classified objects
    pub fn len(&self) -> usize {
        self.crds.len() + self.core.len() + self.rbac.len() + self.deployments.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `spec.names.kind` of every CRD, in group order, without duplicates
    pub fn crd_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = Vec::new();
        for crd in &self.crds {
            let Ok(node) = crd.template() else {
                continue;
            };
            if let Some(kind) = node.str_at("spec.names.kind") {
                if !kind.is_empty() && !kinds.iter().any(|k| k == kind) {
                    kinds.push(kind.to_string());
                }
            }
        }
        kinds
    }
}

/// Bucket manifests by role
///
/// Every input lands in exactly one group; the result does not depend on
/// input order.
pub fn classify<I>(objects: I) -> ClassificationGroups
where
    I: IntoIterator<Item = ManifestObject>,
{
    let mut groups = ClassificationGroups::default();
    for object in objects {
        let bucket = match object.group() {
            ManifestGroup::Crds => &mut groups.crds,
            ManifestGroup::Core => &mut groups.core,
            ManifestGroup::Rbac => &mut groups.rbac,
            ManifestGroup::Deployments => &mut groups.deployments,
            ManifestGroup::Others => &mut groups.others,
        };
        bucket.push(object);
    }

    for bucket in [
        &mut groups.crds,
        &mut groups.core,
        &mut groups.rbac,
        &mut groups.deployments,
        &mut groups.others,
    ] {
        bucket.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then_with(|| a.raw.cmp(&b.raw)));
    }

    groups
}

/// Split a multi-document YAML string into individual documents
///
/// Empty and comment-only documents are dropped; each returned document
/// ends with exactly one newline.
pub fn split_documents(content: &str) -> Vec<String> {
    content
        .split("\n---")
        .map(|part| part.strip_prefix("---").unwrap_or(part))
        .map(str::trim)
        .filter(|doc| {
            !doc.is_empty()
                && !doc
                    .lines()
                    .all(|l| l.trim().is_empty() || l.trim().starts_with('#'))
        })
        .map(|doc| format!("{}\n", doc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CRD: &str = r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: buckets.s3.services.k8s.aws
spec:
  group: s3.services.k8s.aws
  names:
    kind: Bucket
"#;

    const SA: &str = r#"apiVersion: v1
kind: ServiceAccount
metadata:
  name: s
  namespace: ack-system
"#;

    const ROLE: &str = r#"apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: r
"#;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: d
"#;

    const PDB: &str = r#"apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: p
"#;

    fn parse_all(docs: &[&str]) -> Vec<ManifestObject> {
        docs.iter().map(|d| ManifestObject::parse(d).unwrap()).collect()
    }

    #[test]
    fn test_parse_extracts_identity() {
        let obj = ManifestObject::parse(SA).unwrap();
        assert_eq!(obj.api_version, "v1");
        assert_eq!(obj.kind, "ServiceAccount");
        assert_eq!(obj.name, "s");
        assert_eq!(obj.namespace, "ack-system");
        assert!(obj.raw.ends_with("ack-system\n"));
    }

    #[test]
    fn test_parse_allows_missing_namespace() {
        let obj = ManifestObject::parse(ROLE).unwrap();
        assert_eq!(obj.namespace, "");
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        assert!(ManifestObject::parse("kind: [unclosed").is_err());
        assert!(ManifestObject::parse("- just\n- a list\n").is_err());
    }

    #[test]
    fn test_classify_each_group() {
        let groups = classify(parse_all(&[CRD, SA, ROLE, DEPLOYMENT, PDB]));
        assert_eq!(groups.crds.len(), 1);
        assert_eq!(groups.core.len(), 1);
        assert_eq!(groups.rbac.len(), 1);
        assert_eq!(groups.deployments.len(), 1);
        assert_eq!(groups.others.len(), 1);
        assert_eq!(groups.len(), 5);
    }

    #[test]
    fn test_crd_check_requires_api_group() {
        // A CRD kind outside apiextensions is not a CRD
        let fake = "apiVersion: example.com/v1\nkind: CustomResourceDefinition\nmetadata:\n  name: x\n";
        let groups = classify(parse_all(&[fake]));
        assert!(groups.crds.is_empty());
        assert_eq!(groups.others.len(), 1);
    }

    #[test]
    fn test_classify_is_order_independent() {
        let sa2 = "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: a\n  namespace: ack-system\n";
        let svc = "apiVersion: v1\nkind: Service\nmetadata:\n  name: z\n";

        let forward = classify(parse_all(&[SA, sa2, svc]));
        let backward = classify(parse_all(&[svc, sa2, SA]));
        assert_eq!(forward, backward);

        let names: Vec<&str> = forward.core.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["z", "a", "s"]);
    }

    #[test]
    fn test_controller_objects_order() {
        let groups = classify(parse_all(&[PDB, DEPLOYMENT, ROLE, SA, CRD]));
        let kinds: Vec<&str> = groups
            .controller_objects()
            .map(|o| o.kind.as_str())
            .collect();
        assert_eq!(
            kinds,
            ["ServiceAccount", "ClusterRole", "Deployment", "PodDisruptionBudget"]
        );
    }

    #[test]
    fn test_crd_kinds() {
        let groups = classify(parse_all(&[CRD, CRD]));
        assert_eq!(groups.crd_kinds(), ["Bucket"]);
    }

    #[test]
    fn test_split_documents() {
        let docs = split_documents("---\na: 1\n---\n# only a comment\n---\n\n---\nb: 2");
        assert_eq!(docs, ["a: 1\n", "b: 2\n"]);
    }
}
