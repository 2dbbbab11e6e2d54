//! Service configuration (`graphs.yaml`)
//!
//! Each entry describes one ACK controller to turn into a pair of resource
//! graphs. Only `service` and `version` are required; every other field is
//! optional and an absent field means "not configured" (the generated schema
//! then keeps the chart or computed default).
//!
//! ```yaml
//! graphs:
//!   - service: s3
//!     version: 1.2.3
//!     aws:
//!       region: us-west-2
//!     reconcile:
//!       resources: [Bucket]
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::tree::Node;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "ack-system";

/// Public registry that hosts the ACK controller images
pub const ACK_IMAGE_REGISTRY: &str = "public.ecr.aws/aws-controllers-k8s";

/// Root of `graphs.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphsFile {
    #[serde(default)]
    pub graphs: Vec<ServiceConfig>,
}

impl GraphsFile {
    /// Load and normalize `graphs.yaml`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file = Self::from_yaml(&content)?;
        debug!(path = %path.display(), count = file.graphs.len(), "loaded graphs file");
        Ok(file)
    }

    /// Parse and normalize a `graphs.yaml` document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut file: GraphsFile = serde_yaml::from_str(yaml)?;
        if file.graphs.is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "graphs: at least one service is required".to_string(),
            });
        }
        for (index, service) in file.graphs.iter_mut().enumerate() {
            service.normalize(index)?;
        }
        Ok(file)
    }
}

/// Configuration for one ACK service controller
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub service: String,
    pub version: String,
    pub release_name: Option<String>,
    pub namespace: Option<String>,
    pub aws: AwsConfig,
    pub image: ImageConfig,
    pub service_account: ServiceAccountConfig,
    pub controller: ControllerConfig,
    pub deployment: DeploymentConfig,
    pub resources: ResourcesConfig,
    pub metrics: MetricsConfig,
    pub reconcile: ReconcileConfig,
    pub feature_gates: Option<BTreeMap<String, bool>>,
    pub leader_election: LeaderElectionConfig,
    pub iam_role: IamRoleConfig,
    pub extras: ExtrasConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsConfig {
    pub region: Option<String>,
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,
    pub endpoint_url: Option<String>,
    pub credentials: AwsCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCredentials {
    pub secret_name: Option<String>,
    pub secret_key: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConfig {
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub pull_policy: Option<String>,
    pub pull_secrets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceAccountConfig {
    pub create: Option<bool>,
    pub name: Option<String>,
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    pub log_level: Option<String>,
    pub log_dev: Option<bool>,
    pub watch_namespace: Option<String>,
    pub watch_selectors: Option<String>,
    pub install_scope: Option<String>,
    pub deletion_policy: Option<String>,
    #[serde(rename = "enableCARM")]
    pub enable_carm: Option<bool>,
    pub resource_tags: Option<Vec<String>>,
}

/// Deployment knobs. List-of-object fields keep arbitrary entries
/// (volumes, env vars, tolerations).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentConfig {
    pub replicas: Option<i64>,
    pub container_port: Option<i64>,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub tolerations: Option<Vec<IndexMap<String, Node>>>,
    pub affinity: Option<Node>,
    pub priority_class_name: Option<String>,
    pub host_network: Option<bool>,
    pub dns_policy: Option<String>,
    pub strategy: Option<Node>,
    pub extra_volumes: Option<Vec<IndexMap<String, Node>>>,
    pub extra_volume_mounts: Option<Vec<IndexMap<String, Node>>>,
    pub extra_env_vars: Option<Vec<IndexMap<String, Node>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourcesConfig {
    pub requests: ResourceQuantities,
    pub limits: ResourceQuantities,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourceQuantities {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub service: MetricsServiceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsServiceConfig {
    pub create: Option<bool>,
    #[serde(rename = "type")]
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcileConfig {
    pub default_resync_period: Option<i64>,
    pub resource_resync_periods: Option<BTreeMap<String, i64>>,
    pub default_max_concurrent_syncs: Option<i64>,
    pub resource_max_concurrent_syncs: Option<BTreeMap<String, i64>>,
    pub resources: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeaderElectionConfig {
    pub enabled: Option<bool>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IamRoleConfig {
    pub oidc_provider: Option<String>,
    pub max_session_duration: Option<i64>,
    pub role_description: Option<String>,
}

/// Free-form chart value overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtrasConfig {
    pub values: Option<Node>,
}

/// Trimmed, non-empty view of an optional string
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ServiceConfig {
    /// Minimal configuration for a service, as if loaded from `graphs.yaml`
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let mut config = Self {
            service: service.into(),
            version: version.into(),
            ..Default::default()
        };
        config.normalize(0)?;
        Ok(config)
    }

    /// Trim and fill the fields every later stage relies on
    ///
    /// - `service` and `version` are required
    /// - `image.tag` defaults to `version`
    /// - `releaseName` defaults to `ack-<service>-controller`
    /// - `namespace` defaults to `ack-system`
    pub fn normalize(&mut self, index: usize) -> Result<()> {
        self.service = self.service.trim().to_string();
        if self.service.is_empty() {
            return Err(CoreError::MissingField {
                field: format!("graphs[{}].service", index),
            });
        }

        self.version = self.version.trim().to_string();
        if self.version.is_empty() {
            return Err(CoreError::MissingField {
                field: format!("graphs[{}].version", index),
            });
        }

        let tag = non_empty(&self.image.tag)
            .unwrap_or(self.version.as_str())
            .to_string();
        self.image.tag = Some(tag);

        let release = non_empty(&self.release_name)
            .map(String::from)
            .unwrap_or_else(|| self.controller_name());
        self.release_name = Some(release);

        let namespace = non_empty(&self.namespace)
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();
        self.namespace = Some(namespace);

        Ok(())
    }

    /// Lower-cased service name (`s3`)
    pub fn service_lower(&self) -> String {
        self.service.trim().to_lowercase()
    }

    /// Service name with its first letter upper-cased (`S3`), used in schema kinds
    pub fn service_upper(&self) -> String {
        let service = self.service.trim();
        let mut chars = service.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Default controller (and release) name: `ack-<service>-controller`
    pub fn controller_name(&self) -> String {
        let service = self.service_lower();
        if service.is_empty() {
            return "ack-controller".to_string();
        }
        format!("ack-{}-controller", service)
    }

    /// Configured release name, falling back to the controller name
    pub fn release_name(&self) -> String {
        non_empty(&self.release_name)
            .map(String::from)
            .unwrap_or_else(|| self.controller_name())
    }

    /// Configured namespace, falling back to `ack-system`
    pub fn namespace(&self) -> String {
        non_empty(&self.namespace)
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string()
    }

    /// Default controller image repository on the public ECR gallery
    pub fn default_image_repository(&self) -> String {
        let service = self.service_lower();
        if service.is_empty() {
            return String::new();
        }
        format!("{}/{}-controller", ACK_IMAGE_REGISTRY, service)
    }

    /// Default image tag: the chart version
    pub fn default_image_tag(&self) -> String {
        self.version.trim().to_string()
    }
}
