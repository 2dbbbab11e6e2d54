//! Controller values resolution
//!
//! Every field the controller graph exposes is listed in [`CONTROLLER_FIELDS`]
//! with a fallback. The resolved default is the chart's value when the chart
//! declares one, otherwise the fallback with its tokens expanded. A caller
//! value becomes an override only when it differs from that default, which
//! keeps generated schemas small and stable across regenerations.

use ackrgd_core::config::non_empty;
use ackrgd_core::{Node, ServiceConfig};
use tracing::debug;

use crate::schema::{SchemaDefault, SchemaType};

/// One schema field and its fallback default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Dotted path under `values`
    pub path: &'static str,
    /// Default used when the chart declares none; may contain tokens
    pub fallback: &'static str,
}

const fn field(path: &'static str, fallback: &'static str) -> FieldSpec {
    FieldSpec { path, fallback }
}

const CONTROLLER_NAME_TOKEN: &str = "_CONTROLLER_NAME_";
const IMAGE_REPOSITORY_TOKEN: &str = "_IMAGE_REPOSITORY_";
const IMAGE_TAG_TOKEN: &str = "_IMAGE_TAG_";
const NAMESPACE_TOKEN: &str = "_NAMESPACE_";
const SERVICE_LOWER_TOKEN: &str = "_SERVICE_LOWER_";

/// Path of the reconcile resource list, resolved against observed CRD kinds
pub const RECONCILE_RESOURCES: &str = "reconcile.resources";

/// Fields exposed under the controller graph's `values`
pub static CONTROLLER_FIELDS: &[FieldSpec] = &[
    field("aws.accountID", ""),
    field("aws.region", ""),
    field("aws.endpoint_url", ""),
    field("aws.credentials.secretName", ""),
    field("aws.credentials.secretKey", "credentials"),
    field("aws.credentials.profile", "default"),
    field("deletionPolicy", "delete"),
    field("image.repository", IMAGE_REPOSITORY_TOKEN),
    field("image.tag", IMAGE_TAG_TOKEN),
    field("image.pullPolicy", "IfNotPresent"),
    field("image.pullSecrets", "[]"),
    field("deployment.replicas", "1"),
    field("deployment.containerPort", "8080"),
    field("deployment.labels", "{}"),
    field("deployment.annotations", "{}"),
    field("deployment.nodeSelector", "{}"),
    field("deployment.tolerations", "{}"),
    field("deployment.affinity", "{}"),
    field("deployment.priorityClassName", ""),
    field("deployment.hostNetwork", "false"),
    field("deployment.dnsPolicy", "ClusterFirst"),
    field("deployment.strategy", "{}"),
    field("deployment.extraVolumes", "[]"),
    field("deployment.extraVolumeMounts", "[]"),
    field("deployment.extraEnvVars", "[]"),
    field("resources.requests.memory", "64Mi"),
    field("resources.requests.cpu", "50m"),
    field("resources.limits.memory", "128Mi"),
    field("resources.limits.cpu", "100m"),
    field("role.labels", "{}"),
    field("metrics.service.create", "false"),
    field("metrics.service.type", "ClusterIP"),
    field("log.enable_development_logging", "false"),
    field("log.level", "info"),
    field("installScope", "cluster"),
    field("watchNamespace", ""),
    field("watchSelectors", ""),
    field(
        "resourceTags",
        r#"["services.k8s.aws/controller-version=%CONTROLLER_SERVICE%-%CONTROLLER_VERSION%","services.k8s.aws/namespace=%K8S_NAMESPACE%"]"#,
    ),
    field("reconcile.defaultResyncPeriod", "36000"),
    field("reconcile.resourceResyncPeriods", "{}"),
    field("reconcile.defaultMaxConcurrentSyncs", "1"),
    field("reconcile.resourceMaxConcurrentSyncs", "{}"),
    field(RECONCILE_RESOURCES, "[]"),
    field("enableCARM", "true"),
    field("featureGates", "{}"),
    field("serviceAccount.create", "true"),
    field("serviceAccount.name", CONTROLLER_NAME_TOKEN),
    field("serviceAccount.annotations", "{}"),
    field("leaderElection.enabled", "false"),
    field("leaderElection.namespace", NAMESPACE_TOKEN),
    field("iamRole.oidcProvider", ""),
    field("iamRole.maxSessionDuration", "3600"),
    field(
        "iamRole.roleDescription",
        "IRSA role for ACK _SERVICE_LOWER_ controller deployment on EKS cluster using KRO Resource Graph",
    ),
];

/// Expand computed tokens in a fallback default
pub fn expand_tokens(fallback: &str, config: &ServiceConfig) -> String {
    if !fallback.contains('_') {
        return fallback.to_string();
    }
    fallback
        .replace(CONTROLLER_NAME_TOKEN, &config.controller_name())
        .replace(IMAGE_REPOSITORY_TOKEN, &config.default_image_repository())
        .replace(IMAGE_TAG_TOKEN, &config.default_image_tag())
        .replace(NAMESPACE_TOKEN, &config.namespace())
        .replace(SERVICE_LOWER_TOKEN, &config.service_lower())
}

/// Value the caller set for a field, from typed configuration first and
/// `extras.values` second
pub fn configured_value(config: &ServiceConfig, path: &str) -> Option<Node> {
    typed_value(config, path).or_else(|| {
        config
            .extras
            .values
            .as_ref()
            .and_then(|values| values.get_dotted(path))
            .filter(|node| !node.is_null())
            .cloned()
    })
}

fn text(value: &Option<String>) -> Option<Node> {
    non_empty(value).map(Node::from)
}

fn flag(value: Option<bool>) -> Option<Node> {
    value.map(Node::from)
}

fn number(value: Option<i64>) -> Option<Node> {
    value.map(Node::from)
}

fn serialized<T: serde::Serialize>(value: &Option<T>) -> Option<Node> {
    value
        .as_ref()
        .and_then(|v| serde_yaml::to_value(v).ok())
        .map(Node::from)
}

fn typed_value(config: &ServiceConfig, path: &str) -> Option<Node> {
    let aws = &config.aws;
    let controller = &config.controller;
    let deployment = &config.deployment;
    let reconcile = &config.reconcile;

    match path {
        "aws.accountID" => text(&aws.account_id),
        "aws.region" => text(&aws.region),
        "aws.endpoint_url" => text(&aws.endpoint_url),
        "aws.credentials.secretName" => text(&aws.credentials.secret_name),
        "aws.credentials.secretKey" => text(&aws.credentials.secret_key),
        "aws.credentials.profile" => text(&aws.credentials.profile),
        "deletionPolicy" => text(&controller.deletion_policy),
        "image.repository" => text(&config.image.repository),
        "image.tag" => text(&config.image.tag),
        "image.pullPolicy" => text(&config.image.pull_policy),
        "image.pullSecrets" => serialized(&config.image.pull_secrets),
        "deployment.replicas" => number(deployment.replicas),
        "deployment.containerPort" => number(deployment.container_port),
        "deployment.labels" => serialized(&deployment.labels),
        "deployment.annotations" => serialized(&deployment.annotations),
        "deployment.nodeSelector" => serialized(&deployment.node_selector),
        "deployment.tolerations" => serialized(&deployment.tolerations),
        "deployment.affinity" => deployment.affinity.clone(),
        "deployment.priorityClassName" => text(&deployment.priority_class_name),
        "deployment.hostNetwork" => flag(deployment.host_network),
        "deployment.dnsPolicy" => text(&deployment.dns_policy),
        "deployment.strategy" => deployment.strategy.clone(),
        "deployment.extraVolumes" => serialized(&deployment.extra_volumes),
        "deployment.extraVolumeMounts" => serialized(&deployment.extra_volume_mounts),
        "deployment.extraEnvVars" => serialized(&deployment.extra_env_vars),
        "resources.requests.memory" => text(&config.resources.requests.memory),
        "resources.requests.cpu" => text(&config.resources.requests.cpu),
        "resources.limits.memory" => text(&config.resources.limits.memory),
        "resources.limits.cpu" => text(&config.resources.limits.cpu),
        "metrics.service.create" => flag(config.metrics.service.create),
        "metrics.service.type" => text(&config.metrics.service.service_type),
        "log.enable_development_logging" => flag(controller.log_dev),
        "log.level" => text(&controller.log_level),
        "installScope" => text(&controller.install_scope),
        "watchNamespace" => text(&controller.watch_namespace),
        "watchSelectors" => text(&controller.watch_selectors),
        "resourceTags" => serialized(&controller.resource_tags),
        "reconcile.defaultResyncPeriod" => number(reconcile.default_resync_period),
        "reconcile.resourceResyncPeriods" => serialized(&reconcile.resource_resync_periods),
        "reconcile.defaultMaxConcurrentSyncs" => number(reconcile.default_max_concurrent_syncs),
        "reconcile.resourceMaxConcurrentSyncs" => {
            serialized(&reconcile.resource_max_concurrent_syncs)
        }
        "reconcile.resources" => serialized(&reconcile.resources),
        "enableCARM" => flag(controller.enable_carm),
        "featureGates" => serialized(&config.feature_gates),
        "serviceAccount.create" => flag(config.service_account.create),
        "serviceAccount.name" => text(&config.service_account.name),
        "serviceAccount.annotations" => serialized(&config.service_account.annotations),
        "leaderElection.enabled" => flag(config.leader_election.enabled),
        "leaderElection.namespace" => text(&config.leader_election.namespace),
        "iamRole.oidcProvider" => text(&config.iam_role.oidc_provider),
        "iamRole.maxSessionDuration" => number(config.iam_role.max_session_duration),
        "iamRole.roleDescription" => text(&config.iam_role.role_description),
        _ => None,
    }
}

/// Resolved controller values
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerValues {
    /// Schema default tree with every field
    pub defaults: Node,
    /// Only the fields whose configured value differs from the default
    pub overrides: Node,
}

impl ControllerValues {
    /// Defaults with overrides applied, keys sorted
    pub fn values(&self) -> Node {
        let mut values = self.defaults.clone();
        values.merge(&self.overrides);
        values.sort_keys();
        values
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty()
    }
}

/// Resolved raw default of one field
fn resolved_default(
    spec: &FieldSpec,
    config: &ServiceConfig,
    chart_defaults: Option<&Node>,
    crd_kinds: &[String],
) -> String {
    let chart = chart_defaults
        .and_then(|chart| chart.get_dotted(spec.path))
        .filter(|node| !node.is_null());

    if spec.path == RECONCILE_RESOURCES {
        return match chart {
            Some(list) if !list.is_empty() => list.default_text(),
            _ => SchemaDefault::string_array(crd_kinds).value,
        };
    }

    match chart {
        Some(node) => node.default_text(),
        None => expand_tokens(spec.fallback, config),
    }
}

/// Resolve the controller graph values for one service
///
/// `crd_kinds` are the kinds of the CRDs rendered for the service, used as
/// the reconcile resource default when the chart declares none.
pub fn resolve_controller_values(
    config: &ServiceConfig,
    chart_defaults: Option<&Node>,
    crd_kinds: &[String],
) -> ControllerValues {
    let mut defaults = Node::mapping();
    let mut overrides = Node::mapping();

    for spec in CONTROLLER_FIELDS {
        let default_raw = resolved_default(spec, config, chart_defaults, crd_kinds);
        defaults.set_dotted(spec.path, SchemaDefault::for_path(spec.path, &default_raw).to_node());

        let Some(configured) = configured_value(config, spec.path) else {
            continue;
        };
        let configured_raw = configured.default_text();
        let ty = SchemaType::for_path(spec.path);
        if ty.same_value(&configured_raw, &default_raw) {
            continue;
        }

        debug!(
            service = %config.service,
            path = spec.path,
            "configured value differs from default"
        );
        overrides.set_dotted(
            spec.path,
            SchemaDefault::for_path(spec.path, &configured_raw).to_node(),
        );
    }

    ControllerValues {
        defaults,
        overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3() -> ServiceConfig {
        ServiceConfig::new("s3", "1.2.3").unwrap()
    }

    #[test]
    fn test_defaults_without_chart() {
        let values = resolve_controller_values(&s3(), None, &["Bucket".to_string()]);
        let d = &values.defaults;
        assert_eq!(d.str_at("image.tag"), Some("string | default=1.2.3"));
        assert_eq!(
            d.str_at("image.repository"),
            Some("string | default=public.ecr.aws/aws-controllers-k8s/s3-controller")
        );
        assert_eq!(d.str_at("serviceAccount.name"), Some("string | default=ack-s3-controller"));
        assert_eq!(d.str_at("leaderElection.namespace"), Some("string | default=ack-system"));
        assert_eq!(d.str_at("reconcile.resources"), Some(r#"string[] | default=["Bucket"]"#));
        assert_eq!(d.str_at("deployment.replicas"), Some("integer | default=1"));
        assert_eq!(d.str_at("aws.region"), Some(r#"string | default="""#));
        assert_eq!(d.str_at("enableCARM"), Some("boolean | default=true"));
        assert_eq!(
            d.str_at("iamRole.roleDescription"),
            Some("string | default=IRSA role for ACK s3 controller deployment on EKS cluster using KRO Resource Graph")
        );
    }

    #[test]
    fn test_matching_configuration_has_no_overrides() {
        let mut config = s3();
        config.deployment.replicas = Some(1);
        config.controller.log_level = Some("info".to_string());
        config.service_account.create = Some(true);
        config.deployment.labels = Some(Default::default());
        config.reconcile.resources = Some(vec!["Bucket".to_string()]);

        let values = resolve_controller_values(&config, None, &["Bucket".to_string()]);
        assert!(values.overrides.is_empty(), "{:?}", values.overrides);
        assert!(!values.has_overrides());
    }

    #[test]
    fn test_single_change_emits_single_override() {
        let mut config = s3();
        config.aws.region = Some("us-west-2".to_string());

        let values = resolve_controller_values(&config, None, &[]);
        let overrides = values.overrides.as_mapping().unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(
            values.overrides.str_at("aws.region"),
            Some("string | default=us-west-2")
        );
        assert_eq!(values.overrides.get_dotted("aws").unwrap().as_mapping().unwrap().len(), 1);

        let merged = values.values();
        assert_eq!(merged.str_at("aws.region"), Some("string | default=us-west-2"));
        assert_eq!(merged.str_at("aws.credentials.profile"), Some("string | default=default"));
    }

    #[test]
    fn test_chart_defaults_take_precedence_over_fallbacks() {
        let chart = Node::from_yaml(
            r#"
image:
  repository: example.com/custom
  tag: 1.2.3
deployment:
  replicas: 2
  labels:
    team: storage
reconcile:
  resources: [Bucket, Policy]
"#,
        )
        .unwrap();
        let values = resolve_controller_values(&s3(), Some(&chart), &["Other".to_string()]);
        let d = &values.defaults;
        assert_eq!(d.str_at("image.repository"), Some("string | default=example.com/custom"));
        assert_eq!(d.str_at("deployment.replicas"), Some("integer | default=2"));
        assert_eq!(d.str_at("deployment.labels"), Some(r#"object | default={"team":"storage"}"#));
        assert_eq!(
            d.str_at("reconcile.resources"),
            Some(r#"string[] | default=["Bucket","Policy"]"#)
        );
        assert!(values.overrides.is_empty());
    }

    #[test]
    fn test_collections_compared_structurally() {
        let chart = Node::from_yaml("featureGates:\n  B: false\n  A: true\n").unwrap();
        let mut config = s3();
        config.feature_gates = Some([("A".to_string(), true), ("B".to_string(), false)].into());

        let values = resolve_controller_values(&config, Some(&chart), &[]);
        assert!(values.overrides.get("featureGates").is_none());

        config.feature_gates = Some([("A".to_string(), false)].into());
        let values = resolve_controller_values(&config, Some(&chart), &[]);
        assert_eq!(
            values.overrides.str_at("featureGates"),
            Some(r#"object | default={"A":false}"#)
        );
    }

    #[test]
    fn test_configured_tolerations_emit_override() {
        let mut config = s3();
        config.deployment.tolerations =
            Some(serde_yaml::from_str("- key: dedicated\n  operator: Exists\n").unwrap());
        config.deployment.extra_volumes = Some(serde_yaml::from_str("- name: v\n").unwrap());

        let values = resolve_controller_values(&config, None, &[]);
        assert_eq!(
            values.overrides.str_at("deployment.tolerations"),
            Some(r#"object | default=[{"key":"dedicated","operator":"Exists"}]"#)
        );
        assert_eq!(
            values.overrides.str_at("deployment.extraVolumes"),
            Some(r#"string[] | default=[{"name":"v"}]"#)
        );
        assert_eq!(
            values.values().str_at("deployment.tolerations"),
            Some(r#"object | default=[{"key":"dedicated","operator":"Exists"}]"#)
        );

        config.deployment.tolerations = Some(Vec::new());
        let values = resolve_controller_values(&config, None, &[]);
        assert!(values.overrides.get_dotted("deployment.tolerations").is_none());
    }

    #[test]
    fn test_extras_values_used_when_typed_field_absent() {
        let mut config = s3();
        config.extras.values = Some(Node::from_yaml("role:\n  labels:\n    a: b\nlog:\n  level: debug\n").unwrap());
        config.controller.log_level = Some("warn".to_string());

        let values = resolve_controller_values(&config, None, &[]);
        assert_eq!(values.overrides.str_at("role.labels"), Some(r#"object | default={"a":"b"}"#));
        assert_eq!(values.overrides.str_at("log.level"), Some("string | default=warn"));
    }

    #[test]
    fn test_field_paths_are_unique() {
        let mut paths: Vec<&str> = CONTROLLER_FIELDS.iter().map(|f| f.path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), CONTROLLER_FIELDS.len());
    }

    #[test]
    fn test_role_labels_only_from_extras() {
        assert!(configured_value(&s3(), "role.labels").is_none());
        assert!(typed_value(&s3(), "role.labels").is_none());
    }
}
