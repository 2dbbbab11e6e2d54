//! Two-phase placeholder substitution
//!
//! Phase 1 runs on rendered text: every configured literal that may appear
//! verbatim (release name, namespace, region, image coordinates...) becomes a
//! sentinel token such as `_NAME_`. Phase 2 runs on parsed documents and
//! turns sentinels into `${schema.spec...}` references, touching string
//! scalars only so keys and structure are never rewritten.
//!
//! A third, optional pass resolves `${schema.spec...}` references to their
//! schema defaults to produce a readable example document.
//!
//! Unknown tokens are always passed through untouched.

use std::collections::HashMap;

use ackrgd_core::config::non_empty;
use ackrgd_core::{Node, Scalar, ServiceConfig};
use once_cell::sync::Lazy;
use phf::phf_map;
use regex::{Captures, Regex};

use crate::schema::{SchemaDefault, SchemaType};

pub const NAME: &str = "_NAME_";
pub const NAMESPACE: &str = "_NAMESPACE_";
pub const AWS_REGION: &str = "_AWS_REGION_";
pub const AWS_ENDPOINT_URL: &str = "_AWS_ENDPOINT_URL_";
pub const AWS_ACCOUNT_ID: &str = "_AWS_ACCOUNT_ID_";
pub const AWS_SECRET_KEY: &str = "_AWS_SECRET_KEY_";
pub const AWS_SECRET_NAME: &str = "_AWS_SECRET_NAME_";
pub const AWS_PROFILE: &str = "_AWS_PROFILE_";
pub const IMAGE_REPOSITORY: &str = "_IMAGE_REPOSITORY_";
pub const IMAGE_TAG: &str = "_IMAGE_TAG_";
pub const SA_NAME: &str = "_SA_NAME_";

/// Sentinel token to schema reference
static SCHEMA_REFERENCES: phf::Map<&'static str, &'static str> = phf_map! {
    "_NAME_" => "${schema.spec.name}",
    "_NAMESPACE_" => "${schema.spec.namespace}",
    "_AWS_REGION_" => "${schema.spec.values.aws.region}",
    "_AWS_ENDPOINT_URL_" => "${schema.spec.values.aws.endpoint_url}",
    "_AWS_ACCOUNT_ID_" => "${schema.spec.values.aws.accountID}",
    "_AWS_SECRET_KEY_" => "${schema.spec.values.aws.credentials.secretKey}",
    "_AWS_SECRET_NAME_" => "${schema.spec.values.aws.credentials.secretName}",
    "_AWS_PROFILE_" => "${schema.spec.values.aws.credentials.profile}",
    "_IMAGE_REPOSITORY_" => "${schema.spec.values.image.repository}",
    "_IMAGE_TAG_" => "${schema.spec.values.image.tag}",
    "_SA_NAME_" => "${schema.spec.values.serviceAccount.name}",
    "_IRSA_ARN_" => "${ackIamRole.status.ackResourceMetadata.arn}",
    "_LOG_LEVEL_" => "${schema.spec.values.log.level}",
    "_LOG_DEV_" => "${schema.spec.values.log.enable_development_logging}",
    "_WATCH_NAMESPACE_" => "${schema.spec.values.watchNamespace}",
};

/// Sentinels ordered longest first; `_NAME_` is a substring of `_SA_NAME_`
static ORDERED_REFERENCES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut entries: Vec<_> = SCHEMA_REFERENCES.entries().map(|(k, v)| (*k, *v)).collect();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
    entries
});

static SCHEMA_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(schema\.spec\.[A-Za-z0-9_.]+)\}").expect("valid regex"));

/// Schema reference for a sentinel token
pub fn schema_reference(token: &str) -> Option<&'static str> {
    SCHEMA_REFERENCES.get(token).copied()
}

/// Literal to sentinel map for one service
///
/// Built once from the service configuration. When two sources produce the
/// same literal the first registration wins, in this order: release name,
/// controller name, namespace, AWS fields, image repository, image tag,
/// service account name. A later duplicate never overwrites an earlier token,
/// so a service account named like the controller still maps to `_NAME_`.
#[derive(Debug, Clone, Default)]
pub struct SentinelMap {
    /// Longest literal first
    entries: Vec<(String, &'static str)>,
}

impl SentinelMap {
    pub fn for_service(config: &ServiceConfig) -> Self {
        let mut map = Self::default();
        let controller_name = config.controller_name();

        map.register(&config.release_name(), NAME);
        map.register(&controller_name, NAME);
        map.register(&config.namespace(), NAMESPACE);

        let aws = &config.aws;
        map.register_opt(&aws.region, AWS_REGION);
        map.register_opt(&aws.endpoint_url, AWS_ENDPOINT_URL);
        map.register_opt(&aws.account_id, AWS_ACCOUNT_ID);
        map.register_opt(&aws.credentials.secret_key, AWS_SECRET_KEY);
        map.register_opt(&aws.credentials.secret_name, AWS_SECRET_NAME);
        map.register_opt(&aws.credentials.profile, AWS_PROFILE);

        map.register_opt(&config.image.repository, IMAGE_REPOSITORY);
        map.register(&config.default_image_repository(), IMAGE_REPOSITORY);
        map.register_opt(&config.image.tag, IMAGE_TAG);
        map.register(&config.default_image_tag(), IMAGE_TAG);

        map.register_opt(&config.service_account.name, SA_NAME);

        map.entries
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        map
    }

    /// Build from explicit pairs, first registration winning
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'static str)>,
    {
        let mut map = Self::default();
        for (literal, token) in pairs {
            map.register(literal, token);
        }
        map.entries
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        map
    }

    fn register(&mut self, literal: &str, token: &'static str) {
        let literal = literal.trim();
        if literal.is_empty() || self.entries.iter().any(|(l, _)| l == literal) {
            return;
        }
        self.entries.push((literal.to_string(), token));
    }

    fn register_opt(&mut self, literal: &Option<String>, token: &'static str) {
        if let Some(value) = non_empty(literal) {
            self.register(value, token);
        }
    }

    /// Sentinel registered for a literal
    pub fn get(&self, literal: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(l, _)| l == literal)
            .map(|(_, token)| *token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every known literal in `text`, longest literal first
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (literal, token) in &self.entries {
            if out.contains(literal.as_str()) {
                out = out.replace(literal.as_str(), token);
            }
        }
        out
    }
}

/// Replace sentinel tokens in one string with schema references
pub fn sentinels_to_references(text: &str) -> String {
    let mut out = text.to_string();
    for &(token, reference) in ORDERED_REFERENCES.iter() {
        if out.contains(token) {
            out = out.replace(token, reference);
        }
    }
    out
}

/// Concrete defaults for `${schema.spec...}` references
#[derive(Debug, Clone, Default)]
pub struct MaterializedDefaults {
    /// `schema.spec.<path>` to parsed default
    values: HashMap<String, SchemaDefault>,
}

impl MaterializedDefaults {
    /// Collect every `<type> | default=<value>` leaf of a schema `spec`
    pub fn from_schema_spec(spec: &Node) -> Self {
        let mut defaults = Self::default();
        defaults.collect("schema.spec", spec);
        defaults
    }

    fn collect(&mut self, prefix: &str, node: &Node) {
        match node {
            Node::Mapping(map) => {
                for (key, child) in map {
                    self.collect(&format!("{}.{}", prefix, key), child);
                }
            }
            Node::Scalar(Scalar::Str(text)) => {
                if let Some(default) = SchemaDefault::parse(text) {
                    self.values.insert(prefix.to_string(), default);
                }
            }
            _ => {}
        }
    }

    /// Default for a reference path such as `schema.spec.values.image.tag`
    pub fn get(&self, path: &str) -> Option<&str> {
        self.values.get(path).map(SchemaDefault::literal)
    }

    /// Declared type of a reference path
    pub fn schema_type(&self, path: &str) -> Option<SchemaType> {
        self.values.get(path).map(|default| default.ty)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve every known reference in `text`
    pub fn resolve(&self, text: &str) -> String {
        SCHEMA_REFERENCE
            .replace_all(text, |caps: &Captures| match self.get(&caps[1]) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

/// Phase 2 over a document tree
///
/// With `defaults`, references are further resolved to concrete values. A
/// scalar that was exactly one boolean or integer reference becomes a YAML
/// bool or int; everything else stays a string.
pub fn replace_scalars(node: &mut Node, defaults: Option<&MaterializedDefaults>) {
    node.walk_scalars_mut(&mut |scalar: &mut Scalar| {
        let Scalar::Str(text) = scalar else {
            return;
        };
        let replaced = sentinels_to_references(text);
        match defaults {
            Some(defaults) => {
                let whole_reference = SCHEMA_REFERENCE
                    .captures(&replaced)
                    .filter(|caps| caps[0].len() == replaced.len())
                    .and_then(|caps| defaults.schema_type(&caps[1]));
                let resolved = defaults.resolve(&replaced);
                *scalar = match whole_reference {
                    Some(ty) => typed_scalar(ty, resolved),
                    None => Scalar::Str(resolved),
                };
            }
            None => *text = replaced,
        }
    });
}

fn typed_scalar(ty: SchemaType, text: String) -> Scalar {
    match ty {
        SchemaType::Boolean => match text.as_str() {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::Str(text),
        },
        SchemaType::Integer => match text.parse::<i64>() {
            Ok(i) => Scalar::Int(i),
            Err(_) => Scalar::Str(text),
        },
        _ => Scalar::Str(text),
    }
}

/// Phase 2 over emitted YAML text: parse, rewrite string scalars, re-emit
pub fn replace_yaml_scalars(
    yaml: &str,
    defaults: Option<&MaterializedDefaults>,
) -> Result<String, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(yaml.to_string());
    }
    let mut node = Node::from_yaml(yaml)?;
    replace_scalars(&mut node, defaults);
    node.to_yaml()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ackrgd_core::config::AwsConfig;

    fn s3() -> ServiceConfig {
        ServiceConfig::new("s3", "1.2.3").unwrap()
    }

    #[test]
    fn test_sentinels_for_defaults() {
        let map = SentinelMap::for_service(&s3());
        assert_eq!(map.get("ack-s3-controller"), Some(NAME));
        assert_eq!(map.get("ack-system"), Some(NAMESPACE));
        assert_eq!(
            map.get("public.ecr.aws/aws-controllers-k8s/s3-controller"),
            Some(IMAGE_REPOSITORY)
        );
        assert_eq!(map.get("1.2.3"), Some(IMAGE_TAG));
        assert_eq!(map.get("us-west-2"), None);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut config = s3();
        config.service_account.name = Some("ack-s3-controller".to_string());
        let map = SentinelMap::for_service(&config);
        assert_eq!(map.get("ack-s3-controller"), Some(NAME));

        config.service_account.name = Some("custom-sa".to_string());
        let map = SentinelMap::for_service(&config);
        assert_eq!(map.get("custom-sa"), Some(SA_NAME));
    }

    #[test]
    fn test_longest_literal_replaced_intact() {
        let map = SentinelMap::from_pairs([("s3", "_SHORT_"), ("ack-s3-controller", NAME)]);
        assert_eq!(map.apply("name: ack-s3-controller\nsvc: s3\n"), "name: _NAME_\nsvc: _SHORT_\n");
    }

    #[test]
    fn test_apply_leaves_unknown_text() {
        let map = SentinelMap::for_service(&s3());
        let text = "image: public.ecr.aws/aws-controllers-k8s/s3-controller:1.2.3\nother: value\n";
        assert_eq!(
            map.apply(text),
            "image: _IMAGE_REPOSITORY_:_IMAGE_TAG_\nother: value\n"
        );
    }

    #[test]
    fn test_aws_literals() {
        let mut config = s3();
        config.aws = AwsConfig {
            region: Some("us-west-2".to_string()),
            ..Default::default()
        };
        let map = SentinelMap::for_service(&config);
        assert_eq!(map.apply("--aws-region=us-west-2"), "--aws-region=_AWS_REGION_");
    }

    #[test]
    fn test_sentinels_to_references_prefers_longer_token() {
        assert_eq!(
            sentinels_to_references("_SA_NAME_/_NAME_"),
            "${schema.spec.values.serviceAccount.name}/${schema.spec.name}"
        );
        assert_eq!(sentinels_to_references("_UNKNOWN_"), "_UNKNOWN_");
    }

    #[test]
    fn test_phase_two_skips_keys() {
        let mut node = Node::from_yaml("_NAME_: _NAME_\nlist:\n  - _NAMESPACE_\ncount: 3\n").unwrap();
        replace_scalars(&mut node, None);
        assert_eq!(node.str_at("_NAME_"), Some("${schema.spec.name}"));
        assert_eq!(
            node.get("list").and_then(|l| l.as_sequence()).unwrap()[0].as_str(),
            Some("${schema.spec.namespace}")
        );
    }

    #[test]
    fn test_round_trip_leaves_only_references() {
        let config = s3();
        let map = SentinelMap::for_service(&config);
        let rendered = "metadata:\n  name: ack-s3-controller\n  namespace: ack-system\nimage: public.ecr.aws/aws-controllers-k8s/s3-controller:1.2.3\n";

        let out = replace_yaml_scalars(&map.apply(rendered), None).unwrap();
        let node = Node::from_yaml(&out).unwrap();
        assert_eq!(node.str_at("metadata.name"), Some("${schema.spec.name}"));
        assert_eq!(node.str_at("metadata.namespace"), Some("${schema.spec.namespace}"));
        assert_eq!(
            node.str_at("image"),
            Some("${schema.spec.values.image.repository}:${schema.spec.values.image.tag}")
        );
        assert!(!out.contains("ack-s3-controller"));
        assert!(!out.contains("1.2.3"));
    }

    #[test]
    fn test_materialized_defaults() {
        let spec = Node::from_yaml(
            r#"
name: string | default=ack-s3-controller
namespace: string | default=ack-system
values:
  deployment:
    replicas: integer | default=1
  aws:
    region: string | default=""
"#,
        )
        .unwrap();
        let defaults = MaterializedDefaults::from_schema_spec(&spec);
        assert_eq!(defaults.len(), 4);
        assert_eq!(defaults.get("schema.spec.name"), Some("ack-s3-controller"));
        assert_eq!(defaults.get("schema.spec.values.aws.region"), Some(""));

        let mut doc = Node::from_yaml(
            "name: ${schema.spec.name}-crd-graph\nreplicas: ${schema.spec.values.deployment.replicas}\nns: _NAMESPACE_\nother: ${schema.spec.values.unknown}\n",
        )
        .unwrap();
        replace_scalars(&mut doc, Some(&defaults));

        assert_eq!(doc.str_at("name"), Some("ack-s3-controller-crd-graph"));
        assert_eq!(doc.get("replicas"), Some(&Node::from(1_i64)));
        assert_eq!(doc.str_at("ns"), Some("ack-system"));
        assert_eq!(doc.str_at("other"), Some("${schema.spec.values.unknown}"));
    }

    #[test]
    fn test_materialized_type_follows_schema() {
        let spec = Node::from_yaml(
            r#"
values:
  aws:
    accountID: string | default=123456789012
  image:
    tag: string | default=1
  enableCARM: boolean | default=true
  deployment:
    replicas: integer | default=2
"#,
        )
        .unwrap();
        let defaults = MaterializedDefaults::from_schema_spec(&spec);
        assert_eq!(
            defaults.schema_type("schema.spec.values.image.tag"),
            Some(SchemaType::String)
        );

        let mut doc = Node::from_yaml(
            r#"
env:
  value: ${schema.spec.values.aws.accountID}
tag: ${schema.spec.values.image.tag}
carm: ${schema.spec.values.enableCARM}
replicas: ${schema.spec.values.deployment.replicas}
image: repo:${schema.spec.values.image.tag}
"#,
        )
        .unwrap();
        replace_scalars(&mut doc, Some(&defaults));

        assert_eq!(doc.str_at("env.value"), Some("123456789012"));
        assert_eq!(doc.str_at("tag"), Some("1"));
        assert_eq!(doc.str_at("image"), Some("repo:1"));
        assert_eq!(doc.get("carm"), Some(&Node::from(true)));
        assert_eq!(doc.get("replicas"), Some(&Node::from(2_i64)));

        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("tag: '1'"), "{yaml}");
    }
}
