//! Schema default descriptors
//!
//! Graph schemas declare each input field as `<type> | default=<value>`.
//! The type comes from the field's dotted path, never from the value, so a
//! chart that happens to ship `replicas: "1"` still yields an integer field.

use std::fmt;

use ackrgd_core::Node;

/// Separator between the type and the default in a schema leaf
const DEFAULT_MARKER: &str = " | default=";

/// Schema field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    String,
    Boolean,
    Integer,
    StringArray,
    Object,
}

const BOOLEAN_SUFFIXES: &[&str] = &["create", "enabled", "hostnetwork", "enablecarm"];
const BOOLEAN_CONTAINS: &[&str] = &["enable_"];

const INTEGER_SUFFIXES: &[&str] = &[
    "replicas",
    "containerport",
    "defaultmaxconcurrentsyncs",
    "maxsessionduration",
    "defaultresyncperiod",
];

const ARRAY_SUFFIXES: &[&str] = &["pullsecrets", "resourcetags", ".resources"];
const ARRAY_CONTAINS: &[&str] = &["extravolume", "extraenv"];

const OBJECT_SUFFIXES: &[&str] = &[
    "labels",
    "annotations",
    "nodeselector",
    "tolerations",
    "affinity",
    "strategy",
];
const OBJECT_CONTAINS: &[&str] = &[
    "resourceresyncperiods",
    "resourcemaxconcurrentsyncs",
    "featuregates",
];

impl SchemaType {
    /// Infer the type of a field from its dotted path
    ///
    /// Matching is case-insensitive and checked in order: boolean, integer,
    /// string array, object. Anything else is a string.
    pub fn for_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        let ends = |list: &[&str]| list.iter().any(|s| lower.ends_with(s));
        let has = |list: &[&str]| list.iter().any(|s| lower.contains(s));

        if ends(BOOLEAN_SUFFIXES) || has(BOOLEAN_CONTAINS) {
            SchemaType::Boolean
        } else if ends(INTEGER_SUFFIXES) {
            SchemaType::Integer
        } else if ends(ARRAY_SUFFIXES) || has(ARRAY_CONTAINS) {
            SchemaType::StringArray
        } else if ends(OBJECT_SUFFIXES) || has(OBJECT_CONTAINS) {
            SchemaType::Object
        } else {
            SchemaType::String
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::StringArray => "string[]",
            SchemaType::Object => "object",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "string" => Some(SchemaType::String),
            "boolean" => Some(SchemaType::Boolean),
            "integer" => Some(SchemaType::Integer),
            "string[]" => Some(SchemaType::StringArray),
            "object" => Some(SchemaType::Object),
            _ => None,
        }
    }

    /// Normalize raw default text for this type
    pub fn normalize(&self, raw: &str) -> String {
        let value = raw.trim();
        match self {
            SchemaType::Boolean => match value.to_lowercase().as_str() {
                "true" => "true".to_string(),
                _ => "false".to_string(),
            },
            SchemaType::Integer if value.is_empty() => "0".to_string(),
            SchemaType::StringArray if !value.starts_with('[') => "[]".to_string(),
            SchemaType::Object if value.is_empty() => "{}".to_string(),
            // Empty lists stand for "unset"; populated ones are kept for comparison
            SchemaType::Object if value.starts_with('[') && value.ends_with(']') => {
                match Node::from_json(value) {
                    Ok(Node::Sequence(items)) if !items.is_empty() => value.to_string(),
                    _ => "{}".to_string(),
                }
            }
            SchemaType::String if value.is_empty() => "\"\"".to_string(),
            _ => value.to_string(),
        }
    }

    /// Whether two raw values are the same once normalized
    ///
    /// Collections are compared structurally, so key order and JSON spacing
    /// do not matter.
    pub fn same_value(&self, a: &str, b: &str) -> bool {
        let (a, b) = (self.normalize(a), self.normalize(b));
        match self {
            SchemaType::StringArray | SchemaType::Object => {
                match (Node::from_json(&a), Node::from_json(&b)) {
                    (Ok(left), Ok(right)) => left == right,
                    _ => a == b,
                }
            }
            _ => a == b,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<type> | default=<value>` schema leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefault {
    pub ty: SchemaType,
    /// Normalized default text
    pub value: String,
}

impl SchemaDefault {
    /// Typed default for a dotted field path
    pub fn for_path(path: &str, raw: &str) -> Self {
        let ty = SchemaType::for_path(path);
        Self {
            value: ty.normalize(raw),
            ty,
        }
    }

    /// String field default, falling back when `value` is blank
    pub fn string(value: &str, fallback: &str) -> Self {
        let chosen = if value.trim().is_empty() { fallback } else { value };
        Self {
            ty: SchemaType::String,
            value: SchemaType::String.normalize(chosen),
        }
    }

    /// `string[]` default listing `items`
    pub fn string_array(items: &[String]) -> Self {
        let value = serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string());
        Self {
            ty: SchemaType::StringArray,
            value,
        }
    }

    /// Parse a rendered schema leaf
    pub fn parse(text: &str) -> Option<Self> {
        let (ty, value) = text.split_once(DEFAULT_MARKER)?;
        Some(Self {
            ty: SchemaType::parse(ty.trim())?,
            value: value.to_string(),
        })
    }

    /// The default as literal text, with the empty-string marker unwrapped
    pub fn literal(&self) -> &str {
        if self.ty == SchemaType::String && self.value == "\"\"" {
            ""
        } else {
            &self.value
        }
    }

    pub fn to_node(&self) -> Node {
        Node::string(self.to_string())
    }
}

impl fmt::Display for SchemaDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ty, DEFAULT_MARKER, self.value)
    }
}

/// Build a nested schema tree from flattened `(dotted path, raw default)` pairs
pub fn build_default_tree<I, P, V>(entries: I) -> Node
where
    I: IntoIterator<Item = (P, V)>,
    P: AsRef<str>,
    V: AsRef<str>,
{
    let mut tree = Node::mapping();
    for (path, raw) in entries {
        let path = path.as_ref();
        tree.set_dotted(path, SchemaDefault::for_path(path, raw.as_ref()).to_node());
    }
    tree
}
