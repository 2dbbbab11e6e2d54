//! Document trees with explicit traversal
//!
//! Rendered manifests, chart defaults and generated schemas are all
//! semi-structured YAML. `Node` models them as a tagged tree so that
//! "walk every scalar" and "merge two trees" are plain recursive functions
//! rather than type checks repeated at each call site.
//!
//! Mapping keys are kept in document order (`IndexMap`); call
//! [`Node::sort_keys`] when a deterministic alphabetical layout is wanted.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value as YamlValue;

/// A leaf value of a document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Borrow the string payload, if this is a string scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Textual form of the scalar, trimmed. Null renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s.trim().to_string(),
        }
    }
}

/// Tagged document tree: scalar | sequence | mapping
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Mapping(IndexMap<String, Node>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Scalar(Scalar::Null)
    }
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::Str(value.into()))
    }

    /// An empty mapping
    pub fn mapping() -> Self {
        Node::Mapping(IndexMap::new())
    }

    /// Parse a single YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let value: YamlValue = serde_yaml::from_str(yaml)?;
        Ok(Node::from(value))
    }

    /// Parse a JSON (or flow-style YAML) fragment
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Compact JSON rendering, used for collection defaults
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    /// True for null and for empty sequences or mappings
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Scalar(Scalar::Null) => true,
            Node::Scalar(_) => false,
            Node::Sequence(items) => items.is_empty(),
            Node::Mapping(map) => map.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_sequence(&self) -> Option<&Vec<Node>> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Look up a nested value by path segments
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, segment| node.get(segment.as_ref()))
    }

    /// Look up a nested value by dotted path (e.g. `image.tag`)
    pub fn get_dotted(&self, path: &str) -> Option<&Node> {
        let segments: Vec<&str> = path.split('.').collect();
        self.get_path(&segments)
    }

    /// String value at a dotted path, if present and a string
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get_dotted(path).and_then(Node::as_str)
    }

    /// Turn this node into a mapping (discarding any other content) and borrow it
    fn ensure_mapping(&mut self) -> &mut IndexMap<String, Node> {
        if !matches!(self, Node::Mapping(_)) {
            *self = Node::mapping();
        }
        match self {
            Node::Mapping(map) => map,
            _ => unreachable!("node was just replaced by a mapping"),
        }
    }

    /// Insert a child into this mapping, converting the node to a mapping first if needed
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        self.ensure_mapping().insert(key.into(), value);
    }

    /// Set a nested value, creating intermediate mappings
    ///
    /// Intermediate nodes that are not mappings are replaced. An empty path
    /// replaces the node itself.
    pub fn set_path<S: AsRef<str>>(&mut self, path: &[S], value: Node) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };

        let mut current = self;
        for segment in parents {
            current = current
                .ensure_mapping()
                .entry(segment.as_ref().to_string())
                .or_insert_with(Node::mapping);
        }
        current.insert(last.as_ref(), value);
    }

    /// Set a nested value by dotted path
    pub fn set_dotted(&mut self, path: &str, value: Node) {
        let segments: Vec<&str> = path.split('.').collect();
        self.set_path(&segments, value);
    }

    /// Visit every scalar value in the tree
    ///
    /// Mapping keys are never visited, so structural content cannot be
    /// altered by a scalar rewrite.
    pub fn walk_scalars_mut<F: FnMut(&mut Scalar)>(&mut self, f: &mut F) {
        match self {
            Node::Scalar(scalar) => f(scalar),
            Node::Sequence(items) => {
                for item in items {
                    item.walk_scalars_mut(f);
                }
            }
            Node::Mapping(map) => {
                for value in map.values_mut() {
                    value.walk_scalars_mut(f);
                }
            }
        }
    }

    /// Visit every string scalar in the tree
    pub fn walk_strings_mut<F: FnMut(&mut String)>(&mut self, mut f: F) {
        self.walk_scalars_mut(&mut |scalar: &mut Scalar| {
            if let Scalar::Str(s) = scalar {
                f(s);
            }
        });
    }

    /// Visit every mapping in the tree, parents before children
    pub fn walk_mappings_mut<F: FnMut(&mut IndexMap<String, Node>)>(&mut self, f: &mut F) {
        match self {
            Node::Scalar(_) => {}
            Node::Sequence(items) => {
                for item in items {
                    item.walk_mappings_mut(f);
                }
            }
            Node::Mapping(map) => {
                f(map);
                for value in map.values_mut() {
                    value.walk_mappings_mut(f);
                }
            }
        }
    }

    /// Deep merge `overlay` into this tree
    ///
    /// Rules:
    /// - Mappings: recursive merge
    /// - Everything else (scalars, sequences): overlay replaces base
    pub fn merge(&mut self, overlay: &Node) {
        match (self, overlay) {
            (Node::Mapping(base), Node::Mapping(over)) => {
                for (key, value) in over {
                    match base.get_mut(key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (base, over) => *base = over.clone(),
        }
    }

    /// Sort mapping keys alphabetically, recursively
    pub fn sort_keys(&mut self) {
        match self {
            Node::Scalar(_) => {}
            Node::Sequence(items) => items.iter_mut().for_each(Node::sort_keys),
            Node::Mapping(map) => {
                map.sort_keys();
                map.values_mut().for_each(Node::sort_keys);
            }
        }
    }

    /// Raw default text: scalars as plain text, collections as compact JSON
    pub fn default_text(&self) -> String {
        match self {
            Node::Scalar(scalar) => scalar.to_text(),
            other => other.to_json().unwrap_or_default(),
        }
    }
}

impl From<YamlValue> for Node {
    fn from(value: YamlValue) -> Self {
        match value {
            YamlValue::Null => Node::null(),
            YamlValue::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            YamlValue::Number(n) => match n.as_i64() {
                Some(i) => Node::Scalar(Scalar::Int(i)),
                None => Node::Scalar(Scalar::Float(n.as_f64().unwrap_or_default())),
            },
            YamlValue::String(s) => Node::string(s),
            YamlValue::Sequence(seq) => Node::Sequence(seq.into_iter().map(Node::from).collect()),
            YamlValue::Mapping(map) => Node::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_text(k), Node::from(v)))
                    .collect(),
            ),
            YamlValue::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

fn key_text(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::string(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::string(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Scalar(Scalar::Int(value))
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(scalar) => scalar.serialize(serializer),
            Node::Sequence(items) => serializer.collect_seq(items),
            Node::Mapping(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        YamlValue::deserialize(deserializer).map(Node::from)
    }
}
