//! Template condition to CEL transpiler
//!
//! Chart templates gate resources with `{{- if ... }}` blocks. This module
//! extracts those blocks and rewrites the small condition grammar found in
//! ACK charts into CEL, so the generated graph can carry the same gates as
//! `includeWhen` expressions.
//!
//! | Template condition                 | CEL                                          |
//! |------------------------------------|----------------------------------------------|
//! | `gt (int .Values.x) 1`             | `int(schema.spec.values.x) > 1`              |
//! | `eq .Values.scope "namespace"`     | `schema.spec.values.scope == "namespace"`    |
//! | `or .Values.a .Values.b`           | `schema.spec.values.a \|\| schema.spec.values.b` |
//! | `.Values.a not .Values.b`          | `schema.spec.values.a !schema.spec.values.b` |
//!
//! The grammar is not a general expression language. `or` and `and` take
//! exactly two whitespace-free operands.

use once_cell::sync::Lazy;
use regex::Regex;

/// Field prefix used by chart templates
const VALUES_PREFIX: &str = ".Values.";

/// Field prefix the graph schema exposes chart values under
pub const SCHEMA_VALUES_PREFIX: &str = "schema.spec.values.";

/// Kind recorded for blocks without a `kind:` line
pub const UNKNOWN_KIND: &str = "Unknown";

/// Compiled patterns, built once and shared read-only
struct Patterns {
    if_block: Regex,
    kind: Regex,
    gt: Regex,
    lt: Regex,
    eq: Regex,
    ne: Regex,
    int_wrapper: Regex,
    or: Regex,
    and: Regex,
    int_call: Regex,
}

impl Patterns {
    fn compile() -> Self {
        let re = |pattern: &str| Regex::new(pattern).expect("valid regex");
        Self {
            if_block: re(r"(?s)\{\{-?\s*if\s+(.+?)\s*-?\}\}(.*?)\{\{-?\s*end\s*-?\}\}"),
            kind: re(r"kind:\s*(\w+)"),
            gt: re(r"gt\s+\(([^)]+)\)\s+(\d+)"),
            lt: re(r"lt\s+\(([^)]+)\)\s+(\d+)"),
            eq: re(r#"eq\s+([^\s]+)\s+"([^"]*)""#),
            ne: re(r#"ne\s+([^\s]+)\s+"([^"]*)""#),
            int_wrapper: re(r"\(int\s+([^)]+)\)"),
            or: re(r"\bor\s+(\S+)\s+(\S+)"),
            and: re(r"\band\s+(\S+)\s+(\S+)"),
            int_call: re(r"int\s+(schema\.\S+?)(\s|>|<|==|!=|$|\|)"),
        }
    }
}

static PATTERNS: Lazy<Patterns> = Lazy::new(Patterns::compile);

/// A conditional block found in a template
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Condition text as written in the template
    pub source_expression: String,
    /// CEL translation of `source_expression`
    pub cel: String,
    /// Text enclosed by the block
    pub block: String,
    /// First `kind:` inside the block, or [`UNKNOWN_KIND`]
    pub kind: String,
    /// Template path the block was found in
    pub source_path: String,
}

impl Condition {
    /// Whether this condition gates a resource of `kind`
    ///
    /// Matches on the captured kind, or on the block text containing a
    /// `kind: <Kind>` line, since one block may enclose several documents.
    pub fn matches_kind(&self, kind: &str) -> bool {
        self.kind == kind || self.block.contains(&format!("kind: {}", kind))
    }

    /// Simplified CEL when it refers to schema values, otherwise `None`
    pub fn gate(&self) -> Option<String> {
        let cel = simplify(&self.cel);
        (!cel.is_empty() && cel.contains(SCHEMA_VALUES_PREFIX)).then_some(cel)
    }
}

/// Find every `if ... end` block in a template
pub fn extract_conditions(source_path: &str, content: &str) -> Vec<Condition> {
    PATTERNS
        .if_block
        .captures_iter(content)
        .map(|caps| {
            let expression = caps[1].trim().to_string();
            let block = caps[2].to_string();
            Condition {
                cel: to_cel(&expression),
                kind: block_kind(&block),
                source_expression: expression,
                block,
                source_path: source_path.to_string(),
            }
        })
        .collect()
}

fn block_kind(block: &str) -> String {
    PATTERNS
        .kind
        .captures(block)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNKNOWN_KIND.to_string())
}

/// Translate a template condition into CEL
pub fn to_cel(expression: &str) -> String {
    let p = &*PATTERNS;

    let expr = p.gt.replace_all(expression, "${1} > ${2}");
    let expr = p.lt.replace_all(&expr, "${1} < ${2}");
    let expr = p.eq.replace_all(&expr, r#"${1} == "${2}""#);
    let expr = p.ne.replace_all(&expr, r#"${1} != "${2}""#);

    // Left unparenthesized until field references are rewritten
    let expr = p.int_wrapper.replace_all(&expr, "int ${1}");

    let expr = p.or.replace_all(&expr, "${1} || ${2}");
    let expr = p.and.replace_all(&expr, "${1} && ${2}");

    let expr = expr.replace(VALUES_PREFIX, SCHEMA_VALUES_PREFIX);
    let expr = p.int_call.replace_all(&expr, "int(${1})${2}");

    let expr = format!(" {}", expr).replace(" not ", " !");

    expr.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop double negation and tautological boolean comparisons
///
/// Applied until the text stops changing, so the result is a fixed point.
pub fn simplify(cel: &str) -> String {
    let mut current = cel.trim().to_string();
    loop {
        let next = current
            .replace("! !", "")
            .replace(" == true", "")
            .replace(" != false", "")
            .trim()
            .to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `includeWhen` gates for a resource rendered from `source_path`
///
/// Only conditions from the same template apply. Each gate is wrapped as
/// `${<cel>}` and duplicates are dropped, keeping first-seen order.
pub fn gates_for(conditions: &[Condition], source_path: Option<&str>, kind: &str) -> Vec<String> {
    let Some(source_path) = source_path else {
        return Vec::new();
    };

    let mut gates: Vec<String> = Vec::new();
    for condition in conditions
        .iter()
        .filter(|c| c.source_path == source_path && c.matches_kind(kind))
    {
        if let Some(cel) = condition.gate() {
            let gate = format!("${{{}}}", cel);
            if !gates.contains(&gate) {
                gates.push(gate);
            }
        }
    }
    gates
}
