//! Placeholder templates.
//!
//! Syntax:
//! - `{{event.title}}` substitutes a scalar at a dotted path (HTML-escaped)
//! - `{{#session.topics}} ... {{/session.topics}}` repeats the body per list item
//! - inside a section: `{{.}}` is the item itself, `{{label}}` an item field,
//!   `{{@index}}` the zero-based position and `{{@delay}}` a staggered
//!   animation delay in seconds
//!
//! Rendering never substitutes an empty string for a missing value: every
//! unresolved path is collected and the render fails with all of them.

use crate::error::{SceneError, SceneResult};
use serde_json::Value;
use std::collections::BTreeSet;

/// First item's animation delay
const DELAY_BASE_SECS: f64 = 1.5;

/// Delay added per item
const DELAY_STEP_SECS: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    Section { path: String, body: Vec<Node> },
}

/// A parsed template. Its role is the file stem (e.g. "intro").
#[derive(Debug, Clone)]
pub struct Template {
    role: String,
    nodes: Vec<Node>,
}

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub role: String,
    pub contents: String,
}

impl RenderedDocument {
    pub fn file_name(&self) -> String {
        format!("{}.html", self.role)
    }
}

impl Template {
    pub fn parse(role: &str, source: &str) -> SceneResult<Self> {
        let mut stack: Vec<(String, Vec<Node>)> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                current.push(Node::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(syntax(role, "unterminated '{{'"));
            };
            let tag = after[..end].trim();
            rest = &after[end + 2..];

            if let Some(path) = tag.strip_prefix('#') {
                let path = path.trim();
                check_path(role, path)?;
                stack.push((path.to_string(), std::mem::take(&mut current)));
            } else if let Some(path) = tag.strip_prefix('/') {
                let path = path.trim();
                let Some((open, parent)) = stack.pop() else {
                    return Err(syntax(role, format!("'{{{{/{path}}}}}' closes nothing")));
                };
                if open != path {
                    return Err(syntax(
                        role,
                        format!("section '{open}' closed by '{path}'"),
                    ));
                }
                let body = std::mem::replace(&mut current, parent);
                current.push(Node::Section { path: open, body });
            } else {
                check_path(role, tag)?;
                current.push(Node::Var(tag.to_string()));
            }
        }

        if !rest.is_empty() {
            current.push(Node::Text(rest.to_string()));
        }
        if let Some((open, _)) = stack.pop() {
            return Err(syntax(role, format!("section '{open}' is never closed")));
        }

        Ok(Self {
            role: role.to_string(),
            nodes: current,
        })
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Render against the placeholder tree.
    pub fn render(&self, data: &Value) -> SceneResult<RenderedDocument> {
        let mut out = String::new();
        let mut missing = BTreeSet::new();
        render_nodes(&self.nodes, data, None, &mut out, &mut missing);

        if !missing.is_empty() {
            return Err(SceneError::UnresolvedPlaceholder {
                paths: missing.into_iter().collect(),
            });
        }
        Ok(RenderedDocument {
            role: self.role.clone(),
            contents: out,
        })
    }
}

/// Render a template source in one step.
pub fn render(role: &str, source: &str, data: &Value) -> SceneResult<RenderedDocument> {
    Template::parse(role, source)?.render(data)
}

/// Current list item while inside a section
#[derive(Clone, Copy)]
struct Scope<'a> {
    section: &'a str,
    item: &'a Value,
    index: usize,
}

fn render_nodes(
    nodes: &[Node],
    root: &Value,
    scope: Option<Scope<'_>>,
    out: &mut String,
    missing: &mut BTreeSet<String>,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(path) => match resolve_var(path, root, scope) {
                Some(value) => out.push_str(&escape_html(&value)),
                None => {
                    missing.insert(qualify(path, scope));
                }
            },
            Node::Section { path, body } => {
                let list = lookup_in_scope(path, root, scope).and_then(Value::as_array);
                let Some(items) = list else {
                    missing.insert(qualify(path, scope));
                    continue;
                };
                for (index, item) in items.iter().enumerate() {
                    let inner = Scope {
                        section: path,
                        item,
                        index,
                    };
                    render_nodes(body, root, Some(inner), out, missing);
                }
            }
        }
    }
}

fn resolve_var(path: &str, root: &Value, scope: Option<Scope<'_>>) -> Option<String> {
    match (path, scope) {
        (".", Some(s)) => scalar(s.item),
        ("@index", Some(s)) => Some(s.index.to_string()),
        ("@delay", Some(s)) => Some(format!(
            "{:.1}",
            DELAY_BASE_SECS + s.index as f64 * DELAY_STEP_SECS
        )),
        _ => lookup_in_scope(path, root, scope).and_then(scalar),
    }
}

/// Item-relative lookup first, then the root tree.
fn lookup_in_scope<'a>(path: &str, root: &'a Value, scope: Option<Scope<'a>>) -> Option<&'a Value> {
    if let Some(s) = scope {
        if let Some(found) = lookup(s.item, path) {
            return Some(found);
        }
    }
    lookup(root, path)
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |node, key| node.as_object()?.get(key))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn qualify(path: &str, scope: Option<Scope<'_>>) -> String {
    match scope {
        Some(s) => format!("{}.{}", s.section, path),
        None => path.to_string(),
    }
}

fn check_path(role: &str, path: &str) -> SceneResult<()> {
    let valid = !path.is_empty()
        && (path == "."
            || path == "@index"
            || path == "@delay"
            || path.split('.').all(|seg| {
                !seg.is_empty()
                    && seg
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }));
    if valid {
        Ok(())
    } else {
        Err(syntax(role, format!("invalid placeholder '{{{{{path}}}}}'")))
    }
}

fn syntax(role: &str, reason: impl Into<String>) -> SceneError {
    SceneError::TemplateSyntax {
        template: role.to_string(),
        reason: reason.into(),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
