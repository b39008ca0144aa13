// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Minimal HTML templates.
//!
//! Supported tags:
//! - `{{ path }}` value, HTML-escaped
//! - `{{{ path }}}` value, raw
//! - `{{#if path}} … {{else}} … {{/if}}`
//! - `{{#each path}} … {{/each}}`, with `this` naming the current item
//!
//! Paths are dotted (`user.name`). Inside `each` blocks a path is looked up
//! on the current item first, then on the enclosing scopes.

use std::path::Path;

use serde_json::Value;

use crate::error::{FrameworkError, Result};
use crate::util::{html_escape, is_secure_path, scalar_text};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var { path: String, raw: bool },
    If {
        path: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Each { path: String, body: Vec<Node> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Each,
}

struct Frame {
    kind: BlockKind,
    path: String,
    then: Vec<Node>,
    otherwise: Vec<Node>,
    in_else: bool,
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut root = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                push(&mut root, &mut stack, Node::Text(rest[..start].to_string()));
            }
            let after = &rest[start..];

            if let Some(inner) = after.strip_prefix("{{{") {
                let end = inner
                    .find("}}}")
                    .ok_or_else(|| template_error("Unterminated '{{{' tag"))?;
                let path = inner[..end].trim().to_string();
                if path.is_empty() {
                    return Err(template_error("Empty '{{{ }}}' tag"));
                }
                push(&mut root, &mut stack, Node::Var { path, raw: true });
                rest = &inner[end + 3..];
                continue;
            }

            let inner = &after[2..];
            let end = inner
                .find("}}")
                .ok_or_else(|| template_error("Unterminated '{{' tag"))?;
            let tag = inner[..end].trim();
            rest = &inner[end + 2..];

            if let Some(path) = tag.strip_prefix("#if ") {
                stack.push(Frame::new(BlockKind::If, path));
            } else if let Some(path) = tag.strip_prefix("#each ") {
                stack.push(Frame::new(BlockKind::Each, path));
            } else if tag == "else" {
                match stack.last_mut() {
                    Some(frame) if frame.kind == BlockKind::If && !frame.in_else => {
                        frame.in_else = true
                    }
                    _ => return Err(template_error("Unexpected '{{else}}'")),
                }
            } else if tag == "/if" || tag == "/each" {
                let kind = if tag == "/if" {
                    BlockKind::If
                } else {
                    BlockKind::Each
                };
                let frame = stack
                    .pop()
                    .filter(|f| f.kind == kind)
                    .ok_or_else(|| template_error(&format!("Unexpected '{{{{{tag}}}}}'")))?;
                let node = frame.into_node();
                push(&mut root, &mut stack, node);
            } else if tag.is_empty() || tag.starts_with('#') || tag.starts_with('/') {
                return Err(template_error(&format!("Invalid tag '{tag}'")));
            } else {
                push(
                    &mut root,
                    &mut stack,
                    Node::Var {
                        path: tag.to_string(),
                        raw: false,
                    },
                );
            }
        }

        if !rest.is_empty() {
            push(&mut root, &mut stack, Node::Text(rest.to_string()));
        }
        if let Some(frame) = stack.last() {
            return Err(template_error(&format!(
                "Unclosed block '{}'",
                frame.path
            )));
        }
        Ok(Self { nodes: root })
    }

    pub fn render(&self, data: &Value) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, &mut vec![data], &mut out);
        out
    }
}

impl Frame {
    fn new(kind: BlockKind, path: &str) -> Self {
        Self {
            kind,
            path: path.trim().to_string(),
            then: Vec::new(),
            otherwise: Vec::new(),
            in_else: false,
        }
    }

    fn into_node(self) -> Node {
        match self.kind {
            BlockKind::If => Node::If {
                path: self.path,
                then: self.then,
                otherwise: self.otherwise,
            },
            BlockKind::Each => Node::Each {
                path: self.path,
                body: self.then,
            },
        }
    }
}

fn push(root: &mut Vec<Node>, stack: &mut [Frame], node: Node) {
    match stack.last_mut() {
        Some(frame) if frame.in_else => frame.otherwise.push(node),
        Some(frame) => frame.then.push(node),
        None => root.push(node),
    }
}

fn template_error(message: &str) -> FrameworkError {
    FrameworkError::Template(message.to_string())
}

fn render_nodes<'a>(nodes: &'a [Node], scopes: &mut Vec<&'a Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { path, raw } => {
                let text = lookup(scopes, path).map(scalar_text).unwrap_or_default();
                if *raw {
                    out.push_str(&text);
                } else {
                    out.push_str(&html_escape(&text));
                }
            }
            Node::If {
                path,
                then,
                otherwise,
            } => {
                let branch = if lookup(scopes, path).is_some_and(is_truthy) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, scopes, out);
            }
            Node::Each { path, body } => {
                if let Some(Value::Array(items)) = lookup(scopes, path) {
                    for item in items {
                        scopes.push(item);
                        render_nodes(body, scopes, out);
                        scopes.pop();
                    }
                }
            }
        }
    }
}

fn lookup<'a>(scopes: &[&'a Value], path: &str) -> Option<&'a Value> {
    if path == "this" {
        return scopes.last().copied();
    }
    let path = path.strip_prefix("this.").unwrap_or(path);
    scopes.iter().rev().find_map(|scope| {
        path.split('.')
            .try_fold(*scope, |value, key| match value {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    })
}

/// Truthiness for `#if`: null, false, zero, empty strings, arrays and
/// objects are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Read, parse and render a template file.
pub fn render_file(path: &Path, data: &Value) -> Result<String> {
    if !is_secure_path(path) {
        return Err(FrameworkError::NotFound(format!(
            "The template filename '{}' contains illegal characters",
            path.display()
        )));
    }
    let source = std::fs::read_to_string(path).map_err(|e| {
        FrameworkError::Template(format!("Cannot read template '{}': {e}", path.display()))
    })?;
    Ok(Template::parse(&source)?.render(data))
}
