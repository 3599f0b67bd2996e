//! Denial templates
//!
//! The gate renders three templates:
//!
//! - `seb-403-error-message`: fragment embedded in the courseware page
//! - `seb-403`: full-page denial with the course menu
//! - `seb-chrome`: theme chrome wrapped around full pages
//!
//! Built-in templates use a small mustache-like syntax: `{{name}}` inserts
//! an escaped value, `{{{name}}}` inserts raw markup, and
//! `{{#name}}…{{/name}}` / `{{^name}}…{{/name}}` render a section when the
//! value is truthy / falsy. A section over an array renders once per item.
//! Dotted names walk nested objects.

use crate::error::RenderError;
use serde_json::Value;
use std::collections::HashMap;

/// In-page denial fragment
pub const FRAGMENT_TEMPLATE: &str = "seb-403-error-message";

/// Full-page denial
pub const PAGE_TEMPLATE: &str = "seb-403";

/// Theme chrome around full pages
pub const CHROME_TEMPLATE: &str = "seb-chrome";

const FRAGMENT_HTML: &str = include_str!("../../assets/templates/seb-403-error-message.html");
const PAGE_HTML: &str = include_str!("../../assets/templates/seb-403.html");
const CHROME_HTML: &str = include_str!("../../assets/templates/seb-chrome.html");

/// Renders a named template against a JSON context
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError>;
}

/// Templates compiled into the binary
#[derive(Debug, Clone)]
pub struct BuiltinTemplates {
    sources: HashMap<String, String>,
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTemplates {
    pub fn new() -> Self {
        let sources = [
            (FRAGMENT_TEMPLATE, FRAGMENT_HTML),
            (PAGE_TEMPLATE, PAGE_HTML),
            (CHROME_TEMPLATE, CHROME_HTML),
        ]
        .into_iter()
        .map(|(name, html)| (name.to_string(), html.to_string()))
        .collect();
        Self { sources }
    }

    /// Replace or add a template
    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(name.into(), source.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError> {
        let source = self
            .sources
            .get(template)
            .ok_or_else(|| RenderError::NotFound(template.to_string()))?;
        let mut scopes = vec![context];
        render_section(source, &mut scopes).map_err(|reason| RenderError::Failed {
            template: template.to_string(),
            reason,
        })
    }
}

fn render_section<'a>(source: &str, scopes: &mut Vec<&'a Value>) -> Result<String, String> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tag_start = &rest[start..];

        if let Some(body) = tag_start.strip_prefix("{{{") {
            let end = body
                .find("}}}")
                .ok_or_else(|| "unclosed '{{{' tag".to_string())?;
            out.push_str(&to_text(lookup(scopes, body[..end].trim())));
            rest = &body[end + 3..];
            continue;
        }

        let body = &tag_start[2..];
        let end = body
            .find("}}")
            .ok_or_else(|| "unclosed '{{' tag".to_string())?;
        let tag = body[..end].trim();
        rest = &body[end + 2..];

        if let Some(name) = tag.strip_prefix('#').or_else(|| tag.strip_prefix('^')) {
            let name = name.trim();
            let close = format!("{{{{/{}}}}}", name);
            let close_at = rest
                .find(&close)
                .ok_or_else(|| format!("section '{}' is not closed", name))?;
            let inner = &rest[..close_at];
            rest = &rest[close_at + close.len()..];

            let value = lookup(scopes, name);
            if tag.starts_with('^') {
                if !is_truthy(value) {
                    out.push_str(&render_section(inner, scopes)?);
                }
                continue;
            }

            match value {
                Some(Value::Array(items)) => {
                    for item in items {
                        scopes.push(item);
                        let rendered = render_section(inner, scopes);
                        scopes.pop();
                        out.push_str(&rendered?);
                    }
                }
                Some(object @ Value::Object(_)) => {
                    scopes.push(object);
                    let rendered = render_section(inner, scopes);
                    scopes.pop();
                    out.push_str(&rendered?);
                }
                value if is_truthy(value) => out.push_str(&render_section(inner, scopes)?),
                _ => {}
            }
        } else if let Some(name) = tag.strip_prefix('/') {
            return Err(format!("unexpected close of section '{}'", name.trim()));
        } else {
            out.push_str(&escape_html(&to_text(lookup(scopes, tag))));
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Resolve a dotted name, innermost scope first
fn lookup<'a>(scopes: &[&'a Value], name: &str) -> Option<&'a Value> {
    if name == "." {
        return scopes.last().copied();
    }

    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = scopes.iter().rev().find_map(|scope| scope.get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Object(_)) => true,
    }
}

fn to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Escape text for inclusion in HTML element content or attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
