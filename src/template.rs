//! String-Template Renderer
//!
//! Text nodes and attribute values may carry interpolation spans delimited by
//! a fixed marker (two backticks by default): ``` ``user.name`` ```. Each span's
//! inner text is a path. Rendering replaces every span with the display form
//! of the resolved value and leaves the literal text around it untouched.
//! A record registers under every path it references, and any change to one
//! of them re-renders the whole node.

use markup5ever_rcdom::Handle;
use regex::{Captures, Regex};
use std::rc::Rc;

use crate::dom;
use crate::engine::EngineInner;
use crate::error::{BindError, Result};
use crate::path::{canonicalize, parse, prefix_relative, Path};
use crate::registry::{generate_record_id, TemplateBinding};

#[derive(Debug, Clone)]
pub struct TemplateSyntax {
    delimiter: String,
    span_re: Regex,
}

impl TemplateSyntax {
    pub fn new(delimiter: &str) -> Result<Self> {
        let escaped = regex::escape(delimiter);
        let span_re = Regex::new(&format!("(?s){0}(.*?){0}", escaped))
            .map_err(|e| BindError::Options(e.to_string()))?;
        Ok(TemplateSyntax {
            delimiter: delimiter.to_string(),
            span_re,
        })
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn has_spans(&self, text: &str) -> bool {
        self.span_re.is_match(text)
    }

    /// Canonical paths referenced by `text`, deduplicated, first occurrence first.
    pub fn keys(&self, text: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for caps in self.span_re.captures_iter(text) {
            let key = canonicalize(&caps[1]);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Replace every span with `resolve(canonical path)`.
    pub fn render(&self, text: &str, resolve: impl Fn(&str) -> String) -> String {
        self.span_re
            .replace_all(text, |caps: &Captures| resolve(&canonicalize(&caps[1])))
            .to_string()
    }

    /// Prefix every span path with a repeat item prefix (no double prefixing).
    pub fn rewrite(&self, text: &str, prefix: &Path) -> String {
        self.span_re
            .replace_all(text, |caps: &Captures| {
                format!(
                    "{0}{1}{0}",
                    self.delimiter,
                    prefix_relative(prefix, &caps[1])
                )
            })
            .to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Bind a text node whose contents carry spans. `None` when there is nothing to bind.
pub(crate) fn bind_text(engine: &EngineInner, node: &Handle) -> Option<Rc<TemplateBinding>> {
    let contents = dom::text(node)?;
    if !dom::is_text(node) || !engine.syntax.has_spans(&contents) {
        return None;
    }
    if !engine.mark(node, "template") {
        return None;
    }
    Some(register(engine, node, None, contents))
}

/// Bind one attribute whose value carries spans.
pub(crate) fn bind_attribute(
    engine: &EngineInner,
    node: &Handle,
    attribute: &str,
) -> Option<Rc<TemplateBinding>> {
    let value = dom::get_attribute(node, attribute)?;
    if !engine.syntax.has_spans(&value) {
        return None;
    }
    if !engine.mark(node, &format!("template:{}", attribute)) {
        return None;
    }
    Some(register(engine, node, Some(attribute.to_string()), value))
}

fn register(
    engine: &EngineInner,
    node: &Handle,
    attribute: Option<String>,
    template_text: String,
) -> Rc<TemplateBinding> {
    let keys = engine.syntax.keys(&template_text);
    let record = Rc::new(TemplateBinding {
        id: generate_record_id(),
        node: node.clone(),
        attribute,
        template_text,
        keys,
    });
    {
        let mut registries = engine.registries.borrow_mut();
        for key in &record.keys {
            registries.template.register(key, record.clone());
        }
    }
    let context = record.keys.join(", ");
    engine.run_isolated(&context, || apply(engine, &record));
    record
}

/// Re-render the whole template into its node.
pub(crate) fn apply(engine: &EngineInner, record: &TemplateBinding) -> Result<()> {
    let rendered = engine.syntax.render(&record.template_text, |key| {
        engine
            .read(&parse(key))
            .map(|field| field.display())
            .unwrap_or_default()
    });
    match &record.attribute {
        Some(attribute) => dom::set_attribute(&record.node, attribute, &rendered),
        None => dom::set_text(&record.node, &rendered),
    }
    Ok(())
}
