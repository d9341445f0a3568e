//! Compile Entry Point
//!
//! Scans a DOM subtree and binds it, always in this order:
//!
//! 1. Expand list templates (`ez-for`). Expanded templates leave the tree,
//!    so nothing inside them is bound by the later phases; their rendered
//!    instances are compiled on their own as they are inserted.
//! 2. Bind string templates in text nodes and attribute values.
//! 3. Bind leaf/value bindings (`ez-bind`, `ez-bind:attr`).
//! 4. Bind events (write-back listeners on form elements).
//!
//! Every node is marked per binding slot, so compiling the same subtree twice
//! never binds anything twice.

use markup5ever_rcdom::Handle;
use serde::Serialize;

use crate::bind::{self, ValueBinding};
use crate::dom;
use crate::engine::EngineInner;
use crate::repeat;
use crate::template;

/// Bindings created by one compile pass. Instances rendered by a repeat are
/// compiled in passes of their own and are not counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileReport {
    pub repeats: usize,
    pub templates: usize,
    pub leaves: usize,
    pub deep: usize,
    pub listeners: usize,
}

impl CompileReport {
    pub fn total(&self) -> usize {
        self.repeats + self.templates + self.leaves + self.deep + self.listeners
    }
}

pub(crate) fn compile(engine: &EngineInner, root: &Handle) -> CompileReport {
    let mut report = CompileReport::default();
    let options = &engine.options;
    let attribute_prefix = options.attribute_binding_prefix();

    // Phase 1: list templates
    let repeat_selector = format!("[{}]", options.repeat_attribute);
    let mut candidates = Vec::new();
    if dom::matches(&repeat_selector, root) {
        candidates.push(root.clone());
    }
    candidates.extend(dom::find_matching(&repeat_selector, root));
    for element in candidates {
        // Nested templates left the tree together with their outer template.
        if !dom::is_within(root, &element) {
            continue;
        }
        if repeat::expand(engine, &element).is_some() {
            report.repeats += 1;
        }
    }
    if engine.is_marked(root, "repeat") {
        return report;
    }

    let nodes = dom::descendants_inclusive(root);

    // Phase 2: string templates
    for node in &nodes {
        if dom::is_text(node) {
            if template::bind_text(engine, node).is_some() {
                report.templates += 1;
            }
            continue;
        }
        for (name, _) in dom::attributes(node) {
            if name == options.bind_attribute
                || name == options.repeat_attribute
                || name.starts_with(&attribute_prefix)
            {
                continue;
            }
            if template::bind_attribute(engine, node, &name).is_some() {
                report.templates += 1;
            }
        }
    }

    // Phase 3: leaf/value bindings
    for node in nodes.iter().filter(|n| dom::is_element(n)) {
        if let Some(path) = dom::get_attribute(node, &options.bind_attribute) {
            match bind::bind_value(engine, node, &path) {
                Some(ValueBinding::Leaf(_)) => report.leaves += 1,
                Some(ValueBinding::Deep(_)) => report.deep += 1,
                None => {}
            }
        }
        for (name, path) in dom::attributes(node) {
            let Some(attribute) = name.strip_prefix(&attribute_prefix) else {
                continue;
            };
            if attribute.is_empty() {
                continue;
            }
            if bind::bind_attribute(engine, node, attribute, &path).is_some() {
                report.leaves += 1;
            }
        }
    }

    // Phase 4: events
    for node in nodes.iter().filter(|n| dom::is_element(n)) {
        if let Some(path) = dom::get_attribute(node, &options.bind_attribute) {
            if bind::bind_listener(engine, node, &path) {
                report.listeners += 1;
            }
        }
    }

    report
}
