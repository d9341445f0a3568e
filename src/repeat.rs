//! List Repeater
//!
//! An element carrying the repeat attribute (`ez-for="items"`) becomes a
//! template: it is replaced by an anchor comment and kept detached. Every
//! rebuild throws the previous instances away and renders one clone per
//! array item right after the anchor.
//!
//! ## Rebuild
//!
//! 1. Resolve the source path. Not an array: warn and render nothing.
//! 2. Detach every previously rendered instance.
//! 3. For `i` from `len - 1` down to `0`: clone the template, strip the repeat
//!    attribute, prefix every bound path and template key with `source[i]`,
//!    insert right after the anchor, compile the clone.
//!
//! Inserting from the end keeps the final order `0..len` without looking up
//! sibling positions. Paths inside a nested repeat template are left for that
//! repeat to prefix, so they stay relative to the inner item.

use markup5ever_rcdom::Handle;
use std::cell::RefCell;
use std::rc::Rc;

use crate::compile;
use crate::diagnostics::Level;
use crate::dom;
use crate::engine::EngineInner;
use crate::error::{BindError, Result};
use crate::path::{parse, prefix_relative, Path, PathKey};
use crate::reactive::Field;
use crate::registry::{generate_record_id, RepeatBinding};

/// Turn a template-bearing element into a repeat binding and render it once.
pub(crate) fn expand(engine: &EngineInner, element: &Handle) -> Option<Rc<RepeatBinding>> {
    let source = dom::get_attribute(element, &engine.options.repeat_attribute)?;
    if !engine.mark(element, "repeat") {
        return None;
    }
    let source_path = parse(&source);
    let source_string = source_path.to_canonical();

    let anchor = dom::create_comment(&format!(
        " {}: {} ",
        engine.options.anchor_label, source_string
    ));
    dom::insert_before(element, &anchor);
    dom::detach(element);

    let record = Rc::new(RepeatBinding {
        id: generate_record_id(),
        source_path,
        source_string: source_string.clone(),
        anchor,
        template: dom::deep_clone(element),
        rendered: RefCell::new(Vec::new()),
    });
    engine
        .registries
        .borrow_mut()
        .repeat
        .register(&source_string, record.clone());

    engine.run_isolated(&source_string, || rebuild(engine, &record));
    Some(record)
}

pub(crate) fn rebuild(engine: &EngineInner, record: &RepeatBinding) -> Result<()> {
    clear(record);
    if dom::parent(&record.anchor).is_none() {
        return Err(BindError::Detached {
            path: record.source_string.clone(),
        });
    }

    let length = match engine.read(&record.source_path) {
        Some(Field::Node(items)) if items.is_array() => items.len(),
        _ => {
            engine.log(
                Level::Warn,
                "repeat source is not an array; rendering nothing",
                Some(&record.source_string),
            );
            return Ok(());
        }
    };

    let mut rendered = Vec::with_capacity(length);
    for index in (0..length).rev() {
        let instance = dom::deep_clone(&record.template);
        dom::remove_attribute(&instance, &engine.options.repeat_attribute);
        let prefix = record.source_path.child(PathKey::Index(index));
        rewrite_paths(engine, &instance, &prefix, true);
        dom::insert_after(&record.anchor, &instance);
        rendered.insert(0, instance.clone());
        compile::compile(engine, &instance);
    }
    *record.rendered.borrow_mut() = rendered;
    Ok(())
}

/// Detach every rendered instance. Their bindings go inert.
fn clear(record: &RepeatBinding) {
    let previous = std::mem::take(&mut *record.rendered.borrow_mut());
    for instance in previous {
        dom::detach(&instance);
    }
}

/// Prefix bound paths and template keys in `node`'s subtree.
fn rewrite_paths(engine: &EngineInner, node: &Handle, prefix: &Path, is_root: bool) {
    let options = &engine.options;
    let attribute_prefix = options.attribute_binding_prefix();

    if dom::is_text(node) {
        if let Some(text) = dom::text(node) {
            if engine.syntax.has_spans(&text) {
                dom::set_text(node, &engine.syntax.rewrite(&text, prefix));
            }
        }
        return;
    }

    // A nested repeat only gets its source prefixed; the rest of it stays
    // relative to its own items.
    if !is_root {
        if let Some(source) = dom::get_attribute(node, &options.repeat_attribute) {
            dom::set_attribute(
                node,
                &options.repeat_attribute,
                &prefix_relative(prefix, &source),
            );
            return;
        }
    }

    for (name, value) in dom::attributes(node) {
        let rewritten = if name == options.bind_attribute || name.starts_with(&attribute_prefix)
        {
            prefix_relative(prefix, &value)
        } else if engine.syntax.has_spans(&value) {
            engine.syntax.rewrite(&value, prefix)
        } else {
            continue;
        };
        if rewritten != value {
            dom::set_attribute(node, &name, &rewritten);
        }
    }

    for child in dom::children(node) {
        rewrite_paths(engine, &child, prefix, false);
    }
}
