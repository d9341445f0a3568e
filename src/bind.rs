//! Leaf and deep value bindings, plus the change listeners that write user
//! input back into the data graph.
//!
//! - `ez-bind="path"` binds the element value. A scalar makes a leaf
//!   binding; a container makes a deep one. A `<select>` is always deep, and
//!   whether its value is a select model is decided on every apply.
//! - `ez-bind:name="path"` binds the attribute `name`. `null`, missing and
//!   `false` remove the attribute, `true` sets it empty.

use markup5ever_rcdom::Handle;
use serde_json::Number;
use std::rc::Rc;

use crate::dom;
use crate::engine::EngineInner;
use crate::error::{BindError, Result};
use crate::path::{parse, Path};
use crate::reactive::Field;
use crate::registry::{generate_record_id, DeepBinding, LeafBinding};
use crate::select;
use crate::value::Value;

/// Registered write-back target of a value-bound form element.
#[derive(Debug, Clone)]
pub(crate) struct Listener {
    pub node: markup5ever_rcdom::WeakHandle,
    pub path: Path,
}

pub(crate) enum ValueBinding {
    Leaf(Rc<LeafBinding>),
    Deep(Rc<DeepBinding>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Bind the element's value to `path_text`, choosing leaf or deep by the current value.
pub(crate) fn bind_value(
    engine: &EngineInner,
    node: &Handle,
    path_text: &str,
) -> Option<ValueBinding> {
    if !engine.mark(node, "value") {
        return None;
    }
    let path = parse(path_text);
    let path_string = path.to_canonical();
    let current = engine.read(&path);

    let is_select = dom::has_tag(node, "select");
    let deep = is_select || current.as_ref().is_some_and(|f| f.as_node().is_some());

    if deep {
        let record = Rc::new(DeepBinding {
            id: generate_record_id(),
            node: node.clone(),
            path,
            path_string: path_string.clone(),
            is_select,
        });
        engine
            .registries
            .borrow_mut()
            .deep
            .register(&path_string, record.clone());
        engine.run_isolated(&path_string, || apply_deep_now(engine, &record));
        return Some(ValueBinding::Deep(record));
    }

    let record = Rc::new(LeafBinding {
        id: generate_record_id(),
        node: node.clone(),
        attribute: None,
        path,
        path_string: path_string.clone(),
    });
    engine
        .registries
        .borrow_mut()
        .leaf
        .register(&path_string, record.clone());
    engine.run_isolated(&path_string, || apply_leaf(engine, &record));
    Some(ValueBinding::Leaf(record))
}

/// Bind one attribute of the element to `path_text`.
pub(crate) fn bind_attribute(
    engine: &EngineInner,
    node: &Handle,
    attribute: &str,
    path_text: &str,
) -> Option<Rc<LeafBinding>> {
    if !engine.mark(node, &format!("attr:{}", attribute)) {
        return None;
    }
    let path = parse(path_text);
    let path_string = path.to_canonical();
    let record = Rc::new(LeafBinding {
        id: generate_record_id(),
        node: node.clone(),
        attribute: Some(attribute.to_string()),
        path,
        path_string: path_string.clone(),
    });
    engine
        .registries
        .borrow_mut()
        .leaf
        .register(&path_string, record.clone());
    engine.run_isolated(&path_string, || apply_leaf(engine, &record));
    Some(record)
}

/// Listen for user changes on value-bound `input`, `textarea` and `select` elements.
pub(crate) fn bind_listener(engine: &EngineInner, node: &Handle, path_text: &str) -> bool {
    let is_form_element = ["input", "textarea", "select"]
        .iter()
        .any(|tag| dom::has_tag(node, tag));
    if !is_form_element || !engine.mark(node, "listener") {
        return false;
    }
    engine.listeners.borrow_mut().insert(
        dom::node_key(node),
        Listener {
            node: Rc::downgrade(node),
            path: parse(path_text),
        },
    );
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLY
// ═══════════════════════════════════════════════════════════════════════════════

fn ensure_writable(node: &Handle, path: &str) -> Result<()> {
    if dom::can_hold_value(node) {
        return Ok(());
    }
    Err(BindError::ApplyFailed {
        path: path.to_string(),
        reason: format!(
            "<{}> cannot hold a value",
            dom::tag_name(node).unwrap_or_default()
        ),
    })
}

pub(crate) fn apply_leaf(engine: &EngineInner, record: &LeafBinding) -> Result<()> {
    let value = engine
        .read(&record.path)
        .map(|f| f.to_value())
        .unwrap_or(Value::Null);

    match &record.attribute {
        None => {
            ensure_writable(&record.node, &record.path_string)?;
            dom::write_value(&record.node, &value.display());
        }
        Some(attribute) => match value {
            Value::Null | Value::Bool(false) => {
                dom::remove_attribute(&record.node, attribute);
            }
            Value::Bool(true) => dom::set_attribute(&record.node, attribute, ""),
            other => dom::set_attribute(&record.node, attribute, &other.display()),
        },
    }
    Ok(())
}

/// Apply a deep record as propagation does: selects are refreshed on the
/// next turn, everything else is written now.
pub(crate) fn apply_deep(engine: &EngineInner, record: &Rc<DeepBinding>) -> Result<()> {
    if record.is_select {
        engine.scheduler.borrow_mut().request_select(record);
        return Ok(());
    }
    apply_deep_now(engine, record)
}

pub(crate) fn apply_deep_now(engine: &EngineInner, record: &DeepBinding) -> Result<()> {
    ensure_writable(&record.node, &record.path_string)?;
    let current = engine.read(&record.path);
    if record.is_select {
        if let Some(Field::Node(view)) = &current {
            return select::rebuild(engine, record, view);
        }
    }
    let text = current.map(|f| f.display()).unwrap_or_default();
    dom::write_value(&record.node, &text);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITE-BACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Write a user change on `node` back to its bound path. False when no
/// listener is registered for the node.
pub(crate) fn dispatch_change(engine: &EngineInner, node: &Handle) -> bool {
    let listener = engine
        .listeners
        .borrow()
        .get(&dom::node_key(node))
        .filter(|l| l.node.upgrade().is_some_and(|n| Rc::ptr_eq(&n, node)))
        .cloned();
    let Some(listener) = listener else {
        return false;
    };

    let current = engine.read(&listener.path);
    if let Some(field) = &current {
        if dom::has_tag(node, "select") && select::is_select_model(field) {
            if let Some(view) = field.as_node() {
                select::write_back(engine, node, view);
            }
            return true;
        }
    }

    let text = dom::read_value(node);
    let value = coerce_like(current.as_ref(), text);
    let _guard = engine.begin_update(node);
    engine.write_path(&listener.path, value);
    true
}

/// Keep numbers numeric when the user types a number into a numeric field.
fn coerce_like(current: Option<&Field>, text: String) -> Value {
    if let Some(Field::Value(Value::Number(_))) = current {
        if let Ok(n) = text.trim().parse::<i64>() {
            return Value::Number(Number::from(n));
        }
        if let Some(n) = text.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(text)
}
