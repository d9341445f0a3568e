//! Select/Dropdown Model Binding
//!
//! A select model is an object with an `options` array of `[value, enabled]`
//! tuples and a scalar `selectedValue`:
//!
//! ```json
//! { "selectedValue": "b", "options": [["a", true], ["b", true], ["c", false]] }
//! ```
//!
//! Bound to a `<select>`, the option list is regenerated from the tuples on
//! every rebuild. User changes write back `selectedValue` only, with the
//! element flagged as updating so propagation does not re-enter it.

use markup5ever_rcdom::Handle;

use crate::diagnostics::Level;
use crate::dom::{self, ElementSpec};
use crate::engine::EngineInner;
use crate::error::{BindError, Result};
use crate::reactive::{Field, Reactive};
use crate::registry::DeepBinding;
use crate::value::Value;

pub const OPTIONS_KEY: &str = "options";
pub const SELECTED_KEY: &str = "selectedValue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectModel {
    /// `None` when no selection is requested.
    pub selected_value: Option<String>,
    pub options: Vec<SelectOption>,
}

/// True when `field` is an object exposing `options` (array) and `selectedValue`.
pub fn is_select_model(field: &Field) -> bool {
    let Some(node) = field.as_node() else {
        return false;
    };
    if node.is_array() || !node.contains(SELECTED_KEY) {
        return false;
    }
    matches!(
        node.raw().get(&OPTIONS_KEY.into()),
        Some(Value::Container(options)) if options.is_array()
    )
}

/// Read a select model through its wrapped view.
pub fn read_model(view: &Reactive) -> Result<SelectModel> {
    let shape_error = || BindError::ShapeMismatch {
        path: view.path_string().to_string(),
        expected: "object with an `options` array",
    };

    if view.is_array() {
        return Err(shape_error());
    }
    let options_view = match view.get(OPTIONS_KEY) {
        Some(Field::Node(options)) if options.is_array() => options,
        _ => return Err(shape_error()),
    };

    let mut options = Vec::new();
    for index in 0..options_view.len() {
        let option = match options_view.get(index) {
            Some(Field::Node(tuple)) if tuple.is_array() => {
                let value = tuple.get(0usize).map(|f| f.display()).unwrap_or_default();
                let enabled = match tuple.get(1usize) {
                    Some(Field::Value(Value::Bool(enabled))) => enabled,
                    Some(Field::Value(Value::Null)) | None => true,
                    Some(other) => !other.display().is_empty(),
                };
                SelectOption { value, enabled }
            }
            Some(Field::Value(scalar)) => SelectOption {
                value: scalar.display(),
                enabled: true,
            },
            _ => return Err(shape_error()),
        };
        options.push(option);
    }

    let selected_value = match view.get(SELECTED_KEY) {
        Some(Field::Value(Value::Null)) | None => None,
        Some(field) => Some(field.display()),
    };

    Ok(SelectModel {
        selected_value,
        options,
    })
}

/// Regenerate the `<select>` options from the model in `view`.
///
/// A view that is not a select model leaves the element untouched.
pub(crate) fn rebuild(engine: &EngineInner, record: &DeepBinding, view: &Reactive) -> Result<()> {
    let model = read_model(view)?;
    render(engine, &record.node, &model, &record.path_string);
    Ok(())
}

fn render(engine: &EngineInner, select: &Handle, model: &SelectModel, path: &str) {
    dom::remove_children(select);
    for option in &model.options {
        let mut spec = ElementSpec::new("option")
            .attr("value", &option.value)
            .text(&option.value);
        if !option.enabled {
            spec = spec.attr("disabled", "");
        }
        dom::append_child(select, &dom::create_from_spec(&spec));
    }

    let Some(selected) = &model.selected_value else {
        dom::clear_selection(select);
        return;
    };
    let selectable = model
        .options
        .iter()
        .any(|o| o.enabled && &o.value == selected);
    if !selectable || !dom::select_option(select, selected) {
        dom::clear_selection(select);
        engine.log(
            Level::Warn,
            &format!("selected value '{}' is not an enabled option", selected),
            Some(path),
        );
    }
}

/// Write the element's current selection back into `selectedValue`.
pub(crate) fn write_back(engine: &EngineInner, select: &Handle, view: &Reactive) {
    let value = dom::read_value(select);
    let _guard = engine.begin_update(select);
    if value.is_empty() {
        view.set(SELECTED_KEY, Value::Null);
    } else {
        view.set(SELECTED_KEY, value);
    }
}
