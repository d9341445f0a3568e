//! Change Propagation
//!
//! Decides which binding records react to one change event, in a fixed
//! order:
//!
//! 1. **Deep records**: the record path is an ancestor of the event path, the
//!    record's current container is the event target, or the event replaced
//!    a container at an ancestor of the record path.
//! 2. **Exact** leaf, template and repeat records under the event path.
//! 3. **Descendants**, when the new value is a container: step 2 for every
//!    registry key below the event path.
//! 4. **Ancestor walk**: step 2 for every shorter prefix of the event path.
//!
//! A record reacts at most once per event. Every apply is guarded (detached
//! nodes and elements flagged as updating are skipped) and isolated (errors
//! are logged and swallowed).

use std::collections::HashSet;
use std::rc::Rc;

use crate::bind;
use crate::dom;
use crate::engine::EngineInner;
use crate::path::is_ancestor_of;
use crate::reactive::{ChangeEvent, Field};
use crate::registry::{Bound, DeepBinding, RecordId};
use crate::template;

pub(crate) fn on_change(engine: &EngineInner, event: &ChangeEvent) {
    let mut seen: HashSet<RecordId> = HashSet::new();
    let replaced_container = event
        .new_value
        .as_ref()
        .is_some_and(|value| value.is_container());

    // Step 1
    let deep: Vec<_> = engine.registries.borrow().deep.iter().cloned().collect();
    for record in deep {
        if seen.contains(&record.id) || !deep_matches(engine, &record, event, replaced_container) {
            continue;
        }
        seen.insert(record.id);
        if is_live(engine, &*record) {
            engine.run_isolated(&record.path_string, || bind::apply_deep(engine, &record));
        }
    }

    // Step 2
    apply_exact(engine, &event.path_string, &mut seen);

    // Step 3
    if replaced_container {
        let keys = engine
            .registries
            .borrow()
            .descendants_of(&event.path_string);
        for key in keys {
            apply_exact(engine, &key, &mut seen);
        }
    }

    // Step 4
    let mut current = event.path.clone();
    while let Some(parent) = current.parent() {
        apply_exact(engine, &parent.to_canonical(), &mut seen);
        current = parent;
    }
}

fn deep_matches(
    engine: &EngineInner,
    record: &Rc<DeepBinding>,
    event: &ChangeEvent,
    replaced_container: bool,
) -> bool {
    if is_ancestor_of(&record.path_string, &event.path_string) {
        return true;
    }
    if replaced_container && is_ancestor_of(&event.path_string, &record.path_string) {
        return true;
    }
    match engine.read(&record.path) {
        Some(Field::Node(view)) => view.raw().ptr_eq(&event.target),
        _ => false,
    }
}

/// Step 2: leaf, template and repeat records registered under exactly `key`.
fn apply_exact(engine: &EngineInner, key: &str, seen: &mut HashSet<RecordId>) {
    let (leaves, templates, repeats) = {
        let registries = engine.registries.borrow();
        (
            registries.leaf.exact(key),
            registries.template.exact(key),
            registries.repeat.exact(key),
        )
    };

    for record in leaves {
        if seen.insert(record.id) && is_live(engine, &*record) {
            engine.run_isolated(&record.path_string, || bind::apply_leaf(engine, &record));
        }
    }
    for record in templates {
        if seen.insert(record.id) && is_live(engine, &*record) {
            engine.run_isolated(key, || template::apply(engine, &record));
        }
    }
    for record in repeats {
        if seen.insert(record.id) && is_live(engine, &*record) {
            engine.scheduler.borrow_mut().request_repeat(&record);
        }
    }
}

/// Detached-node and feedback guard run before every apply.
///
/// A text node without a parent fails the attachment walk on its first step.
pub(crate) fn is_live(engine: &EngineInner, record: &dyn Bound) -> bool {
    let node = record.node();
    !engine.is_updating(node) && dom::is_attached(node)
}
