//! Binding Registries
//!
//! Four insertion-ordered maps from canonical path string to binding records.
//! Registration only appends; records are never removed one by one. A record
//! whose node left the document stays registered and is skipped at apply
//! time, until the host asks for `Engine::compact()`.

use markup5ever_rcdom::Handle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::path::{is_descendant_of, Path};

pub type RecordId = u64;

static RECORD_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn generate_record_id() -> RecordId {
    RECORD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// What every record exposes to propagation and compaction.
pub trait Bound {
    fn id(&self) -> RecordId;
    /// Node whose attachment decides whether the record is live.
    fn node(&self) -> &Handle;
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDING RECORDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Scalar written into one element's value, or one of its attributes.
#[derive(Debug)]
pub struct LeafBinding {
    pub id: RecordId,
    pub node: Handle,
    pub attribute: Option<String>,
    pub path: Path,
    pub path_string: String,
}

/// Binding that reacts to any change inside the bound container.
#[derive(Debug)]
pub struct DeepBinding {
    pub id: RecordId,
    pub node: Handle,
    pub path: Path,
    pub path_string: String,
    /// Bound to a `<select>`: a `{selectedValue, options}` model is
    /// rebuilt on the next turn, any other value just picks an option.
    pub is_select: bool,
}

/// Text node or attribute value carrying interpolation spans.
#[derive(Debug)]
pub struct TemplateBinding {
    pub id: RecordId,
    pub node: Handle,
    pub attribute: Option<String>,
    pub template_text: String,
    /// Canonical paths referenced by the spans, first occurrence order.
    pub keys: Vec<String>,
}

/// Template repeated once per item of the array at `source_path`.
#[derive(Debug)]
pub struct RepeatBinding {
    pub id: RecordId,
    pub source_path: Path,
    pub source_string: String,
    /// Comment node left where the template element stood.
    pub anchor: Handle,
    /// Detached pristine copy of the template element.
    pub template: Handle,
    /// Rendered instances in document order.
    pub rendered: RefCell<Vec<Handle>>,
}

impl Bound for LeafBinding {
    fn id(&self) -> RecordId {
        self.id
    }
    fn node(&self) -> &Handle {
        &self.node
    }
}

impl Bound for DeepBinding {
    fn id(&self) -> RecordId {
        self.id
    }
    fn node(&self) -> &Handle {
        &self.node
    }
}

impl Bound for TemplateBinding {
    fn id(&self) -> RecordId {
        self.id
    }
    fn node(&self) -> &Handle {
        &self.node
    }
}

impl Bound for RepeatBinding {
    fn id(&self) -> RecordId {
        self.id
    }
    fn node(&self) -> &Handle {
        &self.anchor
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Registry<T> {
    order: Vec<String>,
    entries: HashMap<String, Vec<Rc<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Registry {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<T: Bound> Registry<T> {
    pub fn register(&mut self, key: &str, record: Rc<T>) {
        if !self.entries.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.entries.entry(key.to_string()).or_default().push(record);
    }

    /// Records registered under exactly `key`, in registration order.
    pub fn exact(&self, key: &str) -> Vec<Rc<T>> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Registered keys strictly below `key`, in first-registration order.
    pub fn descendants_of(&self, key: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| is_descendant_of(k, key))
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Every record, grouped by key in first-registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> + '_ {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k))
            .flat_map(|records| records.iter())
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep records for which `keep` holds; returns how many were dropped.
    ///
    /// A record registered under several keys is dropped from all of them.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut dropped = 0;
        for records in self.entries.values_mut() {
            let before = records.len();
            records.retain(|r| keep(&**r));
            dropped += before - records.len();
        }
        self.entries.retain(|_, records| !records.is_empty());
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        dropped
    }
}

/// The four registries of one engine instance.
#[derive(Debug, Default)]
pub struct Registries {
    pub leaf: Registry<LeafBinding>,
    pub deep: Registry<DeepBinding>,
    pub template: Registry<TemplateBinding>,
    pub repeat: Registry<RepeatBinding>,
}

/// Record counts per registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub leaf: usize,
    pub deep: usize,
    pub template: usize,
    pub repeat: usize,
}

impl Registries {
    /// Every registry key strictly below `key`, deduplicated, leaf keys first.
    pub fn descendants_of(&self, key: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for candidate in self
            .leaf
            .descendants_of(key)
            .into_iter()
            .chain(self.template.descendants_of(key))
            .chain(self.repeat.descendants_of(key))
        {
            if !keys.contains(&candidate) {
                keys.push(candidate);
            }
        }
        keys
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            leaf: self.leaf.len(),
            deep: self.deep.len(),
            template: self.template.len(),
            repeat: self.repeat.len(),
        }
    }
}
