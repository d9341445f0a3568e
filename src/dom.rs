//! DOM collaborator.
//!
//! The engine binds against an in-memory document made of
//! `markup5ever_rcdom` handles. Markup is parsed with html5ever; everything
//! else (queries, value access, insertion, attachment checks) is done on the
//! handles directly. A node is attached when its parent chain reaches the
//! `Document` node.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, Attribute, LocalName, Namespace, QualName};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tendril::StrTendril;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

lazy_static! {
    /// `tag`, `*`, `[attr]`, `[attr="value"]` and `tag[attr...]`
    static ref SELECTOR_RE: Regex = Regex::new(
        r#"^\s*([A-Za-z][A-Za-z0-9-]*|\*)?(?:\[\s*([^\]=\s"]+)\s*(?:=\s*"([^"]*)"\s*)?\])?\s*$"#
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING & SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// The `<body>` element of a parsed document.
pub fn body(dom: &RcDom) -> Option<Handle> {
    find_matching("body", &dom.document).into_iter().next()
}

/// Markup of `node`, including the node itself unless it is the document.
pub fn to_html(node: &Handle) -> String {
    let scope = match node.data {
        NodeData::Document => TraversalScope::ChildrenOnly(None),
        _ => TraversalScope::IncludeNode,
    };
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    if serialize(&mut bytes, &handle, opts).is_err() {
        return String::new();
    }
    String::from_utf8(bytes).unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CREATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Declarative description of an element to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSpec {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        ElementSpec {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

fn attr_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(local))
}

pub fn create_element(tag: &str) -> Handle {
    Node::new(NodeData::Element {
        name: html_name(&tag.to_ascii_lowercase()),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

pub fn create_comment(text: &str) -> Handle {
    Node::new(NodeData::Comment {
        contents: StrTendril::from_slice(text),
    })
}

pub fn create_from_spec(spec: &ElementSpec) -> Handle {
    let element = create_element(&spec.tag);
    for (name, value) in &spec.attributes {
        set_attribute(&element, name, value);
    }
    if let Some(text) = &spec.text {
        append_child(&element, &create_text(text));
    }
    for child in &spec.children {
        append_child(&element, &create_from_spec(child));
    }
    element
}

/// Copy `node` and its whole subtree. The copy has no parent.
pub fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            mathml_annotation_xml_integration_point,
            ..
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(None),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };
    let copy = Node::new(data);
    for child in children(node) {
        append_child(&copy, &deep_clone(&child));
    }
    copy
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE STRUCTURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable identity key of a node for the lifetime of the handle.
pub fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

/// True when the parent chain reaches a document node.
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if matches!(current.data, NodeData::Document) {
            return true;
        }
        match parent(&current) {
            Some(p) => current = p,
            None => return false,
        }
    }
}

/// True when `node` is `ancestor` or lies inside it.
pub fn is_within(ancestor: &Handle, node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if Rc::ptr_eq(&current, ancestor) {
            return true;
        }
        match parent(&current) {
            Some(p) => current = p,
            None => return false,
        }
    }
}

fn index_in_parent(parent: &Handle, node: &Handle) -> Option<usize> {
    parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))
}

/// Remove `node` from its parent. Detached nodes are left alone.
pub fn detach(node: &Handle) {
    let Some(parent_node) = parent(node) else {
        return;
    };
    if let Some(index) = index_in_parent(&parent_node, node) {
        parent_node.children.borrow_mut().remove(index);
    }
    node.parent.set(None);
}

pub fn append_child(parent_node: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent_node)));
    parent_node.children.borrow_mut().push(child.clone());
}

pub fn insert_before(reference: &Handle, new_node: &Handle) {
    insert_relative(reference, new_node, 0);
}

pub fn insert_after(reference: &Handle, new_node: &Handle) {
    insert_relative(reference, new_node, 1);
}

fn insert_relative(reference: &Handle, new_node: &Handle, offset: usize) {
    let Some(parent_node) = parent(reference) else {
        return;
    };
    detach(new_node);
    let Some(index) = index_in_parent(&parent_node, reference) else {
        return;
    };
    new_node.parent.set(Some(Rc::downgrade(&parent_node)));
    parent_node
        .children
        .borrow_mut()
        .insert(index + offset, new_node.clone());
}

pub fn remove_children(node: &Handle) {
    for child in children(node) {
        child.parent.set(None);
    }
    node.children.borrow_mut().clear();
}

/// `node` and all its descendants in document order.
pub fn descendants_inclusive(node: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_descendants(node, &mut out);
    out
}

fn collect_descendants(node: &Handle, out: &mut Vec<Handle>) {
    out.push(node.clone());
    for child in children(node) {
        collect_descendants(&child, out);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE KINDS, ATTRIBUTES & TEXT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

pub fn is_text(node: &Handle) -> bool {
    matches!(node.data, NodeData::Text { .. })
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn has_tag(node: &Handle, tag: &str) -> bool {
    tag_name(node)
        .map(|t| t.eq_ignore_ascii_case(tag))
        .unwrap_or(false)
}

pub fn get_attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

pub fn has_attribute(node: &Handle, name: &str) -> bool {
    get_attribute(node, name).is_some()
}

pub fn attributes(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|a| (a.name.local.to_string(), a.value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    if let Some(existing) = attrs.iter_mut().find(|a| &*a.name.local == name) {
        existing.value = StrTendril::from_slice(value);
        return;
    }
    attrs.push(Attribute {
        name: attr_name(name),
        value: StrTendril::from_slice(value),
    });
}

pub fn remove_attribute(node: &Handle, name: &str) -> bool {
    let NodeData::Element { attrs, .. } = &node.data else {
        return false;
    };
    let mut attrs = attrs.borrow_mut();
    let before = attrs.len();
    attrs.retain(|a| &*a.name.local != name);
    attrs.len() != before
}

/// Contents of a text or comment node.
pub fn text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        NodeData::Comment { contents } => Some(contents.to_string()),
        _ => None,
    }
}

pub fn set_text(node: &Handle, value: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from_slice(value);
    }
}

/// Concatenated text of every descendant text node.
pub fn text_content(node: &Handle) -> String {
    descendants_inclusive(node)
        .iter()
        .filter_map(|n| match &n.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect()
}

fn replace_text_children(node: &Handle, value: &str) {
    remove_children(node);
    if !value.is_empty() {
        append_child(node, &create_text(value));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn options(select: &Handle) -> Vec<Handle> {
    descendants_inclusive(select)
        .into_iter()
        .filter(|n| has_tag(n, "option"))
        .collect()
}

fn option_value(option: &Handle) -> String {
    get_attribute(option, "value").unwrap_or_else(|| text_content(option))
}

/// Mark the first enabled option whose value is `value` as selected.
pub fn select_option(select: &Handle, value: &str) -> bool {
    let target = options(select)
        .into_iter()
        .find(|o| option_value(o) == value && !has_attribute(o, "disabled"));
    let Some(target) = target else {
        return false;
    };
    for option in options(select) {
        remove_attribute(&option, "selected");
    }
    set_attribute(&target, "selected", "");
    true
}

pub fn clear_selection(select: &Handle) {
    for option in options(select) {
        remove_attribute(&option, "selected");
    }
}

/// Current value of a node.
///
/// Text nodes yield their contents, `input` its `value` attribute, `select`
/// the value of its selected option (`""` when none is selected), other
/// elements their text content.
pub fn read_value(node: &Handle) -> String {
    if let Some(contents) = text(node) {
        return contents;
    }
    match tag_name(node).as_deref() {
        Some("input") => get_attribute(node, "value").unwrap_or_default(),
        Some("select") => options(node)
            .into_iter()
            .find(|o| has_attribute(o, "selected"))
            .map(|o| option_value(&o))
            .unwrap_or_default(),
        Some("option") => option_value(node),
        _ => text_content(node),
    }
}

/// Write `value` into a node; the counterpart of `read_value`.
/// Void elements other than `input` have no value or content to write.
pub fn can_hold_value(node: &Handle) -> bool {
    const VOID: [&str; 12] = [
        "area", "base", "br", "col", "embed", "hr", "img", "link", "meta", "source", "track",
        "wbr",
    ];
    match tag_name(node) {
        Some(tag) => !VOID.contains(&tag.as_str()),
        None => is_text(node),
    }
}

pub fn write_value(node: &Handle, value: &str) {
    if is_text(node) {
        set_text(node, value);
        return;
    }
    match tag_name(node).as_deref() {
        Some("input") => set_attribute(node, "value", value),
        Some("select") => {
            if !select_option(node, value) {
                clear_selection(node);
            }
        }
        Some(_) => replace_text_children(node, value),
        None => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    tag: Option<String>,
    attribute: Option<(String, Option<String>)>,
}

fn parse_selector(selector: &str) -> Option<Selector> {
    let caps = SELECTOR_RE.captures(selector)?;
    let tag = caps
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|t| t != "*");
    let attribute = caps.get(2).map(|name| {
        (
            name.as_str().to_string(),
            caps.get(3).map(|v| v.as_str().to_string()),
        )
    });
    if caps.get(1).is_none() && attribute.is_none() {
        return None;
    }
    Some(Selector { tag, attribute })
}

fn selector_matches(selector: &Selector, node: &Handle) -> bool {
    let Some(tag) = tag_name(node) else {
        return false;
    };
    if let Some(expected) = &selector.tag {
        if !tag.eq_ignore_ascii_case(expected) {
            return false;
        }
    }
    match &selector.attribute {
        None => true,
        Some((name, expected)) => match (get_attribute(node, name), expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => &actual == expected,
        },
    }
}

/// True when the element `node` matches `selector`.
pub fn matches(selector: &str, node: &Handle) -> bool {
    parse_selector(selector)
        .map(|s| selector_matches(&s, node))
        .unwrap_or(false)
}

/// Descendant elements of `context` (excluding itself) matching `selector`,
/// in document order. An unsupported selector matches nothing.
pub fn find_matching(selector: &str, context: &Handle) -> Vec<Handle> {
    let Some(parsed) = parse_selector(selector) else {
        return Vec::new();
    };
    descendants_inclusive(context)
        .into_iter()
        .skip(1)
        .filter(|n| selector_matches(&parsed, n))
        .collect()
}
