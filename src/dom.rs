//! DOM Module
//!
//! Tree plumbing over `markup5ever_rcdom`. The host hands us `Handle`s into an
//! already-parsed tree; everything here is the small set of DOM operations the
//! binder needs (`innerHTML`, `querySelectorAll`, `replaceChild`, ...).
//!
//! Nodes are reference counted, parents are held weakly, so a detached subtree
//! stays alive exactly as long as someone holds a handle into it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_fragment, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use tendril::StrTendril;

use crate::error::{BinderError, Result};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTION
// ═══════════════════════════════════════════════════════════════════════════════

fn html_name(tag: &str) -> QualName {
    QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from(tag.to_ascii_lowercase()),
    )
}

/// Create a detached element with the given tag name.
pub fn create_element(tag: &str) -> Handle {
    Node::new(NodeData::Element {
        name: html_name(tag),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Create a detached text node.
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// Parse an HTML string the way `element.innerHTML = html` would inside a
/// `<body>`, returning the resulting top-level nodes detached from any parent.
pub fn parse_fragment_nodes(html: &str) -> Vec<Handle> {
    let dom = parse_fragment(RcDom::default(), Default::default(), html_name("body"), vec![])
        .one(html);

    // html5ever puts the fragment under a synthetic <html> root
    let mut nodes = Vec::new();
    for root in dom.document.children.borrow().iter() {
        let moved: Vec<Handle> = root.children.borrow_mut().drain(..).collect();
        for node in moved {
            node.parent.set(None);
            nodes.push(node);
        }
    }
    nodes
}

/// Parse an HTML string and keep only its top-level elements.
pub fn parse_fragment_elements(html: &str) -> Vec<Handle> {
    parse_fragment_nodes(html)
        .into_iter()
        .filter(is_element)
        .collect()
}

/// Parse `html` and return its first element, detached.
pub fn create_html(html: &str) -> Option<Handle> {
    parse_fragment_elements(html).into_iter().next()
}

/// Copy a node. With `deep`, the whole subtree is copied as well.
pub fn clone_node(node: &Handle, deep: bool) -> Handle {
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
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            // <template> keeps its content in a separate fragment
            template_contents: RefCell::new(if deep {
                template_contents
                    .borrow()
                    .as_ref()
                    .map(|contents| clone_node(contents, true))
            } else {
                None
            }),
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
    if deep {
        for child in node.children.borrow().iter() {
            append_child(&copy, &clone_node(child, true));
        }
    }
    copy
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSPECTION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// Identity comparison; two handles are the same node iff they share the allocation.
pub fn same_node(a: &Handle, b: &Handle) -> bool {
    Rc::ptr_eq(a, b)
}

/// Lowercase local name of an element, `None` for other node kinds.
pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn get_attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_attribute(node: &Handle, name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            attrs.borrow().iter().any(|attr| &*attr.name.local == name)
        }
        _ => false,
    }
}

/// Set (or overwrite) an attribute. No-op on non-element nodes.
pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        if let Some(attr) = attrs.iter_mut().find(|attr| &*attr.name.local == name) {
            attr.value = StrTendril::from(value);
            return;
        }
        attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from(value),
        });
    }
}

/// The `class` attribute split on whitespace.
pub fn class_list(node: &Handle) -> Vec<String> {
    get_attribute(node, "class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Concatenated text of the node and all its descendants.
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parent(node: &Handle) -> Option<Handle> {
    // The parent lives in a Cell, so take it out and put it back.
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

pub fn parent_element(node: &Handle) -> Option<Handle> {
    parent(node).filter(is_element)
}

pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

pub fn first_element_child(node: &Handle) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|child| is_element(child))
        .cloned()
}

/// Number of ancestor elements between `node` and the top of its tree.
///
/// The document node itself is not an element, so a node directly under
/// `<html>` has depth 1 and a detached root has depth 0.
pub fn depth(node: &Handle) -> usize {
    let mut depth = 0;
    let mut current = parent_element(node);
    while let Some(element) = current {
        depth += 1;
        current = parent_element(&element);
    }
    depth
}

/// True when `node` is `ancestor` or lies inside its subtree.
pub fn contains(ancestor: &Handle, node: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if same_node(&candidate, ancestor) {
            return true;
        }
        current = parent(&candidate);
    }
    false
}

/// All descendant elements of `root` (root excluded) in document order.
pub fn descendant_elements(root: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();

    while let Some(node) = stack.pop() {
        if is_element(&node) {
            found.push(node.clone());
        }
        let children = node.children.borrow();
        stack.extend(children.iter().rev().cloned());
    }

    found
}

/// `root.querySelectorAll(...)` with a predicate instead of a selector.
pub fn query_all<F>(root: &Handle, predicate: F) -> Vec<Handle>
where
    F: Fn(&Handle) -> bool,
{
    descendant_elements(root)
        .into_iter()
        .filter(|element| predicate(element))
        .collect()
}

/// Descendants carrying `attribute`, optionally with an exact `value`.
/// Equivalent to `[attribute]` / `[attribute="value"]`.
pub fn query_by_attribute(root: &Handle, attribute: &str, value: Option<&str>) -> Vec<Handle> {
    query_all(root, |element| match value {
        Some(expected) => get_attribute(element, attribute).as_deref() == Some(expected),
        None => has_attribute(element, attribute),
    })
}

/// Walk first-element-children down to an element that has no element
/// children of its own.
pub fn deepest_first_leaf(node: &Handle) -> Handle {
    let mut current = node.clone();
    while let Some(child) = first_element_child(&current) {
        current = child;
    }
    current
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Remove `node` from its parent. Detached nodes are left as they are.
pub fn detach(node: &Handle) {
    if let Some(parent) = parent(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !same_node(child, node));
    }
    node.parent.set(None);
}

/// Append `child` to `parent`, moving it out of its current parent first.
pub fn append_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// Put `new_node` where `old` currently is. `old` ends up detached.
pub fn replace_node(old: &Handle, new_node: &Handle) -> Result<()> {
    let parent = parent(old).ok_or(BinderError::DetachedElement)?;
    detach(new_node);

    {
        let mut children = parent.children.borrow_mut();
        let index = children
            .iter()
            .position(|child| same_node(child, old))
            .ok_or(BinderError::DetachedElement)?;
        children[index] = new_node.clone();
    }

    old.parent.set(None);
    new_node.parent.set(Some(Rc::downgrade(&parent)));
    Ok(())
}

/// Detach and return every child of `node`.
pub fn remove_children(node: &Handle) -> Vec<Handle> {
    let removed: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in &removed {
        child.parent.set(None);
    }
    removed
}

/// `node.innerHTML = html`. Returns the new top-level nodes.
///
/// Bound component instances in the old content are NOT disposed; call
/// [`crate::clean_element`] first when the old content may carry any.
pub fn set_inner_html(node: &Handle, html: &str) -> Vec<Handle> {
    remove_children(node);
    let nodes = parse_fragment_nodes(html);
    for child in &nodes {
        append_child(node, child);
    }
    nodes
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

fn serialize_node(node: &Handle, traversal_scope: TraversalScope) -> String {
    let mut out = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    match serialize(&mut out, &SerializableHandle::from(node.clone()), opts) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => String::new(),
    }
}

pub fn outer_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::IncludeNode)
}

pub fn inner_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::ChildrenOnly(None))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
