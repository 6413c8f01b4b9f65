//! Arena-backed document with shadow roots.
//!
//! [`Document`] is the live tree a render environment works on. Nodes are
//! addressed by generational [`NodeId`]s, so an id held after its node was
//! removed resolves to nothing instead of to a recycled slot.
//!
//! Shadow roots are not children of their host: they hang off
//! [`ElementData::shadow_root`] and are skipped by serialization. Children of
//! a `<template>` element are inert: they never count as connected and
//! queries do not descend into them.
//!
//! Every insertion that connects elements is recorded as a [`Connection`];
//! the owning realm drains them to run custom element reactions and to feed
//! the connection observer.

pub mod serialize;

use std::fmt;

use crate::tree::{self, Node};

use self::serialize::{is_void_element, write_comment, write_end_tag, write_start_tag, write_text};

/// Identifier of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Encapsulation mode of a shadow root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShadowRootMode {
    /// Reachable from the host.
    #[default]
    Open,
    /// Hidden from the host.
    Closed,
}

impl ShadowRootMode {
    /// Value used for the `shadowrootmode` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShadowRootMode::Open => "open",
            ShadowRootMode::Closed => "closed",
        }
    }
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lowercase local name.
    pub name: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
    /// Attached shadow root, if any.
    pub shadow_root: Option<NodeId>,
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root.
    Document,
    /// An element.
    Element(ElementData),
    /// A shadow root attached to `host`.
    ShadowRoot {
        /// Host element.
        host: NodeId,
        /// Encapsulation mode.
        mode: ShadowRootMode,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

/// Errors raised by document mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The node was removed from the document.
    #[error("node {0} no longer exists")]
    StaleNode(NodeId),
    /// The operation needs an element.
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),
    /// `attach_shadow` on a host that already has a shadow root.
    #[error("element {0} already hosts a shadow root")]
    ShadowRootExists(NodeId),
    /// The insertion would create a cycle or move a root node.
    #[error("cannot insert node {child} into {parent}")]
    HierarchyRequest {
        /// Target parent.
        parent: NodeId,
        /// Node being inserted.
        child: NodeId,
    },
}

/// An element that became connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// The connected element.
    pub node: NodeId,
    /// `true` when the element lives inside a shadow tree.
    pub in_shadow_tree: bool,
}

/// Immutable copy of an element's name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    /// Lowercase local name.
    pub tag_name: String,
    /// Attributes in insertion order.
    pub attributes: Vec<(String, String)>,
}

impl ElementSnapshot {
    /// Returns the value of attribute `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if attribute `name` is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Returns the `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

/// A live document: `<html><head><meta charset="utf-8"></head><body></body></html>`.
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    connections: Vec<Connection>,
    removed: Vec<NodeId>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &(self.slots.len() - self.free.len()))
            .field("pending_connections", &self.connections.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates the document shell.
    pub fn new() -> Self {
        let unset = NodeId {
            index: 0,
            generation: 0,
        };
        let mut document = Document {
            slots: Vec::new(),
            free: Vec::new(),
            root: unset,
            head: unset,
            body: unset,
            connections: Vec::new(),
            removed: Vec::new(),
        };

        let root = document.alloc(NodeKind::Document);
        let html = document.create_element("html");
        let head = document.create_element("head");
        let meta = document.alloc(NodeKind::Element(ElementData {
            name: "meta".to_string(),
            attributes: vec![("charset".to_string(), "utf-8".to_string())],
            shadow_root: None,
        }));
        let body = document.create_element("body");
        document.link(root, html);
        document.link(html, head);
        document.link(head, meta);
        document.link(html, body);
        document.root = root;
        document.head = head;
        document.body = body;
        document
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The `<head>` element.
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// The `<body>` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    // ------------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------------

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.data = Some(data);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(data),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_ref())
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.data.as_mut())
    }

    fn data_or_err(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.data(id).ok_or(DomError::StaleNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match self.data_mut(id) {
            Some(NodeData {
                kind: NodeKind::Element(element),
                ..
            }) => Ok(element),
            Some(_) => Err(DomError::NotAnElement(id)),
            None => Err(DomError::StaleNode(id)),
        }
    }

    /// Links without recording connections (shell construction only).
    fn link(&mut self, parent: NodeId, child: NodeId) {
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
        }
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns `true` if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    /// Kind of node `id`.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.data(id).map(|data| &data.kind)
    }

    /// Element payload of `id`.
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Local name of element `id`.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    /// Parent node of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).and_then(|data| data.parent)
    }

    /// Children of `id`, including text and comments.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id)
            .map(|data| data.children.as_slice())
            .unwrap_or_default()
    }

    /// Element children of `id`.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.element(*child).is_some())
            .collect()
    }

    /// Value of attribute `name` on element `id`.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if element `id` carries attribute `name`.
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Shadow root of host `id`.
    pub fn shadow_root(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|element| element.shadow_root)
    }

    /// Mode of shadow root `id`.
    pub fn shadow_root_mode(&self, id: NodeId) -> Option<ShadowRootMode> {
        match self.kind(id) {
            Some(NodeKind::ShadowRoot { mode, .. }) => Some(*mode),
            _ => None,
        }
    }

    /// Host of shadow root `id`.
    pub fn host(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            Some(NodeKind::ShadowRoot { host, .. }) => Some(*host),
            _ => None,
        }
    }

    /// Topmost ancestor of `id`: the document, a shadow root, or a detached node.
    pub fn root_node(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Returns `true` if `id` sits in a shadow tree.
    pub fn in_shadow_tree(&self, id: NodeId) -> bool {
        matches!(
            self.kind(self.root_node(id)),
            Some(NodeKind::ShadowRoot { .. })
        )
    }

    fn has_template_ancestor(&self, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.local_name(node) == Some("template") {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Returns `true` when `id` is reachable from the document, through
    /// shadow hosts, and not inside template contents.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current != id && self.local_name(current) == Some("template") {
                return false;
            }
            match self.kind(current) {
                None => return false,
                Some(NodeKind::Document) => return true,
                Some(NodeKind::ShadowRoot { host, .. }) => current = *host,
                Some(_) => match self.parent(current) {
                    Some(parent) => current = parent,
                    None => return false,
                },
            }
        }
    }

    /// Snapshot of element `id`.
    pub fn snapshot(&self, id: NodeId) -> Option<ElementSnapshot> {
        self.element(id).map(|element| ElementSnapshot {
            tag_name: element.name.clone(),
            attributes: element.attributes.clone(),
        })
    }

    /// Descendant elements of `root` in tree order.
    ///
    /// Does not cross into shadow roots or template contents.
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_descendants(root, &mut found);
        found
    }

    fn collect_descendants(&self, parent: NodeId, found: &mut Vec<NodeId>) {
        for child in self.children(parent) {
            if let Some(element) = self.element(*child) {
                found.push(*child);
                if element.name != "template" {
                    self.collect_descendants(*child, found);
                }
            }
        }
    }

    /// Connected elements named `name`, including those in shadow trees.
    pub fn connected_elements_named(&self, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_connected(self.root, &mut |id, element, _| {
            if element.name == name {
                found.push(id);
            }
        });
        found
    }

    fn walk_connected(
        &self,
        parent: NodeId,
        visit: &mut impl FnMut(NodeId, &ElementData, bool),
    ) {
        let in_shadow = self.in_shadow_tree(parent);
        for child in self.children(parent) {
            if let Some(element) = self.element(*child) {
                visit(*child, element, in_shadow);
                if let Some(shadow) = element.shadow_root {
                    self.walk_connected(shadow, visit);
                }
                if element.name != "template" {
                    self.walk_connected(*child, visit);
                }
            }
        }
    }

    /// First light-DOM element with the given `id` attribute.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendant_elements(self.root)
            .into_iter()
            .find(|node| self.attribute(*node, "id") == Some(id))
    }

    /// Element ancestors of `id`, nearest first.
    ///
    /// Stops at the first shadow root, at the document, or at `boundary`
    /// (which is not included).
    pub fn ancestor_elements(&self, id: NodeId, boundary: Option<NodeId>) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            if Some(node) == boundary || self.element(node).is_none() {
                break;
            }
            ancestors.push(node);
            current = self.parent(node);
        }
        ancestors
    }

    // ------------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------------

    /// Creates a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeKind::Element(ElementData {
            name: name.to_ascii_lowercase(),
            attributes: Vec::new(),
            shadow_root: None,
        }))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    /// Creates a detached comment.
    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Comment(text.to_string()))
    }

    /// Attaches a shadow root to element `host`.
    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowRootMode) -> Result<NodeId, DomError> {
        let element = self.element_mut(host)?;
        if element.shadow_root.is_some() {
            return Err(DomError::ShadowRootExists(host));
        }
        let shadow = self.alloc(NodeKind::ShadowRoot { host, mode });
        self.element_mut(host)?.shadow_root = Some(shadow);
        Ok(shadow)
    }

    /// Builds a detached copy of an owned tree node.
    pub fn import_node(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Element(element) => {
                let id = self.alloc(NodeKind::Element(ElementData {
                    name: element.tag_name.to_ascii_lowercase(),
                    attributes: element.attributes.clone(),
                    shadow_root: None,
                }));
                for child in &element.children {
                    let child_id = self.import_node(child);
                    self.link(id, child_id);
                }
                id
            }
            Node::Text { value } => self.create_text(value),
            Node::Comment { value } => self.create_comment(value),
        }
    }

    /// Deep copy of `id` without shadow roots, detached.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId, DomError> {
        let kind = match &self.data_or_err(id)?.kind {
            NodeKind::Element(element) => NodeKind::Element(ElementData {
                name: element.name.clone(),
                attributes: element.attributes.clone(),
                shadow_root: None,
            }),
            NodeKind::Text(text) => NodeKind::Text(text.clone()),
            NodeKind::Comment(text) => NodeKind::Comment(text.clone()),
            NodeKind::Document | NodeKind::ShadowRoot { .. } => {
                return Err(DomError::NotAnElement(id));
            }
        };
        let copy = self.alloc(kind);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.clone_node(child)?;
            self.link(copy, child_copy);
        }
        Ok(copy)
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Inserts `child` as the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_child(parent, 0, child)
    }

    /// Inserts `child` at `index` among the children of `parent`.
    ///
    /// A child that already has a parent is moved.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), DomError> {
        self.data_or_err(parent)?;
        match self.data_or_err(child)?.kind {
            NodeKind::Document | NodeKind::ShadowRoot { .. } => {
                return Err(DomError::HierarchyRequest { parent, child });
            }
            _ => {}
        }
        let mut ancestor = Some(parent);
        while let Some(node) = ancestor {
            if node == child {
                return Err(DomError::HierarchyRequest { parent, child });
            }
            ancestor = self.parent(node);
        }

        self.detach(child)?;
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.data_mut(parent) {
            let index = index.min(data.children.len());
            data.children.insert(index, child);
        }

        if self.is_connected(parent) && self.local_name(parent) != Some("template") {
            self.record_connections(child);
        }
        Ok(())
    }

    fn record_connections(&mut self, subtree: NodeId) {
        let mut pending = Vec::new();
        let in_shadow = self.in_shadow_tree(subtree);
        if let Some(element) = self.element(subtree) {
            pending.push(Connection {
                node: subtree,
                in_shadow_tree: in_shadow,
            });
            if let Some(shadow) = element.shadow_root {
                self.walk_connected(shadow, &mut |id, _, in_shadow| {
                    pending.push(Connection {
                        node: id,
                        in_shadow_tree: in_shadow,
                    })
                });
            }
            if element.name != "template" {
                self.walk_connected(subtree, &mut |id, _, in_shadow| {
                    pending.push(Connection {
                        node: id,
                        in_shadow_tree: in_shadow,
                    })
                });
            }
        }
        self.connections.extend(pending);
    }

    /// Detaches `id` from its parent, keeping the subtree alive.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let parent = self.data_or_err(id)?.parent;
        if let Some(parent) = parent {
            if let Some(data) = self.data_mut(parent) {
                data.children.retain(|child| *child != id);
            }
            if let Some(data) = self.data_mut(id) {
                data.parent = None;
            }
        }
        Ok(())
    }

    /// Detaches and frees `id` with its subtree and shadow roots.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        let Some(data) = self.slots.get_mut(id.index as usize).and_then(|slot| {
            (slot.generation == id.generation)
                .then(|| slot.data.take())
                .flatten()
        }) else {
            return;
        };
        self.free.push(id.index);
        if let NodeKind::Element(element) = &data.kind {
            self.removed.push(id);
            if let Some(shadow) = element.shadow_root {
                self.free_subtree(shadow);
            }
        }
        for child in data.children {
            self.free_subtree(child);
        }
    }

    /// Removes and frees every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
        let children = std::mem::take(&mut self.data_mut(id).ok_or(DomError::StaleNode(id))?.children);
        for child in children {
            self.free_subtree(child);
        }
        Ok(())
    }

    /// Sets attribute `name` on element `id`.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        let name = name.to_ascii_lowercase();
        match element.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attributes.push((name, value.to_string())),
        }
        Ok(())
    }

    /// Removes attribute `name` from element `id`; returns whether it existed.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool, DomError> {
        let element = self.element_mut(id)?;
        let before = element.attributes.len();
        element.attributes.retain(|(key, _)| key != name);
        Ok(element.attributes.len() != before)
    }

    /// Parses `html` and appends the resulting nodes to `parent`.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<(), DomError> {
        for node in tree::parse_fragment_lossy(html) {
            let id = self.import_node(&node);
            self.append_child(parent, id)?;
        }
        Ok(())
    }

    /// Replaces the children of `parent` with the parsed `html`.
    pub fn set_inner_html(&mut self, parent: NodeId, html: &str) -> Result<(), DomError> {
        self.clear_children(parent)?;
        self.append_html(parent, html)
    }

    /// Drains the connection records accumulated since the last call.
    pub fn take_connections(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.connections)
    }

    /// Drains the ids of elements freed since the last call.
    pub fn take_removed(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.removed)
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serializes the children of `id` (shadow roots are not included).
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let parent_name = self.local_name(id);
        for child in self.children(id) {
            self.write_node(&mut out, *child, parent_name);
        }
        out
    }

    /// Serializes `id` itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        let parent_name = self.parent(id).and_then(|parent| self.local_name(parent));
        self.write_node(&mut out, id, parent_name);
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId, parent_name: Option<&str>) {
        match self.kind(id) {
            Some(NodeKind::Element(element)) => {
                write_start_tag(
                    out,
                    &element.name,
                    element
                        .attributes
                        .iter()
                        .map(|(key, value)| (key.as_str(), value.as_str())),
                );
                if is_void_element(&element.name) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(out, *child, Some(&element.name));
                }
                write_end_tag(out, &element.name);
            }
            Some(NodeKind::Text(text)) => write_text(out, text, parent_name),
            Some(NodeKind::Comment(text)) => write_comment(out, text),
            Some(NodeKind::Document) | Some(NodeKind::ShadowRoot { .. }) | None => {}
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell() {
        let document = Document::new();
        assert_eq!(document.local_name(document.body()), Some("body"));
        assert!(document.is_connected(document.body()));
        assert_eq!(
            document.inner_html(document.head()),
            r#"<meta charset="utf-8">"#
        );
        let html = document.children(document.root())[0];
        assert_eq!(document.local_name(html), Some("html"));
    }

    #[test]
    fn test_set_inner_html_records_connections() {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(body, "<x-a><x-b></x-b></x-a><p>t</p>")
            .unwrap();

        let names: Vec<_> = document
            .take_connections()
            .into_iter()
            .map(|c| document.local_name(c.node).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["x-a", "x-b", "p"]);
        assert!(document.take_connections().is_empty());
    }

    #[test]
    fn test_detached_insertions_are_not_connections() {
        let mut document = Document::new();
        let div = document.create_element("div");
        let span = document.create_element("span");
        document.append_child(div, span).unwrap();
        assert!(document.take_connections().is_empty());
        assert!(!document.is_connected(span));
    }

    #[test]
    fn test_template_contents_are_inert() {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(body, "<template><x-a></x-a></template>")
            .unwrap();
        let connections = document.take_connections();
        assert_eq!(connections.len(), 1, "only the template itself connects");

        let template = document.element_children(body)[0];
        let inner = document.children(template)[0];
        assert!(!document.is_connected(inner));
        assert_eq!(document.descendant_elements(body), vec![template]);
    }

    #[test]
    fn test_shadow_root() {
        let mut document = Document::new();
        let body = document.body();
        let host = document.create_element("x-host");
        document.append_child(body, host).unwrap();
        document.take_connections();

        let shadow = document.attach_shadow(host, ShadowRootMode::Open).unwrap();
        assert_eq!(document.shadow_root(host), Some(shadow));
        assert_eq!(document.host(shadow), Some(host));
        assert!(matches!(
            document.attach_shadow(host, ShadowRootMode::Open),
            Err(DomError::ShadowRootExists(_))
        ));

        document.set_inner_html(shadow, "<p>inside</p>").unwrap();
        let connections = document.take_connections();
        assert_eq!(connections.len(), 1);
        assert!(connections[0].in_shadow_tree);
        assert!(document.in_shadow_tree(connections[0].node));

        // Shadow contents never show up in the host's markup.
        assert_eq!(document.outer_html(host), "<x-host></x-host>");
        assert_eq!(document.inner_html(shadow), "<p>inside</p>");
    }

    #[test]
    fn test_remove_invalidates_ids() {
        let mut document = Document::new();
        let body = document.body();
        document.set_inner_html(body, "<x-a></x-a>").unwrap();
        let element = document.element_children(body)[0];

        document.remove(element).unwrap();
        assert!(!document.contains(element));
        assert_eq!(document.take_removed(), vec![element]);

        let reused = document.create_element("x-b");
        assert_ne!(reused, element, "recycled slot gets a new generation");
        assert_eq!(document.local_name(element), None);
        assert!(matches!(
            document.set_attribute(element, "a", "b"),
            Err(DomError::StaleNode(_))
        ));
    }

    #[test]
    fn test_insert_rejects_cycles() {
        let mut document = Document::new();
        let outer = document.create_element("div");
        let inner = document.create_element("div");
        document.append_child(outer, inner).unwrap();
        assert!(matches!(
            document.append_child(inner, outer),
            Err(DomError::HierarchyRequest { .. })
        ));
    }

    #[test]
    fn test_attributes() {
        let mut document = Document::new();
        let element = document.create_element("x-a");
        document.set_attribute(element, "SSR", "").unwrap();
        document.set_attribute(element, "foo", "1").unwrap();
        document.set_attribute(element, "foo", "2").unwrap();
        assert_eq!(document.attribute(element, "foo"), Some("2"));
        assert!(document.has_attribute(element, "ssr"));
        assert!(document.remove_attribute(element, "ssr").unwrap());
        assert!(!document.remove_attribute(element, "ssr").unwrap());
        assert_eq!(document.outer_html(element), r#"<x-a foo="2"></x-a>"#);
    }

    #[test]
    fn test_clone_node_skips_shadow_roots() {
        let mut document = Document::new();
        let body = document.body();
        document.set_inner_html(body, "<div><x-a>t</x-a></div>").unwrap();
        let div = document.element_children(body)[0];
        let host = document.element_children(div)[0];
        document.attach_shadow(host, ShadowRootMode::Open).unwrap();

        let copy = document.clone_node(div).unwrap();
        assert_eq!(document.outer_html(copy), "<div><x-a>t</x-a></div>");
        let copied_host = document.element_children(copy)[0];
        assert_eq!(document.shadow_root(copied_host), None);
    }

    #[test]
    fn test_ancestors_and_lookup() {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(body, r#"<div id="c"><section><x-a></x-a></section></div>"#)
            .unwrap();
        let container = document.get_element_by_id("c").unwrap();
        let section = document.element_children(container)[0];
        let element = document.element_children(section)[0];

        assert_eq!(
            document.ancestor_elements(element, Some(container)),
            vec![section]
        );
        assert_eq!(document.ancestor_elements(element, None).len(), 4);
    }

    #[test]
    fn test_connected_elements_named_crosses_shadow_roots() {
        let mut document = Document::new();
        let body = document.body();
        document.set_inner_html(body, "<x-a></x-a>").unwrap();
        let host = document.element_children(body)[0];
        let shadow = document.attach_shadow(host, ShadowRootMode::Open).unwrap();
        document.set_inner_html(shadow, "<x-a></x-a>").unwrap();

        assert_eq!(document.connected_elements_named("x-a").len(), 2);
    }
}
