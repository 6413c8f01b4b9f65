//! Shadow-tree serialization into declarative shadow DOM.
//!
//! For every eligible element, post-order:
//!
//! 1. apply properties from the `get_element_properties` hook;
//! 2. wait until the element is ready to be read;
//! 3. serialize eligible elements of its shadow tree, concurrently;
//! 4. prepend `<template shadowrootmode="…">` with a copy of the shadow root;
//! 5. drop the SSR marker attribute;
//! 6. extract critical CSS for its tag, stripping the live shadow root's
//!    fallback styles.
//!
//! Each element yields a [`NodeOutcome`]; what a failure does to the request
//! is decided by the request's [`FailurePolicy`](crate::FailurePolicy).

use futures::future::{LocalBoxFuture, join_all};
use serde::Serialize;

use crate::context::Bridge;
use crate::critical_css::extract_critical_css;
use crate::dom::{Document, DomError, ElementSnapshot, NodeId};
use crate::options::{PropertyContext, RenderSelection};
use crate::selector::ssr_marker;

/// Why an element is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Marker attribute, server render flag or `render_elements`: a missing
    /// shadow root is a failure.
    Explicit,
    /// Any defined custom element: skipped without a shadow root.
    Implicit,
    /// Not serialized.
    No,
}

/// What happened to one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    /// A declarative template was inserted.
    Wrapped,
    /// Nothing to serialize.
    Skipped,
    /// Serialization failed.
    Failed(String),
}

/// Outcome of one element and of its shadow-tree descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    /// Tag name.
    pub tag: String,
    /// What happened to this element.
    pub status: NodeStatus,
    /// Outcomes of the eligible elements in its shadow tree.
    pub children: Vec<NodeOutcome>,
}

impl NodeOutcome {
    fn new(tag: String, status: NodeStatus) -> Self {
        Self {
            tag,
            status,
            children: Vec::new(),
        }
    }

    /// Every failure in this subtree, children first.
    pub fn failures(&self) -> Vec<SerializationFailure> {
        let mut failures = Vec::new();
        self.collect_failures(&mut failures);
        failures
    }

    fn collect_failures(&self, failures: &mut Vec<SerializationFailure>) {
        for child in &self.children {
            child.collect_failures(failures);
        }
        if let NodeStatus::Failed(message) = &self.status {
            failures.push(SerializationFailure {
                tag: self.tag.clone(),
                message: message.clone(),
            });
        }
    }
}

/// A failed element, reported in [`RenderResult::failures`](crate::RenderResult).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializationFailure {
    /// Tag name.
    pub tag: String,
    /// What went wrong.
    pub message: String,
}

/// Classifies element `node` under the request's selection rules.
pub(crate) fn eligibility(bridge: &Bridge, node: NodeId) -> Eligibility {
    let document = bridge.realm.document();
    let Some(element) = document.element(node) else {
        return Eligibility::No;
    };
    let registry = bridge.realm.registry();
    let options = &bridge.context.options;

    if ssr_marker(&element.attributes).is_some()
        || registry.is_ssr_eligible(&element.name)
        || options.render_elements.iter().any(|name| *name == element.name)
    {
        return Eligibility::Explicit;
    }
    if options.selection == RenderSelection::AllDefined && registry.is_defined(&element.name) {
        return Eligibility::Implicit;
    }
    Eligibility::No
}

/// Serializes `node` and, first, the eligible elements of its shadow tree.
pub(crate) fn serialize_element(bridge: Bridge, node: NodeId) -> LocalBoxFuture<'static, NodeOutcome> {
    Box::pin(async move {
        let selected = eligibility(&bridge, node);
        let Some(tag) = bridge
            .realm
            .document()
            .local_name(node)
            .map(str::to_string)
        else {
            return NodeOutcome::new(String::new(), NodeStatus::Failed("element was removed".into()));
        };
        if selected == Eligibility::No {
            return NodeOutcome::new(tag, NodeStatus::Skipped);
        }

        apply_properties(&bridge, node);
        wait_until_ready(&bridge, node).await;

        let Some(shadow) = bridge.realm.document().shadow_root(node) else {
            let status = if selected == Eligibility::Explicit {
                log::warn!("⚠️ <{}> is marked for server rendering but has no shadow root", tag);
                NodeStatus::Failed("element has no shadow root".to_string())
            } else {
                NodeStatus::Skipped
            };
            return NodeOutcome::new(tag, status);
        };

        if has_declarative_template(&bridge.realm.document(), node) {
            log::debug!("<{}> already carries a declarative template", tag);
            return NodeOutcome::new(tag, NodeStatus::Skipped);
        }

        let nested: Vec<NodeId> = {
            let candidates = bridge.realm.document().descendant_elements(shadow);
            candidates
                .into_iter()
                .filter(|child| eligibility(&bridge, *child) != Eligibility::No)
                .collect()
        };
        let children = join_all(
            nested
                .into_iter()
                .map(|child| serialize_element(bridge.clone(), child)),
        )
        .await;

        let status = match wrap(&bridge, node, shadow) {
            Ok(()) => NodeStatus::Wrapped,
            Err(e) => {
                log::warn!("⚠️ Failed to serialize <{}>: {}", tag, e);
                NodeStatus::Failed(e.to_string())
            }
        };
        NodeOutcome {
            tag,
            status,
            children,
        }
    })
}

fn apply_properties(bridge: &Bridge, node: NodeId) {
    let Some(hook) = bridge.context.options.get_element_properties.clone() else {
        return;
    };

    let (snapshot, ancestors, host, previous, next) = {
        let document = bridge.realm.document();
        let Some(snapshot) = document.snapshot(node) else {
            return;
        };
        let container = document.get_element_by_id(&bridge.context.options.container_el_id);
        let ancestors = snapshots(&document, document.ancestor_elements(node, container));
        let host = document
            .host(document.root_node(node))
            .and_then(|host| document.snapshot(host));
        let (previous, next) = sibling_snapshots(&document, node);
        (snapshot, ancestors, host, previous, next)
    };

    let context = PropertyContext {
        data: &bridge.context.options.data,
        ancestor_elements: &ancestors,
        host_element: host.as_ref(),
        previous_sibling_elements: &previous,
        next_sibling_elements: &next,
    };
    let Some(properties) = hook(&snapshot, &context) else {
        return;
    };
    let Some(instance) = bridge.realm.instance(node) else {
        log::debug!("<{}> has no component to receive properties", snapshot.tag_name);
        return;
    };
    if instance.set_properties(&properties) {
        bridge.realm.request_update(&instance);
    }
}

fn snapshots(document: &Document, nodes: Vec<NodeId>) -> Vec<ElementSnapshot> {
    nodes
        .into_iter()
        .filter_map(|node| document.snapshot(node))
        .collect()
}

fn sibling_snapshots(document: &Document, node: NodeId) -> (Vec<ElementSnapshot>, Vec<ElementSnapshot>) {
    let Some(parent) = document.parent(node) else {
        return (Vec::new(), Vec::new());
    };
    let siblings = document.element_children(parent);
    let Some(position) = siblings.iter().position(|sibling| *sibling == node) else {
        return (Vec::new(), Vec::new());
    };
    let previous = siblings[..position].to_vec();
    let next = siblings[position + 1..].to_vec();
    (snapshots(document, previous), snapshots(document, next))
}

async fn wait_until_ready(bridge: &Bridge, node: NodeId) {
    if let Some(hook) = bridge.context.options.get_render_ready.clone() {
        let snapshot = bridge.realm.document().snapshot(node);
        if let Some(ready) = snapshot.and_then(|snapshot| hook(&snapshot)) {
            ready.await;
            return;
        }
    }
    if let Some(instance) = bridge.realm.instance(node) {
        instance.update_complete().await;
    }
}

fn has_declarative_template(document: &Document, node: NodeId) -> bool {
    document
        .element_children(node)
        .first()
        .is_some_and(|first| {
            document.local_name(*first) == Some("template")
                && document.has_attribute(*first, "shadowrootmode")
        })
}

fn wrap(bridge: &Bridge, node: NodeId, shadow: NodeId) -> Result<(), DomError> {
    bridge.realm.mutate(|document| -> Result<(), DomError> {
        let mode = document.shadow_root_mode(shadow).unwrap_or_default();
        let template = document.create_element("template");
        document.set_attribute(template, "shadowrootmode", mode.as_str())?;
        for child in document.children(shadow).to_vec() {
            let copy = document.clone_node(child)?;
            document.append_child(template, copy)?;
        }
        document.prepend_child(node, template)?;

        let marker = ssr_marker(
            document
                .element(node)
                .map(|element| element.attributes.as_slice())
                .unwrap_or_default(),
        );
        if let Some(marker) = marker {
            document.remove_attribute(node, marker)?;
        }
        Ok(())
    })?;

    extract_critical_css(bridge, node)
}
