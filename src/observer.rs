//! Connection observer and completion barrier.
//!
//! The observer collects light-DOM elements matching the tracked selectors
//! as they connect. Once dispatch starts, every recorded connection waits
//! one turn of the event loop, signals the completion countdown and, when
//! the element is eligible, schedules its serialization. The connection that
//! brings the countdown to zero finishes the request.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::barrier::{BarrierState, Countdown};
use crate::context::Bridge;
use crate::dom::{Document, NodeId};
use crate::error::RenderError;
use crate::options::FailurePolicy;
use crate::selector::TrackedSelectors;
use crate::serializer::{Eligibility, NodeOutcome, SerializationFailure, eligibility, serialize_element};

/// Watches the document for tracked elements.
pub(crate) struct ConnectionObserver {
    selectors: TrackedSelectors,
    queue: RefCell<VecDeque<NodeId>>,
    notify: Notify,
    completion: Countdown,
    pending: RefCell<Vec<JoinHandle<NodeOutcome>>>,
    disconnected: Cell<bool>,
}

impl ConnectionObserver {
    /// Creates an observer expecting `occurrences` connections.
    pub(crate) fn new(selectors: TrackedSelectors, occurrences: usize) -> Rc<Self> {
        Rc::new(Self {
            selectors,
            queue: RefCell::new(VecDeque::new()),
            notify: Notify::new(),
            completion: Countdown::new("connections", occurrences),
            pending: RefCell::new(Vec::new()),
            disconnected: Cell::new(false),
        })
    }

    /// The completion countdown.
    pub(crate) fn completion(&self) -> &Countdown {
        &self.completion
    }

    /// Queues `node` if it matches the tracked selectors.
    pub(crate) fn record(&self, document: &Document, node: NodeId) {
        if self.disconnected.get() {
            return;
        }
        let Some(element) = document.element(node) else {
            return;
        };
        if self.selectors.matches(&element.name, &element.attributes) {
            self.queue.borrow_mut().push_back(node);
            self.notify.notify_one();
        }
    }

    /// Stops observing. Queued records are dropped.
    pub(crate) fn disconnect(&self) {
        self.disconnected.set(true);
        self.queue.borrow_mut().clear();
        self.notify.notify_one();
    }

    /// Starts dispatching queued and future connections.
    pub(crate) fn begin_dispatch(self: &Rc<Self>, bridge: &Bridge) {
        let observer = Rc::clone(self);
        let task_bridge = bridge.clone();
        bridge.context.spawn(async move {
            observer.dispatch(task_bridge).await;
        });
    }

    async fn dispatch(self: Rc<Self>, bridge: Bridge) {
        if self.completion.is_complete() {
            log::debug!("No tracked elements, finishing immediately");
            self.finish(&bridge).await;
            return;
        }

        loop {
            self.notify.notified().await;
            if self.disconnected.get() {
                return;
            }
            let records: Vec<NodeId> = self.queue.borrow_mut().drain(..).collect();
            for node in records {
                let observer = Rc::clone(&self);
                let task_bridge = bridge.clone();
                bridge.context.spawn(async move {
                    observer.on_connected(task_bridge, node).await;
                });
            }
        }
    }

    async fn on_connected(self: Rc<Self>, bridge: Bridge, node: NodeId) {
        tokio::task::yield_now().await;

        let state = match self.completion.signal() {
            Ok(state) => state,
            Err(e) => {
                log::warn!("⚠️ Untracked connection of {}: {}", node, e);
                return;
            }
        };

        if eligibility(&bridge, node) != Eligibility::No {
            let handle = bridge.context.spawn(serialize_element(bridge.clone(), node));
            self.pending.borrow_mut().push(handle);
        }

        if state == BarrierState::Complete {
            self.finish(&bridge).await;
        }
    }

    async fn finish(&self, bridge: &Bridge) {
        let handles = std::mem::take(&mut *self.pending.borrow_mut());
        let outcomes = join_all(handles).await;

        let mut failures: Vec<SerializationFailure> = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(outcome) => failures.extend(outcome.failures()),
                Err(e) => failures.push(SerializationFailure {
                    tag: String::new(),
                    message: format!("serialization task failed: {}", e),
                }),
            }
        }

        self.disconnect();
        bridge.realm.set_observer(None);

        let policy = bridge.context.options.failure_policy;
        let html = crate::environment::collect_container(bridge);

        if policy == FailurePolicy::FailFast {
            if let Some(first) = failures.first() {
                log::error!("❌ Serialization of <{}> failed: {}", first.tag, first.message);
                bridge.context.complete(Err(RenderError::Serialization {
                    tag: first.tag.clone(),
                    message: first.message.clone(),
                }));
                return;
            }
        }

        if !failures.is_empty() {
            log::warn!("⚠️ {} element(s) failed to serialize", failures.len());
            bridge.context.record_failures(failures);
        }

        tokio::task::yield_now().await;
        bridge.context.complete(Ok(html));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_filters_by_selector() {
        let mut document = Document::new();
        let body = document.body();
        document
            .set_inner_html(body, "<x-a></x-a><p></p><div ssr></div>")
            .unwrap();
        let elements = document.element_children(body);

        let observer = ConnectionObserver::new(TrackedSelectors::new(["x-a"]), 2);
        for element in &elements {
            observer.record(&document, *element);
        }
        assert_eq!(observer.queue.borrow().len(), 2);

        observer.disconnect();
        observer.record(&document, elements[0]);
        assert!(observer.queue.borrow().is_empty());
    }

    #[test]
    fn test_zero_occurrences_complete_immediately() {
        let observer = ConnectionObserver::new(TrackedSelectors::default(), 0);
        assert!(observer.completion().is_complete());
    }
}
