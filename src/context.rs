//! Per-request state.
//!
//! A [`RenderContext`] is created for every render and dropped with it. It
//! is the only place request state lives: nothing about a request is stored
//! on the environment, so concurrent environments never share it.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::dom::NodeId;
use crate::error::Result;
use crate::ingest::{HtmlSource, HtmlSourceMeta};
use crate::options::RenderOptions;
use crate::realm::Realm;
use crate::serializer::SerializationFailure;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// One render call: the HTML, the modules to import and the options.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// The fragment to render.
    pub source: HtmlSource,
    /// Module specifiers imported before the fragment is inserted.
    pub scripts: Vec<String>,
    /// Options.
    pub options: RenderOptions,
}

impl RenderRequest {
    /// Creates a request.
    pub fn new<I, S>(source: impl Into<HtmlSource>, scripts: I, options: RenderOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source: source.into(),
            scripts: scripts.into_iter().map(Into::into).collect(),
            options,
        }
    }
}

/// State owned by one render.
pub(crate) struct RenderContext {
    id: u64,
    pub(crate) options: RenderOptions,
    pub(crate) meta: HtmlSourceMeta,
    critical_styles: RefCell<BTreeMap<String, String>>,
    failures: RefCell<Vec<SerializationFailure>>,
    completion: RefCell<Option<oneshot::Sender<Result<String>>>>,
    tasks: RefCell<Vec<AbortHandle>>,
    script_node: Cell<Option<NodeId>>,
}

impl RenderContext {
    pub(crate) fn new(
        options: RenderOptions,
        meta: HtmlSourceMeta,
    ) -> (Rc<Self>, oneshot::Receiver<Result<String>>) {
        let (sender, receiver) = oneshot::channel();
        let context = Rc::new(Self {
            id: REQUEST_ID.fetch_add(1, Ordering::SeqCst),
            options,
            meta,
            critical_styles: RefCell::new(BTreeMap::new()),
            failures: RefCell::new(Vec::new()),
            completion: RefCell::new(Some(sender)),
            tasks: RefCell::new(Vec::new()),
            script_node: Cell::new(None),
        });
        (context, receiver)
    }

    /// Request id, for logs and the bootstrap plan.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Completes the request. The first completion wins.
    pub(crate) fn complete(&self, outcome: Result<String>) {
        match self.completion.borrow_mut().take() {
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    log::debug!("Request {} completed after its caller left", self.id);
                }
            }
            None => {
                if let Err(e) = outcome {
                    log::debug!("Request {} already complete, ignoring: {}", self.id, e);
                }
            }
        }
    }

    /// Returns `true` once the request completed.
    pub(crate) fn is_complete(&self) -> bool {
        self.completion.borrow().is_none()
    }

    /// Spawns a request-scoped task on the local set.
    pub(crate) fn spawn<F>(&self, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + 'static,
        F::Output: 'static,
    {
        let handle = tokio::task::spawn_local(task);
        self.tasks.borrow_mut().push(handle.abort_handle());
        handle
    }

    /// Aborts every task this request spawned.
    pub(crate) fn abort_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        for task in &tasks {
            task.abort();
        }
        if !tasks.is_empty() {
            log::trace!("Request {}: aborted {} task(s)", self.id, tasks.len());
        }
    }

    /// Stores critical CSS for `tag` unless already present; returns whether
    /// it was stored.
    pub(crate) fn insert_critical_styles(&self, tag: &str, css: String) -> bool {
        let mut styles = self.critical_styles.borrow_mut();
        if styles.contains_key(tag) {
            return false;
        }
        styles.insert(tag.to_string(), css);
        true
    }

    /// Returns `true` if critical CSS was extracted for `tag`.
    pub(crate) fn has_critical_styles(&self, tag: &str) -> bool {
        self.critical_styles.borrow().contains_key(tag)
    }

    pub(crate) fn critical_styles(&self) -> BTreeMap<String, String> {
        self.critical_styles.borrow().clone()
    }

    pub(crate) fn record_failures(&self, failures: impl IntoIterator<Item = SerializationFailure>) {
        self.failures.borrow_mut().extend(failures);
    }

    pub(crate) fn failures(&self) -> Vec<SerializationFailure> {
        self.failures.borrow().clone()
    }

    pub(crate) fn set_script_node(&self, node: NodeId) {
        self.script_node.set(Some(node));
    }

    pub(crate) fn take_script_node(&self) -> Option<NodeId> {
        self.script_node.take()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// What request code running inside the environment can reach: the realm
/// and the context of its own request.
#[derive(Clone)]
pub(crate) struct Bridge {
    pub(crate) realm: Rc<Realm>,
    pub(crate) context: Rc<RenderContext>,
}

impl Bridge {
    pub(crate) fn new(realm: Rc<Realm>, context: Rc<RenderContext>) -> Self {
        Self { realm, context }
    }
}
