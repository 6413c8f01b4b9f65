//! The document environment and the render pipeline.
//!
//! An [`Environment`] owns one realm (document, element registry, module
//! map) and renders requests against it one at a time:
//!
//! ```text
//! ingest ─► setup ─► bootstrap ─► definitions ─► inject HTML
//!                                                     │
//!   result ◄─ collect container ◄─ serialize ◄─ connections
//! ```
//!
//! Everything runs on the current thread and must be driven from inside a
//! [`tokio::task::LocalSet`]. Use [`Renderer`](crate::Renderer) to run an
//! environment on its own thread.
//!
//! With `cleanup` disabled the realm is kept for the next request, so
//! element definitions and evaluated modules carry over; request state
//! (container contents, bootstrap node, observer) is always reset.

use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::bootstrap::{BOOTSTRAP_ATTRIBUTE, Bootstrap};
use crate::context::{Bridge, RenderContext, RenderRequest};
use crate::dom::{Document, DomError, NodeId};
use crate::error::{RenderError, Result};
use crate::ingest::ingest_html;
use crate::modules::{ImportMap, ModuleRegistry, ModuleResolver};
use crate::realm::Realm;
use crate::result::{RenderResult, process_result};

/// Reusable document environment.
pub struct Environment {
    modules: Arc<ModuleRegistry>,
    realm: Option<Rc<Realm>>,
    renders: u64,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("modules", &self.modules.len())
            .field("realm", &self.realm.as_ref().map(|realm| realm.id()))
            .field("renders", &self.renders)
            .finish()
    }
}

impl Environment {
    /// Creates an environment loading component modules from `modules`.
    ///
    /// The realm is built lazily by the first render.
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self {
            modules,
            realm: None,
            renders: 0,
        }
    }

    /// Returns `true` while a realm exists.
    pub fn is_initialized(&self) -> bool {
        self.realm.is_some()
    }

    /// Number of renders this environment ran.
    pub fn renders(&self) -> u64 {
        self.renders
    }

    /// Every element name defined in the current realm.
    pub fn defined_elements(&self) -> Vec<String> {
        self.realm
            .as_ref()
            .map(|realm| realm.registry().defined_names().to_vec())
            .unwrap_or_default()
    }

    /// Element names defined with server rendering enabled.
    pub fn ssr_elements(&self) -> Vec<String> {
        self.realm
            .as_ref()
            .map(|realm| realm.registry().ssr_names())
            .unwrap_or_default()
    }

    /// Drops the realm. The next render builds a fresh one.
    pub fn teardown(&mut self) {
        if let Some(realm) = self.realm.take() {
            log::debug!("Tearing down realm {}", realm.id());
        }
    }

    fn setup(&mut self) -> Rc<Realm> {
        if let Some(realm) = &self.realm {
            log::debug!("Reusing realm {}", realm.id());
            return Rc::clone(realm);
        }
        let realm = Realm::new(Arc::clone(&self.modules));
        log::info!("✅ Realm {} ready", realm.id());
        self.realm = Some(Rc::clone(&realm));
        realm
    }

    /// Renders one request.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Options`] for invalid options.
    /// - [`RenderError::InvalidHtmlSource`] / [`RenderError::InvalidHtmlTree`]
    ///   when the source cannot be ingested.
    /// - [`RenderError::ScriptExecution`] when a module cannot be resolved or
    ///   fails to evaluate.
    /// - [`RenderError::Serialization`] under
    ///   [`FailurePolicy::FailFast`](crate::FailurePolicy::FailFast).
    pub async fn render(&mut self, request: RenderRequest) -> Result<RenderResult> {
        let RenderRequest {
            source,
            scripts,
            options,
        } = request;

        options.validate()?;
        let meta = ingest_html(source, &options.render_elements)?;
        let import_map = match options.import_map_path() {
            Some(path) => Some(ImportMap::load(&path)?),
            None => None,
        };

        let realm = self.setup();
        realm.loader().set_resolver(ModuleResolver::new(
            &options.cwd,
            import_map,
            Arc::clone(&self.modules),
        )?);
        reset_request_state(&realm, &options.container_el_id);

        let cleanup = options.cleanup;
        let container_el_id = options.container_el_id.clone();
        let (context, completion) = RenderContext::new(options, meta);
        log::debug!(
            "Request {}: {} custom element name(s), {} tracked occurrence(s)",
            context.id(),
            context.meta.custom_element_names.len(),
            context.meta.occurrences
        );

        let outcome = {
            let _tasks = AbortOnDrop(Rc::clone(&context));
            let bridge = Bridge::new(Rc::clone(&realm), Rc::clone(&context));
            drive(&bridge, &scripts, completion).await
        };
        self.renders += 1;

        match &outcome {
            Ok(result) => log::debug!(
                "Request {} rendered ({} bytes, {} critical style(s))",
                context.id(),
                result.html.len(),
                result.critical_styles.len()
            ),
            Err(e) => {
                log::warn!("⚠️ Request {} failed: {}", context.id(), e);
                reset_request_state(&realm, &container_el_id);
            }
        }

        if cleanup {
            self.teardown();
        }
        outcome
    }
}

/// Aborts the request's tasks when the render finishes or is dropped.
struct AbortOnDrop(Rc<RenderContext>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort_tasks();
    }
}

async fn drive(
    bridge: &Bridge,
    scripts: &[String],
    mut completion: oneshot::Receiver<Result<String>>,
) -> Result<RenderResult> {
    let bootstrap = Bootstrap::prepare(bridge, scripts)?;
    let observer = bootstrap.inject(bridge)?;
    bootstrap.run(bridge);

    let definitions = bridge.context.meta.definitions.clone();
    tokio::select! {
        biased;
        outcome = &mut completion => {
            let html = outcome.map_err(|_| RenderError::Disconnected)??;
            return process_result(&bridge.context, html);
        }
        defined = definitions.wait() => {
            defined.map_err(|e| RenderError::Configuration(format!("definitions: {}", e)))?;
        }
    }
    log::debug!("Request {}: all custom elements defined", bridge.context.id());

    inject_html(bridge)?;
    observer.begin_dispatch(bridge);

    let html = completion.await.map_err(|_| RenderError::Disconnected)??;
    process_result(&bridge.context, html)
}

/// Inserts the request's HTML into the container, creating it if missing.
pub(crate) fn inject_html(bridge: &Bridge) -> Result<()> {
    let id = &bridge.context.options.container_el_id;
    let html = &bridge.context.meta.html;
    bridge
        .realm
        .mutate(|document| -> std::result::Result<(), DomError> {
            let container = match document.get_element_by_id(id) {
                Some(container) => container,
                None => create_container(document, id)?,
            };
            document.set_inner_html(container, html)
        })
        .map_err(|e| RenderError::InvalidHtmlTree(format!("cannot inject HTML: {}", e)))
}

fn create_container(document: &mut Document, id: &str) -> std::result::Result<NodeId, DomError> {
    let container = document.create_element("div");
    document.set_attribute(container, "id", id)?;
    let body = document.body();
    document.append_child(body, container)?;
    Ok(container)
}

/// Reads and clears the container and removes the request's bootstrap node.
pub(crate) fn collect_container(bridge: &Bridge) -> String {
    let id = &bridge.context.options.container_el_id;
    let script = bridge.context.take_script_node();
    bridge.realm.mutate(|document| {
        let html = match document.get_element_by_id(id) {
            Some(container) => {
                let html = document.inner_html(container);
                if let Err(e) = document.clear_children(container) {
                    log::warn!("⚠️ Failed to clear #{}: {}", id, e);
                }
                html
            }
            None => {
                log::warn!("⚠️ Container #{} disappeared during the render", id);
                String::new()
            }
        };
        if let Some(script) = script.filter(|script| document.contains(*script)) {
            if let Err(e) = document.remove(script) {
                log::warn!("⚠️ Failed to remove bootstrap node: {}", e);
            }
        }
        html
    })
}

fn reset_request_state(realm: &Realm, container_el_id: &str) {
    realm.set_observer(None);
    realm.mutate(|document| {
        if let Some(container) = document.get_element_by_id(container_el_id) {
            if let Err(e) = document.clear_children(container) {
                log::warn!("⚠️ Failed to clear #{}: {}", container_el_id, e);
            }
        }
        let body = document.body();
        let stale: Vec<NodeId> = document
            .element_children(body)
            .into_iter()
            .filter(|node| {
                document.local_name(*node) == Some("script")
                    && document.has_attribute(*node, BOOTSTRAP_ATTRIBUTE)
            })
            .collect();
        for script in stale {
            log::debug!("Removing stale bootstrap node {}", script);
            if let Err(e) = document.remove(script) {
                log::warn!("⚠️ Failed to remove bootstrap node: {}", e);
            }
        }
    });
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ElementDefinition, Template};
    use crate::dom::ElementSnapshot;
    use crate::modules::component_module;
    use crate::options::RenderOptions;
    use tokio::task::LocalSet;

    struct Greeting;

    impl Component for Greeting {
        fn render(&self, _host: &ElementSnapshot) -> Template {
            Template::new().html("<p>hi</p>")
        }
    }

    fn modules() -> Arc<ModuleRegistry> {
        Arc::new(ModuleRegistry::new().with_module(
            "/app/greeting.js",
            component_module(|scope| scope.define(ElementDefinition::new("x-greeting", || Greeting))),
        ))
    }

    fn options(cleanup: bool) -> RenderOptions {
        RenderOptions::builder()
            .cwd("/app")
            .cleanup(cleanup)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_render_without_custom_elements() {
        LocalSet::new()
            .run_until(async {
                let mut environment = Environment::new(modules());
                let result = environment
                    .render(RenderRequest::new("<p>plain</p>", Vec::<String>::new(), options(true)))
                    .await
                    .unwrap();
                assert_eq!(result.html, "<p>plain</p>");
                assert!(result.critical_styles.is_empty());
                assert!(!environment.is_initialized());
            })
            .await;
    }

    #[tokio::test]
    async fn test_reuse_keeps_definitions_and_clears_container() {
        LocalSet::new()
            .run_until(async {
                let mut environment = Environment::new(modules());
                let first = environment
                    .render(RenderRequest::new(
                        "<x-greeting></x-greeting>",
                        ["./greeting.js"],
                        options(false),
                    ))
                    .await
                    .unwrap();
                assert_eq!(
                    first.html,
                    r#"<x-greeting><template shadowrootmode="open"><p>hi</p></template></x-greeting>"#
                );
                assert!(environment.is_initialized());
                assert_eq!(environment.defined_elements(), vec!["x-greeting".to_string()]);
                assert!(environment.ssr_elements().is_empty());

                let second = environment
                    .render(RenderRequest::new(
                        "<x-greeting></x-greeting><span>2</span>",
                        Vec::<String>::new(),
                        options(false),
                    ))
                    .await
                    .unwrap();
                assert!(second.html.ends_with("<span>2</span>"));
                assert!(second.html.starts_with("<x-greeting><template"));
                assert_eq!(environment.renders(), 2);

                let realm = environment.realm.clone().unwrap();
                let document = realm.document();
                let body = document.body();
                let leftovers: Vec<_> = document
                    .element_children(body)
                    .into_iter()
                    .filter(|node| document.local_name(*node) == Some("script"))
                    .collect();
                assert!(leftovers.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_unresolvable_script_fails_before_injection() {
        LocalSet::new()
            .run_until(async {
                let mut environment = Environment::new(modules());
                let error = environment
                    .render(RenderRequest::new(
                        "<x-greeting></x-greeting>",
                        ["bare-package"],
                        options(false),
                    ))
                    .await
                    .unwrap_err();
                assert!(matches!(error, RenderError::ScriptExecution { .. }));
            })
            .await;
    }

    #[tokio::test]
    async fn test_failing_module_rejects_request() {
        LocalSet::new()
            .run_until(async {
                let modules = Arc::new(ModuleRegistry::new().with_module(
                    "/app/broken.js",
                    component_module(|_scope| Err("boom".into())),
                ));
                let mut environment = Environment::new(modules);
                let error = environment
                    .render(RenderRequest::new(
                        "<x-broken></x-broken>",
                        ["./broken.js"],
                        options(true),
                    ))
                    .await
                    .unwrap_err();
                match error {
                    RenderError::ScriptExecution { specifier, message } => {
                        assert_eq!(specifier, "./broken.js");
                        assert!(message.contains("boom"));
                    }
                    other => panic!("unexpected error: {other}"),
                }
            })
            .await;
    }
}
