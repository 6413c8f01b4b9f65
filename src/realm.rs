//! The realm: document, element registry, instances and module map of one
//! environment.
//!
//! Every document mutation made on behalf of the pipeline or of a component
//! goes through [`Realm::mutate`], which afterwards drains the document's
//! connection records: defined elements are upgraded into instances and
//! light-DOM connections are handed to the active connection observer.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use url::Url;

use crate::component::{ComponentError, ElementDefinition, ElementInstance};
use crate::dom::{Document, DomError, NodeId};
use crate::modules::{ModuleLoader, ModuleRegistry};
use crate::observer::ConnectionObserver;
use crate::registry::ElementRegistry;

static REALM_ID: AtomicU64 = AtomicU64::new(1);

/// Document sandbox shared by everything running in one environment.
pub struct Realm {
    id: u64,
    this: Weak<Realm>,
    document: RefCell<Document>,
    registry: RefCell<ElementRegistry>,
    instances: RefCell<HashMap<NodeId, Rc<ElementInstance>>>,
    loader: ModuleLoader,
    observer: RefCell<Option<Rc<ConnectionObserver>>>,
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("id", &self.id)
            .field("defined", &self.registry.borrow().len())
            .field("instances", &self.instances.borrow().len())
            .finish()
    }
}

impl Realm {
    pub(crate) fn new(modules: Arc<ModuleRegistry>) -> Rc<Self> {
        let id = REALM_ID.fetch_add(1, Ordering::SeqCst);
        log::debug!("Creating realm {}", id);
        Rc::new_cyclic(|this| Realm {
            id,
            this: this.clone(),
            document: RefCell::new(Document::new()),
            registry: RefCell::new(ElementRegistry::new()),
            instances: RefCell::new(HashMap::new()),
            loader: ModuleLoader::new(modules),
            observer: RefCell::new(None),
        })
    }

    /// Realm id, for logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read access to the document.
    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    /// Read access to the element registry.
    pub fn registry(&self) -> Ref<'_, ElementRegistry> {
        self.registry.borrow()
    }

    pub(crate) fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Instance behind element `node`, if it is a defined custom element.
    pub fn instance(&self, node: NodeId) -> Option<Rc<ElementInstance>> {
        self.instances.borrow().get(&node).cloned()
    }

    /// Mutates the document, then runs the resulting reactions.
    pub fn mutate<R>(&self, change: impl FnOnce(&mut Document) -> R) -> R {
        let result = change(&mut self.document.borrow_mut());
        self.flush();
        result
    }

    /// Defines an element type and upgrades connected elements of that name.
    pub fn define(&self, definition: ElementDefinition) -> Result<(), ComponentError> {
        let definition = self.registry.borrow_mut().define(definition)?;
        let existing = self
            .document
            .borrow()
            .connected_elements_named(definition.name());
        for node in existing {
            self.upgrade(node, &definition);
        }
        Ok(())
    }

    /// Resolves once `name` is defined. Fails if the realm goes away first.
    pub(crate) fn when_defined(&self, name: &str) -> oneshot::Receiver<()> {
        self.registry.borrow_mut().when_defined(name)
    }

    /// Evaluates the module at `url` in this realm.
    pub fn import(&self, url: &Url) -> Result<(), ComponentError> {
        self.loader.evaluate(self, url)
    }

    pub(crate) fn set_observer(&self, observer: Option<Rc<ConnectionObserver>>) {
        *self.observer.borrow_mut() = observer;
    }

    pub(crate) fn observer(&self) -> Option<Rc<ConnectionObserver>> {
        self.observer.borrow().clone()
    }

    /// Drains connection and removal records.
    pub(crate) fn flush(&self) {
        loop {
            let (connections, removed) = {
                let mut document = self.document.borrow_mut();
                (document.take_connections(), document.take_removed())
            };
            if connections.is_empty() && removed.is_empty() {
                break;
            }

            if !removed.is_empty() {
                let mut instances = self.instances.borrow_mut();
                for node in removed {
                    instances.remove(&node);
                }
            }

            for connection in connections {
                let definition = {
                    let document = self.document.borrow();
                    document
                        .local_name(connection.node)
                        .and_then(|name| self.registry.borrow().get(name).map(|e| e.definition.clone()))
                };
                if let Some(definition) = definition {
                    self.upgrade(connection.node, &definition);
                }

                if !connection.in_shadow_tree {
                    if let Some(observer) = self.observer() {
                        observer.record(&self.document.borrow(), connection.node);
                    }
                }
            }
        }
    }

    fn upgrade(&self, node: NodeId, definition: &Rc<ElementDefinition>) {
        if self.instances.borrow().contains_key(&node) {
            return;
        }
        let instance = Rc::new(ElementInstance::new(node, Rc::clone(definition)));
        self.instances.borrow_mut().insert(node, Rc::clone(&instance));

        if let Some(mode) = definition.shadow_mode() {
            if let Err(e) = self.document.borrow_mut().attach_shadow(node, mode) {
                log::warn!("⚠️ <{}> could not attach a shadow root: {}", definition.name(), e);
            }
        }
        log::trace!("Upgraded <{}> {}", definition.name(), node);
        self.request_update(&instance);
    }

    /// Requests a re-render of `instance` on a later turn.
    pub(crate) fn request_update(&self, instance: &Rc<ElementInstance>) {
        if !instance.request_update() {
            return;
        }
        let Some(realm) = self.this.upgrade() else {
            return;
        };
        let instance = Rc::clone(instance);
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            if let Some(before_render) = instance.take_before_render() {
                before_render.await;
            }
            realm.perform_update(&instance);
        });
    }

    fn perform_update(&self, instance: &ElementInstance) {
        let update = instance.begin_render();
        let error = self.render_instance(instance).err();
        if let Some(error) = &error {
            log::warn!(
                "⚠️ <{}> failed to render: {}",
                instance.definition().name(),
                error
            );
        }
        instance.finish_render(update, error.map(|e| e.to_string()));
    }

    fn render_instance(&self, instance: &ElementInstance) -> Result<(), DomError> {
        let node = instance.node();
        let Some(host) = self.document.borrow().snapshot(node) else {
            return Ok(());
        };
        let template = instance.render(&host);
        let styles = instance.definition().styles();

        self.mutate(|document| -> Result<(), DomError> {
            let root = document.shadow_root(node).unwrap_or(node);
            document.set_inner_html(root, template.markup())?;
            for css in styles {
                let style = document.create_element("style");
                let text = document.create_text(css);
                document.append_child(style, text)?;
                document.append_child(root, style)?;
            }
            Ok(())
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Template};
    use crate::dom::ElementSnapshot;
    use crate::modules::component_module;
    use tokio::task::LocalSet;

    struct Hello;

    impl Component for Hello {
        fn render(&self, host: &ElementSnapshot) -> Template {
            Template::new()
                .html("<p>")
                .text(host.attribute("name").unwrap_or("?"))
                .html("</p>")
        }
    }

    fn realm() -> Rc<Realm> {
        Realm::new(Arc::new(ModuleRegistry::new()))
    }

    #[tokio::test]
    async fn test_upgrade_renders_into_shadow_root() {
        LocalSet::new()
            .run_until(async {
                let realm = realm();
                realm
                    .define(ElementDefinition::new("x-hello", || Hello).style("p { margin: 0 }"))
                    .unwrap();

                let body = realm.document().body();
                realm
                    .mutate(|document| document.set_inner_html(body, r#"<x-hello name="ada"></x-hello>"#))
                    .unwrap();

                let node = realm.document().element_children(body)[0];
                let instance = realm.instance(node).expect("upgraded");
                instance.update_complete().await;

                let document = realm.document();
                let shadow = document.shadow_root(node).unwrap();
                assert_eq!(
                    document.inner_html(shadow),
                    "<p><!---->ada<!----></p><style>p { margin: 0 }</style>"
                );
            })
            .await;
    }

    #[tokio::test]
    async fn test_define_upgrades_existing_elements() {
        LocalSet::new()
            .run_until(async {
                let realm = realm();
                let body = realm.document().body();
                realm
                    .mutate(|document| document.set_inner_html(body, "<x-late></x-late>"))
                    .unwrap();
                let node = realm.document().element_children(body)[0];
                assert!(realm.instance(node).is_none());

                realm.define(ElementDefinition::new("x-late", || Hello)).unwrap();
                assert!(realm.instance(node).is_some());
                assert!(realm.document().shadow_root(node).is_some());
            })
            .await;
    }

    #[tokio::test]
    async fn test_removed_elements_drop_instances() {
        LocalSet::new()
            .run_until(async {
                let realm = realm();
                realm.define(ElementDefinition::new("x-hello", || Hello)).unwrap();
                let body = realm.document().body();
                realm
                    .mutate(|document| document.set_inner_html(body, "<x-hello></x-hello>"))
                    .unwrap();
                let node = realm.document().element_children(body)[0];
                assert!(realm.instance(node).is_some());

                realm.mutate(|document| document.clear_children(body)).unwrap();
                assert!(realm.instance(node).is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_import_evaluates_once() {
        use std::sync::atomic::AtomicUsize;

        static RUNS: AtomicUsize = AtomicUsize::new(0);
        let modules = ModuleRegistry::new().with_module(
            "/app/once.js",
            component_module(|scope| {
                RUNS.fetch_add(1, Ordering::SeqCst);
                scope.define(ElementDefinition::new("x-once", || Hello))
            }),
        );
        let realm = Realm::new(Arc::new(modules));
        let url = Url::parse("file:///app/once.js").unwrap();

        realm.import(&url).unwrap();
        realm.import(&url).unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 1);
        assert!(realm.registry().is_defined("x-once"));

        let missing = Url::parse("file:///app/missing.js").unwrap();
        assert!(matches!(
            realm.import(&missing),
            Err(ComponentError::ModuleNotFound(_))
        ));
    }
}
