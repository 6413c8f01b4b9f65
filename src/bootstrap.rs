//! Bootstrap: import the request's modules and count definitions.
//!
//! The plan is written into the document as a JSON `<script>` node so the
//! environment always shows what the current request loads; the node is
//! removed when the request completes.

use std::rc::Rc;

use serde::Serialize;
use url::Url;

use crate::context::Bridge;
use crate::dom::{DomError, NodeId};
use crate::error::{RenderError, Result};
use crate::observer::ConnectionObserver;

/// Attribute identifying bootstrap script nodes.
pub(crate) const BOOTSTRAP_ATTRIBUTE: &str = "data-static-shadow-dom";

/// Serialized form of the bootstrap.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BootstrapPlan {
    request: u64,
    modules: Vec<String>,
    tracked_names: Vec<String>,
    selectors: Vec<String>,
    container_el_id: String,
}

/// Resolved bootstrap for one request.
#[derive(Debug)]
pub(crate) struct Bootstrap {
    plan: BootstrapPlan,
    modules: Vec<(String, Url)>,
}

impl Bootstrap {
    /// Resolves every script specifier. An unresolvable specifier fails the
    /// request before anything is inserted.
    pub(crate) fn prepare(bridge: &Bridge, scripts: &[String]) -> Result<Self> {
        let loader = bridge.realm.loader();
        let mut modules = Vec::with_capacity(scripts.len());
        for specifier in scripts {
            let url = loader
                .resolve(specifier, None)
                .map_err(|e| RenderError::ScriptExecution {
                    specifier: specifier.clone(),
                    message: e.to_string(),
                })?;
            modules.push((specifier.clone(), url));
        }

        let meta = &bridge.context.meta;
        let plan = BootstrapPlan {
            request: bridge.context.id(),
            modules: modules.iter().map(|(_, url)| url.to_string()).collect(),
            tracked_names: meta.custom_element_names.clone(),
            selectors: meta.selectors.to_selector_list(),
            container_el_id: bridge.context.options.container_el_id.clone(),
        };
        Ok(Self { plan, modules })
    }

    /// Inserts the bootstrap node and installs the connection observer.
    pub(crate) fn inject(&self, bridge: &Bridge) -> Result<Rc<ConnectionObserver>> {
        let json = serde_json::to_string(&self.plan)
            .map_err(|e| RenderError::Configuration(format!("bootstrap plan: {}", e)))?
            .replace("</", "<\\/");
        let request = self.plan.request.to_string();

        let script = bridge
            .realm
            .mutate(|document| -> std::result::Result<NodeId, DomError> {
                let script = document.create_element("script");
                document.set_attribute(script, "type", "application/json")?;
                document.set_attribute(script, BOOTSTRAP_ATTRIBUTE, &request)?;
                let text = document.create_text(&json);
                document.append_child(script, text)?;
                let body = document.body();
                document.append_child(body, script)?;
                Ok(script)
            })
            .map_err(|e| {
                RenderError::Configuration(format!("cannot insert bootstrap: {}", e))
            })?;
        bridge.context.set_script_node(script);

        let meta = &bridge.context.meta;
        let observer = ConnectionObserver::new(meta.selectors.clone(), meta.occurrences);
        bridge.realm.set_observer(Some(Rc::clone(&observer)));
        log::debug!(
            "Request {}: bootstrap injected ({} module(s), {} tracked occurrence(s))",
            self.plan.request,
            self.modules.len(),
            meta.occurrences
        );
        Ok(observer)
    }

    /// Imports the modules and signals the definition barrier as each
    /// tracked name becomes defined.
    pub(crate) fn run(self, bridge: &Bridge) {
        for (specifier, url) in self.modules {
            let task_bridge = bridge.clone();
            bridge.context.spawn(async move {
                tokio::task::yield_now().await;
                if let Err(e) = task_bridge.realm.import(&url) {
                    log::error!("❌ Failed to import {}: {}", specifier, e);
                    task_bridge.context.complete(Err(RenderError::ScriptExecution {
                        specifier,
                        message: e.to_string(),
                    }));
                }
            });
        }

        let definitions = bridge.context.meta.definitions.clone();
        for name in &bridge.context.meta.custom_element_names {
            if bridge.realm.registry().is_defined(name) {
                let _ = definitions.signal();
                continue;
            }
            let defined = bridge.realm.when_defined(name);
            let definitions = definitions.clone();
            let name = name.clone();
            bridge.context.spawn(async move {
                if defined.await.is_ok() {
                    log::trace!("<{}> defined", name);
                    let _ = definitions.signal();
                }
            });
        }
    }
}
