//! Custom element registry with SSR classification.

use std::collections::HashMap;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::component::{ComponentError, ElementDefinition};
use crate::ingest::is_potential_custom_element_name;

/// Hyphenated names the HTML standard reserves for its own elements.
const RESERVED_NAMES: [&str; 8] = [
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// A registered element type.
#[derive(Debug, Clone)]
pub struct RegisteredElement {
    /// The definition.
    pub definition: Rc<ElementDefinition>,
    /// `true` when every instance is rendered on the server.
    pub ssr_eligible: bool,
}

/// Registry of defined element types.
///
/// Lives as long as its environment, so definitions carry over between
/// renders that reuse the environment.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: HashMap<String, RegisteredElement>,
    order: Vec<String>,
    waiters: HashMap<String, Vec<oneshot::Sender<()>>>,
}

impl ElementRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition`, classifying it as SSR-eligible or not.
    pub fn define(&mut self, definition: ElementDefinition) -> Result<Rc<ElementDefinition>, ComponentError> {
        let name = definition.name().to_string();
        if !is_valid_custom_element_name(&name) {
            return Err(ComponentError::InvalidName(name));
        }
        if self.elements.contains_key(&name) {
            return Err(ComponentError::AlreadyDefined(name));
        }

        let definition = Rc::new(definition);
        let ssr_eligible = definition.has_ssr_render();
        log::debug!(
            "Defined <{}> ({})",
            name,
            if ssr_eligible { "server render" } else { "client render" }
        );

        self.elements.insert(
            name.clone(),
            RegisteredElement {
                definition: Rc::clone(&definition),
                ssr_eligible,
            },
        );
        self.order.push(name.clone());

        for waiter in self.waiters.remove(&name).unwrap_or_default() {
            let _ = waiter.send(());
        }
        Ok(definition)
    }

    /// Looks up a registered type.
    pub fn get(&self, name: &str) -> Option<&RegisteredElement> {
        self.elements.get(name)
    }

    /// Returns `true` if `name` is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.elements.contains_key(name)
    }

    /// Returns `true` if `name` is defined with a server render.
    pub fn is_ssr_eligible(&self, name: &str) -> bool {
        self.get(name).is_some_and(|element| element.ssr_eligible)
    }

    /// Every defined name, in definition order.
    pub fn defined_names(&self) -> &[String] {
        &self.order
    }

    /// Names defined with a server render, in definition order.
    pub fn ssr_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.is_ssr_eligible(name))
            .cloned()
            .collect()
    }

    /// Returns a receiver that fires once `name` is defined.
    ///
    /// Fires immediately for names already defined. Waiters whose receiver
    /// was dropped are pruned on each call.
    pub fn when_defined(&mut self, name: &str) -> oneshot::Receiver<()> {
        let (sender, receiver) = oneshot::channel();
        if self.is_defined(name) {
            let _ = sender.send(());
            return receiver;
        }

        self.waiters.retain(|_, senders| {
            senders.retain(|sender| !sender.is_closed());
            !senders.is_empty()
        });
        self.waiters.entry(name.to_string()).or_default().push(sender);
        receiver
    }

    /// Number of defined types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Valid custom element name: potential custom element name, not reserved.
pub fn is_valid_custom_element_name(name: &str) -> bool {
    is_potential_custom_element_name(name) && !RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, Template};
    use crate::dom::ElementSnapshot;

    struct Empty;
    impl Component for Empty {
        fn render(&self, _host: &ElementSnapshot) -> Template {
            Template::new()
        }
    }

    #[test]
    fn test_define_and_classify() {
        let mut registry = ElementRegistry::new();
        registry
            .define(ElementDefinition::new("x-client", || Empty))
            .unwrap();
        registry
            .define(ElementDefinition::new("x-server", || Empty).ssr_render(true))
            .unwrap();

        assert_eq!(registry.defined_names(), ["x-client", "x-server"]);
        assert_eq!(registry.ssr_names(), vec!["x-server"]);
        assert!(registry.is_defined("x-client"));
        assert!(!registry.is_ssr_eligible("x-client"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_and_invalid_names() {
        let mut registry = ElementRegistry::new();
        registry.define(ElementDefinition::new("x-a", || Empty)).unwrap();
        assert_eq!(
            registry.define(ElementDefinition::new("x-a", || Empty)).unwrap_err(),
            ComponentError::AlreadyDefined("x-a".to_string())
        );
        assert!(matches!(
            registry.define(ElementDefinition::new("div", || Empty)),
            Err(ComponentError::InvalidName(_))
        ));
        assert!(matches!(
            registry.define(ElementDefinition::new("font-face", || Empty)),
            Err(ComponentError::InvalidName(_))
        ));
    }

    #[test]
    fn test_when_defined() {
        let mut registry = ElementRegistry::new();
        let mut pending = registry.when_defined("x-later");
        assert!(pending.try_recv().is_err());

        registry.define(ElementDefinition::new("x-later", || Empty)).unwrap();
        assert!(pending.try_recv().is_ok());

        let mut immediate = registry.when_defined("x-later");
        assert!(immediate.try_recv().is_ok());
    }

    #[test]
    fn test_abandoned_waiters_are_pruned() {
        let mut registry = ElementRegistry::new();
        for _ in 0..5 {
            drop(registry.when_defined("x-never"));
        }
        drop(registry.when_defined("x-other"));
        let _live = registry.when_defined("x-never");

        assert_eq!(registry.waiters.len(), 1);
        assert_eq!(registry.waiters["x-never"].len(), 1);
    }
}
