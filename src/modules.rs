//! Component modules: registration, specifier resolution and evaluation.
//!
//! A [`ComponentModule`] is the unit a render imports. Modules are stored in
//! a [`ModuleRegistry`] under a `file://` URL derived from their path, and
//! optionally under a bare package name. Renders import them by specifier:
//!
//! - `./x.js`, `../x.js` and `/abs/x.js` resolve against the request's `cwd`
//!   (or against the importing module for nested imports);
//! - full URLs are used as they are;
//! - bare specifiers go through the import map, then the package table.
//!
//! Each environment evaluates a module at most once; later imports of the
//! same URL are no-ops, and a module that failed keeps failing.
//!
//! # Example
//!
//! ```rust
//! use static_shadow_dom::component::{Component, ElementDefinition, Template};
//! use static_shadow_dom::dom::ElementSnapshot;
//! use static_shadow_dom::modules::{ModuleRegistry, component_module};
//!
//! struct Badge;
//!
//! impl Component for Badge {
//!     fn render(&self, _host: &ElementSnapshot) -> Template {
//!         Template::new().html("<span><slot></slot></span>")
//!     }
//! }
//!
//! let modules = ModuleRegistry::new()
//!     .with_module("/app/components/badge.js", component_module(|scope| {
//!         scope.define(ElementDefinition::new("x-badge", || Badge))
//!     }));
//! assert_eq!(modules.len(), 1);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::component::{ComponentError, ElementDefinition};
use crate::error::{RenderError, Result};
use crate::realm::Realm;

/// Code that defines custom elements when evaluated.
pub trait ComponentModule: Send + Sync + 'static {
    /// Runs the module body.
    fn evaluate(&self, scope: &mut ModuleScope<'_>) -> std::result::Result<(), ComponentError>;
}

/// A [`ComponentModule`] backed by a closure. Built by [`component_module`].
pub struct FnModule<F>(F);

impl<F> ComponentModule for FnModule<F>
where
    F: Fn(&mut ModuleScope<'_>) -> std::result::Result<(), ComponentError> + Send + Sync + 'static,
{
    fn evaluate(&self, scope: &mut ModuleScope<'_>) -> std::result::Result<(), ComponentError> {
        (self.0)(scope)
    }
}

/// Wraps a closure as a [`ComponentModule`].
pub fn component_module<F>(body: F) -> FnModule<F>
where
    F: Fn(&mut ModuleScope<'_>) -> std::result::Result<(), ComponentError> + Send + Sync + 'static,
{
    FnModule(body)
}

/// What a module body can do while it evaluates.
pub struct ModuleScope<'a> {
    realm: &'a Realm,
    url: &'a Url,
}

impl<'a> ModuleScope<'a> {
    pub(crate) fn new(realm: &'a Realm, url: &'a Url) -> Self {
        Self { realm, url }
    }

    /// URL of the evaluating module.
    pub fn url(&self) -> &Url {
        self.url
    }

    /// Defines a custom element.
    pub fn define(&mut self, definition: ElementDefinition) -> std::result::Result<(), ComponentError> {
        self.realm.define(definition)
    }

    /// Returns `true` if `name` is already defined in this environment.
    pub fn is_defined(&self, name: &str) -> bool {
        self.realm.registry().is_defined(name)
    }

    /// Imports another module, resolving `specifier` against this module.
    pub fn import(&mut self, specifier: &str) -> std::result::Result<(), ComponentError> {
        let url = self
            .realm
            .loader()
            .resolve(specifier, Some(self.url))
            .map_err(|e| ComponentError::ModuleNotFound(e.to_string()))?;
        self.realm.import(&url)
    }
}

// ============================================================================
// ModuleRegistry
// ============================================================================

/// Host-supplied modules, shared by every environment.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<Url, Arc<dyn ComponentModule>>,
    packages: HashMap<String, Url>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut urls: Vec<_> = self.modules.keys().map(Url::as_str).collect();
        urls.sort_unstable();
        f.debug_struct("ModuleRegistry")
            .field("modules", &urls)
            .field("packages", &self.packages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` at `path` (made absolute against the process
    /// working directory when relative) and returns its URL.
    pub fn register(
        &mut self,
        path: impl AsRef<Path>,
        module: impl ComponentModule,
    ) -> Result<Url> {
        let url = file_url(path.as_ref())?;
        log::debug!("Registered module {}", url);
        self.modules.insert(url.clone(), Arc::new(module));
        Ok(url)
    }

    /// Registers `module` at `path` and under the bare specifier `name`.
    pub fn register_package(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        module: impl ComponentModule,
    ) -> Result<Url> {
        let url = self.register(path, module)?;
        self.packages.insert(name.into(), url.clone());
        Ok(url)
    }

    /// Builder form of [`register`](Self::register). Registration errors
    /// are logged.
    pub fn with_module(mut self, path: impl AsRef<Path>, module: impl ComponentModule) -> Self {
        if let Err(e) = self.register(path, module) {
            log::error!("❌ Failed to register module: {}", e);
        }
        self
    }

    /// Builder form of [`register_package`](Self::register_package).
    pub fn with_package(
        mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        module: impl ComponentModule,
    ) -> Self {
        if let Err(e) = self.register_package(name, path, module) {
            log::error!("❌ Failed to register package: {}", e);
        }
        self
    }

    /// Module registered at `url`.
    pub fn get(&self, url: &Url) -> Option<Arc<dyn ComponentModule>> {
        self.modules.get(url).cloned()
    }

    /// URL a bare package name maps to.
    pub fn package(&self, name: &str) -> Option<&Url> {
        self.packages.get(name)
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path).map_err(|e| {
        RenderError::Configuration(format!("cannot make {:?} absolute: {}", path, e))
    })?;
    Url::from_file_path(&absolute)
        .map_err(|_| RenderError::Configuration(format!("{:?} is not a valid file path", absolute)))
}

fn directory_url(path: &Path) -> Result<Url> {
    Url::from_directory_path(path)
        .map_err(|_| RenderError::Configuration(format!("{:?} is not a valid directory", path)))
}

// ============================================================================
// Import map
// ============================================================================

#[derive(Debug, Deserialize)]
struct ImportMapFile {
    #[serde(default)]
    imports: BTreeMap<String, String>,
}

/// Parsed import map: bare specifier (or prefix ending in `/`) to URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportMap {
    imports: BTreeMap<String, Url>,
}

impl ImportMap {
    /// Parses `{ "imports": { ... } }`, resolving targets against `base`.
    pub fn from_json(json: &str, base: &Url) -> Result<Self> {
        let file: ImportMapFile = serde_json::from_str(json)
            .map_err(|e| RenderError::Configuration(format!("invalid import map: {}", e)))?;
        let mut imports = BTreeMap::new();
        for (specifier, target) in file.imports {
            match base.join(&target) {
                Ok(url) => {
                    imports.insert(specifier, url);
                }
                Err(e) => log::warn!(
                    "⚠️ Ignoring import map entry {:?} -> {:?}: {}",
                    specifier,
                    target,
                    e
                ),
            }
        }
        Ok(Self { imports })
    }

    /// Reads and parses the import map at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RenderError::Configuration(format!("cannot read import map {:?}: {}", path, e))
        })?;
        let base = match path.parent() {
            Some(dir) => directory_url(dir)?,
            None => directory_url(Path::new("/"))?,
        };
        let map = Self::from_json(&json, &base)?;
        log::debug!("Loaded import map {:?} ({} entries)", path, map.len());
        Ok(map)
    }

    /// Resolves a bare specifier: exact entries first, then the longest
    /// matching `/`-terminated prefix.
    pub fn resolve(&self, specifier: &str) -> Option<Url> {
        if let Some(url) = self.imports.get(specifier) {
            return Some(url.clone());
        }
        self.imports
            .iter()
            .filter(|(key, _)| key.ends_with('/') && specifier.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .and_then(|(key, target)| target.join(&specifier[key.len()..]).ok())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.imports.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Why a specifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A relative specifier that does not join onto its base.
    #[error("invalid relative specifier `{0}`")]
    InvalidRelative(String),
    /// A bare specifier with no import map or package entry.
    #[error("bare specifier `{0}` is not mapped")]
    UnmappedBare(String),
}

/// Resolves specifiers for one request.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    base: Url,
    import_map: Option<ImportMap>,
    registry: Arc<ModuleRegistry>,
}

impl ModuleResolver {
    /// Resolver rooted at directory `cwd`.
    pub fn new(cwd: &Path, import_map: Option<ImportMap>, registry: Arc<ModuleRegistry>) -> Result<Self> {
        Ok(Self {
            base: directory_url(cwd)?,
            import_map,
            registry,
        })
    }

    /// Base URL for top-level specifiers.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `specifier`, relative to `referrer` when given.
    pub fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> std::result::Result<Url, ResolveError> {
        if is_path_specifier(specifier) {
            let base = referrer.unwrap_or(&self.base);
            return base
                .join(specifier)
                .map_err(|_| ResolveError::InvalidRelative(specifier.to_string()));
        }

        if let Ok(url) = Url::parse(specifier) {
            return Ok(url);
        }

        if let Some(url) = self
            .import_map
            .as_ref()
            .and_then(|map| map.resolve(specifier))
        {
            return Ok(url);
        }

        self.registry
            .package(specifier)
            .cloned()
            .ok_or_else(|| ResolveError::UnmappedBare(specifier.to_string()))
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Debug, Clone)]
enum ModuleStatus {
    Evaluating,
    Evaluated,
    Failed(ComponentError),
}

/// Per-environment module map.
pub(crate) struct ModuleLoader {
    registry: Arc<ModuleRegistry>,
    resolver: RefCell<Option<ModuleResolver>>,
    status: RefCell<HashMap<Url, ModuleStatus>>,
}

impl ModuleLoader {
    pub(crate) fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self {
            registry,
            resolver: RefCell::new(None),
            status: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Installs the resolver for the current request.
    pub(crate) fn set_resolver(&self, resolver: ModuleResolver) {
        *self.resolver.borrow_mut() = Some(resolver);
    }

    pub(crate) fn resolve(&self, specifier: &str, referrer: Option<&Url>) -> std::result::Result<Url, ResolveError> {
        match self.resolver.borrow().as_ref() {
            Some(resolver) => resolver.resolve(specifier, referrer),
            None => match referrer {
                Some(base) if is_path_specifier(specifier) => base
                    .join(specifier)
                    .map_err(|_| ResolveError::InvalidRelative(specifier.to_string())),
                _ => Url::parse(specifier)
                    .ok()
                    .or_else(|| self.registry.package(specifier).cloned())
                    .ok_or_else(|| ResolveError::UnmappedBare(specifier.to_string())),
            },
        }
    }

    /// Evaluates the module at `url` unless it already ran.
    pub(crate) fn evaluate(&self, realm: &Realm, url: &Url) -> std::result::Result<(), ComponentError> {
        match self.status.borrow().get(url) {
            Some(ModuleStatus::Evaluated) | Some(ModuleStatus::Evaluating) => return Ok(()),
            Some(ModuleStatus::Failed(error)) => return Err(error.clone()),
            None => {}
        }

        let module = self
            .registry
            .get(url)
            .ok_or_else(|| ComponentError::ModuleNotFound(url.to_string()))?;

        self.status
            .borrow_mut()
            .insert(url.clone(), ModuleStatus::Evaluating);
        log::debug!("Evaluating module {}", url);

        let mut scope = ModuleScope::new(realm, url);
        let result = module.evaluate(&mut scope);

        let status = match &result {
            Ok(()) => ModuleStatus::Evaluated,
            Err(error) => {
                log::warn!("⚠️ Module {} failed: {}", url, error);
                ModuleStatus::Failed(error.clone())
            }
        };
        self.status.borrow_mut().insert(url.clone(), status);
        result
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> impl ComponentModule {
        component_module(|_scope| Ok(()))
    }

    fn registry() -> Arc<ModuleRegistry> {
        Arc::new(
            ModuleRegistry::new()
                .with_module("/app/components/a.js", noop())
                .with_package("lit-ish", "/app/node_modules/lit-ish/index.js", noop()),
        )
    }

    fn resolver(import_map: Option<ImportMap>) -> ModuleResolver {
        ModuleResolver::new(Path::new("/app"), import_map, registry()).unwrap()
    }

    #[test]
    fn test_register_uses_file_urls() {
        let registry = registry();
        let url = Url::parse("file:///app/components/a.js").unwrap();
        assert!(registry.get(&url).is_some());
        assert_eq!(
            registry.package("lit-ish").map(Url::as_str),
            Some("file:///app/node_modules/lit-ish/index.js")
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_relative_specifiers() {
        let resolver = resolver(None);
        assert_eq!(
            resolver.resolve("./components/a.js", None).unwrap().as_str(),
            "file:///app/components/a.js"
        );
        assert_eq!(
            resolver.resolve("/lib/x.js", None).unwrap().as_str(),
            "file:///lib/x.js"
        );

        let referrer = Url::parse("file:///app/components/a.js").unwrap();
        assert_eq!(
            resolver.resolve("../shared/b.js", Some(&referrer)).unwrap().as_str(),
            "file:///app/shared/b.js"
        );
    }

    #[test]
    fn test_bare_specifiers() {
        let map = ImportMap::from_json(
            r#"{ "imports": { "ui": "./components/a.js", "icons/": "./assets/icons/" } }"#,
            &Url::parse("file:///app/").unwrap(),
        )
        .unwrap();
        let resolver = resolver(Some(map));

        assert_eq!(
            resolver.resolve("ui", None).unwrap().as_str(),
            "file:///app/components/a.js"
        );
        assert_eq!(
            resolver.resolve("icons/star.js", None).unwrap().as_str(),
            "file:///app/assets/icons/star.js"
        );
        assert_eq!(
            resolver.resolve("lit-ish", None).unwrap().as_str(),
            "file:///app/node_modules/lit-ish/index.js"
        );
        assert_eq!(
            resolver.resolve("unknown", None),
            Err(ResolveError::UnmappedBare("unknown".to_string()))
        );
    }

    #[test]
    fn test_full_urls_pass_through() {
        let resolver = resolver(None);
        assert_eq!(
            resolver.resolve("file:///elsewhere/x.js", None).unwrap().as_str(),
            "file:///elsewhere/x.js"
        );
    }

    #[test]
    fn test_import_map_load() {
        let dir = std::env::temp_dir().join("static-shadow-dom-import-map-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("map.importmap");
        std::fs::write(&path, r#"{ "imports": { "x": "./x.js" } }"#).unwrap();

        let map = ImportMap::load(&path).unwrap();
        assert_eq!(map.len(), 1);
        let expected = Url::from_file_path(dir.join("x.js")).unwrap();
        assert_eq!(map.resolve("x"), Some(expected));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ImportMap::load(&path),
            Err(RenderError::Configuration(_))
        ));
    }
}
