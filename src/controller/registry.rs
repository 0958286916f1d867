use super::{ActionFn, ActionFuture, Controller, CrudAction, VerbMap, action, crud_action};
use crate::context::RequestContext;
use crate::discovery::{MANIFEST_EXTENSION, discover_units, read_manifest};
use crate::error::{CrudrouteError, HttpError, Result};
use axum::http::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use strum::IntoEnumIterator;

/// Controller manifest, one `controllers/<name>.toml` per controller.
///
/// ```toml
/// model = "Widget"
///
/// [methods]
/// read = "post"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerManifest {
    pub model: Option<String>,
    /// Action to verb overrides, verbs are case-insensitive.
    pub methods: BTreeMap<String, String>,
}

/// Everything a controller type declares before it is registered.
#[derive(Clone, Default)]
pub struct ControllerDefinition {
    model: Option<String>,
    verbs: VerbMap,
    actions: BTreeMap<String, ActionFn>,
}

impl ControllerDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the model this controller is bound to.
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Require `verb` for `action`, replacing the base mapping if there is one.
    pub fn verb(mut self, action: impl Into<String>, verb: Method) -> Self {
        self.verbs.insert(action, verb);
        self
    }

    /// Add an action, or replace one of the CRUD defaults.
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Controller) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), action(handler));
        self
    }

    /// Apply a manifest on top of this definition. The manifest's model and
    /// verbs win.
    pub fn with_manifest(mut self, controller: &str, manifest: ControllerManifest) -> Result<Self> {
        if let Some(model) = manifest.model {
            self.model = Some(model);
        }
        for (action, verb) in manifest.methods {
            let method =
                VerbMap::parse_verb(&verb).ok_or_else(|| CrudrouteError::InvalidVerb {
                    controller: controller.to_string(),
                    action: action.clone(),
                    verb: verb.clone(),
                })?;
            self.verbs.insert(action, method);
        }
        Ok(self)
    }
}

/// A registered controller type: resolved verb map and action table.
pub struct ControllerDescriptor {
    name: String,
    model: Option<String>,
    verbs: VerbMap,
    actions: BTreeMap<String, ActionFn>,
}

impl ControllerDescriptor {
    pub fn new(name: impl Into<String>, definition: ControllerDefinition) -> Self {
        let mut actions: BTreeMap<String, ActionFn> = CrudAction::iter()
            .map(|kind| (kind.name().to_string(), crud_action(kind)))
            .collect();
        actions.extend(definition.actions);

        Self {
            name: name.into(),
            model: definition.model,
            verbs: VerbMap::base().overlay(&definition.verbs),
            actions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Effective verb map: base overlaid by this controller's overrides.
    pub fn verbs(&self) -> &VerbMap {
        &self.verbs
    }

    pub fn action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Bind a fresh controller to the request.
    pub fn instantiate(&self, ctx: &RequestContext) -> std::result::Result<Controller, HttpError> {
        Controller::bind(self, ctx)
    }
}

impl std::fmt::Debug for ControllerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerDescriptor")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("verbs", &self.verbs)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Code-side controller definitions, looked up by name during discovery.
#[derive(Default)]
pub struct ControllerCatalog {
    definitions: BTreeMap<String, ControllerDefinition>,
}

impl ControllerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, name: impl Into<String>, definition: ControllerDefinition) -> Self {
        self.definitions.insert(name.into(), definition);
        self
    }
}

/// Immutable mapping from controller name to descriptor.
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    controllers: BTreeMap<String, ControllerDescriptor>,
}

impl ControllerRegistry {
    pub fn builder() -> ControllerRegistryBuilder {
        ControllerRegistryBuilder::new()
    }

    /// Register one controller per manifest in `dir`, in file name order.
    ///
    /// A catalog entry with the manifest's name supplies the code-defined
    /// actions; without one the controller gets the CRUD defaults only.
    pub fn discover(dir: &Path, catalog: ControllerCatalog) -> Result<Self> {
        let mut definitions = catalog.definitions;
        let mut builder = Self::builder();

        for unit in discover_units(dir, MANIFEST_EXTENSION)? {
            let manifest: ControllerManifest = read_manifest(&unit.path)?;
            let definition = definitions
                .remove(&unit.name)
                .unwrap_or_default()
                .with_manifest(&unit.name, manifest)?;
            builder = builder.register(unit.name, definition)?;
        }

        for name in definitions.keys() {
            tracing::warn!(
                "Controller {} has no manifest in {}; not registered",
                name,
                dir.display()
            );
        }

        Ok(builder.build())
    }

    pub fn get(&self, name: &str) -> Option<&ControllerDescriptor> {
        self.controllers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[derive(Default)]
pub struct ControllerRegistryBuilder {
    controllers: BTreeMap<String, ControllerDescriptor>,
}

impl ControllerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        definition: ControllerDefinition,
    ) -> Result<Self> {
        let name = name.into();
        if self.controllers.contains_key(&name) {
            return Err(CrudrouteError::DuplicateController(name));
        }
        let descriptor = ControllerDescriptor::new(name.clone(), definition);
        tracing::info!(
            "Registered controller {} (model: {})",
            name,
            descriptor.model().unwrap_or("<none>")
        );
        self.controllers.insert(name, descriptor);
        Ok(self)
    }

    pub fn build(self) -> ControllerRegistry {
        ControllerRegistry {
            controllers: self.controllers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_descriptor_resolves_verbs_once() {
        let descriptor = ControllerDescriptor::new(
            "widgets",
            ControllerDefinition::new()
                .model("Widget")
                .verb("read", Method::POST)
                .verb("count", Method::GET),
        );
        assert_eq!(descriptor.verbs().get("read"), Some(&Method::POST));
        assert_eq!(descriptor.verbs().get("create"), Some(&Method::POST));
        assert_eq!(descriptor.verbs().get("count"), Some(&Method::GET));
        assert_eq!(descriptor.model(), Some("Widget"));
    }

    #[test]
    fn test_descriptor_starts_with_crud_actions() {
        let descriptor = ControllerDescriptor::new(
            "widgets",
            ControllerDefinition::new().action("count", |_| Box::pin(async { Ok(json!(0)) })),
        );
        let names: Vec<_> = descriptor.action_names().collect();
        assert_eq!(names, ["count", "create", "delete", "read", "update"]);
        assert!(descriptor.action("status").is_none());
    }

    #[test]
    fn test_manifest_overrides_catalog() {
        let manifest: ControllerManifest =
            toml::from_str("model = \"Gadget\"\n[methods]\nread = \"Post\"\n").unwrap();
        let definition = ControllerDefinition::new()
            .model("Widget")
            .verb("read", Method::PUT)
            .with_manifest("widgets", manifest)
            .unwrap();
        let descriptor = ControllerDescriptor::new("widgets", definition);
        assert_eq!(descriptor.model(), Some("Gadget"));
        assert_eq!(descriptor.verbs().get("read"), Some(&Method::POST));
    }

    #[test]
    fn test_manifest_rejects_bad_verbs() {
        let manifest = ControllerManifest {
            model: None,
            methods: BTreeMap::from([("read".to_string(), "not a verb".to_string())]),
        };
        let err = ControllerDefinition::new()
            .with_manifest("widgets", manifest)
            .err()
            .unwrap();
        assert!(matches!(err, CrudrouteError::InvalidVerb { action, .. } if action == "read"));
    }

    #[test]
    fn test_discover_registers_manifests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("widgets.toml"), "model = \"Widget\"\n").unwrap();
        fs::write(dir.path().join("accounts.toml"), "model = \"Account\"\n").unwrap();
        fs::write(dir.path().join(".draft.toml"), "model = \"Draft\"\n").unwrap();
        fs::write(dir.path().join("readme.txt"), "not a controller").unwrap();

        let catalog = ControllerCatalog::new()
            .define(
                "widgets",
                ControllerDefinition::new().action("ping", |_| Box::pin(async { Ok(json!("pong")) })),
            )
            .define("orphans", ControllerDefinition::new());

        let registry = ControllerRegistry::discover(dir.path(), catalog).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["accounts", "widgets"]);
        assert!(registry.get("widgets").unwrap().action("ping").is_some());
        assert!(registry.get("accounts").unwrap().action("ping").is_none());
        assert!(!registry.contains("orphans"));
    }

    #[test]
    fn test_discover_requires_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ControllerRegistry::discover(&dir.path().join("missing"), ControllerCatalog::new())
            .unwrap_err();
        assert!(matches!(err, CrudrouteError::Discovery { .. }));
    }

    #[test]
    fn test_duplicate_controller_names_are_rejected() {
        let result = ControllerRegistry::builder()
            .register("widgets", ControllerDefinition::new())
            .unwrap()
            .register("widgets", ControllerDefinition::new());
        assert!(matches!(result, Err(CrudrouteError::DuplicateController(_))));
    }
}
