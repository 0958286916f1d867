use super::{MemoryModel, Model, ModelDefinition};
use crate::config::DatabaseConfig;
use crate::discovery::{MANIFEST_EXTENSION, discover_units, read_manifest};
use crate::error::{CrudrouteError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Immutable mapping from model name to model handle.
///
/// Built once before the server starts and shared by every request.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: Arc<BTreeMap<String, Arc<dyn Model>>>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::new()
    }

    /// Build the registry described by `config` from the manifests in `dir`.
    ///
    /// Every model is associated, then all schemas are synced concurrently.
    pub async fn connect(config: &DatabaseConfig, dir: &Path) -> Result<Self> {
        let dialect = config.dialect();
        if dialect != "memory" {
            return Err(CrudrouteError::UnsupportedDialect(dialect.to_string()));
        }

        let mut builder = Self::builder();
        for unit in discover_units(dir, MANIFEST_EXTENSION)? {
            let definition: ModelDefinition = read_manifest(&unit.path)?;
            let name = definition.name.clone().unwrap_or(unit.name);
            tracing::info!("Defined model {} from {}", name, unit.path.display());
            builder = builder.register(MemoryModel::new(name, definition))?;
        }
        builder.initialize().await
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Model>> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.models.keys()).finish()
    }
}

/// Collects models before the registry is frozen.
#[derive(Default)]
pub struct ModelRegistryBuilder {
    models: BTreeMap<String, Arc<dyn Model>>,
}

impl ModelRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(self, model: M) -> Result<Self> {
        self.register_arc(Arc::new(model))
    }

    pub fn register_arc(mut self, model: Arc<dyn Model>) -> Result<Self> {
        let name = model.name().to_string();
        if self.models.contains_key(&name) {
            return Err(CrudrouteError::DuplicateModel(name));
        }
        self.models.insert(name, model);
        Ok(self)
    }

    /// Freeze without running associations or schema sync.
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            models: Arc::new(self.models),
        }
    }

    /// Freeze, associate every model in name order, then sync all schemas.
    pub async fn initialize(self) -> Result<ModelRegistry> {
        let registry = self.build();

        for (name, model) in registry.models.iter() {
            model
                .associate(&registry)
                .map_err(|e| CrudrouteError::ModelSetup {
                    model: name.clone(),
                    message: format!("{e:#}"),
                })?;
        }

        let mut syncs = JoinSet::new();
        for (name, model) in registry.models.iter() {
            let name = name.clone();
            let model = Arc::clone(model);
            syncs.spawn(async move { model.sync().await.map_err(|e| (name, e)) });
        }
        while let Some(joined) = syncs.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((model, e))) => {
                    return Err(CrudrouteError::ModelSetup {
                        model,
                        message: format!("{e:#}"),
                    });
                }
                Err(e) => {
                    return Err(CrudrouteError::ModelSetup {
                        model: "<sync task>".to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!("Model registry ready with {} model(s)", registry.len());
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn test_connect_builds_models_from_manifests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("widget.toml"),
            "name = \"Widget\"\n[[associations]]\nkind = \"belongs_to\"\ntarget = \"Category\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("category.toml"), "name = \"Category\"\n").unwrap();

        let registry = ModelRegistry::connect(&DatabaseConfig::default(), dir.path())
            .await
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["Category", "Widget"]);

        let category = registry.get("Category").unwrap();
        let created = category.create(json!({"title": "tools"})).await.unwrap();
        let widget = registry.get("Widget").unwrap();
        widget
            .create(json!({"name": "hammer", "categoryId": created["id"]}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::default().with("dialect", "postgres");
        let err = ModelRegistry::connect(&config, dir.path()).await.unwrap_err();
        assert!(matches!(err, CrudrouteError::UnsupportedDialect(d) if d == "postgres"));
    }

    #[tokio::test]
    async fn test_missing_association_target_fails_setup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("widget.toml"),
            "name = \"Widget\"\n[[associations]]\nkind = \"has_many\"\ntarget = \"Part\"\n",
        )
        .unwrap();

        let err = ModelRegistry::connect(&DatabaseConfig::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, CrudrouteError::ModelSetup { model, .. } if model == "Widget"));
    }

    #[test]
    fn test_duplicate_model_names_are_rejected() {
        let result = ModelRegistry::builder()
            .register(MemoryModel::new("Widget", ModelDefinition::default()))
            .unwrap()
            .register(MemoryModel::new("Widget", ModelDefinition::default()));
        assert!(matches!(result, Err(CrudrouteError::DuplicateModel(name)) if name == "Widget"));
    }
}
