//! Persistence seam.
//!
//! Controllers only ever talk to a [`Model`]: something that can create a
//! record and read back records matching an equality filter. The built-in
//! backend is [`MemoryModel`]; hosts can register their own implementations
//! through [`ModelRegistry::builder`].

mod memory;
mod registry;

pub use memory::{AssociationDefinition, AssociationKind, KeyStrategy, MemoryModel, ModelDefinition};
pub use registry::{ModelRegistry, ModelRegistryBuilder};

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Equality criteria, attribute name to expected value.
pub type Filter = Map<String, Value>;

#[async_trait]
pub trait Model: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Attribute holding the record identifier.
    fn primary_key(&self) -> &str {
        "id"
    }

    /// Persist `record` and return the stored form, generated fields included.
    async fn create(&self, record: Value) -> anyhow::Result<Value>;

    /// Every record whose attributes equal the criteria in `filter`.
    async fn find_all(&self, filter: &Filter) -> anyhow::Result<Vec<Value>>;

    /// Wire references to other models. Runs once, after every model is registered.
    fn associate(&self, _models: &ModelRegistry) -> anyhow::Result<()> {
        Ok(())
    }

    /// Make sure the backing schema exists.
    async fn sync(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
