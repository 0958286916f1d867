use super::{Filter, Model, ModelRegistry};
use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::RwLock;
use uuid::Uuid;

/// How the primary key of a new record is generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    #[default]
    Increment,
    Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// The source holds a foreign key referencing the target.
    BelongsTo,
    /// The target holds a foreign key referencing the source.
    HasMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationDefinition {
    pub kind: AssociationKind,
    pub target: String,
    pub foreign_key: Option<String>,
}

/// Model manifest, one `models/<name>.toml` per model.
///
/// ```toml
/// name = "Widget"
/// primary_key = "increment"
/// attributes = ["name", "price"]
///
/// [[associations]]
/// kind = "belongs_to"
/// target = "Category"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelDefinition {
    pub name: Option<String>,
    pub primary_key: KeyStrategy,
    /// Adds `createdAt`/`updatedAt` to every created record.
    pub timestamps: bool,
    /// Persisted attributes. Empty means every attribute is kept.
    pub attributes: Vec<String>,
    pub associations: Vec<AssociationDefinition>,
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            name: None,
            primary_key: KeyStrategy::Increment,
            timestamps: true,
            attributes: Vec::new(),
            associations: Vec::new(),
        }
    }
}

impl AssociationDefinition {
    /// Explicit foreign key, or `<target in lowerCamel>Id`.
    pub fn foreign_key(&self) -> String {
        if let Some(key) = &self.foreign_key {
            return key.clone();
        }
        let mut chars = self.target.chars();
        match chars.next() {
            Some(first) => format!("{}{}Id", first.to_lowercase(), chars.as_str()),
            None => "Id".to_string(),
        }
    }
}

struct Reference {
    foreign_key: String,
    target_name: String,
    target: Weak<dyn Model>,
}

/// Process-local table backend.
pub struct MemoryModel {
    name: String,
    definition: ModelDefinition,
    /// `None` until the schema has been synced.
    rows: RwLock<Option<Vec<Value>>>,
    last_id: AtomicU64,
    references: OnceLock<Vec<Reference>>,
}

const PRIMARY_KEY: &str = "id";

impl MemoryModel {
    pub fn new(name: impl Into<String>, definition: ModelDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
            rows: RwLock::new(None),
            last_id: AtomicU64::new(0),
            references: OnceLock::new(),
        }
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    fn references(&self) -> &[Reference] {
        self.references.get().map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_column(&self, attribute: &str) -> bool {
        self.definition.attributes.is_empty()
            || attribute == PRIMARY_KEY
            || self.definition.attributes.iter().any(|a| a == attribute)
            || (self.definition.timestamps && matches!(attribute, "createdAt" | "updatedAt"))
            || self.references().iter().any(|r| r.foreign_key == attribute)
    }

    fn missing_table(&self) -> anyhow::Error {
        anyhow!("Table for model {} does not exist", self.name)
    }

    async fn check_references(&self, row: &Map<String, Value>) -> anyhow::Result<()> {
        for reference in self.references() {
            let Some(value) = row.get(&reference.foreign_key).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = reference.target.upgrade().ok_or_else(|| {
                anyhow!("Model {} is no longer registered", reference.target_name)
            })?;
            let mut filter = Filter::new();
            filter.insert(target.primary_key().to_string(), value.clone());
            if target.find_all(&filter).await?.is_empty() {
                bail!(
                    "Foreign key constraint failed: {}.{} references missing {} {}",
                    self.name,
                    reference.foreign_key,
                    reference.target_name,
                    value
                );
            }
        }
        Ok(())
    }
}

/// Equality with the leniency query strings need: `"3"` matches `3`, and an
/// array of criteria matches any of its values.
fn criterion_matches(value: &Value, criterion: &Value) -> bool {
    match (value, criterion) {
        (_, Value::Array(options)) if !value.is_array() => {
            options.iter().any(|option| criterion_matches(value, option))
        }
        (Value::Number(_) | Value::Bool(_), Value::String(text)) => value.to_string() == *text,
        _ => value == criterion,
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    filter.iter().all(|(attribute, criterion)| {
        criterion_matches(row.get(attribute).unwrap_or(&Value::Null), criterion)
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn primary_key(&self) -> &str {
        PRIMARY_KEY
    }

    async fn create(&self, record: Value) -> anyhow::Result<Value> {
        let input = match record {
            Value::Object(input) => input,
            other => bail!(
                "{} expects an object record, got {}",
                self.name,
                json_kind(&other)
            ),
        };

        let mut row: Map<String, Value> = input
            .into_iter()
            .filter(|(attribute, _)| self.is_column(attribute))
            .collect();
        self.check_references(&row).await?;

        let mut rows = self.rows.write().await;
        let rows = rows.as_mut().ok_or_else(|| self.missing_table())?;

        let key = match row.get(PRIMARY_KEY).filter(|v| !v.is_null()) {
            Some(supplied) => {
                if rows.iter().any(|existing| existing[PRIMARY_KEY] == *supplied) {
                    bail!("Duplicate key {} for model {}", supplied, self.name);
                }
                if let Some(id) = supplied.as_u64() {
                    self.last_id.fetch_max(id, Ordering::SeqCst);
                }
                supplied.clone()
            }
            None => match self.definition.primary_key {
                KeyStrategy::Increment => {
                    let previous = self
                        .last_id
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
                        .map_err(|_| anyhow!("Key space exhausted for model {}", self.name))?;
                    Value::from(previous + 1)
                }
                KeyStrategy::Uuid => Value::from(Uuid::new_v4().to_string()),
            },
        };
        row.insert(PRIMARY_KEY.to_string(), key);

        if self.definition.timestamps {
            let now = Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
            row.insert("createdAt".to_string(), now.clone());
            row.insert("updatedAt".to_string(), now);
        }

        let row = Value::Object(row);
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_all(&self, filter: &Filter) -> anyhow::Result<Vec<Value>> {
        if let Some(unknown) = filter.keys().find(|attribute| !self.is_column(attribute)) {
            bail!("Unknown column '{}' for model {}", unknown, self.name);
        }

        let rows = self.rows.read().await;
        let rows = rows.as_ref().ok_or_else(|| self.missing_table())?;
        Ok(rows
            .iter()
            .filter(|row| row_matches(row, filter))
            .cloned()
            .collect())
    }

    fn associate(&self, models: &ModelRegistry) -> anyhow::Result<()> {
        let mut references = Vec::new();
        for association in &self.definition.associations {
            let target = models.get(&association.target).with_context(|| {
                format!(
                    "{} is associated with unknown model {}",
                    self.name, association.target
                )
            })?;
            if association.kind == AssociationKind::BelongsTo {
                references.push(Reference {
                    foreign_key: association.foreign_key(),
                    target_name: association.target.clone(),
                    target: Arc::downgrade(target),
                });
            }
        }
        self.references
            .set(references)
            .map_err(|_| anyhow!("Model {} is already associated", self.name))
    }

    async fn sync(&self) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        if rows.is_none() {
            tracing::debug!("Creating table for model {}", self.name);
            *rows = Some(Vec::new());
        }
        Ok(())
    }
}
