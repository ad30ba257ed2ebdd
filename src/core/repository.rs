//! Repository trait for resource persistence

use crate::core::error::{PersistenceError, ViewError, ViewResult};
use crate::core::resource::{Resource, Scope};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field values written by an insert or update, keyed by field name
///
/// Only the keys present are written; absent fields keep their stored value.
pub type Changes = Map<String, Value>;

/// Storage interface for one resource type
///
/// Implementations own their concurrency control and report constraint
/// failures as the matching [`PersistenceError`] variant so the framework
/// can translate them for clients. The framework is agnostic to the
/// underlying storage mechanism.
#[async_trait]
pub trait Repository<R: Resource>: Send + Sync {
    /// Count instances inside a scope
    async fn count(&self, scope: &Scope) -> Result<u64, PersistenceError>;

    /// Fetch a slice of a scope, in a stable order
    async fn fetch_page(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<R>, PersistenceError>;

    /// Get an instance by ID inside a scope
    async fn get(&self, scope: &Scope, id: &Uuid) -> Result<Option<R>, PersistenceError>;

    /// Insert a new instance built from raw field values
    async fn insert(&self, fields: Changes) -> Result<R, PersistenceError>;

    /// Apply field values to an existing instance
    async fn update(&self, id: &Uuid, changes: Changes) -> Result<R, PersistenceError>;

    /// Delete an instance
    async fn delete(&self, id: &Uuid) -> Result<(), PersistenceError>;

    /// Search instances by an exact field value
    async fn search(&self, field: &str, value: &Value) -> Result<Vec<R>, PersistenceError>;
}

/// Convert a serializable payload into the field map written by a repository
pub fn to_changes<T: Serialize>(payload: &T) -> Result<Changes, PersistenceError> {
    match serde_json::to_value(payload).map_err(|e| PersistenceError::Other(e.into()))? {
        Value::Object(map) => Ok(map),
        other => Err(PersistenceError::Other(anyhow::anyhow!(
            "expected an object payload, got {}",
            other
        ))),
    }
}

/// Lay a partial update over `base` and type-check the result as `U`
///
/// `base` must carry every field of `U`; a patch key outside it is rejected.
/// Only the patched fields are returned, in their checked form.
pub fn overlay<U: Serialize + DeserializeOwned>(
    mut base: Changes,
    patch: Changes,
) -> ViewResult<Changes> {
    if let Some(unknown) = patch.keys().find(|key| !base.contains_key(*key)) {
        return Err(ViewError::validation(format!("unknown field `{}`", unknown)));
    }

    let keys: Vec<String> = patch.keys().cloned().collect();
    base.extend(patch);

    let checked: U = serde_json::from_value(Value::Object(base))
        .map_err(|e| ViewError::validation(e.to_string()))?;
    let mut checked = to_changes(&checked)?;

    Ok(keys
        .into_iter()
        .filter_map(|key| checked.remove(&key).map(|value| (key, value)))
        .collect())
}
