//! Persisted application settings
//!
//! Each settings scheme is a typed struct stored as one JSON document under
//! its name. Reading a scheme that was never written yields its defaults;
//! writing merges only the fields sent into what is already stored.
//!
//! ```rust,ignore
//! #[derive(Default, Serialize, Deserialize)]
//! struct Policy { allow_anonymous_invoices: bool, discount: u8 }
//!
//! impl SettingScheme for Policy {
//!     fn setting_name() -> &'static str { "policy" }
//! }
//!
//! let settings = SettingsStore::new(Arc::new(repo));
//! let policy: Policy = settings.get().await?;
//! settings.set::<Policy>(changes).await?;
//! ```

use crate::core::error::{ViewError, ViewResult};
use crate::core::repository::{Changes, Repository, overlay, to_changes};
use crate::core::resource::Resource;
use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A typed group of settings
pub trait SettingScheme: Serialize + DeserializeOwned + Default + Send {
    /// Key the scheme is stored under
    fn setting_name() -> &'static str;
}

/// Stored row: the explicitly written fields of one scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: Uuid,
    pub name: String,
    pub value: Changes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingCreate {
    pub name: String,
    #[serde(default)]
    pub value: Changes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingUpdate {
    pub value: Changes,
}

impl Resource for Setting {
    type Create = SettingCreate;
    type Update = SettingUpdate;
    type Display = Setting;

    fn resource_name() -> &'static str {
        "settings"
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Typed access to settings kept in a [`Repository`]
#[derive(Clone)]
pub struct SettingsStore {
    repository: Arc<dyn Repository<Setting>>,
}

impl SettingsStore {
    pub fn new(repository: Arc<dyn Repository<Setting>>) -> Self {
        Self { repository }
    }

    async fn find(&self, name: &str) -> ViewResult<Option<Setting>> {
        let mut found = self
            .repository
            .search("name", &Value::String(name.to_string()))
            .await?;
        Ok(found.pop())
    }

    /// Current value of a scheme, or its defaults when never written
    pub async fn get<S: SettingScheme>(&self) -> ViewResult<S> {
        match self.find(S::setting_name()).await? {
            Some(stored) => decode(stored.value),
            None => Ok(S::default()),
        }
    }

    /// Merge `patch` into the stored scheme and return the result
    ///
    /// Unknown or ill-typed fields are rejected before anything is written.
    pub async fn set<S: SettingScheme>(&self, patch: Changes) -> ViewResult<S> {
        let name = S::setting_name();
        let stored = self.find(name).await?;

        let mut value = stored
            .as_ref()
            .map(|s| s.value.clone())
            .unwrap_or_default();
        let mut base = to_changes(&S::default())?;
        base.extend(value.clone());
        value.extend(overlay::<S>(base, patch)?);

        let mut fields = Changes::new();
        fields.insert("value".to_string(), Value::Object(value.clone()));

        match stored {
            Some(setting) => {
                self.repository.update(&setting.id, fields).await?;
            }
            None => {
                fields.insert("name".to_string(), Value::String(name.to_string()));
                self.repository.insert(fields).await?;
            }
        }

        tracing::debug!(setting = %name, "settings updated");
        decode(value)
    }
}

/// Stored fields laid over the scheme defaults
fn decode<S: SettingScheme>(value: Changes) -> ViewResult<S> {
    let mut fields = to_changes(&S::default())?;
    fields.extend(value);

    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        ViewError::Internal(anyhow!(
            "stored setting '{}' is unreadable: {}",
            S::setting_name(),
            e
        ))
    })
}
