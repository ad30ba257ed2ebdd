//! In-memory implementation of Repository for testing and development

use crate::core::error::PersistenceError;
use crate::core::repository::{Changes, Repository};
use crate::core::resource::{Resource, Scope};
use anyhow::anyhow;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Something a foreign-key constraint can point at
pub trait KeySet: Send + Sync {
    /// Table name used in constraint messages
    fn table(&self) -> &str;

    fn contains_key(&self, id: &Uuid) -> bool;
}

#[derive(Clone)]
struct Reference {
    field: String,
    target: Arc<dyn KeySet>,
}

/// In-memory repository
///
/// Keeps insertion order, so pages are stable. Uses RwLock for thread-safe
/// access. Declared constraints are enforced on every write and reported
/// with the same messages a relational database would produce.
///
/// ```rust,ignore
/// let users = InMemoryRepository::<Principal>::new().unique(["email"]);
/// let stores = InMemoryRepository::<Store>::new()
///     .unique(["name"])
///     .required(["name"])
///     .references("user_id", &users);
/// ```
pub struct InMemoryRepository<R: Resource> {
    items: Arc<RwLock<IndexMap<Uuid, R>>>,
    unique: Vec<String>,
    required: Vec<String>,
    references: Vec<Reference>,
}

impl<R: Resource> Clone for InMemoryRepository<R> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            unique: self.unique.clone(),
            required: self.required.clone(),
            references: self.references.clone(),
        }
    }
}

impl<R: Resource> InMemoryRepository<R> {
    /// Create an empty repository without constraints
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(IndexMap::new())),
            unique: Vec::new(),
            required: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Declare fields whose non-null values must be unique
    pub fn unique<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.unique.extend(fields.into_iter().map(String::from));
        self
    }

    /// Declare fields that must be present and non-null
    pub fn required<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.required.extend(fields.into_iter().map(String::from));
        self
    }

    /// Declare that `field` holds the id of an instance in `target`
    pub fn references<T: Resource>(mut self, field: &str, target: &InMemoryRepository<T>) -> Self {
        self.references.push(Reference {
            field: field.to_string(),
            target: Arc::new(target.clone()),
        });
        self
    }

    /// Store an instance as-is, enforcing constraints
    pub fn seed(&self, item: R) -> Result<R, PersistenceError> {
        let fields = serialize(&item)?;
        self.check_required(&fields)?;
        self.check_references(&fields)?;

        let mut items = self.write()?;
        self.check_unique(&items, &item.id(), &fields)?;
        items.insert(item.id(), item.clone());

        Ok(item)
    }

    /// Number of stored instances
    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table(&self) -> &'static str {
        R::resource_name()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, IndexMap<Uuid, R>>, PersistenceError> {
        self.items
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e).into())
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, IndexMap<Uuid, R>>, PersistenceError> {
        self.items
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e).into())
    }

    fn check_required(&self, fields: &Changes) -> Result<(), PersistenceError> {
        match self
            .required
            .iter()
            .find(|f| fields.get(f.as_str()).is_none_or(Value::is_null))
        {
            Some(field) => Err(not_null(field)),
            None => Ok(()),
        }
    }

    fn check_references(&self, fields: &Changes) -> Result<(), PersistenceError> {
        for reference in &self.references {
            let value = match fields.get(&reference.field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let exists = value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .is_some_and(|id| reference.target.contains_key(&id));

            if !exists {
                return Err(PersistenceError::ForeignKeyViolation {
                    message: format!(
                        "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{field}_fkey\"",
                        table = self.table(),
                        field = reference.field,
                    ),
                });
            }
        }
        Ok(())
    }

    fn check_unique(
        &self,
        items: &IndexMap<Uuid, R>,
        id: &Uuid,
        fields: &Changes,
    ) -> Result<(), PersistenceError> {
        for field in &self.unique {
            let value = match fields.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let taken = items
                .iter()
                .filter(|(other, _)| *other != id)
                .any(|(_, item)| field_value(item, field).as_ref() == Some(value));

            if taken {
                return Err(PersistenceError::UniqueViolation {
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        self.table(),
                        field
                    ),
                });
            }
        }
        Ok(())
    }

    /// Validate and materialize a full field map
    fn build(&self, fields: Changes) -> Result<R, PersistenceError> {
        self.check_required(&fields)?;
        self.check_references(&fields)?;
        deserialize(fields)
    }
}

impl<R: Resource> Default for InMemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> KeySet for InMemoryRepository<R> {
    fn table(&self) -> &str {
        R::resource_name()
    }

    fn contains_key(&self, id: &Uuid) -> bool {
        self.items
            .read()
            .map(|items| items.contains_key(id))
            .unwrap_or(false)
    }
}

fn not_null(field: &str) -> PersistenceError {
    PersistenceError::NotNullViolation {
        message: format!(
            "null value in column \"{}\" violates not-null constraint",
            field
        ),
    }
}

fn serialize<T: serde::Serialize>(item: &T) -> Result<Changes, PersistenceError> {
    crate::core::repository::to_changes(item)
}

fn field_value<R: Resource>(item: &R, field: &str) -> Option<Value> {
    serialize(item).ok()?.remove(field)
}

/// Build an instance, reporting missing fields as not-null violations
fn deserialize<R: Resource>(fields: Changes) -> Result<R, PersistenceError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        let message = e.to_string();
        match message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            Some(field) => not_null(field),
            None => PersistenceError::Other(e.into()),
        }
    })
}

#[async_trait]
impl<R: Resource> Repository<R> for InMemoryRepository<R> {
    async fn count(&self, scope: &Scope) -> Result<u64, PersistenceError> {
        let items = self.read()?;
        Ok(items.values().filter(|item| scope.contains(*item)).count() as u64)
    }

    async fn fetch_page(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<R>, PersistenceError> {
        let items = self.read()?;
        Ok(items
            .values()
            .filter(|item| scope.contains(*item))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, scope: &Scope, id: &Uuid) -> Result<Option<R>, PersistenceError> {
        let items = self.read()?;
        Ok(items.get(id).filter(|item| scope.contains(*item)).cloned())
    }

    async fn insert(&self, mut fields: Changes) -> Result<R, PersistenceError> {
        if fields.get("id").is_none_or(Value::is_null) {
            fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }

        let item = self.build(fields.clone())?;

        let mut items = self.write()?;
        if items.contains_key(&item.id()) {
            return Err(PersistenceError::UniqueViolation {
                message: format!(
                    "duplicate key value violates unique constraint \"{}_pkey\"",
                    self.table()
                ),
            });
        }
        self.check_unique(&items, &item.id(), &fields)?;
        items.insert(item.id(), item.clone());

        Ok(item)
    }

    async fn update(&self, id: &Uuid, mut changes: Changes) -> Result<R, PersistenceError> {
        changes.remove("id");

        let current = self
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no {} row with id {}", self.table(), id))?;

        let mut fields = serialize(&current)?;
        fields.extend(changes);
        let item = self.build(fields.clone())?;

        let mut items = self.write()?;
        if !items.contains_key(id) {
            return Err(anyhow!("no {} row with id {}", self.table(), id).into());
        }
        self.check_unique(&items, id, &fields)?;
        items.insert(*id, item.clone());

        Ok(item)
    }

    async fn delete(&self, id: &Uuid) -> Result<(), PersistenceError> {
        let mut items = self.write()?;
        items.shift_remove(id);
        Ok(())
    }

    async fn search(&self, field: &str, value: &Value) -> Result<Vec<R>, PersistenceError> {
        let items = self.read()?;
        Ok(items
            .values()
            .filter(|item| field_value(*item, field).as_ref() == Some(value))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Owner {
        id: Uuid,
    }

    impl Resource for Owner {
        type Create = Owner;
        type Update = Owner;
        type Display = Owner;

        fn resource_name() -> &'static str {
            "owners"
        }

        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Store {
        id: Uuid,
        name: String,
        #[serde(default)]
        note: Option<String>,
        user_id: Option<Uuid>,
    }

    impl Resource for Store {
        type Create = Store;
        type Update = Store;
        type Display = Store;

        fn resource_name() -> &'static str {
            "stores"
        }

        fn id(&self) -> Uuid {
            self.id
        }

        fn owner_id(&self) -> Option<Uuid> {
            self.user_id
        }
    }

    fn fields(value: Value) -> Changes {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn stores() -> InMemoryRepository<Store> {
        InMemoryRepository::new().unique(["name"]).required(["name"])
    }

    #[tokio::test]
    async fn test_insert_assigns_id() {
        let repo = stores();
        let store = repo
            .insert(fields(json!({"name": "Main", "user_id": null})))
            .await
            .unwrap();

        assert!(!store.id.is_nil());
        assert_eq!(
            repo.get(&Scope::All, &store.id).await.unwrap(),
            Some(store)
        );
    }

    #[tokio::test]
    async fn test_unique_violation_keeps_first() {
        let repo = stores();
        let first = repo
            .insert(fields(json!({"name": "Main", "user_id": null})))
            .await
            .unwrap();

        let err = repo
            .insert(fields(json!({"name": "Main", "user_id": null})))
            .await
            .unwrap_err();

        assert!(matches!(err, PersistenceError::UniqueViolation { .. }));
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint \"stores_name_key\""
        );
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(&Scope::All, &first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_update_to_own_value_is_not_a_duplicate() {
        let repo = stores();
        let store = repo
            .insert(fields(json!({"name": "Main", "user_id": null})))
            .await
            .unwrap();

        let updated = repo
            .update(&store.id, fields(json!({"name": "Main", "note": "x"})))
            .await
            .unwrap();
        assert_eq!(updated.note.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_required_field() {
        let repo = stores();
        let err = repo
            .insert(fields(json!({"name": null, "user_id": null})))
            .await
            .unwrap_err();

        assert!(matches!(err, PersistenceError::NotNullViolation { .. }));
        assert_eq!(
            err.to_string(),
            "null value in column \"name\" violates not-null constraint"
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_not_null_violation() {
        let repo = InMemoryRepository::<Store>::new();
        let err = repo.insert(fields(json!({"user_id": null}))).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotNullViolation { .. }));
    }

    #[tokio::test]
    async fn test_foreign_key() {
        let owners = InMemoryRepository::<Owner>::new();
        let owner = owners.seed(Owner { id: Uuid::new_v4() }).unwrap();
        let repo = stores().references("user_id", &owners);

        repo.insert(fields(json!({"name": "A", "user_id": owner.id})))
            .await
            .unwrap();

        let err = repo
            .insert(fields(json!({"name": "B", "user_id": Uuid::new_v4()})))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::ForeignKeyViolation { .. }));
        assert!(err.to_string().contains("stores_user_id_fkey"));
    }

    #[tokio::test]
    async fn test_scope_filters_and_order() {
        let repo = InMemoryRepository::<Store>::new();
        let me = Uuid::new_v4();
        for (i, owner) in [Some(me), None, Some(me)].into_iter().enumerate() {
            repo.insert(fields(json!({"name": format!("s{}", i), "user_id": owner})))
                .await
                .unwrap();
        }

        assert_eq!(repo.count(&Scope::All).await.unwrap(), 3);
        assert_eq!(repo.count(&Scope::OwnedBy(me)).await.unwrap(), 2);

        let page = repo.fetch_page(&Scope::OwnedBy(me), 0, 10).await.unwrap();
        let names: Vec<_> = page.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["s0", "s2"]);

        let second = repo.fetch_page(&Scope::All, 1, 1).await.unwrap();
        assert_eq!(second[0].name, "s1");
    }

    #[tokio::test]
    async fn test_out_of_scope_get_is_none() {
        let repo = InMemoryRepository::<Store>::new();
        let store = repo
            .insert(fields(json!({"name": "A", "user_id": Uuid::new_v4()})))
            .await
            .unwrap();

        let other = Scope::OwnedBy(Uuid::new_v4());
        assert_eq!(repo.get(&other, &store.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_ignores_id_and_keeps_untouched_fields() {
        let repo = InMemoryRepository::<Store>::new();
        let store = repo
            .insert(fields(json!({"name": "A", "note": "keep", "user_id": null})))
            .await
            .unwrap();

        let updated = repo
            .update(
                &store.id,
                fields(json!({"id": Uuid::new_v4(), "name": "B"})),
            )
            .await
            .unwrap();

        assert_eq!(updated.id, store.id);
        assert_eq!(updated.name, "B");
        assert_eq!(updated.note.as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn test_delete_and_search() {
        let repo = InMemoryRepository::<Store>::new();
        let a = repo
            .insert(fields(json!({"name": "A", "user_id": null})))
            .await
            .unwrap();

        let found = repo.search("name", &json!("A")).await.unwrap();
        assert_eq!(found, vec![a.clone()]);

        repo.delete(&a.id).await.unwrap();
        assert!(repo.is_empty());
        assert!(repo.search("name", &json!("A")).await.unwrap().is_empty());
    }
}
