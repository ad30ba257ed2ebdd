//! Resource traits defining how an entity is exposed through a view

use crate::core::auth::Principal;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Base trait for every entity exposed through a [`ResourceView`].
///
/// A resource declares three shapes next to itself:
/// - `Create`: the validated payload accepted by `POST`
/// - `Update`: the payload accepted by `PUT` (and the field set `PATCH` may touch)
/// - `Display`: what every operation returns to the client
///
/// The entity itself is stored through a [`Repository`]; its other
/// attributes are opaque to the framework.
///
/// [`ResourceView`]: crate::server::view::ResourceView
/// [`Repository`]: crate::core::repository::Repository
pub trait Resource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Payload accepted by create
    type Create: DeserializeOwned + Serialize + Send + 'static;

    /// Payload accepted by replace
    type Update: DeserializeOwned + Serialize + Send + 'static;

    /// Shape returned to clients
    type Display: Serialize + From<Self> + Send + 'static;

    /// The resource name used in URLs and error details (e.g., "stores")
    fn resource_name() -> &'static str;

    /// Get the unique identifier for this instance
    fn id(&self) -> Uuid;

    /// Get the owning principal, if the entity is owned
    fn owner_id(&self) -> Option<Uuid> {
        None
    }
}

/// Subset of a repository visible to one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every instance
    All,
    /// Instances owned by this principal
    OwnedBy(Uuid),
    /// Only the instance with this identifier
    Only(Uuid),
}

impl Scope {
    /// Whether an instance falls inside this scope
    pub fn contains<R: Resource>(&self, item: &R) -> bool {
        match self {
            Scope::All => true,
            Scope::OwnedBy(owner) => item.owner_id() == Some(*owner),
            Scope::Only(id) => item.id() == *id,
        }
    }
}

type ScopeFn = Arc<dyn Fn(Option<&Principal>) -> Scope + Send + Sync>;

/// How a view narrows its data source for a principal
#[derive(Clone, Default)]
pub enum Ownership {
    /// Instances whose owner is the requesting principal
    #[default]
    Owned,

    /// The principal entity itself: lists only the caller's own record,
    /// while count and lookups run over the full set
    Principal,

    /// Never narrowed
    Public,

    /// Arbitrary narrowing
    Custom(ScopeFn),
}

impl Ownership {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Option<&Principal>) -> Scope + Send + Sync + 'static,
    {
        Ownership::Custom(Arc::new(f))
    }

    /// Scope used by list
    pub fn list_scope(&self, principal: Option<&Principal>) -> Scope {
        match (self, principal) {
            (Ownership::Custom(f), _) => f(principal),
            (Ownership::Public, _) => Scope::All,
            (Ownership::Owned, Some(p)) => Scope::OwnedBy(p.id),
            (Ownership::Principal, Some(p)) => Scope::Only(p.id),
            // Anonymous callers only reach public operations
            (_, None) => Scope::All,
        }
    }

    /// Scope used by count and by every id lookup
    pub fn lookup_scope(&self, principal: Option<&Principal>) -> Scope {
        match (self, principal) {
            (Ownership::Custom(f), _) => f(principal),
            (Ownership::Owned, Some(p)) => Scope::OwnedBy(p.id),
            _ => Scope::All,
        }
    }
}

impl fmt::Debug for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ownership::Owned => write!(f, "Owned"),
            Ownership::Principal => write!(f, "Principal"),
            Ownership::Public => write!(f, "Public"),
            Ownership::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
