//! Core module containing fundamental traits and types for the framework

pub mod auth;
pub mod error;
#[cfg(feature = "push")]
pub mod notify;
pub mod operation;
pub mod query;
pub mod repository;
pub mod resource;
pub mod settings;
pub mod tasks;
pub mod token;

pub use auth::{AuthGuard, AuthPolicy, Authenticator, CredentialVerifier, Principal};
pub use error::{PersistenceError, ViewError, ViewResult};
pub use operation::Operation;
pub use query::{Page, PageParams, Pagination};
pub use repository::{Changes, Repository};
pub use resource::{Ownership, Resource, Scope};
pub use settings::{Setting, SettingScheme, SettingsStore};
pub use tasks::BackgroundTasks;
pub use token::{Clock, FixedClock, SystemClock, TokenIssuer, TokenKind};
