//! # viewset
//!
//! Declarative CRUD resource views with token authentication, for axum.
//!
//! ## Features
//!
//! - **Resource views**: list, count, get, create, replace, update and delete
//!   endpoints generated from one `Resource` description
//! - **Overrides**: replace any operation, post-process lookups, add custom
//!   operations, run post-create side effects in the background
//! - **Ownership scoping**: non-privileged callers only ever see their own
//!   instances; anything else is a 404
//! - **Token auth**: HMAC-signed access/refresh tokens, per-operation policies
//! - **Error translation**: unique, not-null and foreign-key violations become 422s
//! - **Configuration-Based**: secrets, enabled operations and policies from YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use viewset::prelude::*;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Store { id: Uuid, name: String, user_id: Uuid }
//!
//! impl Resource for Store {
//!     type Create = StoreCreate;
//!     type Update = StoreUpdate;
//!     type Display = Store;
//!
//!     fn resource_name() -> &'static str { "stores" }
//!     fn id(&self) -> Uuid { self.id }
//!     fn owner_id(&self) -> Option<Uuid> { Some(self.user_id) }
//! }
//!
//! let app = ServerBuilder::new()
//!     .with_config(AppConfig::from_yaml_file("app.yaml")?)
//!     .with_principals(users)
//!     .register(ResourceView::new("/stores", stores))
//!     .build()?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Traits ===
    pub use crate::core::{
        auth::{
            AuthGuard, AuthPolicy, Authenticator, CredentialVerifier, Principal, PrincipalCreate,
            PrincipalDisplay, PrincipalUpdate,
        },
        error::{PersistenceError, ViewError, ViewResult},
        operation::Operation,
        query::{Page, PageParams, Pagination},
        repository::{Changes, Repository},
        resource::{Ownership, Resource, Scope},
        settings::{Setting, SettingScheme, SettingsStore},
        tasks::BackgroundTasks,
        token::{Clock, FixedClock, SystemClock, TokenIssuer, TokenKind},
    };

    #[cfg(feature = "push")]
    pub use crate::core::notify::WebhookNotifier;

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryRepository;

    // === Config ===
    pub use crate::config::{AppConfig, AuthSettings, ResourceConfig};

    // === Server ===
    pub use crate::server::{
        Call, Caller, ResourceView, ServerBuilder, TokenPair, ViewDescriptor, ViewRegistry,
        principal_view,
    };

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;

    // === Axum ===
    pub use axum::{
        Router,
        extract::{Path, State},
        http::HeaderMap,
        routing::MethodFilter,
    };
}
