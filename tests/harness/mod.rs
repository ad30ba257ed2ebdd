//! Shared fixtures for the HTTP-level test suites.
//!
//! Every suite drives a real router built by `ServerBuilder` through
//! `axum_test::TestServer`, with in-memory repositories for principals and a
//! `stores` resource owned by principals.

#![allow(dead_code)]

use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use viewset::prelude::*;

// ==============================================================
// Fixtures
// ==============================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub default_currency: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCreate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    pub user_id: Uuid,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// `name` is required, `email` is optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreUpdate {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Resource for Store {
    type Create = StoreCreate;
    type Update = StoreUpdate;
    type Display = Store;

    fn resource_name() -> &'static str {
        "stores"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.user_id)
    }
}

/// Reversible "hash" good enough for tests
pub struct PlainVerifier;

impl CredentialVerifier for PlainVerifier {
    fn hash(&self, secret: &str) -> anyhow::Result<String> {
        Ok(format!("plain:{}", secret))
    }

    fn verify(&self, secret: &str, hash: &str) -> bool {
        hash == format!("plain:{}", secret)
    }
}

pub const SECRET: &str = "integration-secret";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub server: TestServer,
    pub stores: InMemoryRepository<Store>,
    pub users: InMemoryRepository<Principal>,
    pub issuer: TokenIssuer,
    pub tasks: BackgroundTasks,
    pub alice: Principal,
    pub bob: Principal,
    pub root: Principal,
}

fn principal(email: &str, is_superuser: bool) -> Principal {
    Principal {
        id: Uuid::new_v4(),
        email: email.to_string(),
        hashed_password: format!("plain:{}", PASSWORD),
        is_superuser,
    }
}

/// Build an app with the default configuration
pub fn spawn_app(configure: impl FnOnce(ResourceView<Store>) -> ResourceView<Store>) -> TestApp {
    spawn_app_with_config(AppConfig::new(SECRET), configure)
}

/// Build an app exposing `/stores` (configured by `configure`), `/users`
/// and the token routes
pub fn spawn_app_with_config(
    config: AppConfig,
    configure: impl FnOnce(ResourceView<Store>) -> ResourceView<Store>,
) -> TestApp {
    let users = InMemoryRepository::<Principal>::new().unique(["email"]);
    let alice = users.seed(principal("alice@example.com", false)).unwrap();
    let bob = users.seed(principal("bob@example.com", false)).unwrap();
    let root = users.seed(principal("root@example.com", true)).unwrap();

    let stores = InMemoryRepository::<Store>::new()
        .unique(["name"])
        .required(["name"])
        .references("user_id", &users);

    let issuer = TokenIssuer::new(&config.auth).unwrap();
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(PlainVerifier);

    let builder = ServerBuilder::new()
        .with_config(config)
        .with_principals(Arc::new(users.clone()))
        .with_credentials(verifier.clone())
        .register(principal_view(Arc::new(users.clone()), verifier))
        .register(configure(ResourceView::new(
            "/stores",
            Arc::new(stores.clone()),
        )));
    let tasks = builder.tasks().clone();

    let server = TestServer::try_new(builder.build().unwrap()).unwrap();

    TestApp {
        server,
        stores,
        users,
        issuer,
        tasks,
        alice,
        bob,
        root,
    }
}

impl TestApp {
    pub fn token(&self, principal: &Principal) -> String {
        self.issuer.issue_access(&principal.email).unwrap()
    }

    /// Create a store owned by `owner` through the API
    pub async fn create_store(&self, owner: &Principal, name: &str) -> Value {
        let response = self
            .server
            .post("/stores")
            .authorization_bearer(self.token(owner))
            .json(&json!({ "name": name, "user_id": owner.id }))
            .await;
        response.assert_status_ok();
        response.json()
    }
}
