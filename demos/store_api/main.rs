//! Store API example
//!
//! This example demonstrates:
//! - A `stores` resource owned by principals
//! - The `/users` principal view and the `/token` login routes
//! - Per-operation policies loaded from YAML
//! - A create override taking the owner from the token
//! - A custom operation backed by persisted settings, and a post-create hook
//!
//! ```bash
//! cargo run --example store_api
//! curl -X POST localhost:3000/token -d 'username=admin@example.com&password=admin'
//! curl localhost:3000/stores -H "Authorization: Bearer <access_token>"
//! ```

use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use viewset::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Store {
    id: Uuid,
    name: String,
    #[serde(default)]
    email: Option<String>,
    default_currency: String,
    user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreCreate {
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default = "usd")]
    default_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreUpdate {
    name: String,
    #[serde(default)]
    email: Option<String>,
    default_currency: String,
}

fn usd() -> String {
    "USD".to_string()
}

/// Currencies stores may pick from, editable at runtime
#[derive(Debug, Serialize, Deserialize)]
struct CurrencySettings {
    accepted: Vec<String>,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            accepted: vec!["USD".into(), "EUR".into(), "GBP".into()],
        }
    }
}

impl SettingScheme for CurrencySettings {
    fn setting_name() -> &'static str {
        "currencies"
    }
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

/// Stores secrets as-is. Swap in a real password hash outside of demos.
struct PlaintextVerifier;

impl CredentialVerifier for PlaintextVerifier {
    fn hash(&self, secret: &str) -> anyhow::Result<String> {
        Ok(secret.to_string())
    }

    fn verify(&self, secret: &str, hash: &str) -> bool {
        secret == hash
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,viewset=debug")),
        )
        .init();

    println!("🚀 viewset Store API Example");
    println!("============================\n");

    let path = std::env::var("VIEWSET_CONFIG")
        .unwrap_or_else(|_| "demos/store_api/app.yaml".to_string());
    let config = AppConfig::from_yaml_file(&path)?;
    println!("✅ Loaded configuration from {}", path);
    println!("   - {} resource overrides\n", config.resources.len());

    let users = InMemoryRepository::<Principal>::new().unique(["email"]);
    let admin = users.seed(Principal {
        id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        hashed_password: "admin".to_string(),
        is_superuser: true,
    })?;
    println!("👤 Seeded admin@example.com / admin ({})\n", admin.id);

    let stores = InMemoryRepository::<Store>::new()
        .unique(["name"])
        .required(["name", "default_currency"])
        .references("user_id", &users);

    let settings = SettingsStore::new(Arc::new(
        InMemoryRepository::<Setting>::new().unique(["name"]),
    ));

    let verifier: Arc<dyn CredentialVerifier> = Arc::new(PlaintextVerifier);

    let create_settings = settings.clone();
    let store_view = ResourceView::<Store>::new("/stores", Arc::new(stores))
        // The owner always comes from the token, never from the payload
        .on_create(move |call: Call<Store>, payload: StoreCreate| {
            let settings = create_settings.clone();
            async move {
                let owner = call.principal.ok_or(ViewError::Unauthenticated)?;
                let currencies: CurrencySettings = settings.get().await?;
                if !currencies.accepted.contains(&payload.default_currency) {
                    return Err(ViewError::validation(format!(
                        "currency {} is not accepted",
                        payload.default_currency
                    )));
                }

                let mut fields = Changes::new();
                fields.insert("name".into(), json!(payload.name));
                fields.insert("email".into(), json!(payload.email));
                fields.insert("default_currency".into(), json!(payload.default_currency));
                fields.insert("user_id".into(), json!(owner.id));
                Ok(call.repository.insert(fields).await?)
            }
        })
        .after_create(|store: Store, principal: Option<Principal>| async move {
            tracing::info!(
                store = %store.name,
                created_by = ?principal.map(|p| p.email),
                "store opened"
            );
            Ok(())
        })
        .custom_operation("currencies", move || {
            let settings = settings.clone();
            async move {
                let currencies: CurrencySettings = settings.get().await?;
                Ok::<_, ViewError>(Json(currencies.accepted))
            }
        });

    println!("🌐 Routes:");
    println!("   POST   /token                 login (form: username, password)");
    println!("   POST   /token/refresh         new token pair");
    println!("   GET    /stores                list own stores");
    println!("   GET    /stores/count          count own stores");
    println!("   GET    /stores/currencies     custom operation");
    println!("   GET    /stores/{{id}}           one store");
    println!("   POST   /stores                create a store");
    println!("   PUT    /stores/{{id}}           replace a store");
    println!("   PATCH  /stores/{{id}}           update a store");
    println!("   DELETE /stores/{{id}}           delete a store");
    println!("   *      /users                 principals (admin only)\n");

    ServerBuilder::new()
        .with_config(config)
        .with_principals(Arc::new(users.clone()))
        .with_credentials(verifier.clone())
        .register(principal_view(Arc::new(users), verifier))
        .register(store_view)
        .serve("127.0.0.1:3000")
        .await
}
