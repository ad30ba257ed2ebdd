//! ServerBuilder for fluent API to build HTTP servers

use super::registry::{ViewContext, ViewDescriptor, ViewRegistry};
use super::token_routes::token_routes;
use super::view::route_not_found;
use crate::config::AppConfig;
use crate::core::auth::{Authenticator, CredentialVerifier, Principal};
use crate::core::repository::Repository;
use crate::core::tasks::BackgroundTasks;
use crate::core::token::{Clock, SystemClock, TokenIssuer};
use anyhow::{Result, anyhow};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for creating HTTP servers from resource views
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(AppConfig::from_yaml_file("app.yaml")?)
///     .with_principals(users.clone())
///     .with_credentials(MyHasher)
///     .register(principal_view(users, hasher))
///     .register(ResourceView::new("/stores", stores))
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: Option<AppConfig>,
    principals: Option<Arc<dyn Repository<Principal>>>,
    credentials: Option<Arc<dyn CredentialVerifier>>,
    clock: Arc<dyn Clock>,
    registry: ViewRegistry,
    custom_routes: Vec<Router>,
    tasks: BackgroundTasks,
    cors: Option<CorsLayer>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            principals: None,
            credentials: None,
            clock: Arc::new(SystemClock),
            registry: ViewRegistry::new(),
            custom_routes: Vec::new(),
            tasks: BackgroundTasks::default(),
            cors: None,
        }
    }

    /// Set the application configuration (required)
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the repository principals are resolved from (required)
    pub fn with_principals(mut self, principals: Arc<dyn Repository<Principal>>) -> Self {
        self.principals = Some(principals);
        self
    }

    /// Enable the login and refresh endpoints
    pub fn with_credentials(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = Some(verifier);
        self
    }

    /// Use another time source for issuing and checking tokens
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for endpoints that don't fit the resource view pattern.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Register a view
    pub fn register(mut self, view: impl ViewDescriptor + 'static) -> Self {
        self.registry.register(Box::new(view));
        self
    }

    /// Dispatcher running post-create hooks; subscribe to it to observe
    /// background outcomes
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Build the final router
    ///
    /// This generates:
    /// - Routes for all registered views
    /// - Token routes, when credentials are configured
    /// - Health check routes
    /// - Custom routes
    pub fn build(self) -> Result<Router> {
        let config = self
            .config
            .ok_or_else(|| anyhow!("AppConfig is required. Call .with_config()"))?;
        config.validate()?;

        let principals = self.principals.ok_or_else(|| {
            anyhow!("Principal repository is required. Call .with_principals()")
        })?;

        let issuer = TokenIssuer::with_clock(&config.auth, self.clock)?;
        let authenticator = Arc::new(Authenticator::new(issuer, principals));

        let ctx = ViewContext {
            authenticator: authenticator.clone(),
            tasks: self.tasks,
            config: Arc::new(config),
        };

        let mut app = health_routes().merge(self.registry.build_routes(&ctx)?);

        if let Some(verifier) = self.credentials {
            app = app.merge(token_routes(authenticator, verifier));
        }

        for custom_router in self.custom_routes {
            app = app.merge(custom_router);
        }

        app = app.fallback(route_not_found);

        if let Some(cors) = self.cors {
            app = app.layer(cors);
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "viewset"
    }))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
