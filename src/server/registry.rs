//! View registry for collecting resource views and building their routes

use crate::config::AppConfig;
use crate::core::auth::Authenticator;
use crate::core::tasks::BackgroundTasks;
use anyhow::Result;
use axum::Router;
use indexmap::IndexMap;
use std::sync::Arc;

/// Shared state every view is built against
#[derive(Clone, Debug)]
pub struct ViewContext {
    pub authenticator: Arc<Authenticator>,
    pub tasks: BackgroundTasks,
    pub config: Arc<AppConfig>,
}

/// Trait that describes how to build routes for a view
///
/// Implemented by [`ResourceView`](super::view::ResourceView); boxed so
/// views over different resource types share one registry.
pub trait ViewDescriptor: Send {
    /// The view name, matched against configuration entries
    fn name(&self) -> &str;

    /// Consume the view and build its router
    fn into_routes(self: Box<Self>, ctx: &ViewContext) -> Result<Router>;
}

/// Registry for all views in the application
#[derive(Default)]
pub struct ViewRegistry {
    descriptors: IndexMap<String, Box<dyn ViewDescriptor>>,
}

impl ViewRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            descriptors: IndexMap::new(),
        }
    }

    /// Register a view
    ///
    /// A later view with the same name replaces the earlier one.
    pub fn register(&mut self, descriptor: Box<dyn ViewDescriptor>) {
        let name = descriptor.name().to_string();
        if self.descriptors.insert(name.clone(), descriptor).is_some() {
            tracing::warn!(view = %name, "replacing previously registered view");
        }
    }

    /// Names of all registered views, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.descriptors.keys().map(|s| s.as_str()).collect()
    }

    /// Build a router with all registered view routes
    pub fn build_routes(self, ctx: &ViewContext) -> Result<Router> {
        for resource in &ctx.config.resources {
            if !self.descriptors.contains_key(&resource.name) {
                tracing::warn!(resource = %resource.name, "configuration for unregistered view");
            }
        }

        let mut router = Router::new();
        for (_, descriptor) in self.descriptors {
            router = router.merge(descriptor.into_routes(ctx)?);
        }

        Ok(router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Principal;
    use crate::core::token::TokenIssuer;
    use crate::storage::InMemoryRepository;

    struct StubView {
        name: String,
        fail: bool,
    }

    impl StubView {
        fn boxed(name: &str, fail: bool) -> Box<Self> {
            Box::new(Self {
                name: name.to_string(),
                fail,
            })
        }
    }

    impl ViewDescriptor for StubView {
        fn name(&self) -> &str {
            &self.name
        }

        fn into_routes(self: Box<Self>, _ctx: &ViewContext) -> Result<Router> {
            if self.fail {
                anyhow::bail!("broken view {}", self.name);
            }
            Ok(Router::new())
        }
    }

    fn context() -> ViewContext {
        let config = AppConfig::new("secret");
        let issuer = TokenIssuer::new(&config.auth).unwrap();
        let principals = Arc::new(InMemoryRepository::<Principal>::new());

        ViewContext {
            authenticator: Arc::new(Authenticator::new(issuer, principals)),
            tasks: BackgroundTasks::default(),
            config: Arc::new(config),
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        assert!(ViewRegistry::new().names().is_empty());
        assert!(ViewRegistry::default().names().is_empty());
    }

    #[test]
    fn test_register_keeps_order() {
        let mut registry = ViewRegistry::new();
        registry.register(StubView::boxed("stores", false));
        registry.register(StubView::boxed("products", false));
        assert_eq!(registry.names(), vec!["stores", "products"]);
    }

    #[test]
    fn test_register_duplicate_replaces() {
        let mut registry = ViewRegistry::new();
        registry.register(StubView::boxed("stores", false));
        registry.register(StubView::boxed("stores", false));
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_build_routes_propagates_errors() {
        let mut registry = ViewRegistry::new();
        registry.register(StubView::boxed("stores", false));
        registry.register(StubView::boxed("broken", true));

        let err = registry.build_routes(&context()).unwrap_err();
        assert!(err.to_string().contains("broken view"));
    }

    #[test]
    fn test_build_routes_empty_registry() {
        assert!(ViewRegistry::new().build_routes(&context()).is_ok());
    }
}
