//! Declarative resource views
//!
//! A [`ResourceView`] turns a [`Resource`] and a [`Repository`] into the
//! standard family of endpoints under one base path:
//!
//! | Operation | Route              |
//! |-----------|--------------------|
//! | list      | `GET    P`         |
//! | count     | `GET    P/count`   |
//! | get_one   | `GET    P/{id}`    |
//! | create    | `POST   P`         |
//! | replace   | `PUT    P/{id}`    |
//! | update    | `PATCH  P/{id}`    |
//! | delete    | `DELETE P/{id}`    |
//!
//! Every operation can be overridden, disabled or given its own auth policy,
//! and custom operations are served at `P/{name}`.
//!
//! # Example
//!
//! ```rust,ignore
//! let stores = ResourceView::new("/stores", Arc::new(repo))
//!     .ownership(Ownership::Owned)
//!     .operations([Operation::List, Operation::GetOne, Operation::Create])
//!     .policy(Operation::List, AuthPolicy::Public)
//!     .after_create(|store: Store, _| async move { notify(store).await });
//! ```

use crate::config::ResourceConfig;
use crate::core::auth::{AuthGuard, AuthPolicy, Principal};
use crate::core::error::{ErrorResponse, ViewError, ViewResult};
use crate::core::operation::Operation;
use crate::core::query::{Page, Pagination};
use crate::core::repository::{Changes, Repository, overlay, to_changes};
use crate::core::resource::{Ownership, Resource, Scope};
use crate::core::tasks::BackgroundTasks;
use crate::server::guard::{Caller, guarded};
use crate::server::registry::{ViewContext, ViewDescriptor};
use anyhow::{Result, anyhow, bail};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::handler::Handler;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, on};
use axum::{Json, Router};
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// What an override receives about the current request
pub struct Call<R: Resource> {
    pub repository: Arc<dyn Repository<R>>,
    pub principal: Option<Principal>,
    /// Narrowed data source for this operation
    pub scope: Scope,
}

impl<R: Resource> Clone for Call<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            principal: self.principal.clone(),
            scope: self.scope,
        }
    }
}

pub type ListOverride<R> = Arc<
    dyn Fn(Call<R>, Pagination) -> BoxFuture<'static, ViewResult<Page<<R as Resource>::Display>>>
        + Send
        + Sync,
>;
pub type FetchOverride<R> =
    Arc<dyn Fn(Call<R>, Uuid, Option<R>) -> BoxFuture<'static, ViewResult<Option<R>>> + Send + Sync>;
pub type CreateOverride<R> = Arc<
    dyn Fn(Call<R>, <R as Resource>::Create) -> BoxFuture<'static, ViewResult<R>> + Send + Sync,
>;
pub type WriteOverride<R> =
    Arc<dyn Fn(Call<R>, R, Changes) -> BoxFuture<'static, ViewResult<R>> + Send + Sync>;
pub type DeleteOverride<R> =
    Arc<dyn Fn(Call<R>, R) -> BoxFuture<'static, ViewResult<()>> + Send + Sync>;
pub type AfterCreate<R> =
    Arc<dyn Fn(R, Option<Principal>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct Overrides<R: Resource> {
    list: Option<ListOverride<R>>,
    get_one: Option<FetchOverride<R>>,
    create: Option<CreateOverride<R>>,
    replace: Option<WriteOverride<R>>,
    update: Option<WriteOverride<R>>,
    delete: Option<DeleteOverride<R>>,
    after_create: Option<AfterCreate<R>>,
}

impl<R: Resource> Default for Overrides<R> {
    fn default() -> Self {
        Self {
            list: None,
            get_one: None,
            create: None,
            replace: None,
            update: None,
            delete: None,
            after_create: None,
        }
    }
}

/// Builder describing how a resource is exposed
pub struct ResourceView<R: Resource> {
    base_path: String,
    repository: Arc<dyn Repository<R>>,
    ownership: Ownership,
    enabled: Vec<Operation>,
    auth: bool,
    privileged_only: bool,
    policies: HashMap<Operation, AuthPolicy>,
    post_auth: bool,
    overrides: Overrides<R>,
    custom: Vec<(Operation, MethodRouter)>,
    replaced: HashMap<Operation, MethodRouter>,
    errors: Vec<String>,
}

impl<R: Resource> ResourceView<R> {
    /// A view with every standard operation enabled, requiring an access
    /// token, scoped to the caller's own instances
    pub fn new(base_path: impl Into<String>, repository: Arc<dyn Repository<R>>) -> Self {
        let base_path = base_path.into();
        let base_path = format!("/{}", base_path.trim_matches('/'));

        Self {
            base_path,
            repository,
            ownership: Ownership::default(),
            enabled: Operation::STANDARD.to_vec(),
            auth: true,
            privileged_only: false,
            policies: HashMap::new(),
            post_auth: true,
            overrides: Overrides::default(),
            custom: Vec::new(),
            replaced: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Name used to match configuration entries (base path without slashes)
    pub fn name(&self) -> &str {
        self.base_path.trim_matches('/')
    }

    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Restrict the view to these standard operations
    pub fn operations(mut self, operations: impl IntoIterator<Item = Operation>) -> Self {
        let wanted: HashSet<Operation> = operations.into_iter().collect();
        self.enabled = Operation::STANDARD
            .iter()
            .filter(|op| wanted.contains(*op))
            .cloned()
            .collect();
        self
    }

    /// Turn authentication on or off for every operation without an
    /// explicit policy
    pub fn auth(mut self, enabled: bool) -> Self {
        self.auth = enabled;
        self
    }

    /// Require a privileged principal for every operation without an
    /// explicit policy
    pub fn privileged_only(mut self, privileged_only: bool) -> Self {
        self.privileged_only = privileged_only;
        self
    }

    /// Auth policy for one operation
    pub fn policy(mut self, operation: Operation, policy: AuthPolicy) -> Self {
        self.policies.insert(operation, policy);
        self
    }

    /// Whether create fails when authentication fails (default), or
    /// continues with an anonymous caller
    pub fn post_auth(mut self, post_auth: bool) -> Self {
        self.post_auth = post_auth;
        self
    }

    /// Replace the default list
    pub fn on_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, Pagination) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<Page<R::Display>>> + Send + 'static,
    {
        self.overrides.list = Some(Arc::new(move |call, pagination| f(call, pagination).boxed()));
        self
    }

    /// Post-process a lookup; may turn a hit into a miss and vice versa
    ///
    /// Also applies to the fetch done by replace, update and delete.
    pub fn on_get_one<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, Uuid, Option<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<Option<R>>> + Send + 'static,
    {
        self.overrides.get_one = Some(Arc::new(move |call, id, item| f(call, id, item).boxed()));
        self
    }

    /// Replace the default insert
    pub fn on_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, R::Create) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<R>> + Send + 'static,
    {
        self.overrides.create = Some(Arc::new(move |call, payload| f(call, payload).boxed()));
        self
    }

    /// Replace the default full overwrite; receives every field of the
    /// update shape
    pub fn on_replace<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, R, Changes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<R>> + Send + 'static,
    {
        self.overrides.replace = Some(Arc::new(move |call, item, changes| {
            f(call, item, changes).boxed()
        }));
        self
    }

    /// Replace the default partial update; receives only the fields sent
    pub fn on_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, R, Changes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<R>> + Send + 'static,
    {
        self.overrides.update = Some(Arc::new(move |call, item, changes| {
            f(call, item, changes).boxed()
        }));
        self
    }

    /// Replace the default delete
    pub fn on_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Call<R>, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult<()>> + Send + 'static,
    {
        self.overrides.delete = Some(Arc::new(move |call, item| f(call, item).boxed()));
        self
    }

    /// Side effect run in the background after a successful create
    ///
    /// Runs at most once; a failure is logged and never reaches the client.
    pub fn after_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(R, Option<Principal>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.overrides.after_create = Some(Arc::new(move |item, principal| {
            f(item, principal).boxed()
        }));
        self
    }

    /// Serve `handler` with `GET {base}/{name}`
    pub fn custom_operation<H, T>(self, name: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.custom_operation_with(name, MethodFilter::GET, handler)
    }

    /// Serve `handler` at `{base}/{name}` for the given method
    ///
    /// The handler runs behind the view's auth policy for `name` and can
    /// extract the resolved [`Caller`].
    pub fn custom_operation_with<H, T>(mut self, name: &str, method: MethodFilter, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        match name.parse::<Operation>() {
            Ok(op) if !op.is_standard() => {
                if self.custom.iter().any(|(existing, _)| *existing == op) {
                    self.errors
                        .push(format!("custom operation '{}' registered twice", name));
                } else {
                    self.custom.push((op, on(method, handler)));
                }
            }
            Ok(_) => self.errors.push(format!(
                "'{}' is a standard operation, use route_handler to replace it",
                name
            )),
            Err(e) => self.errors.push(e.to_string()),
        }
        self
    }

    /// Replace a whole standard handler
    ///
    /// The handler is served at the operation's canonical path and method,
    /// behind the operation's auth policy.
    pub fn route_handler<H, T>(mut self, operation: Operation, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        match operation.method() {
            Some(method) => {
                self.replaced.insert(operation, on(method, handler));
            }
            None => self.errors.push(format!(
                "'{}' is not a standard operation, use custom_operation",
                operation
            )),
        }
        self
    }

    /// Apply configuration overrides
    pub fn apply_config(&mut self, config: &ResourceConfig) -> Result<()> {
        if let Some(operations) = &config.operations {
            let parsed = operations
                .iter()
                .map(|name| Operation::parse_standard(name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| anyhow!("resource '{}': {}", config.name, e))?;

            let wanted: HashSet<Operation> = parsed.into_iter().collect();
            self.enabled = Operation::STANDARD
                .iter()
                .filter(|op| wanted.contains(*op))
                .cloned()
                .collect();
        }

        if let Some(auth) = &config.auth {
            for (name, policy) in &auth.policies {
                let op: Operation = name
                    .parse()
                    .map_err(|e| anyhow!("resource '{}': {}", config.name, e))?;
                let policy = AuthPolicy::parse_policy(policy).ok_or_else(|| {
                    anyhow!(
                        "resource '{}': unknown auth policy '{}' for '{}'",
                        config.name,
                        policy,
                        name
                    )
                })?;
                self.policies.insert(op, policy);
            }
        }

        if let Some(post_auth) = config.post_auth {
            self.post_auth = post_auth;
        }

        Ok(())
    }

    /// Effective policy for an operation
    pub fn policy_for(&self, operation: &Operation) -> AuthPolicy {
        self.policies
            .get(operation)
            .copied()
            .unwrap_or_else(|| AuthPolicy::from_flags(self.auth, self.privileged_only))
    }

    pub fn enabled_operations(&self) -> &[Operation] {
        &self.enabled
    }

    /// Build the router for this view
    pub fn into_router(mut self, ctx: &ViewContext) -> Result<Router> {
        if let Some(config) = ctx.config.resource(self.name()) {
            self.apply_config(config)?;
        }

        if !self.errors.is_empty() {
            bail!("view {}: {}", self.base_path, self.errors.join("; "));
        }

        let guard_for = |policy: AuthPolicy| AuthGuard::for_policy(ctx.authenticator.clone(), policy);

        let state = Arc::new(ViewState {
            name: R::resource_name().to_string(),
            repository: self.repository.clone(),
            ownership: self.ownership.clone(),
            create_guard: guard_for(self.policy_for(&Operation::Create)),
            post_auth: self.post_auth,
            overrides: std::mem::take(&mut self.overrides),
            tasks: ctx.tasks.clone(),
        });

        let mut routes: IndexMap<String, MethodRouter> = IndexMap::new();
        let mut add = |path: String, router: MethodRouter| {
            let merged = match routes.shift_remove(&path) {
                Some(existing) => existing.merge(router),
                None => router,
            };
            routes.insert(path, merged);
        };

        for op in &self.enabled {
            let guard = guard_for(self.policy_for(op));
            let router = match self.replaced.remove(op) {
                Some(handler) => {
                    let lenient = *op == Operation::Create && !self.post_auth;
                    guarded(handler, guard, lenient)
                }
                // Create resolves auth itself, after the payload is validated
                None if *op == Operation::Create => standard_route(op, state.clone()),
                None => guarded(standard_route(op, state.clone()), guard, false),
            };
            add(op.path(&self.base_path), router);
        }

        for (op, handler) in std::mem::take(&mut self.custom) {
            let guard = guard_for(self.policy_for(&op));
            add(op.path(&self.base_path), guarded(handler, guard, false));
        }

        let mut router = Router::new();
        for (path, method_router) in routes {
            router = router.route(&path, method_router.fallback(route_not_found));
        }

        tracing::info!(
            view = %self.base_path,
            operations = ?self.enabled.iter().map(Operation::name).collect::<Vec<_>>(),
            "registered resource view"
        );

        Ok(router)
    }
}

impl<R: Resource> ViewDescriptor for ResourceView<R> {
    fn name(&self) -> &str {
        ResourceView::name(self)
    }

    fn into_routes(self: Box<Self>, ctx: &ViewContext) -> Result<Router> {
        (*self).into_router(ctx)
    }
}

/// Shared state behind the generated handlers
struct ViewState<R: Resource> {
    name: String,
    repository: Arc<dyn Repository<R>>,
    ownership: Ownership,
    create_guard: AuthGuard,
    post_auth: bool,
    overrides: Overrides<R>,
    tasks: BackgroundTasks,
}

impl<R: Resource> ViewState<R> {
    fn call(&self, principal: Option<Principal>, scope: Scope) -> Call<R> {
        Call {
            repository: self.repository.clone(),
            principal,
            scope,
        }
    }

    /// Look up an instance in the caller's scope
    async fn fetch(&self, principal: &Option<Principal>, raw_id: &str) -> ViewResult<R> {
        let not_found = || ViewError::not_found(&self.name, raw_id);
        let id = Uuid::parse_str(raw_id).map_err(|_| not_found())?;

        let scope = self.ownership.lookup_scope(principal.as_ref());
        let mut item = self.repository.get(&scope, &id).await?;

        if let Some(hook) = &self.overrides.get_one {
            item = hook(self.call(principal.clone(), scope), id, item).await?;
        }

        item.ok_or_else(not_found)
    }

    /// Resolve the creating principal, degrading to anonymous unless
    /// post-auth is required
    async fn create_principal(&self, headers: &HeaderMap) -> ViewResult<Option<Principal>> {
        match self.create_guard.resolve(headers).await {
            Ok(principal) => Ok(principal),
            Err(e) if self.post_auth => Err(e),
            Err(e) => {
                tracing::debug!(view = %self.name, reason = %e, "creating anonymously");
                Ok(None)
            }
        }
    }
}

fn standard_route<R: Resource>(op: &Operation, state: Arc<ViewState<R>>) -> MethodRouter {
    let router: MethodRouter<Arc<ViewState<R>>> = match op {
        Operation::List => on(MethodFilter::GET, list::<R>),
        Operation::Count => on(MethodFilter::GET, count::<R>),
        Operation::GetOne => on(MethodFilter::GET, get_one::<R>),
        Operation::Create => on(MethodFilter::POST, create::<R>),
        Operation::Replace => on(MethodFilter::PUT, replace::<R>),
        Operation::Update => on(MethodFilter::PATCH, update::<R>),
        Operation::Delete => on(MethodFilter::DELETE, delete::<R>),
        Operation::Custom(_) => MethodRouter::new(),
    };
    router.with_state(state)
}

/// Response for any method or path nothing is routed to
pub(crate) async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: "NOT_FOUND".to_string(),
            message: "Not Found".to_string(),
            details: None,
        }),
    )
}

/// JSON body whose data errors render as [`ViewError::ValidationFailed`]
pub struct Payload<T>(pub T);

impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(JsonRejection::JsonDataError(e)) => {
                Err(ViewError::validation(e.body_text()).into_response())
            }
            Err(rejection) => Err(rejection.into_response()),
        }
    }
}

// =============================================================================
// Generated handlers
// =============================================================================

async fn list<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
    pagination: Pagination,
) -> ViewResult<Json<Page<R::Display>>> {
    let scope = view.ownership.list_scope(principal.as_ref());

    let page = match &view.overrides.list {
        Some(custom) => custom(view.call(principal, scope), pagination).await?,
        None => pagination.paginate(view.repository.as_ref(), &scope).await?,
    };

    Ok(Json(page))
}

async fn count<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
) -> ViewResult<Json<u64>> {
    let scope = view.ownership.lookup_scope(principal.as_ref());
    Ok(Json(view.repository.count(&scope).await?))
}

async fn get_one<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ViewResult<Json<R::Display>> {
    let item = view.fetch(&principal, &id).await?;
    Ok(Json(item.into()))
}

async fn create<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    headers: HeaderMap,
    Payload(payload): Payload<R::Create>,
) -> ViewResult<Json<R::Display>> {
    let principal = view.create_principal(&headers).await?;

    let item = match &view.overrides.create {
        Some(custom) => {
            let scope = view.ownership.lookup_scope(principal.as_ref());
            custom(view.call(principal.clone(), scope), payload).await?
        }
        None => view.repository.insert(to_changes(&payload)?).await?,
    };

    if let Some(hook) = &view.overrides.after_create {
        view.tasks.dispatch(
            format!("{}.after_create:{}", view.name, item.id()),
            hook(item.clone(), principal),
        );
    }

    Ok(Json(item.into()))
}

async fn replace<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    Payload(payload): Payload<R::Update>,
) -> ViewResult<Json<R::Display>> {
    let current = view.fetch(&principal, &id).await?;
    let changes = to_changes(&payload)?;

    let item = match &view.overrides.replace {
        Some(custom) => {
            let scope = view.ownership.lookup_scope(principal.as_ref());
            custom(view.call(principal, scope), current, changes).await?
        }
        None => view.repository.update(&current.id(), changes).await?,
    };

    Ok(Json(item.into()))
}

async fn update<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    Payload(patch): Payload<Map<String, Value>>,
) -> ViewResult<Json<R::Display>> {
    let current = view.fetch(&principal, &id).await?;
    let changes = merge_patch::<R>(&current, patch)?;

    let item = match &view.overrides.update {
        Some(custom) => {
            let scope = view.ownership.lookup_scope(principal.as_ref());
            custom(view.call(principal, scope), current, changes).await?
        }
        None => view.repository.update(&current.id(), changes).await?,
    };

    Ok(Json(item.into()))
}

async fn delete<R: Resource>(
    State(view): State<Arc<ViewState<R>>>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> ViewResult<Json<R::Display>> {
    let current = view.fetch(&principal, &id).await?;

    match &view.overrides.delete {
        Some(custom) => {
            let scope = view.ownership.lookup_scope(principal.as_ref());
            custom(view.call(principal, scope), current.clone()).await?
        }
        None => view.repository.delete(&current.id()).await?,
    }

    Ok(Json(current.into()))
}

/// Check a partial update against the update shape
///
/// The patch is laid over the current values projected onto the update
/// shape, and the result must deserialize as that shape. Only the fields
/// present in the patch are returned.
pub fn merge_patch<R: Resource>(current: &R, patch: Map<String, Value>) -> ViewResult<Changes> {
    let projected: R::Update = serde_json::from_value(serde_json::to_value(current)?)
        .map_err(|e| {
            anyhow!(
                "cannot project {} onto its update shape: {}",
                R::resource_name(),
                e
            )
        })?;
    overlay::<R::Update>(to_changes(&projected)?, patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        id: Uuid,
        a: i64,
        b: i64,
        note: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ItemUpdate {
        a: i64,
        b: i64,
        #[serde(default)]
        note: Option<String>,
    }

    impl Resource for Item {
        type Create = ItemUpdate;
        type Update = ItemUpdate;
        type Display = Item;

        fn resource_name() -> &'static str {
            "items"
        }

        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn item() -> Item {
        Item {
            id: Uuid::new_v4(),
            a: 1,
            b: 2,
            note: Some("n".to_string()),
        }
    }

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_patch_returns_only_sent_fields() {
        let changes = merge_patch(&item(), patch(json!({"b": 3}))).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["b"], json!(3));
    }

    #[test]
    fn test_merge_patch_rejects_unknown_fields() {
        let err = merge_patch(&item(), patch(json!({"id": Uuid::new_v4()}))).unwrap_err();
        assert!(matches!(err, ViewError::ValidationFailed { .. }));
    }

    #[test]
    fn test_merge_patch_type_checks_values() {
        let err = merge_patch(&item(), patch(json!({"a": "one"}))).unwrap_err();
        assert!(matches!(err, ViewError::ValidationFailed { .. }));
    }

    #[test]
    fn test_merge_patch_allows_clearing_optional() {
        let changes = merge_patch(&item(), patch(json!({"note": null}))).unwrap();
        assert_eq!(changes["note"], Value::Null);
    }

    #[test]
    fn test_builder_defaults() {
        let repo = crate::storage::InMemoryRepository::<Item>::new();
        let view = ResourceView::<Item>::new("items/", Arc::new(repo));

        assert_eq!(view.base_path(), "/items");
        assert_eq!(view.name(), "items");
        assert_eq!(view.enabled_operations().len(), 7);
        assert_eq!(view.policy_for(&Operation::List), AuthPolicy::Authenticated);
    }

    #[test]
    fn test_policy_toggles() {
        let repo = crate::storage::InMemoryRepository::<Item>::new();
        let view = ResourceView::<Item>::new("/items", Arc::new(repo))
            .privileged_only(true)
            .policy(Operation::Count, AuthPolicy::Public);

        assert_eq!(view.policy_for(&Operation::List), AuthPolicy::PrivilegedOnly);
        assert_eq!(view.policy_for(&Operation::Count), AuthPolicy::Public);

        let view = view.auth(false);
        assert_eq!(view.policy_for(&Operation::Delete), AuthPolicy::Public);
    }

    #[test]
    fn test_apply_config() {
        let repo = crate::storage::InMemoryRepository::<Item>::new();
        let mut view = ResourceView::<Item>::new("/items", Arc::new(repo));

        let config: ResourceConfig = serde_yaml::from_str(
            "name: items\noperations: [get_one, list]\npost_auth: false\nauth:\n  list: public\n",
        )
        .unwrap();
        view.apply_config(&config).unwrap();

        assert_eq!(
            view.enabled_operations(),
            &[Operation::List, Operation::GetOne]
        );
        assert_eq!(view.policy_for(&Operation::List), AuthPolicy::Public);
        assert!(!view.post_auth);
    }

    #[test]
    fn test_apply_config_rejects_unknown_names() {
        let repo = crate::storage::InMemoryRepository::<Item>::new();
        let mut view = ResourceView::<Item>::new("/items", Arc::new(repo));

        let config: ResourceConfig =
            serde_yaml::from_str("name: items\noperations: [list, destroy]\n").unwrap();
        assert!(view.apply_config(&config).is_err());

        let config: ResourceConfig =
            serde_yaml::from_str("name: items\nauth:\n  list: everyone\n").unwrap();
        assert!(view.apply_config(&config).is_err());
    }
}
