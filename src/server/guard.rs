//! Auth middleware for view routes
//!
//! Runs an [`AuthGuard`] before the handler and stores the outcome in the
//! request extensions, where handlers pick it up through [`Caller`].

use crate::core::auth::{AuthGuard, Principal};
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use std::convert::Infallible;

/// The principal resolved for the current request
///
/// `None` means anonymous: the operation is public, or auth failed on a
/// lenient create.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

/// Resolve the caller or reject the request
///
/// With `lenient`, a failed resolution degrades to an anonymous caller.
pub async fn authorize(guard: AuthGuard, lenient: bool, mut request: Request, next: Next) -> Response {
    let principal = match guard.resolve(request.headers()).await {
        Ok(principal) => principal,
        Err(e) if lenient => {
            tracing::debug!(reason = %e, "continuing anonymously");
            None
        }
        Err(e) => return e.into_response(),
    };

    request.extensions_mut().insert(Caller(principal));
    next.run(request).await
}

/// Wrap every route of `router` with [`authorize`]
pub fn guarded(router: MethodRouter, guard: AuthGuard, lenient: bool) -> MethodRouter {
    router.route_layer(middleware::from_fn(move |req: Request, next: Next| {
        authorize(guard.clone(), lenient, req, next)
    }))
}
