//! Login and refresh endpoints
//!
//! - `POST /token` takes a form with `username` (the email) and `password`
//! - `POST /token/refresh` takes `{"refresh_token": "..."}`
//!
//! Both answer with a fresh access/refresh pair.

use crate::core::auth::{AuthGuard, Authenticator, CredentialVerifier, LoginError};
use crate::core::error::{ViewError, ViewResult};
use crate::core::token::TokenKind;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Clone)]
struct TokenState {
    authenticator: Arc<Authenticator>,
    verifier: Arc<dyn CredentialVerifier>,
}

/// Build the token routes
pub fn token_routes(
    authenticator: Arc<Authenticator>,
    verifier: Arc<dyn CredentialVerifier>,
) -> Router {
    Router::new()
        .route("/token", post(login))
        .route("/token/refresh", post(refresh))
        .with_state(TokenState {
            authenticator,
            verifier,
        })
}

fn issue_pair(authenticator: &Authenticator, subject: &str) -> ViewResult<TokenPair> {
    let issuer = authenticator.issuer();
    Ok(TokenPair {
        access_token: issuer.issue_access(subject)?,
        refresh_token: issuer.issue_refresh(subject)?,
        token_type: "bearer".to_string(),
    })
}

async fn login(
    State(state): State<TokenState>,
    Form(form): Form<LoginForm>,
) -> ViewResult<Json<TokenPair>> {
    let principal = state
        .authenticator
        .authenticate(state.verifier.as_ref(), &form.username, &form.password)
        .await
        .map_err(|e| match e {
            LoginError::Storage(e) => ViewError::from(e),
            other => {
                tracing::debug!(username = %form.username, reason = %other, "login refused");
                ViewError::Unauthenticated
            }
        })?;

    Ok(Json(issue_pair(&state.authenticator, &principal.email)?))
}

async fn refresh(
    State(state): State<TokenState>,
    Json(request): Json<RefreshRequest>,
) -> ViewResult<Json<TokenPair>> {
    let principal = AuthGuard::new(state.authenticator.clone())
        .expect_kind(TokenKind::Refresh)
        .with_token(request.refresh_token)
        .resolve(&HeaderMap::new())
        .await?
        .ok_or(ViewError::Unauthenticated)?;

    Ok(Json(issue_pair(&state.authenticator, &principal.email)?))
}
