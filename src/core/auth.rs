//! Authentication for viewset
//!
//! Provides token-based authentication with:
//! - Principal resolution from bearer tokens
//! - Per-operation policies (public, authenticated, privileged only)
//! - Credential verification for the login flow

use crate::core::error::{PersistenceError, ViewError};
use crate::core::repository::Repository;
use crate::core::resource::Resource;
use crate::core::token::{TokenIssuer, TokenKind};
use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    /// Unique handle, also the token subject
    pub email: String,
    pub hashed_password: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Payload for creating a principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalCreate {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Payload for replacing a principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalUpdate {
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Public view of a principal (never exposes the credential hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalDisplay {
    pub id: Uuid,
    pub email: String,
    pub is_superuser: bool,
}

impl From<Principal> for PrincipalDisplay {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            email: p.email,
            is_superuser: p.is_superuser,
        }
    }
}

impl Resource for Principal {
    type Create = PrincipalCreate;
    type Update = PrincipalUpdate;
    type Display = PrincipalDisplay;

    fn resource_name() -> &'static str {
        "users"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// Authorization policy for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// No token required; handlers see an anonymous principal
    Public,

    /// Any valid access token
    Authenticated,

    /// Valid access token of a superuser
    PrivilegedOnly,
}

impl AuthPolicy {
    /// Parse policy from string (for YAML config)
    pub fn parse_policy(s: &str) -> Option<Self> {
        match s {
            "public" => Some(AuthPolicy::Public),
            "authenticated" => Some(AuthPolicy::Authenticated),
            "privileged_only" | "admin_only" => Some(AuthPolicy::PrivilegedOnly),
            _ => None,
        }
    }

    /// Policy equivalent to the `auth` / `privileged_only` pair of toggles
    pub fn from_flags(enabled: bool, privileged_only: bool) -> Self {
        match (enabled, privileged_only) {
            (false, _) => AuthPolicy::Public,
            (true, false) => AuthPolicy::Authenticated,
            (true, true) => AuthPolicy::PrivilegedOnly,
        }
    }
}

/// Hashes and verifies user secrets
///
/// The hashing algorithm is supplied by the application.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, secret: &str) -> anyhow::Result<String>;

    fn verify(&self, secret: &str, hash: &str) -> bool;
}

/// Why a login attempt failed
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("no principal with this email")]
    UnknownPrincipal,

    #[error("wrong password")]
    BadCredentials,

    #[error(transparent)]
    Storage(#[from] PersistenceError),
}

/// Shared authentication state: token issuer and principal lookup
pub struct Authenticator {
    issuer: TokenIssuer,
    principals: Arc<dyn Repository<Principal>>,
}

impl Authenticator {
    pub fn new(issuer: TokenIssuer, principals: Arc<dyn Repository<Principal>>) -> Self {
        Self { issuer, principals }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn principals(&self) -> &Arc<dyn Repository<Principal>> {
        &self.principals
    }

    /// Look up a principal by email
    pub async fn find_principal(&self, email: &str) -> Result<Option<Principal>, PersistenceError> {
        let mut found = self
            .principals
            .search("email", &Value::String(email.to_string()))
            .await?;
        Ok(found.pop())
    }

    /// Check an email/password pair
    pub async fn authenticate(
        &self,
        verifier: &dyn CredentialVerifier,
        email: &str,
        password: &str,
    ) -> Result<Principal, LoginError> {
        let principal = self
            .find_principal(email)
            .await?
            .ok_or(LoginError::UnknownPrincipal)?;

        if !verifier.verify(password, &principal.hashed_password) {
            return Err(LoginError::BadCredentials);
        }

        Ok(principal)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Request-time authentication check
///
/// # Example
///
/// ```rust,ignore
/// let guard = AuthGuard::new(authenticator).privileged_only(true);
/// let principal = guard.resolve(&headers).await?;
/// ```
#[derive(Clone, Debug)]
pub struct AuthGuard {
    authenticator: Arc<Authenticator>,
    enabled: bool,
    privileged_only: bool,
    expected_kind: TokenKind,
    token: Option<String>,
}

impl AuthGuard {
    /// Enabled guard expecting an access token
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            enabled: true,
            privileged_only: false,
            expected_kind: TokenKind::Access,
            token: None,
        }
    }

    /// Guard enforcing a policy
    pub fn for_policy(authenticator: Arc<Authenticator>, policy: AuthPolicy) -> Self {
        Self::new(authenticator)
            .enabled(policy != AuthPolicy::Public)
            .privileged_only(policy == AuthPolicy::PrivilegedOnly)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn privileged_only(mut self, privileged_only: bool) -> Self {
        self.privileged_only = privileged_only;
        self
    }

    pub fn expect_kind(mut self, kind: TokenKind) -> Self {
        self.expected_kind = kind;
        self
    }

    /// Use this token instead of reading the request headers
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolve the principal for a request
    ///
    /// Returns `Ok(None)` when the guard is disabled.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Principal>, ViewError> {
        if !self.enabled {
            return Ok(None);
        }

        let token = match self.token.as_deref().or_else(|| bearer_token(headers)) {
            Some(token) => token,
            None => {
                tracing::debug!("rejecting request without bearer token");
                return Err(ViewError::Unauthenticated);
            }
        };

        let subject = self
            .authenticator
            .issuer
            .verify(token, &self.expected_kind)
            .map_err(|e| {
                tracing::debug!(reason = %e, "rejecting token");
                ViewError::Unauthenticated
            })?;

        let principal = self
            .authenticator
            .find_principal(&subject)
            .await?
            .ok_or_else(|| {
                tracing::debug!(subject = %subject, "token subject does not resolve");
                ViewError::Unauthenticated
            })?;

        if self.privileged_only && !principal.is_superuser {
            tracing::debug!(principal = %principal.id, "privileged operation refused");
            return Err(ViewError::Forbidden);
        }

        Ok(Some(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use crate::core::token::FixedClock;
    use crate::storage::InMemoryRepository;
    use axum::http::HeaderValue;
    use chrono::{Duration, TimeZone, Utc};

    struct PlainVerifier;

    impl CredentialVerifier for PlainVerifier {
        fn hash(&self, secret: &str) -> anyhow::Result<String> {
            Ok(format!("plain:{}", secret))
        }

        fn verify(&self, secret: &str, hash: &str) -> bool {
            hash == format!("plain:{}", secret)
        }
    }

    fn principal(email: &str, is_superuser: bool) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: "plain:pw".to_string(),
            is_superuser,
        }
    }

    async fn setup() -> (Arc<Authenticator>, Principal, Principal) {
        let repo = InMemoryRepository::<Principal>::new().unique(["email"]);
        let alice = principal("alice@example.com", false);
        let root = principal("root@example.com", true);
        repo.seed(alice.clone()).unwrap();
        repo.seed(root.clone()).unwrap();

        let clock = Arc::new(FixedClock(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let issuer = TokenIssuer::with_clock(&AuthSettings::new("secret"), clock).unwrap();
        (
            Arc::new(Authenticator::new(issuer, Arc::new(repo))),
            alice,
            root,
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&bearer("abc")), Some("abc"));

        let mut lower = HeaderMap::new();
        lower.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer xyz"));
        assert_eq!(bearer_token(&lower), Some("xyz"));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&basic), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(AuthPolicy::parse_policy("public"), Some(AuthPolicy::Public));
        assert_eq!(
            AuthPolicy::parse_policy("authenticated"),
            Some(AuthPolicy::Authenticated)
        );
        assert_eq!(
            AuthPolicy::parse_policy("admin_only"),
            Some(AuthPolicy::PrivilegedOnly)
        );
        assert_eq!(AuthPolicy::parse_policy("role:editor"), None);
    }

    #[test]
    fn test_policy_from_flags() {
        assert_eq!(AuthPolicy::from_flags(false, true), AuthPolicy::Public);
        assert_eq!(AuthPolicy::from_flags(true, false), AuthPolicy::Authenticated);
        assert_eq!(AuthPolicy::from_flags(true, true), AuthPolicy::PrivilegedOnly);
    }

    #[tokio::test]
    async fn test_disabled_guard_is_anonymous() {
        let (auth, _, _) = setup().await;
        let guard = AuthGuard::new(auth).enabled(false);
        assert_eq!(guard.resolve(&HeaderMap::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolves_principal() {
        let (auth, alice, _) = setup().await;
        let token = auth.issuer().issue_access(&alice.email).unwrap();

        let resolved = AuthGuard::new(auth).resolve(&bearer(&token)).await.unwrap();
        assert_eq!(resolved, Some(alice));
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let (auth, _, _) = setup().await;
        let result = AuthGuard::new(auth).resolve(&HeaderMap::new()).await;
        assert!(matches!(result, Err(ViewError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_wrong_kind_is_unauthenticated() {
        let (auth, alice, _) = setup().await;
        let token = auth.issuer().issue_refresh(&alice.email).unwrap();

        let result = AuthGuard::new(auth).resolve(&bearer(&token)).await;
        assert!(matches!(result, Err(ViewError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthenticated() {
        let (auth, alice, _) = setup().await;
        let token = auth
            .issuer()
            .issue(&alice.email, &TokenKind::Access, Duration::seconds(-1))
            .unwrap();

        let result = AuthGuard::new(auth).resolve(&bearer(&token)).await;
        assert!(matches!(result, Err(ViewError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_unauthenticated() {
        let (auth, _, _) = setup().await;
        let token = auth.issuer().issue_access("ghost@example.com").unwrap();

        let result = AuthGuard::new(auth).resolve(&bearer(&token)).await;
        assert!(matches!(result, Err(ViewError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_privileged_only_forbids_regular_principal() {
        let (auth, alice, root) = setup().await;
        let guard = AuthGuard::for_policy(auth.clone(), AuthPolicy::PrivilegedOnly);

        let token = auth.issuer().issue_access(&alice.email).unwrap();
        assert!(matches!(
            guard.resolve(&bearer(&token)).await,
            Err(ViewError::Forbidden)
        ));

        let token = auth.issuer().issue_access(&root.email).unwrap();
        assert_eq!(guard.resolve(&bearer(&token)).await.unwrap(), Some(root));
    }

    #[tokio::test]
    async fn test_pre_supplied_token_bypasses_headers() {
        let (auth, alice, _) = setup().await;
        let refresh = auth.issuer().issue_refresh(&alice.email).unwrap();

        let guard = AuthGuard::new(auth)
            .expect_kind(TokenKind::Refresh)
            .with_token(refresh);
        assert_eq!(guard.resolve(&HeaderMap::new()).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (auth, alice, _) = setup().await;

        let ok = auth
            .authenticate(&PlainVerifier, "alice@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(ok, alice);

        assert!(matches!(
            auth.authenticate(&PlainVerifier, "alice@example.com", "nope").await,
            Err(LoginError::BadCredentials)
        ));
        assert!(matches!(
            auth.authenticate(&PlainVerifier, "ghost@example.com", "pw").await,
            Err(LoginError::UnknownPrincipal)
        ));
    }

    #[test]
    fn test_display_hides_hash() {
        let display = PrincipalDisplay::from(principal("alice@example.com", false));
        let json = serde_json::to_value(&display).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }
}
