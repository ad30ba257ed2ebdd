//! Signed, time-bounded tokens
//!
//! Tokens are JWTs carrying three claims: `sub` (the principal's email),
//! `token_type` (the kind tag) and `exp` (absolute expiry, seconds since the
//! epoch). The signing secret and algorithm come from [`AuthSettings`]; time
//! comes from an injected [`Clock`] so issuance and expiry checks are
//! deterministic under test.

use crate::config::AuthSettings;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Kind tag embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    Other(String),
}

impl TokenKind {
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::Other(tag) => tag,
        }
    }
}

impl FromStr for TokenKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "access" => TokenKind::Access,
            "refresh" => TokenKind::Refresh,
            other => TokenKind::Other(other.to_string()),
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal email); absent subjects are rejected on verify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Kind tag (`access`, `refresh`, ...)
    #[serde(default)]
    pub token_type: String,
    /// Expiration timestamp
    pub exp: i64,
}

/// Why a token was rejected
///
/// Kept for server-side logging only; clients always see the same
/// unauthenticated response.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed or badly signed token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("expected a {expected} token, got {actual:?}")]
    WrongKind { expected: TokenKind, actual: String },

    #[error("token has no subject")]
    MissingSubject,
}

/// Mints and verifies tokens with the process-wide secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Build an issuer from validated settings, using the wall clock
    pub fn new(settings: &AuthSettings) -> anyhow::Result<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Build an issuer with an explicit clock
    pub fn with_clock(settings: &AuthSettings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let algorithm = settings.algorithm()?;
        let secret = settings.secret_key.as_bytes();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            access_ttl: Duration::minutes(settings.access_token_ttl_minutes),
            refresh_ttl: Duration::minutes(settings.refresh_token_ttl_minutes),
            clock,
        })
    }

    /// Current time according to the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Default lifetime for a token kind
    pub fn default_ttl(&self, kind: &TokenKind) -> Duration {
        match kind {
            TokenKind::Refresh => self.refresh_ttl,
            _ => self.access_ttl,
        }
    }

    /// Issue a token for `subject` expiring `ttl` from now
    pub fn issue(&self, subject: &str, kind: &TokenKind, ttl: Duration) -> anyhow::Result<String> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            token_type: kind.as_str().to_string(),
            exp: (self.clock.now() + ttl).timestamp(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?)
    }

    /// Issue an access token with the configured lifetime
    pub fn issue_access(&self, subject: &str) -> anyhow::Result<String> {
        self.issue(subject, &TokenKind::Access, self.access_ttl)
    }

    /// Issue a refresh token with the configured lifetime
    pub fn issue_refresh(&self, subject: &str) -> anyhow::Result<String> {
        self.issue(subject, &TokenKind::Refresh, self.refresh_ttl)
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str, expected: &TokenKind) -> Result<String, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked against the injected clock below
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        if claims.token_type != expected.as_str() {
            return Err(TokenError::WrongKind {
                expected: expected.clone(),
                actual: claims.token_type,
            });
        }

        claims.sub.ok_or(TokenError::MissingSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings(secret: &str) -> AuthSettings {
        AuthSettings::new(secret)
    }

    fn at(secs: i64) -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.timestamp_opt(secs, 0).unwrap()))
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_700_000_000)).unwrap();
        let token = issuer.issue_access("alice@example.com").unwrap();

        let subject = issuer.verify(&token, &TokenKind::Access).unwrap();
        assert_eq!(subject, "alice@example.com");
    }

    #[test]
    fn test_issue_is_deterministic_for_fixed_clock() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_700_000_000)).unwrap();
        let a = issuer.issue_access("alice@example.com").unwrap();
        let b = issuer.issue_access("alice@example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_expiry_is_fifteen_minutes() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_000)).unwrap();
        let token = issuer.issue_access("alice@example.com").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<Claims>(&token, &DecodingKey::from_secret(b"secret"), &validation)
            .unwrap()
            .claims;

        assert_eq!(claims.exp, 1_000 + 15 * 60);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_expired_token_rejected() {
        let s = settings("secret");
        let minted = TokenIssuer::with_clock(&s, at(1_000)).unwrap();
        let token = minted.issue(
            "alice@example.com",
            &TokenKind::Access,
            Duration::seconds(60),
        )
        .unwrap();

        let later = TokenIssuer::with_clock(&s, at(1_060)).unwrap();
        assert!(matches!(
            later.verify(&token, &TokenKind::Access),
            Err(TokenError::Expired)
        ));

        let just_before = TokenIssuer::with_clock(&s, at(1_059)).unwrap();
        assert!(just_before.verify(&token, &TokenKind::Access).is_ok());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_000)).unwrap();
        let token = issuer.issue_refresh("alice@example.com").unwrap();

        match issuer.verify(&token, &TokenKind::Access) {
            Err(TokenError::WrongKind { expected, actual }) => {
                assert_eq!(expected, TokenKind::Access);
                assert_eq!(actual, "refresh");
            }
            other => panic!("expected WrongKind, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let a = TokenIssuer::with_clock(&settings("secret-a"), at(1_000)).unwrap();
        let b = TokenIssuer::with_clock(&settings("secret-b"), at(1_000)).unwrap();
        let token = a.issue_access("alice@example.com").unwrap();

        assert!(matches!(
            b.verify(&token, &TokenKind::Access),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_000)).unwrap();
        assert!(issuer.verify("not-a-token", &TokenKind::Access).is_err());
    }

    #[test]
    fn test_missing_subject_rejected() {
        let issuer = TokenIssuer::with_clock(&settings("secret"), at(1_000)).unwrap();
        let claims = Claims {
            sub: None,
            token_type: "access".to_string(),
            exp: 5_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            issuer.verify(&token, &TokenKind::Access),
            Err(TokenError::MissingSubject)
        ));
    }

    #[test]
    fn test_custom_kind_roundtrip() {
        let kind: TokenKind = "email_verify".parse().unwrap();
        assert_eq!(kind, TokenKind::Other("email_verify".to_string()));
        assert_eq!(kind.to_string(), "email_verify");
        assert_eq!("refresh".parse::<TokenKind>().unwrap(), TokenKind::Refresh);
    }
}
