//! Integration-name token.
//!
//! Asset writes carry an `FS-INTEGRATION-NAME` header so Freshservice can
//! attribute the change to this integration. The header value is a short-lived
//! HS256 JWT signed with the API key.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::FreshServiceResult;

/// Header carrying the token.
pub const INTEGRATION_NAME_HEADER: &str = "FS-INTEGRATION-NAME";

/// Issuer claim identifying the integration.
pub const INTEGRATION_ISSUER: &str = "device_42";

/// Token lifetime in seconds.
const TOKEN_LIFETIME_SECS: i64 = 120;

/// A token with this many seconds or fewer left is replaced.
const TOKEN_RENEW_WINDOW_SECS: i64 = 15;

/// Claims of the integration token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationClaims {
    pub iss: String,
    pub exp: i64,
}

/// Signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IntegrationToken {
    value: String,
    expires_at: i64,
}

impl IntegrationToken {
    /// Sign a fresh token valid for two minutes from `now` (unix seconds).
    pub fn issue(api_key: &str, now: i64) -> FreshServiceResult<Self> {
        let claims = IntegrationClaims {
            iss: INTEGRATION_ISSUER.to_string(),
            exp: now + TOKEN_LIFETIME_SECS,
        };
        let value = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(api_key.as_bytes()),
        )?;

        Ok(Self {
            value,
            expires_at: claims.exp,
        })
    }

    /// Whether the token must be replaced at `now` (unix seconds).
    #[must_use]
    pub fn needs_renewal(&self, now: i64) -> bool {
        self.expires_at - now <= TOKEN_RENEW_WINDOW_SECS
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

/// Token source that reuses the current token until it is about to expire.
#[derive(Debug, Default)]
pub struct TokenCache {
    current: Option<IntegrationToken>,
}

impl TokenCache {
    /// Current token value, issuing a new one when needed.
    pub fn token(&mut self, api_key: &str) -> FreshServiceResult<String> {
        self.token_at(api_key, Utc::now().timestamp())
    }

    fn token_at(&mut self, api_key: &str, now: i64) -> FreshServiceResult<String> {
        match &self.current {
            Some(token) if !token.needs_renewal(now) => Ok(token.value.clone()),
            _ => {
                let token = IntegrationToken::issue(api_key, now)?;
                let value = token.value.clone();
                self.current = Some(token);
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn test_issue_signs_claims() {
        let token = IntegrationToken::issue("api-key", 1_000).unwrap();
        assert_eq!(token.expires_at(), 1_120);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        let data = decode::<IntegrationClaims>(
            token.value(),
            &DecodingKey::from_secret(b"api-key"),
            &validation,
        )
        .unwrap();
        assert_eq!(data.claims.iss, "device_42");
        assert_eq!(data.claims.exp, 1_120);
    }

    #[test]
    fn test_cache_reuses_until_renew_window() {
        let mut cache = TokenCache::default();
        let first = cache.token_at("k", 1_000).unwrap();
        assert_eq!(cache.token_at("k", 1_100).unwrap(), first);

        let renewed = cache.token_at("k", 1_105).unwrap();
        assert_ne!(renewed, first);
    }
}
