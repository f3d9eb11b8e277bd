//! Bearer token acquisition for the Resource Manager API.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{HierarchyError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint, used when the key file has no `token_uri`.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only scope; the walker never mutates the hierarchy.
const CLOUD_PLATFORM_READ_ONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/cloud-platform.read-only";

/// Refresh this long before the token actually expires.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// Lifetime requested for the JWT assertion.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    exp: u64,
    iat: u64,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

#[derive(Clone)]
enum TokenSource {
    ServiceAccount {
        credentials: Arc<ServiceAccountCredentials>,
        client: Client,
        cached_token: Arc<RwLock<Option<CachedToken>>>,
    },
    Static(Arc<str>),
}

/// Supplies bearer tokens, either minted from a service account key or fixed.
#[derive(Clone)]
pub struct Authenticator {
    source: TokenSource,
}

impl Authenticator {
    /// Create an authenticator from a service account JSON key file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    /// Create an authenticator from parsed service account credentials.
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            source: TokenSource::ServiceAccount {
                credentials: Arc::new(credentials),
                client: Client::new(),
                cached_token: Arc::new(RwLock::new(None)),
            },
        }
    }

    /// Use a pre-issued access token as-is (e.g. `gcloud auth print-access-token`).
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(Arc::from(token.into())),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        let (credentials, client, cached_token) = match &self.source {
            TokenSource::Static(token) => return Ok(token.to_string()),
            TokenSource::ServiceAccount {
                credentials,
                client,
                cached_token,
            } => (credentials, client, cached_token),
        };

        {
            let cached = cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_SKEW {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cached = cached_token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if token.expires_at > SystemTime::now() + EXPIRY_SKEW {
                return Ok(token.access_token.clone());
            }
        }

        let new_token = refresh_token(client, credentials).await?;
        *cached = Some(new_token.clone());
        Ok(new_token.access_token)
    }
}

/// Exchange a signed JWT assertion for an access token.
async fn refresh_token(
    client: &Client,
    credentials: &ServiceAccountCredentials,
) -> Result<CachedToken> {
    let token_uri = credentials
        .token_uri
        .as_deref()
        .unwrap_or(DEFAULT_TOKEN_URI);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HierarchyError::TokenRefreshError(e.to_string()))?
        .as_secs();

    let claims = Claims {
        iss: credentials.client_email.clone(),
        scope: CLOUD_PLATFORM_READ_ONLY_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let header = Header::new(Algorithm::RS256);
    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
    let jwt = encode(&header, &claims, &key)?;

    let params = [
        ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
        ("assertion", &jwt),
    ];

    debug!(client_email = %credentials.client_email, "Refreshing access token");
    let response = client.post(token_uri).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(HierarchyError::TokenRefreshError(format!(
            "Status {}: {}",
            status, body
        )));
    }

    let token_response: TokenResponse = response.json().await?;

    Ok(CachedToken {
        access_token: token_response.access_token,
        expires_at: SystemTime::now() + Duration::from_secs(token_response.expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "walker@example.iam.gserviceaccount.com".to_string(),
            scope: CLOUD_PLATFORM_READ_ONLY_SCOPE.to_string(),
            aud: DEFAULT_TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("walker@example.iam.gserviceaccount.com"));
        assert!(json.contains(CLOUD_PLATFORM_READ_ONLY_SCOPE));
    }

    #[tokio::test]
    async fn test_static_token_is_returned_unchanged() {
        let auth = Authenticator::from_access_token("ya29.static");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_invalid_private_key_fails_refresh() {
        let auth = Authenticator::new(ServiceAccountCredentials {
            client_email: "walker@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: None,
        });

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, HierarchyError::JwtError(_)));
    }
}
