// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================
//
// Used for the public (viewer) deployment. The service account's JSON key is
// provided through the secret store; the Drive folder must be shared with the
// service account email.
//
// Flow: sign a JWT with the account's private key, exchange it at the token
// endpoint for a one-hour access token, cache the token until shortly before
// it expires.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::auth::AuthError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Fields we need from the service account JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    /// At most one hour after `iat`.
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Access-token source backed by a service account key.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scope: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    /// Parses the JSON key. Fails early on a malformed descriptor or key.
    pub fn from_json(json: &str, scope: &str) -> Result<Self, AuthError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| AuthError::ServiceAccount(format!("invalid descriptor: {}", e)))?;

        EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| AuthError::ServiceAccount(format!("invalid private key: {}", e)))?;

        Ok(Self {
            credentials,
            scope: scope.to_string(),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Gets a valid access token, fetching a new one if necessary.
    pub async fn get_access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() + Duration::seconds(60) {
                    return Ok(token.token.clone());
                }
            }
        }

        let response = self.fetch_new_token().await?;

        let mut cached = self.cached_token.write().await;
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at: Utc::now() + Duration::seconds(response.expires_in),
        });

        Ok(response.access_token)
    }

    fn signed_assertion(&self, now: i64) -> Result<String, AuthError> {
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.credentials.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| AuthError::ServiceAccount(e.to_string()))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| AuthError::ServiceAccount(e.to_string()))
    }

    async fn fetch_new_token(&self) -> Result<TokenResponse, AuthError> {
        let jwt = self.signed_assertion(Utc::now().timestamp())?;

        tracing::debug!(
            "Exchanging service account assertion for {}",
            self.credentials.client_email
        );

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::ServiceAccount(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::ServiceAccount(format!(
                "token exchange failed ({}): {}",
                status, text
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ServiceAccount(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/service_account_key.pem"
    ));

    fn descriptor(token_uri: &str) -> String {
        serde_json::json!({
            "type": "service_account",
            "client_email": "reader@project.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "token_uri": token_uri
        })
        .to_string()
    }

    #[test]
    fn test_descriptor_missing_fields_is_rejected() {
        let result = ServiceAccountAuth::from_json(r#"{"client_email":"a@b.com"}"#, "scope");
        assert!(matches!(result, Err(AuthError::ServiceAccount(_))));
    }

    #[test]
    fn test_invalid_private_key_is_rejected() {
        let json = r#"{
            "client_email": "reader@project.iam.gserviceaccount.com",
            "private_key": "not a pem"
        }"#;
        let result = ServiceAccountAuth::from_json(json, "scope");
        match result {
            Err(AuthError::ServiceAccount(msg)) => assert!(msg.contains("private key")),
            other => panic!("expected private key error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_token_uri_defaults_when_absent() {
        let creds: ServiceAccountCredentials =
            serde_json::from_str(r#"{"client_email":"a","private_key":"k"}"#).unwrap();
        assert_eq!(creds.token_uri, DEFAULT_TOKEN_URI);
    }

    #[tokio::test]
    async fn test_access_token_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("jwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.service",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let auth = ServiceAccountAuth::from_json(&descriptor(&token_uri), "scope").unwrap();

        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.service");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.service");
    }

    #[tokio::test]
    async fn test_rejected_assertion_is_a_service_account_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
            .mount(&server)
            .await;

        let token_uri = format!("{}/token", server.uri());
        let auth = ServiceAccountAuth::from_json(&descriptor(&token_uri), "scope").unwrap();

        match auth.get_access_token().await {
            Err(AuthError::ServiceAccount(msg)) => {
                assert!(msg.contains("401"), "{msg}");
                assert!(msg.contains("invalid_client"), "{msg}");
            }
            other => panic!("expected a service account error, got {:?}", other),
        }
    }
}

