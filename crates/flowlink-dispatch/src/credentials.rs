//! Credential resolution.
//!
//! Connection credentials are stored as configured; some services need them
//! exchanged or augmented right before dispatch (OAuth access-token refresh
//! being the common case). [`CredentialResolver`] is the capability seam so
//! alternate schemes can be substituted without touching the dispatcher.
//!
//! A resolution failure always fails the dispatch — stale credentials are
//! never silently reused.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use flowlink_types::link::ServiceConfig;

/// Credentials ready to be sent to the execution service.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCredentials {
    pub credentials: Value,
}

/// Errors produced during credential resolution.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The token endpoint rejected the refresh.
    #[error("token refresh failed: {0}")]
    Refresh(String),

    /// Transport failure talking to the token endpoint.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stored credentials are not in the shape the resolver expects.
    #[error("malformed credentials: {0}")]
    Malformed(String),
}

/// Exchanges or augments service credentials before dispatch.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Materialize live credentials for a service.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when credentials cannot be materialized;
    /// the dispatch fails rather than running with stale secrets.
    async fn resolve(&self, service: &ServiceConfig)
        -> Result<ResolvedCredentials, CredentialError>;
}

/// Passes stored credentials through unchanged.
///
/// Used for services whose credentials are long-lived (connection strings,
/// API keys).
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCredentialResolver;

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(
        &self,
        service: &ServiceConfig,
    ) -> Result<ResolvedCredentials, CredentialError> {
        Ok(ResolvedCredentials {
            credentials: service.credentials.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Refreshes an OAuth access token against a token endpoint.
///
/// Credentials carrying a `refresh_token` field get their `access_token`
/// rewritten from the endpoint's response; credentials without one pass
/// through unchanged.
pub struct OauthRefreshResolver {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl OauthRefreshResolver {
    /// Create a resolver for one token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Http`] if the HTTP client can't be built.
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }
}

#[async_trait]
impl CredentialResolver for OauthRefreshResolver {
    async fn resolve(
        &self,
        service: &ServiceConfig,
    ) -> Result<ResolvedCredentials, CredentialError> {
        let Some(refresh_token) = service.credentials.get("refresh_token").and_then(Value::as_str)
        else {
            return Ok(ResolvedCredentials {
                credentials: service.credentials.clone(),
            });
        };

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Refresh(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Refresh(format!("unparseable token response: {e}")))?;

        let mut credentials = service.credentials.clone();
        match credentials.as_object_mut() {
            Some(map) => {
                map.insert("access_token".to_string(), Value::String(token.access_token));
            }
            None => {
                return Err(CredentialError::Malformed(
                    "credentials with refresh_token must be a JSON object".into(),
                ));
            }
        }

        tracing::debug!(service = %service.id, "Refreshed access token");
        Ok(ResolvedCredentials { credentials })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlink_types::ids::{ServiceId, WorkspaceId};
    use serde_json::json;

    fn service(credentials: Value) -> ServiceConfig {
        ServiceConfig {
            id: ServiceId::new("src_1"),
            workspace_id: WorkspaceId::new("ws_1"),
            package: "source-hubspot".into(),
            version: "2.1.0".into(),
            credentials,
        }
    }

    #[tokio::test]
    async fn static_resolver_passes_through() {
        let creds = json!({"api_key": "k"});
        let resolved = StaticCredentialResolver
            .resolve(&service(creds.clone()))
            .await
            .unwrap();
        assert_eq!(resolved.credentials, creds);
    }

    #[tokio::test]
    async fn oauth_resolver_skips_refresh_without_token() {
        let resolver =
            OauthRefreshResolver::new("http://127.0.0.1:9/token", "cid", "secret").unwrap();
        let creds = json!({"api_key": "k"});
        // No refresh_token field: no network call, passthrough.
        let resolved = resolver.resolve(&service(creds.clone())).await.unwrap();
        assert_eq!(resolved.credentials, creds);
    }

    #[tokio::test]
    async fn oauth_resolver_fails_closed_on_unreachable_endpoint() {
        let resolver =
            OauthRefreshResolver::new("http://127.0.0.1:9/token", "cid", "secret").unwrap();
        let err = resolver
            .resolve(&service(json!({"refresh_token": "r"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Http(_)));
    }
}
