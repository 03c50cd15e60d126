//! Authorization sequencing for the run entrypoint.
//!
//! Two credential paths exist: a shared dispatcher secret for
//! service-to-service calls, and a user token with workspace access. The
//! secret is checked first, then user auth; exactly one must validate, and
//! rejection happens before any state is touched. Token validation itself
//! is a collaborator behind [`WorkspaceAccess`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use flowlink_types::ids::WorkspaceId;

/// Authorization failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,

    /// The access collaborator itself failed (not a rejection).
    #[error("auth backend error: {0}")]
    Backend(String),
}

/// Which credential path validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    /// Service-to-service call carrying the shared secret.
    Service,
    /// Authenticated user with access to the workspace.
    User,
}

/// Validates a user token's access to a workspace.
#[async_trait]
pub trait WorkspaceAccess: Send + Sync {
    /// Whether `token` belongs to a user with access to `workspace`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] when validation itself fails.
    async fn has_access(&self, token: &str, workspace: &WorkspaceId) -> Result<bool, AuthError>;
}

/// Token-to-workspaces table, loaded from configuration.
#[derive(Debug, Default)]
pub struct StaticWorkspaceAccess {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticWorkspaceAccess {
    #[must_use]
    pub fn new(grants: HashMap<String, HashSet<String>>) -> Self {
        Self { grants }
    }

    /// Parse the `USER_TOKENS` config value: a JSON object mapping tokens to
    /// workspace-id lists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] on malformed JSON.
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let parsed: HashMap<String, Vec<String>> = serde_json::from_str(raw)
            .map_err(|e| AuthError::Backend(format!("invalid user token table: {e}")))?;
        Ok(Self::new(
            parsed
                .into_iter()
                .map(|(token, workspaces)| (token, workspaces.into_iter().collect()))
                .collect(),
        ))
    }
}

#[async_trait]
impl WorkspaceAccess for StaticWorkspaceAccess {
    async fn has_access(&self, token: &str, workspace: &WorkspaceId) -> Result<bool, AuthError> {
        Ok(self
            .grants
            .get(token)
            .is_some_and(|workspaces| workspaces.contains(workspace.as_str())))
    }
}

/// Auth policy for the run entrypoint.
pub struct DispatchAuth {
    service_secret: Option<String>,
    access: Arc<dyn WorkspaceAccess>,
}

impl DispatchAuth {
    #[must_use]
    pub fn new(service_secret: Option<String>, access: Arc<dyn WorkspaceAccess>) -> Self {
        Self {
            service_secret,
            access,
        }
    }

    /// Authorize a bearer token for a workspace.
    ///
    /// The shared secret is tried first; a miss falls back to user-token
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unauthorized`] when neither path validates, or
    /// [`AuthError::Backend`] when validation itself fails.
    pub async fn authorize(
        &self,
        token: Option<&str>,
        workspace: &WorkspaceId,
    ) -> Result<Principal, AuthError> {
        let Some(token) = token else {
            return Err(AuthError::Unauthorized);
        };

        if let Some(secret) = &self.service_secret {
            if token == secret {
                return Ok(Principal::Service);
            }
        }

        if self.access.has_access(token, workspace).await? {
            return Ok(Principal::User);
        }

        Err(AuthError::Unauthorized)
    }
}
