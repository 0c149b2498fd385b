//! Credential table held in memory. Used by the demo runtime and tests.

use crate::ports::outbound::Authenticator;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ApiError, ApiResult, AuthContext, AuthType, Credentials, OrgId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    sessions: RwLock<HashMap<(AuthType, String), AuthContext>>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `secret` to `auth`. The credential type follows `auth.auth_type`.
    pub fn insert(&self, secret: impl Into<String>, auth: AuthContext) {
        self.sessions
            .write()
            .insert((auth.auth_type, secret.into()), auth);
    }

    /// Forget a credential, as a logout or key revocation would.
    pub fn revoke(&self, auth_type: AuthType, secret: &str) -> bool {
        self.sessions
            .write()
            .remove(&(auth_type, secret.to_string()))
            .is_some()
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, org_id: &OrgId, credentials: &Credentials) -> ApiResult<AuthContext> {
        let auth = self
            .sessions
            .read()
            .get(&(credentials.auth_type, credentials.secret.clone()))
            .cloned()
            .ok_or_else(|| ApiError::AuthenticationFailed("unknown credentials".into()))?;
        if &auth.org_id != org_id {
            return Err(ApiError::AuthenticationFailed(
                "credentials belong to another org".into(),
            ));
        }
        Ok(auth)
    }
}
