//! Session state: the bearer credential for the running process.
//!
//! A `Session` is an ordinary value handed to every call that needs
//! authentication. Nothing here is global and nothing is written to disk.

use crate::api_client::LeaseApiClient;
use crate::errors::AppError;
use crate::models::Credential;

#[derive(Debug, Clone, Default)]
pub struct Session {
    credential: Option<Credential>,
}

impl Session {
    /// A session with no credential; requests go out without `Authorization`.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.username.as_str())
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }

    /// Logs in and stores the returned token.
    ///
    /// On any failure the session is left exactly as it was.
    pub async fn login(
        &mut self,
        api: &LeaseApiClient,
        username: &str,
        password: &str,
    ) -> Result<Credential, AppError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::Auth("username and password required".to_string()));
        }

        let token = api.login(username, password).await?;
        let credential = Credential {
            username: username.to_string(),
            token,
        };
        self.credential = Some(credential.clone());

        tracing::info!("✓ Logged in as {}", username);
        Ok(credential)
    }

    /// Creates an account without logging in.
    pub async fn register(
        &self,
        api: &LeaseApiClient,
        username: &str,
        password: &str,
    ) -> Result<(), AppError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "username and password required".to_string(),
            ));
        }
        api.register(username, password).await
    }

    /// Notifies the backend, then clears the credential no matter what the
    /// backend said.
    pub async fn logout(&mut self, api: &LeaseApiClient) {
        if let Err(e) = api.logout(self).await {
            tracing::warn!("Logout notification failed, clearing session anyway: {}", e);
        }
        self.clear();
    }

    /// Drops the credential without talking to the backend.
    pub fn clear(&mut self) {
        if let Some(credential) = self.credential.take() {
            tracing::info!("Session for {} cleared", credential.username);
        }
    }
}
