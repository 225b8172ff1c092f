use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::{
    API_KEY_KEY, CURRENT_USER_KEY, Storage, USER_KEY_PREFIX, get_json, set_json,
};
use crate::error::StorageError;
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please enter a valid email and password (min 6 characters)")]
    InvalidCredentials,

    #[error("No user is signed in")]
    NotSignedIn,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// Archive data is keyed by user_id, so it must stay stable per account
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn update_email(&self, email: &str) -> Result<User, AuthError>;
}

// Accepts any plausible email/password pair and keeps the session in storage
pub struct LocalIdentityProvider {
    storage: Arc<dyn Storage>,
}

impl LocalIdentityProvider {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        LocalIdentityProvider { storage }
    }

    fn validate(email: &str, password: &str) -> Result<(), AuthError> {
        if email.contains('@') && password.chars().count() >= MIN_PASSWORD_LEN {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn store(&self, user: &User) -> Result<(), AuthError> {
        set_json(self.storage.as_ref(), CURRENT_USER_KEY, user).await?;
        Ok(())
    }

    async fn start_session(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();
        Self::validate(email, password)?;

        let user = User {
            user_id: user_id_for(email),
            username: username_for(email),
            email: email.to_string(),
        };
        self.store(&user).await?;

        tracing::info!("signed in as {}", user.username);
        Ok(user)
    }
}

// Stable per-account id so a returning user gets their own archive back
pub fn user_id_for(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes())
        .simple()
        .to_string()
}

fn username_for(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_user(&self) -> Result<Option<User>, AuthError> {
        Ok(get_json(self.storage.as_ref(), CURRENT_USER_KEY).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.start_session(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError> {
        self.start_session(email, password).await
    }

    // Ends the session; only the API key and per-user archives survive
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.storage
            .retain(&|key| key == API_KEY_KEY || key.starts_with(USER_KEY_PREFIX))
            .await?;
        Ok(())
    }

    async fn update_email(&self, email: &str) -> Result<User, AuthError> {
        let mut user = self.current_user().await?.ok_or(AuthError::NotSignedIn)?;
        let email = email.trim();
        if !email.contains('@') {
            return Err(AuthError::InvalidCredentials);
        }

        user.email = email.to_string();
        user.username = username_for(email);
        self.store(&user).await?;
        Ok(user)
    }
}
