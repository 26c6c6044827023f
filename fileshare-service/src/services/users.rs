use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{ChangePasswordInput, RegisterUserInput, User};
use crate::services::error::{ServiceError, StoreError};
use crate::services::repository::UserRepository;
use crate::utils::{CredentialHasher, Password};

/// Registration, authentication and maintenance of identities.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { users, hasher }
    }

    pub async fn register(&self, input: RegisterUserInput) -> Result<User, ServiceError> {
        input.validate()?;

        let password_hash = self.hash(&Password::new(input.password))?;
        let user = User::new(input.email, password_hash);

        self.users.create_user(&user).await.map_err(|e| match e {
            StoreError::Conflict => ServiceError::EmailExists,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Resolve an identity from email and password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let user = self
            .users
            .get_user_by_email(email)
            .await
            .map_err(|e| e.or_not_found(ServiceError::UserNotFound))?;

        if !self.verify(&Password::new(password), &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(ServiceError::InvalidPassword);
        }

        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.users
            .get_user(user_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::UserNotFound))
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<User, ServiceError> {
        input.validate()?;

        let mut user = self.get_user(user_id).await?;
        if !self.verify(&Password::new(input.current_password), &user.password_hash)? {
            return Err(ServiceError::InvalidPassword);
        }

        user.password_hash = self.hash(&Password::new(input.new_password))?;
        user.updated_at = Utc::now();

        self.users
            .update_user(&user)
            .await
            .map_err(|e| e.or_not_found(ServiceError::UserNotFound))?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(user)
    }

    /// Delete an identity; its memberships go with it.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.users
            .delete_user(user_id)
            .await
            .map_err(|e| e.or_not_found(ServiceError::UserNotFound))?;

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    fn hash(&self, password: &Password) -> Result<String, ServiceError> {
        self.hasher
            .hash(password)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))
    }

    fn verify(&self, password: &Password, hash: &str) -> Result<bool, ServiceError> {
        self.hasher.verify(password, hash).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password verification error: {}", e))
        })
    }
}
