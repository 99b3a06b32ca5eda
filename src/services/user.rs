//! User service
//!
//! Login, logout and session validation. Sessions are opaque UUID tokens
//! stored in the database with an expiry; an expired session is deleted
//! the first time it is presented.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 14;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Credentials submitted to the login form
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// User service for authentication and account bootstrap
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_expiration(user_repo, session_repo, DEFAULT_SESSION_EXPIRATION_DAYS)
    }

    pub fn with_session_expiration(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_expiration_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days,
        }
    }

    /// Create an account with a hashed password
    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        if input.username.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "Username cannot be empty".to_string(),
            ));
        }
        if input.password.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Password cannot be empty".to_string(),
            ));
        }
        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(input.username));
        }

        let password_hash = hash_password(&input.password)?;
        let now = Utc::now();
        let user = User {
            id: 0,
            username: input.username,
            email: input.email,
            password_hash,
            role: input.role,
            created_at: now,
            updated_at: now,
        };

        Ok(self.user_repo.create(&user).await.context("Failed to create user")?)
    }

    /// Verify credentials and open a new session
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::info!("Failed login for {}", user.username);
            return Err(invalid());
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        tracing::info!("User {} logged in", user.username);
        Ok(created)
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; expired ones are deleted.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        Ok(self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserServiceError> {
        Ok(self.user_repo.list().await.context("Failed to list users")?)
    }

    /// Create the given account only when no user exists yet.
    ///
    /// Returns the created user, or `None` when users already exist.
    pub async fn bootstrap_admin(&self, input: CreateUserInput) -> Result<Option<User>, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        if count > 0 {
            return Ok(None);
        }
        self.create_user(input).await.map(Some)
    }

    /// Delete every expired session, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::test_support::migrated_pool;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    async fn service() -> (DynDatabasePool, UserService) {
        let pool = migrated_pool().await;
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    fn input(username: &str, role: UserRole) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "secret123".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = service().await;
        let user = service.create_user(input("kenneth", UserRole::Teacher)).await.unwrap();

        let session = service
            .login(LoginInput {
                username: "kenneth".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .unwrap();

        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (_pool, service) = service().await;
        service.create_user(input("kenneth", UserRole::Teacher)).await.unwrap();

        let wrong_password = service
            .login(LoginInput {
                username: "kenneth".to_string(),
                password: "nope".to_string(),
            })
            .await;
        let unknown_user = service
            .login(LoginInput {
                username: "ghost".to_string(),
                password: "secret123".to_string(),
            })
            .await;

        assert!(matches!(wrong_password, Err(UserServiceError::AuthenticationError(_))));
        assert!(matches!(unknown_user, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_deleted() {
        let (pool, service) = service().await;
        let user = service.create_user(input("kenneth", UserRole::Teacher)).await.unwrap();
        let sessions = SqlxSessionRepository::new(pool);
        let now = Utc::now();
        sessions
            .create(&Session {
                id: "stale".to_string(),
                user_id: user.id,
                expires_at: now - Duration::minutes(1),
                created_at: now - Duration::days(1),
            })
            .await
            .unwrap();

        assert!(service.validate_session("stale").await.unwrap().is_none());
        assert!(sessions.get_by_id("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let (_pool, service) = service().await;
        service.create_user(input("kenneth", UserRole::Teacher)).await.unwrap();

        let duplicate = service.create_user(input("kenneth", UserRole::Teacher)).await;
        assert!(matches!(duplicate, Err(UserServiceError::UserExists(_))));

        let blank = input("  ", UserRole::Teacher);
        assert!(matches!(
            service.create_user(blank).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_when_empty() {
        let (_pool, service) = service().await;

        let created = service.bootstrap_admin(input("root", UserRole::Admin)).await.unwrap();
        assert!(created.unwrap().is_staff());

        let again = service.bootstrap_admin(input("other", UserRole::Admin)).await.unwrap();
        assert!(again.is_none());
    }
}
