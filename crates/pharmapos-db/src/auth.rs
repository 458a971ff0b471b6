//! # Authentication Service
//!
//! Username/password login backed by argon2 hashes stored in the users
//! table. Failed logins never reveal whether the username exists, whether
//! the password was wrong, or whether the account is disabled: every path
//! returns the same `InvalidCredentials`.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::repository::{AuditLogRepository, UserRepository};
use pharmapos_core::SessionUser;

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong username, wrong password, or disabled account. Deliberately
    /// indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("database error: {0}")]
    Persistence(#[from] DbError),
}

/// Service for login and password management.
#[derive(Debug, Clone)]
pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    /// Creates a new AuthService.
    pub fn new(pool: SqlitePool) -> Self {
        AuthService { pool }
    }

    /// Verifies credentials and returns the session identity on success.
    ///
    /// A successful login stamps `last_login` and appends an audit entry;
    /// both are best-effort and never fail the login itself.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser, AuthError> {
        let users = UserRepository::new(self.pool.clone());

        let user = match users.get_by_username(username).await? {
            Some(user) => user,
            None => {
                debug!(username = %username, "Login failed: unknown username");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !user.is_active {
            debug!(username = %username, "Login failed: account disabled");
            return Err(AuthError::InvalidCredentials);
        }

        if !verify_password(password, &user.password_hash) {
            debug!(username = %username, "Login failed: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(err) = users.update_last_login(&user.id).await {
            warn!(error = %err, "Failed to stamp last_login");
        }

        let audit = AuditLogRepository::new(self.pool.clone());
        if let Err(err) = audit
            .log(
                Some(&user.id),
                "login",
                "users",
                Some(&user.id),
                &serde_json::json!({
                    "username": user.username,
                    "role": user.role.as_str(),
                })
                .to_string(),
            )
            .await
        {
            warn!(error = %err, "Audit log write failed");
        }

        info!(username = %user.username, role = %user.role, "Login succeeded");

        Ok(SessionUser {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
        })
    }

    /// Changes a user's password after verifying the current one.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let users = UserRepository::new(self.pool.clone());

        let user = users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(new_password)?;
        users.update_password_hash(user_id, &new_hash).await?;

        info!(username = %user.username, "Password changed");
        Ok(())
    }
}

/// Hashes a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verifies a password against a stored argon2 hash. An unparseable hash
/// verifies as false rather than erroring, so corrupt rows lock the
/// account instead of crashing login.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-real-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn login_accepts_good_credentials_and_rejects_everything_else() {
        use crate::pool::{Database, DbConfig};
        use chrono::Utc;
        use pharmapos_core::{Role, User};
        use uuid::Uuid;

        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        db.users()
            .insert(&User {
                id: Uuid::new_v4().to_string(),
                username: "maria".to_string(),
                password_hash: hash_password("secret").unwrap(),
                full_name: "Maria Santos".to_string(),
                role: Role::Pharmacist,
                is_active: true,
                last_login: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        db.users()
            .insert(&User {
                id: Uuid::new_v4().to_string(),
                username: "former".to_string(),
                password_hash: hash_password("secret").unwrap(),
                full_name: "Former Employee".to_string(),
                role: Role::Cashier,
                is_active: false,
                last_login: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let session = db.auth().login("maria", "secret").await.unwrap();
        assert_eq!(session.username, "maria");
        assert_eq!(session.role, Role::Pharmacist);

        let stamped = db.users().get_by_username("maria").await.unwrap().unwrap();
        assert!(stamped.last_login.is_some());

        // Unknown user, wrong password and disabled account all look alike.
        for (user, pass) in [("nobody", "secret"), ("maria", "wrong"), ("former", "secret")] {
            let err = db.auth().login(user, pass).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }
}
