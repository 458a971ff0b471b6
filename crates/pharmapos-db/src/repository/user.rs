//! # User Repository
//!
//! Database operations for POS user accounts. Password hashing and
//! verification live in the auth service; this repository stores and
//! retrieves the already-hashed credential.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use pharmapos_core::validation::validate_username;
use pharmapos_core::{Role, User};

const USER_COLUMNS: &str =
    "id, username, password_hash, full_name, role, is_active, last_login, created_at";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by username. Includes inactive accounts; login decides
    /// what to do with them.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lists all users sorted by username.
    pub async fn list_all(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Inserts a new user. `password_hash` must already be an argon2 hash.
    pub async fn insert(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, username = %user.username, "Inserting user");

        validate_username(&user.username)?;

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, full_name, role, is_active, last_login, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.last_login)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates a user's profile fields (not the password).
    pub async fn update(&self, user: &User) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET full_name = ?2, role = ?3, is_active = ?4 WHERE id = ?1",
        )
        .bind(&user.id)
        .bind(&user.full_name)
        .bind(user.role)
        .bind(user.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", &user.id));
        }

        Ok(())
    }

    /// Replaces a user's password hash.
    pub async fn update_password_hash(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?2 WHERE id = ?1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Stamps the user's last successful login.
    pub async fn update_last_login(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET last_login = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Deactivates a user account without deleting its sale history.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Bootstraps the initial admin account if no users exist yet.
    ///
    /// Returns `true` when the account was created. A non-empty users table
    /// leaves the database untouched, so repeated startups are safe.
    pub async fn ensure_initial_admin(
        &self,
        username: &str,
        password_hash: &str,
        full_name: &str,
    ) -> DbResult<bool> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        if existing > 0 {
            return Ok(false);
        }

        let admin = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            full_name: full_name.to_string(),
            role: Role::Admin,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        };

        self.insert(&admin).await?;
        info!(username = %username, "Created initial admin account");
        Ok(true)
    }
}
