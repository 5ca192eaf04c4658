//! Account repository: registration, login and API keys.

use super::DbError;
use super::models::{ApiKey, User, UserId};
use crate::security::password::{dummy_password_verify, hash_password, verify_password};
use sqlx::SqlitePool;

/// Repository for account operations.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new user with an Argon2-hashed password.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, DbError> {
        let password_hash =
            hash_password(password).map_err(|e| DbError::PasswordHash(e.to_string()))?;
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return DbError::UserExists(username.to_string());
            }
            DbError::from(e)
        })?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            password_hash,
        })
    }

    /// Find a user by name.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, username, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, username, password_hash)| User {
            id,
            username,
            password_hash,
        }))
    }

    /// Check a username/password pair.
    ///
    /// `Ok(None)` for an unknown user or a wrong password; an unknown user
    /// still pays for one Argon2 verification so timing does not reveal it.
    pub async fn verify_login(&self, username: &str, password: &str) -> Result<Option<User>, DbError> {
        let Some(user) = self.find_by_username(username).await? else {
            dummy_password_verify(password);
            return Ok(None);
        };

        if verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Store a freshly generated API key for a user.
    pub async fn create_api_key(&self, user_id: UserId) -> Result<ApiKey, DbError> {
        let api_key = crate::security::api_key::generate();
        let now = chrono::Utc::now().timestamp();

        let result =
            sqlx::query("INSERT INTO api_keys (api_key, user_id, created_at) VALUES (?, ?, ?)")
                .bind(&api_key)
                .bind(user_id)
                .bind(now)
                .execute(self.pool)
                .await?;

        Ok(ApiKey {
            id: result.last_insert_rowid(),
            api_key,
            user_id,
            created_at: now,
        })
    }

    /// A user's API keys, oldest first.
    pub async fn list_api_keys(&self, user_id: UserId) -> Result<Vec<ApiKey>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, i64, i64)>(
            r#"
            SELECT id, api_key, user_id, created_at FROM api_keys
            WHERE user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, api_key, user_id, created_at)| ApiKey {
                id,
                api_key,
                user_id,
                created_at,
            })
            .collect())
    }

    /// Delete one of a user's API keys. Returns `false` if it was not theirs.
    pub async fn delete_api_key(&self, user_id: UserId, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Resolve the user an API key belongs to, given the claimed username.
    pub async fn api_key_owner(
        &self,
        username: &str,
        api_key: &str,
    ) -> Result<Option<UserId>, DbError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT users.id FROM users
            JOIN api_keys ON api_keys.user_id = users.id
            WHERE users.username = ? AND api_keys.api_key = ?
            "#,
        )
        .bind(username)
        .bind(api_key)
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id)
    }
}
