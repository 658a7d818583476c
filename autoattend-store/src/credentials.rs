//! Credential store: one portal login per identity

use autoattend_core::{
    AttendError, AttendResult, Identity, Secret, UserCredential, DEFAULT_DURATION_MINUTES,
};
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Row of the `users` table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRecord {
    user_id: i64,
    username: String,
    password: String,
    default_duration: Option<i64>,
}

impl UserRecord {
    fn into_credential(self) -> UserCredential {
        let duration = match self.default_duration {
            Some(minutes) => u32::try_from(minutes).unwrap_or_else(|_| {
                warn!(
                    identity = self.user_id,
                    minutes, "Stored duration out of range, using default"
                );
                DEFAULT_DURATION_MINUTES
            }),
            None => DEFAULT_DURATION_MINUTES,
        };

        UserCredential::new(self.user_id, self.username, Secret::new(self.password))
            .with_duration(duration)
    }
}

pub(crate) const UPSERT_USER: &str = "INSERT OR REPLACE INTO users (user_id, username, password, default_duration) VALUES (?, ?, ?, ?)";

#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
}

impl CredentialStore {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, identity: Identity) -> AttendResult<Option<UserCredential>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, password, default_duration FROM users WHERE user_id = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AttendError::storage("Failed to load credential", e, "get_credential"))?;

        Ok(record.map(UserRecord::into_credential))
    }

    /// Insert or overwrite the whole row (last write wins)
    pub async fn save(&self, credential: &UserCredential) -> AttendResult<()> {
        sqlx::query(UPSERT_USER)
            .bind(credential.identity)
            .bind(&credential.username)
            .bind(credential.secret.expose())
            .bind(i64::from(credential.preferred_duration_minutes))
            .execute(&self.pool)
            .await
            .map_err(|e| AttendError::storage("Failed to save credential", e, "save_credential"))?;

        debug!(identity = credential.identity, "Credential saved");
        Ok(())
    }

    pub async fn list(&self) -> AttendResult<Vec<UserCredential>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, username, password, default_duration FROM users ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AttendError::storage("Failed to list credentials", e, "list_credentials"))?;

        Ok(records
            .into_iter()
            .map(UserRecord::into_credential)
            .collect())
    }

    /// Returns `false` when no credential exists for `identity`
    pub async fn update_duration(&self, identity: Identity, minutes: u32) -> AttendResult<bool> {
        let result = sqlx::query("UPDATE users SET default_duration = ? WHERE user_id = ?")
            .bind(i64::from(minutes))
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| AttendError::storage("Failed to update duration", e, "update_duration"))?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace username and secret, keeping the stored duration
    pub async fn update_login(
        &self,
        identity: Identity,
        username: &str,
        secret: &Secret,
    ) -> AttendResult<bool> {
        let result = sqlx::query("UPDATE users SET username = ?, password = ? WHERE user_id = ?")
            .bind(username)
            .bind(secret.expose())
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| AttendError::storage("Failed to update credential", e, "update_login"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, identity: Identity) -> AttendResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(identity)
            .execute(&self.pool)
            .await
            .map_err(|e| AttendError::storage("Failed to delete credential", e, "delete"))?;

        Ok(result.rows_affected() > 0)
    }
}
