//! SQL implementation of the device token repository

use crate::error::DbError;
use crate::repositories::device_token::DeviceTokenRepository;
use crate::repositories::{from_millis, to_millis};
use crate::DbClient;
use chrono::Utc;
use lilead_common::models::{DeviceToken, Platform};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info, warn};

/// SQL implementation of the device token repository
#[derive(Debug, Clone)]
pub struct SqlDeviceTokenRepository {
    /// The database client
    db_client: DbClient,
}

impl SqlDeviceTokenRepository {
    /// Create a new SQL device token repository
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    fn map_row(row: &AnyRow) -> Result<DeviceToken, DbError> {
        let platform: String = row.try_get("platform")?;
        let platform = platform
            .parse::<Platform>()
            .map_err(|e| DbError::CorruptRow(e.to_string()))?;
        let updated_at: i64 = row.try_get("updated_at")?;

        Ok(DeviceToken {
            token: row.try_get("token")?,
            user_id: row.try_get("user_id")?,
            platform,
            updated_at: from_millis(updated_at)?,
        })
    }
}

impl DeviceTokenRepository for SqlDeviceTokenRepository {
    async fn init_schema(&self) -> Result<(), DbError> {
        debug!("Initializing device token schema");

        self.db_client
            .execute(
                r#"
            CREATE TABLE IF NOT EXISTS device_tokens (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                platform TEXT NOT NULL,
                updated_at BIGINT NOT NULL
            )
        "#,
            )
            .await?;
        self.db_client
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_device_tokens_user_id ON device_tokens (user_id)",
            )
            .await?;

        info!("Device token schema initialized successfully");
        Ok(())
    }

    async fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: Platform,
    ) -> Result<DeviceToken, DbError> {
        if token.trim().is_empty() {
            return Err(DbError::InvalidInput("Token is required".to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(DbError::InvalidInput("User id is required".to_string()));
        }

        debug!("Registering {} device token for user: {}", platform, user_id);

        if let Some(existing) = self.find_by_token(token).await? {
            if existing.user_id != user_id {
                warn!(
                    previous_user = %existing.user_id,
                    new_user = %user_id,
                    "Device token re-registered by another user, reassigning"
                );
            }
        }

        let updated_at = Utc::now();
        sqlx::query(
            r#"
                INSERT INTO device_tokens (token, user_id, platform, updated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (token) DO UPDATE
                SET user_id = excluded.user_id,
                    platform = excluded.platform,
                    updated_at = excluded.updated_at
            "#,
        )
        .bind(token)
        .bind(user_id)
        .bind(platform.as_str())
        .bind(to_millis(updated_at))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to upsert device token: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        Ok(DeviceToken {
            token: token.to_string(),
            user_id: user_id.to_string(),
            platform,
            updated_at: from_millis(to_millis(updated_at))?,
        })
    }

    async fn unregister(&self, token: &str) -> Result<(), DbError> {
        debug!("Deleting device token");

        let result = sqlx::query("DELETE FROM device_tokens WHERE token = $1")
            .bind(token)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to delete device token: {}", e);
                DbError::QueryError(e.to_string())
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("device token".to_string()));
        }

        Ok(())
    }

    async fn tokens_for_user(&self, user_id: &str) -> Result<Vec<DeviceToken>, DbError> {
        debug!("Finding device tokens for user: {}", user_id);

        let rows = sqlx::query(
            r#"
            SELECT token, user_id, platform, updated_at
            FROM device_tokens
            WHERE user_id = $1
            ORDER BY updated_at, token
        "#,
        )
        .bind(user_id)
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to find device tokens: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<DeviceToken>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT token, user_id, platform, updated_at
            FROM device_tokens
            WHERE token = $1
        "#,
        )
        .bind(token)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to find device token: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repository() -> SqlDeviceTokenRepository {
        let client = DbClient::from_url("sqlite::memory:").await.unwrap();
        let repo = SqlDeviceTokenRepository::new(client);
        repo.init_schema().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let repo = repository().await;

        repo.register("user-1", "tok-a", Platform::Ios).await.unwrap();
        repo.register("user-1", "tok-b", Platform::Android).await.unwrap();
        repo.register("user-2", "tok-c", Platform::Web).await.unwrap();

        let tokens: Vec<(String, Platform)> = repo
            .tokens_for_user("user-1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.token, t.platform))
            .collect();

        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains(&("tok-a".to_string(), Platform::Ios)));
        assert!(tokens.contains(&("tok-b".to_string(), Platform::Android)));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let repo = repository().await;

        repo.register("user-1", "tok-a", Platform::Ios).await.unwrap();
        repo.register("user-1", "tok-a", Platform::Ios).await.unwrap();

        assert_eq!(repo.tokens_for_user("user-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reregistering_reassigns_owner() {
        let repo = repository().await;

        repo.register("user-1", "shared", Platform::Ios).await.unwrap();
        let token = repo
            .register("user-2", "shared", Platform::Android)
            .await
            .unwrap();

        assert_eq!(token.user_id, "user-2");
        assert!(repo.tokens_for_user("user-1").await.unwrap().is_empty());

        let stored = repo.find_by_token("shared").await.unwrap().unwrap();
        assert_eq!(stored.user_id, "user-2");
        assert_eq!(stored.platform, Platform::Android);
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let repo = repository().await;

        let err = repo.register("user-1", "  ", Platform::Web).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unregister() {
        let repo = repository().await;
        repo.register("user-1", "tok-a", Platform::Ios).await.unwrap();

        repo.unregister("tok-a").await.unwrap();
        assert!(repo.find_by_token("tok-a").await.unwrap().is_none());

        let err = repo.unregister("tok-a").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
