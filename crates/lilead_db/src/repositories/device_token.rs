//! Device registry
//!
//! Maps push tokens to the user and platform they belong to. The token is the
//! primary key: registration is an upsert and the last writer wins.

use crate::error::DbError;
use lilead_common::models::{DeviceToken, Platform};

/// Repository for device push tokens
pub trait DeviceTokenRepository: Send + Sync {
    /// Initialize the database schema
    ///
    /// Creates the `device_tokens` table and its user index if they don't
    /// already exist.
    fn init_schema(&self) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// Register a device token
    ///
    /// Upserts by token. If the token is already known its owner, platform
    /// and `updated_at` are overwritten, which reassigns it when `user_id`
    /// differs. Registering the same triple twice is not an error.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidInput` when `token` is empty.
    fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: Platform,
    ) -> impl std::future::Future<Output = Result<DeviceToken, DbError>> + Send;

    /// Delete a device token
    ///
    /// # Errors
    ///
    /// `DbError::NotFound` when the token is not registered. Callers that only
    /// care about the token being gone can treat this as success.
    fn unregister(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<(), DbError>> + Send;

    /// All tokens currently owned by `user_id`, oldest registration first
    fn tokens_for_user(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<DeviceToken>, DbError>> + Send;

    /// Look up a single token
    fn find_by_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Option<DeviceToken>, DbError>> + Send;
}
