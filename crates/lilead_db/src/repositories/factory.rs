//! Factory for creating SQL repositories
//!
//! Both repositories share the pool owned by the [`DbClient`] they are built from.

use crate::repositories::device_token_sql::SqlDeviceTokenRepository;
use crate::repositories::reminder_sql::SqlReminderRepository;
use crate::{DbClient, RepositoryFactory};

/// Factory for creating SQL-backed repositories
#[derive(Debug, Clone, Default)]
pub struct SqlRepositoryFactory;

impl SqlRepositoryFactory {
    /// Create a new repository factory
    pub fn new() -> Self {
        Self
    }
}

impl RepositoryFactory<SqlDeviceTokenRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlDeviceTokenRepository {
        SqlDeviceTokenRepository::new(db_client)
    }
}

impl RepositoryFactory<SqlReminderRepository, DbClient> for SqlRepositoryFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlReminderRepository {
        SqlReminderRepository::new(db_client)
    }
}
