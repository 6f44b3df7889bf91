//! Repository implementations for SQLite storage

pub mod account;
pub mod session;

pub use account::SqliteAccountRepository;
pub use session::SqliteSessionRepository;

use std::sync::Arc;

use async_trait::async_trait;
use ngome_core::{
    Error,
    error::StorageError,
    repositories::{AccountRepositoryProvider, RepositoryProvider, SessionRepositoryProvider},
};
use sqlx::SqlitePool;

/// Repository provider implementation for SQLite
///
/// Implements the individual repository provider traits as well as the
/// unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    account: Arc<SqliteAccountRepository>,
    session: Arc<SqliteSessionRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let account = Arc::new(SqliteAccountRepository::new(pool.clone()));
        let session = Arc::new(SqliteSessionRepository::new(pool.clone()));

        Self {
            pool,
            account,
            session,
        }
    }
}

impl AccountRepositoryProvider for SqliteRepositoryProvider {
    type AccountRepo = SqliteAccountRepository;

    fn account(&self) -> Arc<Self::AccountRepo> {
        self.account.clone()
    }
}

impl SessionRepositoryProvider for SqliteRepositoryProvider {
    type SessionRepo = SqliteSessionRepository;

    fn session(&self) -> Arc<Self::SessionRepo> {
        self.session.clone()
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        use crate::migrations::{
            CreateAccountsTable, CreateIndexes, CreateSessionsTable, SqliteMigrationManager,
        };
        use ngome_migration::{Migration, MigrationManager};

        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            Error::Storage(StorageError::Migration(
                "Failed to initialize migrations".to_string(),
            ))
        })?;

        let migrations: Vec<Box<dyn Migration<_>>> = vec![
            Box::new(CreateAccountsTable),
            Box::new(CreateSessionsTable),
            Box::new(CreateIndexes),
        ];
        manager.up(&migrations).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            Error::Storage(StorageError::Migration(
                "Failed to run migrations".to_string(),
            ))
        })?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(StorageError::Database(e.to_string())))?;
        Ok(())
    }
}
