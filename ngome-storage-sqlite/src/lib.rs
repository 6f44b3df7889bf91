//! SQLite storage backend for the ngome account security core
//!
//! Provides [`SqliteRepositoryProvider`], wiring SQLite-backed
//! implementations of the account and session repositories together with
//! the schema migrations.
//!
//! The backend keeps the core's concurrency contract at the storage layer:
//! the capped session insert runs inside one transaction, and the lockout
//! transitions are single conditional updates.

pub mod migrations;
pub mod repositories;

pub use repositories::{
    SqliteAccountRepository, SqliteRepositoryProvider, SqliteSessionRepository,
};

#[cfg(test)]
pub(crate) mod test_util {
    use ngome_core::repositories::RepositoryProvider;
    use sqlx::SqlitePool;

    use crate::SqliteRepositoryProvider;

    pub(crate) async fn setup_provider() -> SqliteRepositoryProvider {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        let provider = SqliteRepositoryProvider::new(pool);
        provider.migrate().await.expect("Failed to run migrations");
        provider
    }
}
