//! Repository traits for the data access layer
//!
//! Services talk to storage exclusively through these interfaces. The
//! composition mirrors the provider-trait hierarchy: one `*Repository`
//! trait per data domain, one `*RepositoryProvider` trait granting access
//! to each, and [`RepositoryProvider`] as the supertrait a storage backend
//! implements to provide everything plus lifecycle methods.

pub mod account;
pub mod session;

pub use account::{AccountRepository, ManualLock, PasswordUpdate};
pub use session::{SessionCreation, SessionRepository};

use std::sync::Arc;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for account repository access.
pub trait AccountRepositoryProvider: Send + Sync + 'static {
    /// The account repository implementation type
    type AccountRepo: AccountRepository;

    /// Get the account repository
    fn account(&self) -> Arc<Self::AccountRepo>;
}

/// Provider trait for session repository access.
pub trait SessionRepositoryProvider: Send + Sync + 'static {
    /// The session repository implementation type
    type SessionRepo: SessionRepository;

    /// Get the session repository
    fn session(&self) -> Arc<Self::SessionRepo>;
}

/// Provider trait that storage implementations implement to supply all
/// repositories, plus migrations and health checking.
#[async_trait]
pub trait RepositoryProvider: AccountRepositoryProvider + SessionRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
