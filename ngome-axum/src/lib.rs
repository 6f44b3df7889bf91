//! Ready-to-use Axum routes and middleware for the ngome security core
//!
//! Exposes the HTTP surface of the account security subsystem: login with
//! lockout and suspicious-login handling, activity polling, session
//! listing and targeted termination, password lifecycle endpoints, and
//! the administrative lock/unlock operations, all behind the
//! double-submit CSRF middleware for state-changing methods.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ngome::{Ngome, SqliteRepositoryProvider};
//! use ngome_axum::{CookieConfig, create_router};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = sqlx::SqlitePool::connect("sqlite:ngome.db").await.unwrap();
//!     let ngome = Arc::new(Ngome::new(Arc::new(SqliteRepositoryProvider::new(pool))));
//!     ngome.migrate().await.unwrap();
//!
//!     let app = create_router(ngome, CookieConfig::default());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod types;

pub use error::ApiError;
pub use middleware::{AuthState, csrf_middleware};
pub use routes::create_router;
pub use types::{ConnectionInfo, CookieConfig};
