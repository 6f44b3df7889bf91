//! SQLite implementation of the session repository.
//!
//! The capped insert runs check, eviction and insert in one transaction so
//! concurrent logins for the same account serialize at the database and
//! can never jointly exceed the concurrency cap.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ngome_core::{
    Error,
    account::AccountId,
    error::StorageError,
    repositories::{SessionCreation, SessionRepository},
    session::{DeviceClass, Session, SessionId, SessionToken},
};
use sqlx::SqlitePool;

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteSession {
    id: String,
    user_id: String,
    token: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    device_class: String,
    created_at: i64,
    last_activity: i64,
    expires_at: i64,
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).expect("Invalid timestamp")
}

impl From<SqliteSession> for Session {
    fn from(row: SqliteSession) -> Self {
        Session {
            id: SessionId::new(&row.id),
            user_id: AccountId::new(&row.user_id),
            token: SessionToken::new(&row.token),
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            device_class: match row.device_class.as_str() {
                "Mobile" => DeviceClass::Mobile,
                "Tablet" => DeviceClass::Tablet,
                "Windows" => DeviceClass::Windows,
                "Mac" => DeviceClass::Mac,
                "Linux" => DeviceClass::Linux,
                _ => DeviceClass::Unknown,
            },
            created_at: from_ts(row.created_at),
            last_activity: from_ts(row.last_activity),
            expires_at: from_ts(row.expires_at),
        }
    }
}

fn db_err(e: sqlx::Error, context: &str) -> Error {
    tracing::error!(error = %e, "{context}");
    StorageError::Database(context.to_string()).into()
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn create(&self, session: Session, max_sessions: u32) -> Result<SessionCreation, Error> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err(e, "Failed to begin session transaction"))?;

        let now = Utc::now().timestamp();

        // rowid breaks created_at ties (second granularity) in insertion order
        let active: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM sessions WHERE user_id = ? AND expires_at > ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(session.user_id.as_str())
        .bind(now)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_err(e, "Failed to count active sessions"))?;

        let mut evicted = Vec::new();
        let overflow = active.len() as i64 - (max_sessions as i64 - 1);
        if overflow > 0 {
            for (id,) in active.into_iter().take(overflow as usize) {
                sqlx::query("DELETE FROM sessions WHERE id = ?")
                    .bind(&id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_err(e, "Failed to evict session"))?;
                evicted.push(SessionId::new(&id));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token, ip_address, user_agent,
                                  device_class, created_at, last_activity, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.as_str())
        .bind(session.user_id.as_str())
        .bind(session.token.as_str())
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.device_class.as_str())
        .bind(session.created_at.timestamp())
        .bind(session.last_activity.timestamp())
        .bind(session.expires_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err(e, "Failed to insert session"))?;

        tx.commit()
            .await
            .map_err(|e| db_err(e, "Failed to commit session transaction"))?;

        Ok(SessionCreation { session, evicted })
    }

    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<Session>, Error> {
        let row = sqlx::query_as::<_, SqliteSession>("SELECT * FROM sessions WHERE token = ?")
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to find session"))?;

        Ok(row.map(Session::from))
    }

    async fn find_active_by_user(
        &self,
        user_id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Session>, Error> {
        let rows = sqlx::query_as::<_, SqliteSession>(
            "SELECT * FROM sessions WHERE user_id = ? AND expires_at > ? ORDER BY created_at DESC",
        )
        .bind(user_id.as_str())
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to list active sessions"))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn find_recent_by_user(
        &self,
        user_id: &AccountId,
        since: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Session>, Error> {
        let rows = sqlx::query_as::<_, SqliteSession>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = ? AND created_at >= ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.as_str())
        .bind(since.timestamp())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to read session history"))?;

        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn touch(
        &self,
        token: &SessionToken,
        last_activity: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE sessions SET last_activity = ?, expires_at = ? WHERE token = ?")
            .bind(last_activity.timestamp())
            .bind(expires_at.timestamp())
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to touch session"))?;

        Ok(())
    }

    async fn delete_by_token(&self, token: &SessionToken) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to delete session"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: &SessionId, owner: &AccountId) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
            .bind(id.as_str())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to delete session by id"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user_id: &AccountId) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to delete user sessions"))?;

        Ok(result.rows_affected())
    }

    async fn delete_by_user_except(
        &self,
        user_id: &AccountId,
        keep: &SessionToken,
    ) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token != ?")
            .bind(user_id.as_str())
            .bind(keep.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to delete other user sessions"))?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to delete expired sessions"))?;

        Ok(result.rows_affected())
    }
}
