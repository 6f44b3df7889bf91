//! SQLite implementation of the account repository.
//!
//! The concurrent-sensitive mutations (failed-login recording, grace-period
//! start) are expressed as single conditional updates so two requests from
//! the same account cannot interleave a read-check-write and lose one side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ngome_core::{
    Error,
    account::{Account, AccountId, LockoutKind, LockoutPolicy},
    error::{NotFoundError, StorageError},
    repositories::{AccountRepository, ManualLock, PasswordUpdate},
};
use sqlx::SqlitePool;

pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &AccountId) -> Result<Account, Error> {
        self.find_by_id(id).await?.ok_or(NotFoundError::Account.into())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteAccount {
    id: String,
    username: String,
    role: String,
    institution_id: Option<String>,
    password_hash: String,
    failed_login_attempts: i64,
    login_locked_until: Option<i64>,
    login_lockout_reason: Option<String>,
    login_lockout_kind: Option<String>,
    is_manually_locked: bool,
    locked_by: Option<String>,
    locked_at: Option<i64>,
    lockout_notes: Option<String>,
    is_temporary_password: bool,
    temporary_password_expiry: Option<i64>,
    must_change_password: bool,
    password_expires_at: Option<i64>,
    grace_period_started_at: Option<i64>,
    last_expiration_warning_level: i64,
    failed_password_change_attempts: i64,
    password_change_lockout_until: Option<i64>,
    last_activity: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).expect("Invalid timestamp")
}

impl TryFrom<SqliteAccount> for Account {
    type Error = Error;

    fn try_from(row: SqliteAccount) -> Result<Self, Error> {
        Ok(Account {
            id: AccountId::new(&row.id),
            username: row.username,
            role: row.role.parse()?,
            institution_id: row.institution_id,
            password_hash: row.password_hash,
            failed_login_attempts: row.failed_login_attempts as u32,
            login_locked_until: row.login_locked_until.map(from_ts),
            login_lockout_reason: row.login_lockout_reason,
            login_lockout_kind: row
                .login_lockout_kind
                .as_deref()
                .map(str::parse)
                .transpose()?,
            is_manually_locked: row.is_manually_locked,
            locked_by: row.locked_by.as_deref().map(AccountId::new),
            locked_at: row.locked_at.map(from_ts),
            lockout_notes: row.lockout_notes,
            is_temporary_password: row.is_temporary_password,
            temporary_password_expiry: row.temporary_password_expiry.map(from_ts),
            must_change_password: row.must_change_password,
            password_expires_at: row.password_expires_at.map(from_ts),
            grace_period_started_at: row.grace_period_started_at.map(from_ts),
            last_expiration_warning_level: row.last_expiration_warning_level as u8,
            failed_password_change_attempts: row.failed_password_change_attempts as u32,
            password_change_lockout_until: row.password_change_lockout_until.map(from_ts),
            last_activity: row.last_activity.map(from_ts),
            created_at: from_ts(row.created_at),
            updated_at: from_ts(row.updated_at),
        })
    }
}

fn db_err(e: sqlx::Error, context: &str) -> Error {
    tracing::error!(error = %e, "{context}");
    StorageError::Database(context.to_string()).into()
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn create(&self, account: Account) -> Result<Account, Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, username, role, institution_id, password_hash,
                failed_login_attempts, login_locked_until, login_lockout_reason,
                login_lockout_kind, is_manually_locked, locked_by, locked_at,
                lockout_notes, is_temporary_password, temporary_password_expiry,
                must_change_password, password_expires_at, grace_period_started_at,
                last_expiration_warning_level, failed_password_change_attempts,
                password_change_lockout_until, last_activity, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.as_str())
        .bind(&account.username)
        .bind(account.role.as_str())
        .bind(&account.institution_id)
        .bind(&account.password_hash)
        .bind(account.failed_login_attempts as i64)
        .bind(account.login_locked_until.map(|t| t.timestamp()))
        .bind(&account.login_lockout_reason)
        .bind(account.login_lockout_kind.map(|k| k.as_str()))
        .bind(account.is_manually_locked)
        .bind(account.locked_by.as_ref().map(|id| id.as_str().to_string()))
        .bind(account.locked_at.map(|t| t.timestamp()))
        .bind(&account.lockout_notes)
        .bind(account.is_temporary_password)
        .bind(account.temporary_password_expiry.map(|t| t.timestamp()))
        .bind(account.must_change_password)
        .bind(account.password_expires_at.map(|t| t.timestamp()))
        .bind(account.grace_period_started_at.map(|t| t.timestamp()))
        .bind(account.last_expiration_warning_level as i64)
        .bind(account.failed_password_change_attempts as i64)
        .bind(account.password_change_lockout_until.map(|t| t.timestamp()))
        .bind(account.last_activity.map(|t| t.timestamp()))
        .bind(account.created_at.timestamp())
        .bind(account.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to create account"))?;

        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to find account"))?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to find account by username"))?;

        row.map(Account::try_from).transpose()
    }

    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
    ) -> Result<Account, Error> {
        let now = Utc::now();

        // Step 1: atomic increment, returning the post-increment row.
        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            UPDATE accounts
            SET failed_login_attempts = failed_login_attempts + 1, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(now.timestamp())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to record failed login"))?
        .ok_or(NotFoundError::Account)?;

        let account: Account = row.try_into()?;

        // Step 2: arm the lockout with a compare-and-swap on the counter.
        // If a concurrent attempt raced past us, its own arm step covers it.
        if let Some((until, reason)) = policy.lockout_after(account.failed_login_attempts, now) {
            let result = sqlx::query(
                r#"
                UPDATE accounts
                SET login_locked_until = ?, login_lockout_reason = ?,
                    login_lockout_kind = 'automatic', updated_at = ?
                WHERE id = ? AND failed_login_attempts = ? AND is_manually_locked = 0
                "#,
            )
            .bind(until.timestamp())
            .bind(&reason)
            .bind(now.timestamp())
            .bind(id.as_str())
            .bind(account.failed_login_attempts as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to arm automatic lockout"))?;

            if result.rows_affected() > 0 {
                return Ok(Account {
                    login_locked_until: Some(from_ts(until.timestamp())),
                    login_lockout_reason: Some(reason),
                    login_lockout_kind: Some(LockoutKind::Automatic),
                    ..account
                });
            }
            // CAS missed: re-read the winning state
            return self.fetch(id).await;
        }

        Ok(account)
    }

    async fn reset_failed_logins(&self, id: &AccountId) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, login_locked_until = NULL,
                login_lockout_reason = NULL, login_lockout_kind = NULL, updated_at = ?
            WHERE id = ? AND is_manually_locked = 0
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to reset failed logins"))?;

        Ok(())
    }

    async fn apply_manual_lock(&self, id: &AccountId, lock: ManualLock) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET is_manually_locked = 1, locked_by = ?, locked_at = ?,
                login_lockout_reason = ?, login_lockout_kind = 'manual',
                lockout_notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(lock.locked_by.as_str())
        .bind(lock.locked_at.timestamp())
        .bind(&lock.reason)
        .bind(&lock.notes)
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to apply manual lock"))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::Account.into());
        }
        Ok(())
    }

    async fn clear_lockout(&self, id: &AccountId) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, login_locked_until = NULL,
                login_lockout_reason = NULL, login_lockout_kind = NULL,
                is_manually_locked = 0, locked_by = NULL, locked_at = NULL,
                lockout_notes = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to clear lockout"))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::Account.into());
        }
        Ok(())
    }

    async fn set_last_activity(
        &self,
        id: &AccountId,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE accounts SET last_activity = ? WHERE id = ?")
            .bind(at.map(|t| t.timestamp()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to set last activity"))?;

        Ok(())
    }

    async fn update_password(&self, id: &AccountId, update: PasswordUpdate) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = ?, is_temporary_password = ?,
                temporary_password_expiry = ?, must_change_password = ?,
                password_expires_at = ?, grace_period_started_at = NULL,
                last_expiration_warning_level = 0,
                failed_password_change_attempts = 0,
                password_change_lockout_until = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.password_hash)
        .bind(update.is_temporary)
        .bind(update.temporary_expiry.map(|t| t.timestamp()))
        .bind(update.must_change)
        .bind(update.expires_at.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to update password"))?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError::Account.into());
        }
        Ok(())
    }

    async fn record_failed_password_change(
        &self,
        id: &AccountId,
        lock_until: Option<DateTime<Utc>>,
    ) -> Result<Account, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            UPDATE accounts
            SET failed_password_change_attempts = failed_password_change_attempts + 1,
                password_change_lockout_until = COALESCE(?, password_change_lockout_until),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(lock_until.map(|t| t.timestamp()))
        .bind(Utc::now().timestamp())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to record failed password change"))?
        .ok_or(NotFoundError::Account)?;

        row.try_into()
    }

    async fn set_grace_period_start(
        &self,
        id: &AccountId,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        // First writer wins under concurrent post-expiry logins
        sqlx::query(
            "UPDATE accounts SET grace_period_started_at = ? WHERE id = ? AND grace_period_started_at IS NULL",
        )
        .bind(at.timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err(e, "Failed to set grace period start"))?;

        Ok(())
    }

    async fn set_expiration_warning_level(&self, id: &AccountId, level: u8) -> Result<(), Error> {
        sqlx::query("UPDATE accounts SET last_expiration_warning_level = ? WHERE id = ?")
            .bind(level as i64)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err(e, "Failed to set expiration warning level"))?;

        Ok(())
    }
}
