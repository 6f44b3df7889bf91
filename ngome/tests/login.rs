//! End-to-end login flow tests against the SQLite backend.

use std::sync::Arc;

use ngome::{Ngome, NgomeConfig, SqliteRepositoryProvider};
use ngome_core::{
    Error,
    account::{Account, AccountId, Role},
    error::AuthError,
    events::SecurityReporter,
    password::hash_password,
    repositories::{AccountRepository, AccountRepositoryProvider},
};
use sqlx::SqlitePool;

const PASSWORD: &str = "staff_portal_2024";

async fn setup() -> (Ngome<SqliteRepositoryProvider>, Arc<SqliteRepositoryProvider>) {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create pool");
    let repositories = Arc::new(SqliteRepositoryProvider::new(pool));
    let ngome = Ngome::with_config(
        repositories.clone(),
        NgomeConfig::default(),
        SecurityReporter::disabled(),
    );
    ngome.migrate().await.expect("Failed to run migrations");
    (ngome, repositories)
}

async fn seed_user(
    repositories: &SqliteRepositoryProvider,
    username: &str,
    role: Role,
) -> AccountId {
    let account = repositories
        .account()
        .create(
            Account::builder()
                .username(username)
                .role(role)
                .password_hash(hash_password(PASSWORD).unwrap())
                .build()
                .unwrap(),
        )
        .await
        .unwrap();
    account.id
}

#[tokio::test]
async fn test_login_succeeds_with_correct_credentials() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;

    let outcome = ngome
        .login(
            "jkhamis",
            PASSWORD,
            Some("10.0.0.1".to_string()),
            Some("Mozilla/5.0 (Windows NT 10.0)".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(outcome.account_id, user_id);
    assert_eq!(outcome.role, Role::Employee);
    assert!(!outcome.must_change_password);
    // Very first session: never suspicious
    assert!(!outcome.inspection.is_suspicious);

    // The session is live and resolvable
    let session = ngome
        .validate_session(&outcome.session.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.user_id, user_id);

    // Activity clock was reset by the login
    let activity = ngome.activity_status(&user_id).await.unwrap();
    assert!(!activity.session_expired);
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_blur_together() {
    let (ngome, repositories) = setup().await;
    seed_user(&repositories, "jkhamis", Role::Employee).await;

    let unknown = ngome.login("nobody", PASSWORD, None, None).await.unwrap_err();
    let wrong = ngome
        .login("jkhamis", "not the password", None, None)
        .await
        .unwrap_err();

    assert!(matches!(unknown, Error::Auth(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Error::Auth(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_five_failures_lock_the_account() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;

    for i in 1..=5 {
        let err = ngome
            .login("jkhamis", "not the password", Some("10.0.0.1".to_string()), None)
            .await
            .unwrap_err();
        if i < 5 {
            assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
        } else {
            // The fifth failure arms the lockout and reports the window
            match err {
                Error::Auth(AuthError::AccountLocked {
                    remaining_seconds, ..
                }) => assert!(remaining_seconds.unwrap() > 0),
                e => panic!("Expected AccountLocked, got {e:?}"),
            }
        }
    }

    let status = ngome.account_lockout_status(&user_id).await.unwrap();
    assert!(status.is_locked);
    assert_eq!(status.failed_attempts, 5);

    // Even the correct password is now refused, before verification
    let err = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::AccountLocked { .. })));
}

#[tokio::test]
async fn test_manual_lock_and_verified_unlock_cycle() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;
    let admin_id = seed_user(&repositories, "asalim", Role::Admin).await;

    ngome
        .lock_account(
            &user_id,
            &admin_id,
            "Suspicious access pattern detected",
            None,
        )
        .await
        .unwrap();

    // Correct password, still rejected
    let err = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap_err();
    match err {
        Error::Auth(AuthError::AccountLocked {
            remaining_seconds, ..
        }) => assert!(remaining_seconds.is_none(), "manual locks have no expiry"),
        e => panic!("Expected AccountLocked, got {e:?}"),
    }

    ngome
        .unlock_account(
            &user_id,
            &admin_id,
            "Verified via phone, confirmed identity and ZanID",
            true,
        )
        .await
        .unwrap();

    // Login works again, and the counter started over
    ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();
    let status = ngome.account_lockout_status(&user_id).await.unwrap();
    assert!(!status.is_locked);
    assert_eq!(status.failed_attempts, 0);
}

#[tokio::test]
async fn test_fourth_login_evicts_oldest_session() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;

    let mut tokens = Vec::new();
    for i in 0..4 {
        let outcome = ngome
            .login(
                "jkhamis",
                PASSWORD,
                Some(format!("10.0.0.{i}")),
                Some("Mozilla/5.0 (Windows NT 10.0)".to_string()),
            )
            .await
            .unwrap();
        tokens.push(outcome.session.token);
    }

    let listed = ngome.list_sessions(&user_id).await.unwrap();
    assert_eq!(listed.len(), 3, "cap is three concurrent sessions");

    // The first session was evicted; the last three survive
    assert!(ngome.validate_session(&tokens[0]).await.unwrap().is_none());
    for token in &tokens[1..] {
        assert!(ngome.validate_session(token).await.unwrap().is_some());
    }

    // Listed tokens are masked
    for summary in &listed {
        assert!(summary.token_masked.ends_with('…'));
    }
}

#[tokio::test]
async fn test_logout_clears_session_and_activity() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;

    let outcome = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();
    ngome
        .logout(&user_id, &outcome.session.token, false)
        .await
        .unwrap();

    assert!(
        ngome
            .validate_session(&outcome.session.token)
            .await
            .unwrap()
            .is_none()
    );
    // Cleared activity reads as timed out immediately
    let activity = ngome.activity_status(&user_id).await.unwrap();
    assert!(activity.session_expired);
    assert!(activity.last_activity.is_none());
}

#[tokio::test]
async fn test_logout_everywhere() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;

    let outcome = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();
    ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();
    ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();

    let ended = ngome
        .logout(&user_id, &outcome.session.token, true)
        .await
        .unwrap();
    assert_eq!(ended, 3);
    assert!(ngome.list_sessions(&user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_force_logout_is_ownership_checked() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;
    let other_id = seed_user(&repositories, "mhassan", Role::Employee).await;

    let outcome = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();

    assert!(!ngome.force_logout(&outcome.session.id, &other_id).await.unwrap());
    assert!(ngome.force_logout(&outcome.session.id, &user_id).await.unwrap());
}

#[tokio::test]
async fn test_temporary_password_full_cycle() {
    let (ngome, repositories) = setup().await;
    let user_id = seed_user(&repositories, "jkhamis", Role::Employee).await;
    let admin_id = seed_user(&repositories, "asalim", Role::Admin).await;

    let temporary = ngome
        .issue_temporary_password(&user_id, &admin_id)
        .await
        .unwrap();

    // Old password no longer works
    let err = ngome.login("jkhamis", PASSWORD, None, None).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));

    // Temporary password admits, but demands a change
    let outcome = ngome.login("jkhamis", &temporary, None, None).await.unwrap();
    assert!(outcome.must_change_password);

    // Changing the password settles the account
    ngome
        .change_password(
            &user_id,
            &temporary,
            "fresh_portal_password_7",
            Some(&outcome.session.token),
        )
        .await
        .unwrap();

    let outcome = ngome
        .login("jkhamis", "fresh_portal_password_7", None, None)
        .await
        .unwrap();
    assert!(!outcome.must_change_password);
}

#[tokio::test]
async fn test_suspicious_login_from_new_ip_and_device() {
    let (ngome, repositories) = setup().await;
    seed_user(&repositories, "jkhamis", Role::Employee).await;

    ngome
        .login(
            "jkhamis",
            PASSWORD,
            Some("10.0.0.1".to_string()),
            Some("Mozilla/5.0 (Windows NT 10.0)".to_string()),
        )
        .await
        .unwrap();

    let outcome = ngome
        .login(
            "jkhamis",
            PASSWORD,
            Some("198.51.100.9".to_string()),
            Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148".to_string()),
        )
        .await
        .unwrap();

    assert!(outcome.inspection.is_suspicious);
    assert!(outcome.inspection.should_notify);
}

#[tokio::test]
async fn test_cleanup_sweep_is_idempotent() {
    let (ngome, repositories) = setup().await;
    seed_user(&repositories, "jkhamis", Role::Employee).await;

    ngome.login("jkhamis", PASSWORD, None, None).await.unwrap();

    // Nothing expired yet
    assert_eq!(ngome.cleanup_expired_sessions().await.unwrap(), 0);
    assert_eq!(ngome.cleanup_expired_sessions().await.unwrap(), 0);
}
