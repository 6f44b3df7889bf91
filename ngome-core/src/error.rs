use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked: {reason}")]
    AccountLocked {
        reason: String,
        /// Seconds until an automatic lockout expires. `None` for manual locks.
        remaining_seconds: Option<i64>,
    },

    #[error("Temporary password has expired")]
    TemporaryPasswordExpired,

    #[error("Password has expired and the grace period has ended")]
    PasswordExpired,

    #[error("Password changes are temporarily locked")]
    PasswordChangeLocked { remaining_seconds: i64 },
}

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("Role {role} lacks the {capability} capability")]
    MissingCapability {
        role: &'static str,
        capability: &'static str,
    },

    #[error("Administrator accounts cannot be locked")]
    AdminTargetProtected,

    #[error("Session does not belong to the requesting account")]
    NotSessionOwner,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Password is too common")]
    CommonPassword,

    #[error("{field} must be at least {min} characters (got {actual})")]
    JustificationTooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("Identity verification must be confirmed before unlocking")]
    IdentityNotVerified,

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("Account not found")]
    Account,

    #[error("Session not found")]
    Session,
}

#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Account is already manually locked")]
    AlreadyManuallyLocked,

    #[error("Account is not locked")]
    NotLocked,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let locked = Error::Auth(AuthError::AccountLocked {
            reason: "Too many failed login attempts".to_string(),
            remaining_seconds: Some(900),
        });
        assert_eq!(
            locked.to_string(),
            "Authentication error: Account is locked: Too many failed login attempts"
        );

        let conflict = Error::Conflict(ConflictError::AlreadyManuallyLocked);
        assert_eq!(
            conflict.to_string(),
            "Conflict: Account is already manually locked"
        );

        let authz = Error::Authorization(AuthorizationError::MissingCapability {
            role: "Employee",
            capability: "can_lock_accounts",
        });
        assert_eq!(
            authz.to_string(),
            "Authorization error: Role Employee lacks the can_lock_accounts capability"
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = AuthError::InvalidCredentials.into();
        assert!(matches!(error, Error::Auth(AuthError::InvalidCredentials)));

        let error: Error = ValidationError::CommonPassword.into();
        assert!(error.is_validation_error());

        let error: Error = StorageError::NotFound.into();
        assert!(error.is_storage_error());
    }

    #[test]
    fn test_classification_helpers() {
        assert!(Error::Auth(AuthError::InvalidCredentials).is_auth_error());
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_validation_error());
        assert!(Error::Conflict(ConflictError::NotLocked).is_conflict_error());
    }
}
