//! Service layer for the account security core
//!
//! Concrete services encapsulating the lockout state machine, session
//! lifecycle, inactivity tracking, login anomaly detection and password
//! lifecycle. Services are generic over the repository traits and carry a
//! [`crate::events::SecurityReporter`] so audit and notification emission
//! is part of each operation rather than a caller obligation.

pub mod activity;
pub mod anomaly;
pub mod lockout;
pub mod password;
pub mod session;

pub use activity::{ActivityService, ActivityStatus, ActivityWindow};
pub use anomaly::{AnomalyConfig, AnomalyService, AnomalySignal, LoginInspection};
pub use lockout::LockoutService;
pub use password::PasswordService;
pub use session::{SessionLimits, SessionService};
