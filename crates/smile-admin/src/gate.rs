//! Admin access gate.
//!
//! A single shared passphrase guards the portfolio manager. Sessions live
//! for the process lifetime; nothing is persisted.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("Wrong Password! remember!!!")]
    WrongPassphrase,
}

/// Verifies the admin passphrase and mints process-lifetime sessions.
pub struct AdminGate {
    passphrase: String,
    failed_attempts: AtomicU32,
}

impl AdminGate {
    /// Create a gate with the configured passphrase. The passphrase is an
    /// explicit construction parameter, never read from the environment.
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            failed_attempts: AtomicU32::new(0),
        }
    }

    /// Verify a passphrase attempt and mint a session.
    pub fn login(&self, attempt: &str) -> Result<AdminSession, GateError> {
        if attempt == self.passphrase {
            Ok(AdminSession {
                started_at: Utc::now(),
            })
        } else {
            self.failed_attempts.fetch_add(1, Ordering::SeqCst);
            Err(GateError::WrongPassphrase)
        }
    }

    /// Number of rejected login attempts so far.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts.load(Ordering::SeqCst)
    }
}

/// Proof of a successful admin login.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_passphrase_opens_a_session() {
        let gate = AdminGate::new("toffa@shop");
        assert!(gate.login("toffa@shop").is_ok());
        assert_eq!(gate.failed_attempts(), 0);
    }

    #[test]
    fn wrong_passphrase_is_rejected_and_counted() {
        let gate = AdminGate::new("toffa@shop");
        assert_eq!(gate.login("1234").unwrap_err(), GateError::WrongPassphrase);
        assert_eq!(gate.login("").unwrap_err(), GateError::WrongPassphrase);
        assert_eq!(gate.failed_attempts(), 2);
    }
}
