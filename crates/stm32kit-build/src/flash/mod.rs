//! Flash session state machine and the OpenOCD probe bridge.
//!
//! A session walks `Idle → Connecting → Erasing → Programming → Verifying →
//! Done`. Connection is the only retried step: one attempt under reset, then
//! manual-reset retries up to [`MAX_CONNECT_ATTEMPTS`] in total. Any other
//! failure, and any cancellation, ends the session in `Failed`.

pub mod openocd;
pub mod session;
pub mod state;

pub use openocd::{FlashPlan, OpenOcdBridge};
pub use session::{
    AutoRetry, BridgeError, ConnectMode, FlashReport, FlashSession, ProbeBridge, ResetPrompt,
    MAX_CONNECT_ATTEMPTS,
};
pub use state::{FailureReason, FlashState};

/// Terminal failures of a flash session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlashError {
    #[error("could not connect to the target after {attempts} attempts{}", diagnostic_block(diagnostic))]
    Connect { attempts: u32, diagnostic: String },

    #[error("flash erase failed{}", diagnostic_block(diagnostic))]
    Erase { diagnostic: String },

    #[error("programming failed{}", diagnostic_block(diagnostic))]
    Program { diagnostic: String },

    #[error("verification found a mismatch{}", diagnostic_block(diagnostic))]
    VerifyMismatch { diagnostic: String },

    #[error("flash cancelled")]
    Cancelled,
}

impl FlashError {
    pub(crate) fn from_failure(reason: FailureReason, diagnostic: String, attempts: u32) -> Self {
        match reason {
            FailureReason::ConnectTimeout => FlashError::Connect {
                attempts,
                diagnostic,
            },
            FailureReason::Erase => FlashError::Erase { diagnostic },
            FailureReason::Program => FlashError::Program { diagnostic },
            FailureReason::Verify => FlashError::VerifyMismatch { diagnostic },
            FailureReason::Cancelled => FlashError::Cancelled,
        }
    }
}

fn diagnostic_block(diagnostic: &str) -> String {
    if diagnostic.trim().is_empty() {
        String::new()
    } else {
        format!(":\n{diagnostic}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_mentions_attempts() {
        let err = FlashError::from_failure(
            FailureReason::ConnectTimeout,
            "Error: open failed".into(),
            MAX_CONNECT_ATTEMPTS,
        );
        assert_eq!(
            err.to_string(),
            "could not connect to the target after 3 attempts:\nError: open failed"
        );
    }
}
