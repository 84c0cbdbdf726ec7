use std::fmt;

/// Why a flash session ended in [`FlashState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Every connection attempt failed.
    ConnectTimeout,
    Erase,
    Program,
    Verify,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::ConnectTimeout => "connect timeout",
            FailureReason::Erase => "erase failed",
            FailureReason::Program => "program failed",
            FailureReason::Verify => "verify mismatch",
            FailureReason::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    Connecting,
    Erasing,
    Programming,
    Verifying,
    Done,
    Failed {
        reason: FailureReason,
        /// Output captured from the failing step.
        diagnostic: String,
    },
}

impl FlashState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlashState::Done | FlashState::Failed { .. })
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            FlashState::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn failed(reason: FailureReason, diagnostic: impl Into<String>) -> Self {
        FlashState::Failed {
            reason,
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for FlashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashState::Idle => f.write_str("idle"),
            FlashState::Connecting => f.write_str("connecting"),
            FlashState::Erasing => f.write_str("erasing"),
            FlashState::Programming => f.write_str("programming"),
            FlashState::Verifying => f.write_str("verifying"),
            FlashState::Done => f.write_str("done"),
            FlashState::Failed { reason, .. } => write!(f, "failed ({reason})"),
        }
    }
}
