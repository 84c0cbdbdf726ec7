//! The connect/erase/program/verify state machine.

use std::fmt;

use crate::process::CancelToken;

use super::state::{FailureReason, FlashState};
use super::FlashError;

/// Total connection attempts: one under reset, then manual retries.
pub const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// How the probe attaches to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// The probe holds NRST while attaching.
    UnderReset,
    /// The user holds the reset button; the probe attaches without NRST control.
    Manual,
}

impl fmt::Display for ConnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectMode::UnderReset => "under reset",
            ConnectMode::Manual => "manual reset",
        })
    }
}

/// Why a bridge step did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    Failed { diagnostic: String },
    Cancelled,
}

/// The probe tool, driven one step at a time.
pub trait ProbeBridge {
    fn connect(&mut self, mode: ConnectMode, cancel: &CancelToken) -> Result<(), BridgeError>;
    fn erase(&mut self, cancel: &CancelToken) -> Result<(), BridgeError>;
    fn program(&mut self, cancel: &CancelToken) -> Result<(), BridgeError>;
    fn verify(&mut self, cancel: &CancelToken) -> Result<(), BridgeError>;
    /// Restart the target after a verified write.
    fn reset(&mut self, cancel: &CancelToken) -> Result<(), BridgeError>;
}

/// Asks the user to hold the reset button before a manual retry.
pub trait ResetPrompt {
    /// Called before manual attempt `attempt` (2-based). Returning `false`
    /// abandons the session as cancelled.
    fn hold_reset(&mut self, attempt: u32, last_error: &str) -> bool;
}

impl<P: ResetPrompt + ?Sized> ResetPrompt for &mut P {
    fn hold_reset(&mut self, attempt: u32, last_error: &str) -> bool {
        (**self).hold_reset(attempt, last_error)
    }
}

/// Retries immediately, for non-interactive use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoRetry;

impl ResetPrompt for AutoRetry {
    fn hold_reset(&mut self, attempt: u32, _last_error: &str) -> bool {
        log::warn!(
            "connect attempt {attempt}/{MAX_CONNECT_ATTEMPTS}: retrying without reset control; hold the board's RESET button if it does not respond"
        );
        true
    }
}

/// What a completed session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    pub attempts: u32,
    /// Every distinct state entered, starting with `Idle`.
    pub history: Vec<FlashState>,
}

/// One flash of one artifact.
pub struct FlashSession<B, P> {
    bridge: B,
    prompt: P,
    cancel: CancelToken,
    state: FlashState,
    attempts: u32,
    last_error: String,
    history: Vec<FlashState>,
}

impl<B: ProbeBridge, P: ResetPrompt> FlashSession<B, P> {
    pub fn new(bridge: B, prompt: P, cancel: CancelToken) -> Self {
        Self {
            bridge,
            prompt,
            cancel,
            state: FlashState::Idle,
            attempts: 0,
            last_error: String::new(),
            history: vec![FlashState::Idle],
        }
    }

    pub fn state(&self) -> &FlashState {
        &self.state
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn history(&self) -> &[FlashState] {
        &self.history
    }

    /// Perform one transition. Terminal states are left unchanged.
    pub fn step(&mut self) -> &FlashState {
        if self.state.is_terminal() {
            return &self.state;
        }
        let next = if self.cancel.is_cancelled() {
            FlashState::failed(FailureReason::Cancelled, format!("cancelled while {}", self.state))
        } else {
            match self.state {
                FlashState::Idle => FlashState::Connecting,
                FlashState::Connecting => self.connect_attempt(),
                FlashState::Erasing => {
                    let result = self.bridge.erase(&self.cancel);
                    advance(result, FlashState::Programming, FailureReason::Erase)
                }
                FlashState::Programming => {
                    let result = self.bridge.program(&self.cancel);
                    advance(result, FlashState::Verifying, FailureReason::Program)
                }
                FlashState::Verifying => {
                    let result = self.bridge.verify(&self.cancel);
                    let next = advance(result, FlashState::Done, FailureReason::Verify);
                    if next == FlashState::Done {
                        if let Err(e) = self.bridge.reset(&self.cancel) {
                            log::warn!("image verified but the target did not restart: {e:?}");
                        }
                    }
                    next
                }
                FlashState::Done | FlashState::Failed { .. } => return &self.state,
            }
        };
        self.enter(next);
        &self.state
    }

    /// Step until a terminal state.
    pub fn run(mut self) -> Result<FlashReport, FlashError> {
        loop {
            match self.step().clone() {
                FlashState::Done => {
                    return Ok(FlashReport {
                        attempts: self.attempts,
                        history: self.history,
                    })
                }
                FlashState::Failed { reason, diagnostic } => {
                    return Err(FlashError::from_failure(reason, diagnostic, self.attempts))
                }
                _ => {}
            }
        }
    }

    fn connect_attempt(&mut self) -> FlashState {
        self.attempts += 1;
        let mode = if self.attempts == 1 {
            ConnectMode::UnderReset
        } else {
            ConnectMode::Manual
        };
        if mode == ConnectMode::Manual && !self.prompt.hold_reset(self.attempts, &self.last_error) {
            return FlashState::failed(FailureReason::Cancelled, "manual reset retry declined");
        }
        match self.bridge.connect(mode, &self.cancel) {
            Ok(()) => {
                log::info!("connected to target ({mode}, attempt {})", self.attempts);
                FlashState::Erasing
            }
            Err(BridgeError::Cancelled) => {
                FlashState::failed(FailureReason::Cancelled, "cancelled while connecting")
            }
            Err(BridgeError::Failed { diagnostic }) => {
                log::warn!(
                    "connect attempt {}/{MAX_CONNECT_ATTEMPTS} ({mode}) failed",
                    self.attempts
                );
                if self.attempts >= MAX_CONNECT_ATTEMPTS {
                    FlashState::failed(FailureReason::ConnectTimeout, diagnostic)
                } else {
                    self.last_error = diagnostic;
                    FlashState::Connecting
                }
            }
        }
    }

    fn enter(&mut self, next: FlashState) {
        if next == self.state {
            return;
        }
        log::info!("flash: {} -> {next}", self.state);
        self.history.push(next.clone());
        self.state = next;
    }
}

fn advance(result: Result<(), BridgeError>, next: FlashState, on_failure: FailureReason) -> FlashState {
    match result {
        Ok(()) => next,
        Err(BridgeError::Cancelled) => FlashState::failed(FailureReason::Cancelled, "cancelled"),
        Err(BridgeError::Failed { diagnostic }) => FlashState::failed(on_failure, diagnostic),
    }
}
