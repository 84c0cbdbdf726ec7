//! Building and flashing generated stm32kit projects.
//!
//! Backends wrap external build tools behind [`BuildBackend`]; the
//! [`flash`] module drives OpenOCD through a bounded-retry state machine.
//! [`BuildPipeline`] adds the project-level rules: one operation at a time,
//! build before flash, clean rebuild after any unsuccessful build.

pub mod backend;
pub mod error;
pub mod flash;
pub mod pipeline;
pub mod process;
pub mod state;
pub mod toolchain;
pub mod worker;

pub use backend::{backend_for, find_artifact, BuildBackend, BuildContext, CmakeBackend, MakeBackend};
pub use error::{BuildError, Result};
pub use flash::{FlashError, FlashReport, FlashState, ResetPrompt, MAX_CONNECT_ATTEMPTS};
pub use pipeline::{BuildOutcome, BuildPipeline};
pub use process::{CancelToken, CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use state::{BuildState, BuildStatus};
pub use toolchain::ToolStatus;
pub use worker::Operation;

pub use stm32kit_project::OperationLock;
