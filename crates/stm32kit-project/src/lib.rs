//! Project state for stm32kit: the persisted descriptor, content
//! fingerprints, and the reconciler that keeps regeneration from
//! clobbering user edits.

pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod fs;
pub mod lock;
pub mod reconcile;

pub use descriptor::{FileRecord, FileState, Origin, ProjectDescriptor, DESCRIPTOR_FILE};
pub use error::{ProjectError, Result};
pub use fingerprint::Fingerprint;
pub use lock::{OperationLock, STATE_DIR};
pub use reconcile::{Force, PreservePolicy, Reconciler, RegenerationReport};
