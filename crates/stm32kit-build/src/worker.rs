//! Build and flash operations on a dedicated thread.

use std::thread::{self, JoinHandle};

use crate::error::{BuildError, Result};
use crate::process::CancelToken;

/// A running operation and its cancellation token.
#[derive(Debug)]
pub struct Operation<T> {
    handle: JoinHandle<Result<T>>,
    cancel: CancelToken,
}

impl<T: Send + 'static> Operation<T> {
    /// Start `work` on a named worker thread.
    pub fn spawn<F>(name: &str, work: F) -> Result<Self>
    where
        F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("stm32kit-{name}"))
            .spawn(move || work(token))
            .map_err(|source| BuildError::Spawn {
                program: format!("{name} worker"),
                source,
            })?;
        Ok(Self { handle, cancel })
    }

    /// Request cancellation; the operation ends with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the operation ends. A panic on the worker is re-raised here.
    pub fn wait(self) -> Result<T> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn returns_the_worker_result() {
        let op = Operation::spawn("build", |_| Ok(42)).unwrap();
        assert_eq!(op.wait().unwrap(), 42);
    }

    #[test]
    fn cancel_reaches_the_worker() {
        let op = Operation::spawn("flash", |cancel| {
            while !cancel.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err::<(), _>(BuildError::Cancelled)
        })
        .unwrap();
        op.cancel();
        assert!(matches!(op.wait(), Err(BuildError::Cancelled)));
    }
}
