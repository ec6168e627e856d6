use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::WatchDiffError;

/// Routes operator interrupts (SIGINT, SIGTERM, SIGHUP) to a cancellation
/// token. The token is cancelled at most once no matter how many signals
/// arrive.
#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the dispatch loop.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Install the process-wide signal handler. Can only succeed once per process.
    pub fn install(&self) -> Result<(), WatchDiffError> {
        let controller = self.clone();
        ctrlc::set_handler(move || {
            controller.interrupt();
        })?;
        Ok(())
    }

    /// Request shutdown. Returns true only for the call that cancelled.
    pub fn interrupt(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        tracing::info!("interrupt received, stopping watch");
        true
    }

    pub fn is_interrupted(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
