//! Task spawning abstraction for runtime independence.
//!
//! Restore timers and watchdogs are spawned through [`TaskSpawner`] so the
//! orchestrator never calls `tokio::spawn` directly and tests can drive it
//! on a paused clock.

use std::future::Future;

/// Spawns detached background tasks.
///
/// Generic over the future, so services hold the concrete [`TokioSpawner`]
/// rather than a trait object.
pub trait TaskSpawner: Send + Sync {
    /// Runs `future` to completion in the background. There is no handle to
    /// join or abort it; tasks observe cancellation through their own state.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Spawns onto the Tokio runtime that built the services.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    /// Captures the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn spawned_timer_fires_on_paused_clock() {
        let spawner = TokioSpawner::current();
        let fired = Arc::new(AtomicBool::new(false));
        let timer = Arc::clone(&fired);

        spawner.spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            timer.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!fired.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
