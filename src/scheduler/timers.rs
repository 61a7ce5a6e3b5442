//! One-shot timers used by the scheduler to wake up at status boundaries.

use std::time::Duration;

use tokio::runtime::Handle;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

pub trait TimerDriver: Send + Sync {
    /// Run `task` once, `delay` from now.
    fn schedule(&self, delay: Duration, task: TimerTask);
}

/// Timers backed by tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTimers {
    handle: Handle,
}

impl TokioTimers {
    /// Bind to the runtime of the calling context.
    ///
    /// Panics outside a tokio runtime, like `tokio::spawn`.
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }
}

impl TimerDriver for TokioTimers {
    fn schedule(&self, delay: Duration, task: TimerTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

#[cfg(test)]
pub use manual::ManualTimers;


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn tokio_timer_fires_after_delay() {
        let timers = TokioTimers::current();
        let (tx, rx) = oneshot::channel();
        timers.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(42);
            }),
        );
        assert_eq!(rx.await.unwrap(), 42);
    }
}
