//! Status polling for a single run.
//!
//! One fetch runs at a time: the next tick is only awaited after the previous
//! fetch returned, and ticks missed while fetching are skipped rather than
//! replayed in a burst.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::api::RunApi;
use crate::error::DpackError;
use crate::run::Run;

/// Anything that can look up the current state of a run.
pub trait RunSource {
    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>, DpackError>;
}

impl RunSource for RunApi {
    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>, DpackError> {
        self.get_run(run_id).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Updated(Run),
    NotFound,
    /// The fetch failed. Polling continues on the next tick.
    Error(String),
}

/// Resolves once cancellation is requested or the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|&stop| stop).await;
}

/// Poll `run_id` every `every` until it is terminal, missing, or cancelled.
///
/// The first fetch happens immediately. Returns the terminal run, or `None`
/// when polling stopped for any other reason.
pub async fn poll_run<S: RunSource>(
    source: &S,
    run_id: &str,
    every: Duration,
    mut cancel: watch::Receiver<bool>,
    mut on_event: impl FnMut(PollEvent),
) -> Option<Run> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!(run_id, "polling cancelled");
                return None;
            }
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!(run_id, "polling cancelled");
                return None;
            }
            fetched = source.fetch_run(run_id) => fetched,
        };

        match fetched {
            Ok(Some(run)) => {
                if run.status.is_terminal() {
                    on_event(PollEvent::Updated(run.clone()));
                    return Some(run);
                }
                on_event(PollEvent::Updated(run));
            }
            Ok(None) => {
                on_event(PollEvent::NotFound);
                return None;
            }
            Err(e) => {
                warn!(run_id, error = %e, "status poll failed, retrying");
                on_event(PollEvent::Error(e.to_string()));
            }
        }
    }
}
