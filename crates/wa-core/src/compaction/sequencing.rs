//! Waiting between dependent compaction steps.
//!
//! Metadata operations are asynchronous on the engine side. Before a step
//! that depends on one, the executor either sleeps a fixed delay or polls
//! the submitted query until it reaches a terminal state. Both waits honour
//! a [`CancelFlag`].

use crate::query::{QueryEngine, QueryState, Submission};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use wa_common::{Error, Result};
use wa_config::Sequencing;

/// Longest single sleep before the cancel flag is checked again.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation flag for a running tick.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Sleep for `duration`, waking early with [`Error::Cancelled`].
pub fn sleep_cancellable(duration: Duration, cancel: &CancelFlag) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        cancel.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
    }
}

/// Applies the configured [`Sequencing`] after a submission.
pub struct Sequencer<'a> {
    engine: &'a dyn QueryEngine,
    strategy: Sequencing,
    cancel: CancelFlag,
}

impl<'a> Sequencer<'a> {
    pub fn new(engine: &'a dyn QueryEngine, strategy: Sequencing, cancel: CancelFlag) -> Self {
        Self {
            engine,
            strategy,
            cancel,
        }
    }

    /// Wait until the effect of `submission` can be relied on.
    ///
    /// Dry-run submissions carry no execution id and return immediately.
    pub fn settle(&self, submission: &Submission, what: &str) -> Result<()> {
        let Some(id) = &submission.execution_id else {
            return Ok(());
        };

        match self.strategy {
            Sequencing::FixedDelay { delay_ms } => {
                info!(delay_ms, "wait for a few seconds until {what}");
                sleep_cancellable(Duration::from_millis(delay_ms), &self.cancel)
            }
            Sequencing::Poll { max_attempts, .. } => {
                for attempt in 1..=max_attempts {
                    sleep_cancellable(self.strategy.backoff(attempt), &self.cancel)?;
                    let state = self.engine.query_state(id)?;
                    let state_name = state.name();
                    debug!(execution_id = %id, attempt, state = state_name, "polled query");
                    if !state.is_terminal() {
                        continue;
                    }
                    return match state {
                        QueryState::Failed { reason } | QueryState::Cancelled { reason } => {
                            Err(Error::QueryFailed {
                                execution_id: id.to_string(),
                                state: state_name.to_string(),
                                reason,
                            })
                        }
                        _ => {
                            info!(execution_id = %id, attempt, "{what}: done");
                            Ok(())
                        }
                    };
                }
                Err(Error::CompletionTimeout {
                    execution_id: id.to_string(),
                    attempts: max_attempts,
                })
            }
        }
    }
}
