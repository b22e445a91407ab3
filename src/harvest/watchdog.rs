//! Completion watchdog.
//!
//! Races the consumer task against a deadline. Whichever is observed first
//! decides the terminal state; the teardown is the same either way.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use super::consumer::{Consumed, ConsumerExit};

/// Watchdog state machine.
///
/// `Running` moves to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Running,
    /// Both slots latched before the deadline.
    CompletedEarly,
    /// The deadline passed first.
    TimedOut,
    /// The process closed its output before both slots latched.
    SourceClosed,
}

impl WatchdogState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug)]
pub struct Watchdog {
    started: Instant,
    deadline: Instant,
    state: WatchdogState,
}

impl Watchdog {
    /// Starts the clock. Call right after the process is spawned.
    pub fn start(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
            state: WatchdogState::Running,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Waits for `consumer` to finish on its own or for the deadline. On
    /// timeout the consumer is told to stop through `stop` and then joined,
    /// so the process has exited by the time this returns.
    pub(crate) async fn supervise(
        &mut self,
        mut consumer: JoinHandle<Consumed>,
        stop: oneshot::Sender<()>,
    ) -> Result<Consumed, JoinError> {
        let finished = tokio::select! {
            biased;
            joined = &mut consumer => Some(joined),
            () = sleep_until(self.deadline) => None,
        };

        match finished {
            Some(joined) => {
                let next = match joined.as_ref().map(|c| c.exit) {
                    Ok(ConsumerExit::Complete) => WatchdogState::CompletedEarly,
                    _ => WatchdogState::SourceClosed,
                };
                self.transition(next);
                joined
            }
            None => {
                self.transition(WatchdogState::TimedOut);
                // The consumer may have just finished; a closed channel is fine.
                let _ = stop.send(());
                consumer.await
            }
        }
    }

    fn transition(&mut self, next: WatchdogState) {
        debug_assert!(!self.state.is_terminal(), "watchdog already stopped");
        debug!(
            from = ?self.state,
            to = ?next,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Watchdog transition"
        );
        self.state = next;
    }
}
