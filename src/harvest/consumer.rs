//! The task that drains a [`LineSource`], decodes and classifies each line,
//! and latches qualifying records.
//!
//! The consumer is the single owner of both the source and the slots. It is
//! told to stop through a oneshot channel and hands the slots back through its
//! `JoinHandle`, so no state is shared with the watchdog.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::model::{Record, Slots};
use crate::traits::LineSource;

/// Why the consumer stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Both slots were latched.
    Complete,
    /// The source closed its output first.
    Exhausted,
    /// The watchdog asked it to stop.
    Stopped,
}

/// Line counters for one harvest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineCounts {
    /// Lines pulled from the source
    pub read: usize,

    /// Lines dropped because they did not decode
    pub discarded: usize,
}

#[derive(Debug)]
pub(crate) struct Consumed {
    pub(crate) slots: Slots,
    pub(crate) counts: LineCounts,
    pub(crate) exit: ConsumerExit,
}

/// Reads until both slots are filled, the source closes, or `stop` fires,
/// then tears the source down (terminate, then wait up to `grace` before a
/// hard kill).
pub(crate) async fn consume<S: LineSource>(
    mut source: S,
    mut stop: oneshot::Receiver<()>,
    grace: Duration,
) -> Consumed {
    let mut slots = Slots::default();
    let mut counts = LineCounts::default();

    let exit = loop {
        let line = tokio::select! {
            biased;
            _ = &mut stop => break ConsumerExit::Stopped,
            line = source.next_line() => line,
        };
        let Some(line) = line else {
            break ConsumerExit::Exhausted;
        };
        counts.read += 1;

        let record = match Record::parse(&line) {
            Ok(record) => record,
            Err(e) => {
                counts.discarded += 1;
                debug!(error = %e, line = %line, "Discarding undecodable line");
                continue;
            }
        };

        if let Some(slot) = classify(&record).slot() {
            if slots.latch(slot, record) {
                debug!(?slot, "Latched record");
            }
        }

        if slots.is_complete() {
            break ConsumerExit::Complete;
        }
    };

    source.terminate();
    if let Err(e) = source.wait(grace).await {
        warn!(error = %e, "Stream process teardown failed");
    }

    Consumed {
        slots,
        counts,
        exit,
    }
}
