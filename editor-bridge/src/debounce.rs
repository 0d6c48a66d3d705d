//! Trailing-edge debounce of block submissions.

use std::time::Duration;

use quill_notes::BlockId;
use tokio::time::Instant;

/// A cancellable trailing-edge timer for one pending submission.
///
/// Every [`record`](Self::record) pushes the deadline out to a full quiet
/// period after the latest edit. Only one block is pending at a time: an
/// edit to another block supersedes the previous one.
#[derive(Debug)]
pub struct Debouncer {
    quiescence: Duration,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    block: BlockId,
    deadline: Instant,
}

impl Debouncer {
    pub fn new(quiescence: Duration) -> Self {
        Self {
            quiescence,
            pending: None,
        }
    }

    /// Note an edit to `block` and restart the timer.
    pub fn record(&mut self, block: BlockId) {
        self.pending = Some(Pending {
            block,
            deadline: Instant::now() + self.quiescence,
        });
    }

    /// Drop the pending submission, if any.
    pub fn cancel(&mut self) -> Option<BlockId> {
        self.pending.take().map(|p| p.block)
    }

    /// Drop the pending submission only if it is for `block`.
    pub fn cancel_for(&mut self, block: BlockId) -> bool {
        if self.pending_block() == Some(block) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn pending_block(&self) -> Option<BlockId> {
        self.pending.map(|p| p.block)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.deadline)
    }

    /// Take the pending block once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<BlockId> {
        match self.pending {
            Some(p) if p.deadline <= now => {
                self.pending = None;
                Some(p.block)
            }
            _ => None,
        }
    }
}
