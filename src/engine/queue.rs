use std::collections::VecDeque;

use tracing::{debug, info, trace, warn};

use super::Core;
use super::control::ControlState;
use super::walker::Discovered;
use crate::error::{ItemError, ProcessError};
use crate::event::Event;
use crate::node::{Item, NodeStatus};

/// Sequence numbers of entries awaiting dispatch.
///
/// FIFO for new entries; retried entries go back to the head.
#[derive(Debug, Default)]
pub(crate) struct Pending {
    seqs: VecDeque<u64>,
}

impl Pending {
    pub fn push_back(&mut self, seq: u64) {
        self.seqs.push_back(seq);
    }

    pub fn push_front(&mut self, seq: u64) {
        self.seqs.push_front(seq);
    }

    pub fn pop_front(&mut self) -> Option<u64> {
        self.seqs.pop_front()
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }
}

impl Core {
    /// Admits a discovered entry.
    ///
    /// Once `max_done` entries have been registered the entry is rejected and
    /// a graceful stop is requested.
    pub(super) fn register(&mut self, entry: Discovered) -> bool {
        if self.counters.registered >= self.limits.max_done {
            info!(max_done = self.limits.max_done, "registration cap reached");
            self.controller.quit();
            return false;
        }
        debug!(name = %entry.name, "registered");
        let seq = self.archive.admit(entry.name, entry.path);
        self.pending.push_back(seq);
        self.counters.registered += 1;
        true
    }

    /// Takes the next pending entry if a concurrency slot is free.
    pub(super) fn next(&mut self) -> Option<(u64, Item)> {
        if self.controller.state() == ControlState::Aborted {
            return None;
        }
        if self.counters.doing >= self.limits.max_doing as u64 {
            return None;
        }
        let seq = self.pending.pop_front()?;
        let node = self.archive.get_mut(seq)?;
        node.set_status(NodeStatus::Doing);
        self.counters.doing += 1;
        trace!(name = node.name(), attempt = node.retries() + 1, "dispatch");
        Some((seq, node.item()))
    }

    /// Applies the outcome of one processor call.
    pub(super) fn complete(&mut self, seq: u64, outcome: Result<(), ProcessError>) {
        self.counters.doing = self.counters.doing.saturating_sub(1);

        let source = match outcome {
            Ok(()) => {
                self.archive(seq, NodeStatus::Done);
                return;
            }
            Err(source) => source,
        };

        let Some(node) = self.archive.get_mut(seq) else {
            return;
        };
        let name = node.name().to_owned();
        let attempt = node.retries() + 1;
        let error = ItemError::Process { attempt, source };
        self.counters.errors += 1;

        if node.retries() >= self.limits.retry {
            warn!(%name, attempt, %error, "giving up");
            self.emit(Event::Error { name, error });
            self.archive(seq, NodeStatus::Ignored);
        } else {
            node.retry();
            node.set_status(NodeStatus::Waiting);
            self.pending.push_front(seq);
            debug!(%name, attempt, %error, "will retry");
            self.emit(Event::Warning { name, error });
        }

        if self.counters.errors >= self.limits.max_errors {
            warn!(
                max_errors = self.limits.max_errors,
                "error cap reached, aborting"
            );
            self.controller.abort();
        }
    }
}
