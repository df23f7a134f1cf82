//! Notifications emitted by the engine.
//!
//! The engine never returns per-item errors to its caller; everything that
//! happens to an entry is reported as an [`Event`] on the channel returned by
//! [`Engine::new`](crate::engine::Engine::new).

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::ItemError;
use crate::node::NodeStatus;

/// Receiving half of the notification channel.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Run counters. All monotonic except `doing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub registered: u64,
    pub doing: u64,
    pub done: u64,
    pub ignored: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[derive(Debug)]
pub enum Event {
    /// Processed successfully.
    Done { name: String },
    /// Gave up after the retry budget was spent.
    Ignored { name: String },
    /// Excluded by predicate. Reserved.
    Skipped { name: String },
    /// The resume marker advanced to `marker`.
    MoveOn { marker: String },
    /// A name in `dirname` is not valid UTF-8 and was left out of the walk.
    NoUtf8Name { dirname: String, raw: Vec<u8> },
    /// Recoverable failure; the entry was queued for another attempt.
    Warning { name: String, error: ItemError },
    /// Failure after the last retry; the entry was archived as ignored.
    Error { name: String, error: ItemError },
    /// Every discovered entry has been archived.
    End(Counters),
}

impl Event {
    /// The event emitted when an entry is archived with `status`.
    ///
    /// Returns `None` for non-terminal statuses.
    pub fn archived(status: NodeStatus, name: String) -> Option<Self> {
        match status {
            NodeStatus::Done => Some(Event::Done { name }),
            NodeStatus::Ignored => Some(Event::Ignored { name }),
            NodeStatus::Skipped => Some(Event::Skipped { name }),
            NodeStatus::Waiting | NodeStatus::Doing => None,
        }
    }

    /// Notification name, as used in log files and terminal output.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Done { .. } => "done",
            Event::Ignored { .. } => "ignored",
            Event::Skipped { .. } => "skipped",
            Event::MoveOn { .. } => "moveon",
            Event::NoUtf8Name { .. } => "no-utf8-name",
            Event::Warning { .. } => "warning",
            Event::Error { .. } => "error",
            Event::End(_) => "end",
        }
    }
}

impl Counters {
    pub(crate) fn record(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::Done => self.done += 1,
            NodeStatus::Ignored => self.ignored += 1,
            NodeStatus::Skipped => self.skipped += 1,
            NodeStatus::Waiting | NodeStatus::Doing => {}
        }
    }
}
