use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a discovered entry.
///
/// `Waiting → Doing → {Done | Waiting (retry) | Ignored}`. `Skipped` is
/// reserved for predicate-based exclusion and is never produced by the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Waiting,
    Doing,
    Done,
    Ignored,
    Skipped,
}

impl NodeStatus {
    /// Terminal statuses are the ones an entry can be archived with.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Done | NodeStatus::Ignored | NodeStatus::Skipped
        )
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Waiting => write!(f, "waiting"),
            NodeStatus::Doing => write!(f, "doing"),
            NodeStatus::Done => write!(f, "done"),
            NodeStatus::Ignored => write!(f, "ignored"),
            NodeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// The immutable view of an entry handed to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Relative name under the traversal root, segments joined by `/`.
    pub name: String,
    /// Absolute path on disk.
    pub path: PathBuf,
}

/// One registered filesystem entry, owned by the engine until archived.
#[derive(Debug, Clone)]
pub struct Node {
    seq: u64,
    name: String,
    path: PathBuf,
    status: NodeStatus,
    retries: u32,
}

impl Node {
    pub fn new(seq: u64, name: String, path: PathBuf) -> Self {
        Self {
            seq,
            name,
            path,
            status: NodeStatus::Waiting,
            retries: 0,
        }
    }

    /// Discovery sequence number; strictly increasing in traversal order.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn set_status(&mut self, status: NodeStatus) {
        self.status = status;
    }

    /// Number of failed attempts so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry(&mut self) {
        self.retries += 1;
    }

    pub fn item(&self) -> Item {
        Item {
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}
