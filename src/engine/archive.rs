use std::collections::VecDeque;
use std::path::PathBuf;

use tracing::{debug, info};

use super::Core;
use super::control::ControlState;
use crate::event::Event;
use crate::node::{Node, NodeStatus};

/// Registered entries that have not been archived yet, in discovery order.
///
/// Sequence numbers are handed out consecutively and entries only ever leave
/// from the front, so the entry with sequence `s` sits at index
/// `s - front.seq()`.
#[derive(Debug, Default)]
pub(crate) struct Archive {
    nodes: VecDeque<Node>,
    next_seq: u64,
}

impl Archive {
    /// Appends a new waiting entry and returns its sequence number.
    pub fn admit(&mut self, name: String, path: PathBuf) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.push_back(Node::new(seq, name, path));
        seq
    }

    fn index(&self, seq: u64) -> Option<usize> {
        let front = self.nodes.front()?.seq();
        let index = usize::try_from(seq.checked_sub(front)?).ok()?;
        (index < self.nodes.len()).then_some(index)
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut Node> {
        let index = self.index(seq)?;
        self.nodes.get_mut(index)
    }

    /// Finalizes `seq` with a terminal `status`.
    ///
    /// When the entry is at the front, the whole leading run of terminal
    /// entries is removed and the name of the last one is returned as the new
    /// resume marker.
    pub fn settle(&mut self, seq: u64, status: NodeStatus) -> Option<String> {
        debug_assert!(status.is_terminal());
        let index = self.index(seq)?;
        self.nodes[index].set_status(status);
        if index != 0 {
            return None;
        }
        let run = self
            .nodes
            .iter()
            .take_while(|node| node.status().is_terminal())
            .count();
        self.nodes
            .drain(..run)
            .last()
            .map(|node| node.name().to_owned())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Core {
    /// Archives `seq` with a terminal status and advances the marker when the
    /// finalized prefix grows.
    pub(super) fn archive(&mut self, seq: u64, status: NodeStatus) {
        let Some(node) = self.archive.get_mut(seq) else {
            return;
        };
        let name = node.name().to_owned();
        self.counters.record(status);
        if let Some(event) = Event::archived(status, name) {
            self.emit(event);
        }

        if let Some(marker) = self.archive.settle(seq, status) {
            debug!(%marker, remaining = self.archive.len(), "moveon");
            self.marker = Some(marker.clone());
            self.emit(Event::MoveOn { marker });
            self.try_end();
        }
    }

    /// Fires `end` once discovery is over and nothing is left unarchived.
    /// An aborted run never ends.
    pub(super) fn try_end(&mut self) {
        if self.ended || !self.discovery_finished || !self.archive.is_empty() {
            return;
        }
        if self.controller.state() == ControlState::Aborted {
            return;
        }
        self.ended = true;
        info!(
            done = self.counters.done,
            ignored = self.counters.ignored,
            errors = self.counters.errors,
            "run complete"
        );
        self.emit(Event::End(self.counters));
    }
}
