//! The traversal engine: walker, admission queue and archiver driven from a
//! single cooperative loop.
//!
//! All bookkeeping lives in [`Core`] and is only touched between awaits, so
//! the queues need no locking. The loop suspends on three things: a control
//! signal, the completion of any in-flight processor call, and the walker's
//! one outstanding directory listing.

mod archive;
mod control;
mod queue;
mod walker;

use std::path::PathBuf;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub use control::{ControlState, Controller};

use crate::config::TraverseConfig;
use crate::error::{ConfigError, ItemError, ProcessError};
use crate::event::{Counters, Event, EventReceiver};
use crate::node::Item;
use crate::processor::ItemProcessor;
use archive::Archive;
use queue::Pending;
use walker::{Discovery, Listing, NameList, Step, Walker};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The whole tree (or name list) was processed.
    Exhausted,
    /// Discovery was stopped early; everything admitted was archived.
    Stopped,
    /// Dispatch was cut off; some admitted entries were never archived.
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub counters: Counters,
    /// Last marker emitted by this run, if any.
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    max_done: u64,
    max_doing: usize,
    max_waiting: usize,
    max_errors: u64,
    retry: u32,
}

/// Run state shared by the walker, the queue and the archiver.
pub(crate) struct Core {
    limits: Limits,
    discovery: Discovery,
    pending: Pending,
    archive: Archive,
    counters: Counters,
    controller: Controller,
    events: mpsc::UnboundedSender<Event>,
    marker: Option<String>,
    discovery_finished: bool,
    /// Discovery stopped before the walk was exhausted.
    halted: bool,
    ended: bool,
}

impl Core {
    fn emit(&self, event: Event) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Steps the walker while discovery may continue and the pending queue
    /// has room. Every registered entry is offered for dispatch right away,
    /// so pending only fills once all concurrency slots are taken; dispatched
    /// entries are pushed onto `ready`. Returns a directory that must be
    /// listed before the walk can go on.
    fn discover(&mut self, ready: &mut Vec<(u64, Item)>) -> Option<PathBuf> {
        while !self.discovery_finished
            && self.controller.state() == ControlState::Running
            && self.pending.len() < self.limits.max_waiting
        {
            match self.discovery.step() {
                Step::Entry(entry) => {
                    if !self.register(entry) {
                        break;
                    }
                    ready.extend(std::iter::from_fn(|| self.next()));
                }
                Step::List(path) => return Some(path),
                Step::NoUtf8Name { dirname, raw } => {
                    warn!(%dirname, raw = ?raw, "name is not valid UTF-8");
                    self.emit(Event::NoUtf8Name { dirname, raw });
                }
                Step::Unreadable { name, path, error } => {
                    warn!(path = %path.display(), %error, "cannot read directory");
                    self.emit(Event::Warning {
                        name,
                        error: ItemError::Unreadable {
                            path,
                            source: error,
                        },
                    });
                }
                Step::Finished => {
                    info!(registered = self.counters.registered, "discovery finished");
                    self.discovery_finished = true;
                    self.try_end();
                }
            }
        }
        None
    }

    fn halt_discovery(&mut self) {
        if self.discovery_finished {
            return;
        }
        info!(
            state = %self.controller.state(),
            registered = self.counters.registered,
            "discovery halted"
        );
        self.discovery_finished = true;
        self.halted = true;
        self.try_end();
    }

    fn report(self) -> RunReport {
        let outcome = match (self.ended, self.halted) {
            (true, false) => RunOutcome::Exhausted,
            (true, true) => RunOutcome::Stopped,
            (false, _) => RunOutcome::Aborted,
        };
        RunReport {
            outcome,
            counters: self.counters,
            marker: self.marker,
        }
    }
}

/// Checkpointed traversal of one directory tree.
pub struct Engine<P> {
    processor: P,
    core: Core,
    signals: watch::Receiver<ControlState>,
}

impl<P: ItemProcessor> Engine<P> {
    /// Validates `config` and prepares a run. Notifications for the run are
    /// delivered on the returned receiver.
    pub fn new(
        config: TraverseConfig,
        processor: P,
    ) -> Result<(Self, EventReceiver), ConfigError> {
        config.validate()?;
        let (controller, signals) = Controller::new();
        let (events, rx) = mpsc::unbounded_channel();

        let discovery = match config.names {
            Some(names) => Discovery::Names(NameList::new(config.path, names)),
            None => Discovery::Tree(Walker::new(
                config.path,
                config.directory_first,
                config.marker.as_deref(),
            )),
        };
        let core = Core {
            limits: Limits {
                max_done: config.max_done,
                max_doing: config.max_doing,
                max_waiting: config.max_waiting,
                max_errors: config.max_errors,
                retry: config.retry,
            },
            discovery,
            pending: Pending::default(),
            archive: Archive::default(),
            counters: Counters::default(),
            controller,
            events,
            marker: None,
            discovery_finished: false,
            halted: false,
            ended: false,
        };
        let engine = Self {
            processor,
            core,
            signals,
        };
        Ok((engine, rx))
    }

    /// Handle for stopping the run from outside.
    pub fn controller(&self) -> Controller {
        self.core.controller.clone()
    }

    /// Drives the run until every discovered entry is archived, or until an
    /// abort leaves nothing in flight.
    pub async fn run(self) -> RunReport {
        let Engine {
            processor,
            mut core,
            mut signals,
        } = self;
        let mut in_flight = FuturesUnordered::new();
        let mut listing: Option<BoxFuture<'static, Listing>> = None;
        let mut ready = Vec::new();

        loop {
            if *signals.borrow_and_update() != ControlState::Running {
                listing = None;
                core.halt_discovery();
            }
            ready.extend(std::iter::from_fn(|| core.next()));
            if listing.is_none() {
                if let Some(path) = core.discover(&mut ready) {
                    listing = Some(Box::pin(walker::list(path)));
                }
            }
            for (seq, item) in ready.drain(..) {
                in_flight.push(invoke(&processor, seq, item));
            }

            if core.ended || (in_flight.is_empty() && listing.is_none()) {
                break;
            }

            tokio::select! {
                biased;
                Ok(()) = signals.changed() => {}
                Some((seq, outcome)) = in_flight.next() => core.complete(seq, outcome),
                listed = poll_listing(&mut listing) => {
                    listing = None;
                    core.discovery.listed(listed);
                }
            }
        }

        let report = core.report();
        info!(outcome = ?report.outcome, marker = ?report.marker, "run finished");
        report
    }
}

async fn invoke<P: ItemProcessor>(
    processor: &P,
    seq: u64,
    item: Item,
) -> (u64, Result<(), ProcessError>) {
    let outcome = processor.process(&item).await;
    (seq, outcome)
}

async fn poll_listing(slot: &mut Option<BoxFuture<'static, Listing>>) -> Listing {
    match slot {
        Some(listing) => listing.await,
        None => std::future::pending().await,
    }
}
