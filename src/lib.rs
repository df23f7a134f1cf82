//! fsee: resumable batch processing over huge directory trees.
//!
//! The [`engine`] walks a tree in a deterministic order, hands every entry to
//! an [`ItemProcessor`](processor::ItemProcessor) with bounded concurrency and
//! reports progress as [`Event`](event::Event)s. The `moveon` marker it emits
//! is enough to resume a later run exactly where this one left off.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod node;
pub mod processor;
pub mod task;
pub mod ui;

pub use config::TraverseConfig;
pub use engine::{Controller, Engine, RunOutcome, RunReport};
pub use event::{Counters, Event, EventReceiver};
pub use processor::{CommandProcessor, ItemProcessor};
