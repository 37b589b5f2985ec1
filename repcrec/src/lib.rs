//! `repcrec` is the concurrency-control and replication core of a
//! simulator for a replicated, distributed transactional key-value store.
//!
//! It owns the hard engineering: per-site multi-version records with lock
//! queues, two transaction flavors (strict 2PL read-write and
//! snapshot-isolation read-only), available-copies replication, and a
//! coordinator that advances logical time, dispatches commands, detects
//! deadlocks, and retries blocked work. Tokenizing trace lines and
//! rendering log output to a terminal are the driver crate's job; this
//! crate only knows about `Command` in and `OutputEvent` out.
//!
//! ## Getting started
//!
//! ```
//! use repcrec::coordinator::Coordinator;
//! use repcrec::command::Command;
//! use repcrec::output::OutputEvent;
//!
//! let mut coordinator = Coordinator::new();
//! let outcome = coordinator.tick(Command::Begin("T1".into()));
//! assert!(outcome.error.is_none());
//! assert!(outcome.events.contains(&OutputEvent::Time(1)));
//! ```

pub mod command;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod record;
pub mod site;
pub mod sites;
pub mod transaction;
