//! Error types for the simulator core.
//!
//! Only the fatal classes from the spec live here (§7): violations the
//! coordinator itself can detect once a `Command` reaches it. Grammar
//! violations and out-of-range tokens are caught earlier, by the driver's
//! parser, which has its own lightweight error type.

use std::fmt;

use crate::command::{RecordId, SiteId, TxId};

/// A fatal, design-level protocol violation. The caller (the coordinator's
/// user, ultimately the trace being replayed) is asserted never to trigger
/// these under correct use; when one occurs the simulation terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `begin`/`beginRO` named a transaction id that is already known.
    DuplicateBegin(TxId),
    /// `R`/`W`/`end` named a transaction id that was never begun.
    UnknownTransaction(TxId),
    /// `R`/`W`/`end` named a transaction that has already ended.
    TransactionAlreadyCompleted(TxId),
    /// A write was addressed to a read-only transaction.
    WriteToReadOnly(TxId),
    /// `end` arrived while a prior operation of the same transaction is
    /// still `IN_PROGRESS`.
    ProtocolViolation(TxId),
    /// `fail(s)` named a site that is already `FAILED`.
    SiteAlreadyFailed(SiteId),
    /// `recover(s)` named a site that is already `LIVE`.
    SiteAlreadyLive(SiteId),
    /// A record id fell outside `1..=20` after it reached the core (the
    /// parser should have caught this; this variant guards against callers
    /// that bypass it).
    RecordOutOfRange(RecordId),
    /// A site id fell outside `1..=10` after it reached the core.
    SiteOutOfRange(SiteId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateBegin(tx) => write!(f, "transaction {tx} has already begun"),
            Error::UnknownTransaction(tx) => write!(f, "transaction {tx} is not known"),
            Error::TransactionAlreadyCompleted(tx) => {
                write!(f, "transaction {tx} has already completed")
            }
            Error::WriteToReadOnly(tx) => {
                write!(f, "transaction {tx} is read-only and cannot write")
            }
            Error::ProtocolViolation(tx) => write!(
                f,
                "transaction {tx} received end() while an earlier operation is still in progress"
            ),
            Error::SiteAlreadyFailed(site) => write!(f, "site {site} has already failed"),
            Error::SiteAlreadyLive(site) => write!(f, "site {site} is not failed"),
            Error::RecordOutOfRange(record) => write!(f, "record x{record} is out of range"),
            Error::SiteOutOfRange(site) => write!(f, "site {site} is out of range"),
        }
    }
}

impl std::error::Error for Error {}

/// The crate-wide result alias; every fallible core method returns this.
pub type CResult<T> = Result<T, Error>;
