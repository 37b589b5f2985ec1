//! Record versions and the lock requests that guard them.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::command::TxId;

/// Who wrote a version. A sum type rather than a sentinel string: the
/// initial seed value at every site is a single flyweight, never a genuine
/// transaction, and representing it this way rules out a transaction ever
/// colliding with the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Writer {
    /// The seed value installed when a site is constructed.
    Initial,
    /// A real transaction's write.
    Genuine(TxId),
}

impl fmt::Display for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Writer::Initial => write!(f, "initialValue"),
            Writer::Genuine(tx) => write!(f, "{tx}"),
        }
    }
}

impl Writer {
    pub fn is(&self, tx: &TxId) -> bool {
        matches!(self, Writer::Genuine(t) if t == tx)
    }
}

/// One version in a record's history. `commit_time = None` marks an
/// uncommitted version, visible only to its own writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub value: i64,
    pub writer: Writer,
    pub commit_time: Option<u64>,
}

impl RecordVersion {
    pub fn is_committed(&self) -> bool {
        self.commit_time.is_some()
    }
}

/// READ or WRITE, as requested against a record's lock queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    Read,
    Write,
}

/// One entry in a record's FIFO lock queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub tx: TxId,
    pub kind: LockKind,
}

impl fmt::Display for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LockKind::Read => write!(f, "{}.R", self.tx),
            LockKind::Write => write!(f, "{}.W", self.tx),
        }
    }
}
