//! The command model: tagged values produced by the (external) parser and
//! consumed by the coordinator. Nothing in this module knows how a line of
//! trace text was tokenized — see `repcrec-cli::parser` for that.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

/// A transaction identifier, e.g. `"T1"`. Plain strings are kept (rather
/// than an interned index) because traces are small and the wire format is
/// exactly what a human wrote in the script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for TxId {
    fn from(s: S) -> Self {
        TxId(s.into())
    }
}

/// A record number, 1..=20 by construction (see §3).
pub type RecordId = u32;

/// A site number, 1..=10 by construction (see §3).
pub type SiteId = u32;

/// Tagged command values, one variant per grammar form in §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Begin(TxId),
    BeginReadOnly(TxId),
    Read { tx: TxId, record: RecordId },
    Write { tx: TxId, record: RecordId, value: i64 },
    End(TxId),
    Dump,
    Fail(SiteId),
    Recover(SiteId),
    Quit,
}
