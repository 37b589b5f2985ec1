//! A single logical database item at one site: a version history plus the
//! lock queue that arbitrates access to it (§4.1).

mod version;

pub use version::{LockKind, LockRequest, RecordVersion, Writer};

use std::collections::VecDeque;

use crate::command::TxId;

/// One record at one site. Versions are kept most-recent-first so that
/// `getLatestData`/`getLatestCommittedData` are simple front scans, and so
/// that an uncommitted write and the committed history it will eventually
/// join live in the same list (splitting them breaks read-your-writes, per
/// the design notes).
#[derive(Debug, Clone)]
pub struct Record {
    versions: VecDeque<RecordVersion>,
    locks: VecDeque<LockRequest>,
    replicated: bool,
    recovered: bool,
}

impl Record {
    /// A freshly constructed record, seeded with its initial committed
    /// value at commit time 0 (§3).
    pub fn new(initial_value: i64, replicated: bool) -> Self {
        let mut versions = VecDeque::new();
        versions.push_front(RecordVersion {
            value: initial_value,
            writer: Writer::Initial,
            commit_time: Some(0),
        });
        Record { versions, locks: VecDeque::new(), replicated, recovered: true }
    }

    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Prepends a new version to the history.
    pub fn insert_new_version(&mut self, value: i64, tx: TxId, commit_time: Option<u64>) {
        self.versions.push_front(RecordVersion { value, writer: Writer::Genuine(tx), commit_time });
    }

    /// Enqueues a lock request, deduplicating per §4.1's `addLockRequest`
    /// rules: a READ is dropped if `tx` already has any entry; a WRITE is
    /// dropped only if `tx` already has a WRITE entry (a prior READ by the
    /// same transaction does not suppress a WRITE — that's the upgrade
    /// case, represented as two queue entries).
    pub fn add_lock_request(&mut self, tx: &TxId, kind: LockKind) {
        match kind {
            LockKind::Read => {
                if self.locks.iter().any(|l| &l.tx == tx) {
                    return;
                }
            }
            LockKind::Write => {
                if self.locks.iter().any(|l| &l.tx == tx && l.kind == LockKind::Write) {
                    return;
                }
            }
        }
        self.locks.push_back(LockRequest { tx: tx.clone(), kind });
    }

    /// Whether `tx`'s READ request (which must already be queued) has been
    /// acquired: its first entry for `tx` is reached before any WRITE entry
    /// belonging to a different transaction.
    pub fn is_read_lock_acquired(&self, tx: &TxId) -> bool {
        for lock in &self.locks {
            if &lock.tx == tx {
                return true;
            }
            if &lock.tx != tx && lock.kind == LockKind::Write {
                return false;
            }
        }
        false
    }

    /// Whether `tx`'s WRITE request has been acquired: its first WRITE
    /// entry is reached before any entry (READ or WRITE) of a different
    /// transaction.
    pub fn is_write_lock_acquired(&self, tx: &TxId) -> bool {
        for lock in &self.locks {
            if &lock.tx == tx && lock.kind == LockKind::Write {
                return true;
            }
            if &lock.tx != tx {
                return false;
            }
        }
        false
    }

    pub fn remove_uncommitted_version_for_trans(&mut self, tx: &TxId) {
        self.versions.retain(|v| !(v.commit_time.is_none() && v.writer.is(tx)));
    }

    pub fn remove_all_uncommitted_versions(&mut self) {
        self.versions.retain(RecordVersion::is_committed);
    }

    pub fn remove_locks_for_trans(&mut self, tx: &TxId) {
        self.locks.retain(|l| &l.tx != tx);
    }

    /// The value visible to a RW transaction reading via `getLatestData`:
    /// the front of the list, i.e. an uncommitted write (necessarily the
    /// reader's own, since only the writer can see its own uncommitted
    /// version) if present, else the newest committed value.
    pub fn latest_data(&self) -> Option<i64> {
        self.versions.front().map(|v| v.value)
    }

    /// Whether the newest version of this record was written by `tx` —
    /// used to let a transaction read its own pending write even on a
    /// replicated record that hasn't recovered yet (§4.2).
    pub fn latest_data_writer_is(&self, tx: &TxId) -> bool {
        self.versions.front().map(|v| v.writer.is(tx)).unwrap_or(false)
    }

    pub fn latest_committed_data(&self) -> Option<i64> {
        self.versions.iter().find(|v| v.is_committed()).map(|v| v.value)
    }

    /// Commits every uncommitted version belonging to `tx`, installing
    /// `commit_time`, and flips `recovered` true (R-RECOV: a committed
    /// write landing at a replicated record proves it caught up).
    pub fn commit_transaction(&mut self, tx: &TxId, commit_time: u64) {
        let mut committed_any = false;
        for version in self.versions.iter_mut() {
            if version.commit_time.is_none() && version.writer.is(tx) {
                version.commit_time = Some(commit_time);
                committed_any = true;
            }
        }
        if committed_any {
            self.recovered = true;
        }
    }

    /// Site failure: drop uncommitted versions, mark a replicated record
    /// unrecovered, clear the lock queue (§4.1 `fail()`).
    pub fn fail(&mut self) {
        self.remove_all_uncommitted_versions();
        if self.replicated {
            self.recovered = false;
        }
        self.locks.clear();
    }

    /// Read for an RO transaction at `start_time`: the newest version
    /// committed at or before `start_time`, falling back to the oldest
    /// version present if none qualifies (§4.2).
    pub fn version_for_snapshot(&self, start_time: u64) -> Option<&RecordVersion> {
        self.versions
            .iter()
            .filter(|v| matches!(v.commit_time, Some(ct) if ct <= start_time))
            .max_by_key(|v| v.commit_time)
            .or_else(|| self.versions.back())
    }

    /// The waits-for edges this record's lock queue contributes: for every
    /// pair `(earlier, later)` with `earlier` before `later` in the queue,
    /// `later.tx -> earlier.tx` iff they're different transactions and not
    /// both READs (§4.1).
    pub fn waits_for_edges(&self) -> Vec<(TxId, TxId)> {
        let mut edges = Vec::new();
        for later in 0..self.locks.len() {
            for earlier in 0..later {
                let prev = &self.locks[earlier];
                let cur = &self.locks[later];
                if prev.tx != cur.tx && !(prev.kind == LockKind::Read && cur.kind == LockKind::Read)
                {
                    edges.push((cur.tx.clone(), prev.tx.clone()));
                }
            }
        }
        edges
    }
}
