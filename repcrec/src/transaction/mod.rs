//! The transaction layer (§4.3/§4.4): a tagged variant rather than the
//! dynamic-dispatch class hierarchy the source used (§9 design note) —
//! the coordinator only ever needs a `start_time`, a `status`, and a
//! single dispatch call, and both flavors fit behind that without a
//! trait object.

mod state;

pub use state::{Operation, OperationKind, OperationStatus, TransactionStatus};

use std::collections::BTreeSet;

use crate::command::{RecordId, SiteId, TxId};
use crate::output::OutputEvent;
use crate::sites::Sites;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    ReadWrite,
    ReadOnly,
}

/// One transaction, RW or RO (§3). RO transactions never touch
/// `sites_touched` for fail-abort purposes — §4.5's failure-induced abort
/// only ever targets RW transactions — but the field is shared so the
/// coordinator doesn't need to match on kind to ask "did you touch this
/// site".
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TxId,
    pub start_time: u64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub operations: Vec<Operation>,
    pub sites_touched: BTreeSet<SiteId>,
    pub deadlocked: bool,
    /// Set once `end` has fully materialized (commit or abort). Distinct
    /// from `status`: a deferred site-failure or deadlock abort sets
    /// `status = Aborted` immediately, but the transaction only becomes
    /// "already completed" (§7) once `end` actually runs.
    pub finished: bool,
}

impl Transaction {
    pub fn new(id: TxId, start_time: u64, kind: TransactionKind) -> Self {
        Transaction {
            id,
            start_time,
            kind,
            status: TransactionStatus::Alive,
            operations: Vec::new(),
            sites_touched: BTreeSet::new(),
            deadlocked: false,
            finished: false,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    pub fn all_operations_completed(&self) -> bool {
        self.operations.iter().all(Operation::is_completed)
    }

    /// Attempts to complete a `Read` operation in place; leaves it
    /// `IN_PROGRESS` if no site can currently serve it.
    pub fn try_complete_read(
        &mut self,
        op_idx: usize,
        record: RecordId,
        sites: &mut Sites,
        events: &mut Vec<OutputEvent>,
    ) {
        match self.kind {
            TransactionKind::ReadWrite => {
                for site in sites.in_id_order_mut() {
                    if !site.is_read_ok_for_rw(record, &self.id) {
                        continue;
                    }
                    site.request_read_lock(record, &self.id);
                    if site.is_read_lock_acquired(record, &self.id) {
                        let value = site
                            .read_latest(record)
                            .expect("a site that just granted a read lock holds the record");
                        let site_id = site.id();
                        self.sites_touched.insert(site_id);
                        events.push(OutputEvent::Read { tx: self.id.clone(), record, site: site_id, value });
                        self.operations[op_idx].complete();
                        return;
                    }
                }
            }
            TransactionKind::ReadOnly => {
                for site in sites.in_id_order() {
                    if let Some(value) = site.read_for_read_only(record, self.start_time) {
                        events.push(OutputEvent::Read {
                            tx: self.id.clone(),
                            record,
                            site: site.id(),
                            value,
                        });
                        self.operations[op_idx].complete();
                        return;
                    }
                }
            }
        }
    }

    /// Attempts to complete a `Write` operation (§4.4): every live site
    /// holding the record must grant the WRITE lock before any of them
    /// sees the buffered version — a partial grant leaves the operation
    /// `IN_PROGRESS` with no side effect anywhere.
    pub fn try_complete_write(
        &mut self,
        op_idx: usize,
        record: RecordId,
        value: i64,
        sites: &mut Sites,
        events: &mut Vec<OutputEvent>,
    ) {
        debug_assert_eq!(self.kind, TransactionKind::ReadWrite);

        let live_holders: Vec<SiteId> =
            sites.in_id_order().filter(|s| s.is_write_ok_for_rw(record)).map(|s| s.id()).collect();
        if live_holders.is_empty() {
            return;
        }

        for &site_id in &live_holders {
            if let Some(site) = sites.get_mut(site_id) {
                site.request_write_lock(record, &self.id);
            }
        }

        let all_acquired = live_holders
            .iter()
            .all(|&site_id| sites.get(site_id).map(|s| s.is_write_lock_acquired(record, &self.id)).unwrap_or(false));
        if !all_acquired {
            return;
        }

        for &site_id in &live_holders {
            if let Some(site) = sites.get_mut(site_id) {
                site.write_record(record, value, self.id.clone());
                self.sites_touched.insert(site_id);
            }
        }
        events.push(OutputEvent::Wrote { tx: self.id.clone(), record, value, sites: live_holders });
        self.operations[op_idx].complete();
    }

    /// Materializes `end` (§4.4). By the time this runs, the coordinator
    /// has already verified every earlier operation of this transaction is
    /// `COMPLETED`, so this never stays `IN_PROGRESS`.
    pub fn complete_end(
        &mut self,
        op_idx: usize,
        end_time: u64,
        sites: &mut Sites,
        events: &mut Vec<OutputEvent>,
    ) {
        match self.status {
            TransactionStatus::Aborted => {
                for site in sites.in_id_order_mut() {
                    site.remove_uncommitted_data_for_trans(&self.id);
                    site.remove_locks_for_trans(&self.id);
                }
                self.operations[op_idx].complete();
                self.finished = true;
                if self.deadlocked {
                    events.push(OutputEvent::AbortedDueToDeadlock { tx: self.id.clone() });
                } else {
                    events.push(OutputEvent::AbortsDueToSiteFailure { tx: self.id.clone() });
                }
            }
            TransactionStatus::Alive => {
                for site in sites.in_id_order_mut() {
                    site.commit_transaction(&self.id, end_time);
                    site.remove_locks_for_trans(&self.id);
                }
                self.status = TransactionStatus::Committed;
                self.operations[op_idx].complete();
                self.finished = true;
                events.push(OutputEvent::Commits { tx: self.id.clone() });
            }
            TransactionStatus::Committed => {
                // `end` only ever runs once per transaction; guarded by
                // `finished` at the coordinator before this is reached.
            }
        }
    }

    /// A deferred site-failure abort (§4.5): the transaction's status
    /// flips immediately, and every currently pending operation is
    /// cancelled (marked `COMPLETED`) so the retry pass leaves it alone
    /// and a later `end` doesn't trip the "earlier operation still
    /// IN_PROGRESS" protocol check (§5 cancellation).
    pub fn abort_due_to_site_failure(&mut self) {
        self.status = TransactionStatus::Aborted;
        for op in self.operations.iter_mut() {
            op.complete();
        }
    }

    /// Deadlock victim abort (§4.4 `abortDeadlockedTransaction`): cancels
    /// every pending operation and releases all footprint at every site
    /// immediately. The "was aborted due to a deadlock" log line is
    /// emitted later, when `end` materializes it (mirrors the
    /// site-failure case).
    pub fn abort_deadlocked(&mut self, sites: &mut Sites) {
        self.deadlocked = true;
        self.status = TransactionStatus::Aborted;
        for op in self.operations.iter_mut() {
            op.complete();
        }
        for site in sites.in_id_order_mut() {
            site.remove_uncommitted_data_for_trans(&self.id);
            site.remove_locks_for_trans(&self.id);
        }
    }
}
