//! A site ("data manager"): one of ten independent nodes holding a subset
//! of the twenty records (§4.2).

use std::collections::BTreeMap;

use crate::command::{RecordId, SiteId, TxId};
use crate::error::{CResult, Error};
use crate::record::{LockKind, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Live,
    Failed,
}

/// One of the ten sites. Records are kept in a `BTreeMap` so that `dump()`
/// and the coordinator's site-id-ordered iteration come out sorted for
/// free.
#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    status: SiteStatus,
    failed_times: Vec<u64>,
    records: BTreeMap<RecordId, Record>,
}

impl Site {
    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn status(&self) -> SiteStatus {
        self.status
    }

    pub fn is_live(&self) -> bool {
        self.status == SiteStatus::Live
    }

    pub fn holds(&self, record: RecordId) -> bool {
        self.records.contains_key(&record)
    }

    pub fn failed_times(&self) -> &[u64] {
        &self.failed_times
    }

    /// Builds site `id`, seeding every record it holds per the placement
    /// rule in §3: even records everywhere, odd record `i` only at site
    /// `1 + (i mod 10)`.
    pub fn new(id: SiteId, num_records: RecordId) -> Self {
        let mut records = BTreeMap::new();
        for i in 1..=num_records {
            let replicated = i % 2 == 0;
            let holds = replicated || id == 1 + (i % 10);
            if holds {
                records.insert(i, Record::new(10 * i as i64, replicated));
            }
        }
        Site { id, status: SiteStatus::Live, failed_times: Vec::new(), records }
    }

    /// True iff an RW transaction `tx` may read `record` here (§4.2): the
    /// site is live, holds the record, and either the record has recovered
    /// or `tx` itself wrote its newest version (read-your-writes survives
    /// an unrecovered replica).
    pub fn is_read_ok_for_rw(&self, record: RecordId, tx: &TxId) -> bool {
        if !self.is_live() {
            return false;
        }
        let Some(r) = self.records.get(&record) else { return false };
        if r.is_recovered() {
            return true;
        }
        r.latest_data_writer_is(tx)
    }

    pub fn is_write_ok_for_rw(&self, record: RecordId) -> bool {
        self.is_live() && self.holds(record)
    }

    pub fn request_read_lock(&mut self, record: RecordId, tx: &TxId) {
        if !self.is_live() {
            return;
        }
        if let Some(r) = self.records.get_mut(&record) {
            r.add_lock_request(tx, LockKind::Read);
        }
    }

    pub fn request_write_lock(&mut self, record: RecordId, tx: &TxId) {
        if !self.is_live() {
            return;
        }
        if let Some(r) = self.records.get_mut(&record) {
            r.add_lock_request(tx, LockKind::Write);
        }
    }

    pub fn is_read_lock_acquired(&self, record: RecordId, tx: &TxId) -> bool {
        self.is_live()
            && self.records.get(&record).map(|r| r.is_read_lock_acquired(tx)).unwrap_or(false)
    }

    pub fn is_write_lock_acquired(&self, record: RecordId, tx: &TxId) -> bool {
        self.is_live()
            && self.records.get(&record).map(|r| r.is_write_lock_acquired(tx)).unwrap_or(false)
    }

    pub fn read_latest(&self, record: RecordId) -> Option<i64> {
        self.records.get(&record).and_then(Record::latest_data)
    }

    pub fn write_record(&mut self, record: RecordId, value: i64, tx: TxId) {
        if let Some(r) = self.records.get_mut(&record) {
            r.insert_new_version(value, tx, None);
        }
    }

    pub fn commit_transaction(&mut self, tx: &TxId, commit_time: u64) {
        for r in self.records.values_mut() {
            r.commit_transaction(tx, commit_time);
        }
    }

    pub fn remove_uncommitted_data_for_trans(&mut self, tx: &TxId) {
        for r in self.records.values_mut() {
            r.remove_uncommitted_version_for_trans(tx);
        }
    }

    pub fn remove_locks_for_trans(&mut self, tx: &TxId) {
        for r in self.records.values_mut() {
            r.remove_locks_for_trans(tx);
        }
    }

    /// Read for an RO transaction (§4.2). Fails outright if the site is
    /// down or doesn't hold the record. Otherwise picks the
    /// snapshot-appropriate version, then — for a replicated record —
    /// rejects it if this site failed strictly between that version's
    /// commit and the transaction's snapshot time (a fail in that window
    /// means this site cannot vouch the value survived continuously).
    pub fn read_for_read_only(&self, record: RecordId, start_time: u64) -> Option<i64> {
        if !self.is_live() {
            return None;
        }
        let r = self.records.get(&record)?;
        let version = r.version_for_snapshot(start_time)?;
        if r.is_replicated() {
            let commit_time = version.commit_time.unwrap_or(0);
            let invalidated = self
                .failed_times
                .iter()
                .any(|&f| commit_time < f && f < start_time);
            if invalidated {
                return None;
            }
        }
        Some(version.value)
    }

    /// Crashes the site at logical time `ts`: drops locks and uncommitted
    /// data everywhere, marks replicated records unrecovered.
    pub fn fail(&mut self, ts: u64) -> CResult<()> {
        if !self.is_live() {
            return Err(Error::SiteAlreadyFailed(self.id));
        }
        self.failed_times.push(ts);
        self.status = SiteStatus::Failed;
        for r in self.records.values_mut() {
            r.fail();
        }
        Ok(())
    }

    /// Brings the site back up. Replicated records stay `recovered=false`
    /// until a subsequent committed write lands (§4.2, preserved per the
    /// open question in §9).
    pub fn recover(&mut self) -> CResult<()> {
        if self.is_live() {
            return Err(Error::SiteAlreadyLive(self.id));
        }
        self.status = SiteStatus::Live;
        Ok(())
    }

    /// Waits-for edges contributed by every record's lock queue at this
    /// site (§4.1/§4.5).
    pub fn waits_for_edges(&self) -> Vec<(TxId, TxId)> {
        self.records.values().flat_map(Record::waits_for_edges).collect()
    }

    /// Renders `Site s: x1:v1 x2:v2 ...` (§4.2/§6), using the latest
    /// *committed* value of every record this site holds, in record-id
    /// order.
    pub fn dump(&self) -> String {
        let body = self
            .records
            .iter()
            .filter_map(|(id, r)| r.latest_committed_data().map(|v| format!("x{id}:{v}")))
            .collect::<Vec<_>>()
            .join(" ");
        format!("Site {}: {}", self.id, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tx(name: &str) -> TxId {
        TxId(name.to_string())
    }

    #[test]
    fn placement_follows_even_everywhere_odd_one_site() {
        let site2 = Site::new(2, 20);
        let site3 = Site::new(3, 20);
        // x1 is odd, holder = 1 + (1 % 10) = 2
        assert!(site2.holds(1));
        assert!(!site3.holds(1));
        // x2 is even, replicated everywhere
        assert!(site2.holds(2));
        assert!(site3.holds(2));
        assert_eq!(site2.read_latest(1), Some(10));
        assert_eq!(site2.read_latest(2), Some(20));
    }

    #[test]
    fn fail_then_fail_again_is_an_error() {
        let mut s = Site::new(1, 20);
        s.fail(5).unwrap();
        assert_eq!(s.fail(6), Err(Error::SiteAlreadyFailed(1)));
    }

    #[test]
    fn recover_while_live_is_an_error() {
        let mut s = Site::new(1, 20);
        assert_eq!(s.recover(), Err(Error::SiteAlreadyLive(1)));
    }

    #[test]
    fn replicated_record_unreadable_by_rw_after_recovery_until_new_commit() {
        let mut s = Site::new(1, 20);
        s.fail(1).unwrap();
        s.recover().unwrap();
        assert!(!s.is_read_ok_for_rw(2, &tx("T1")));
        s.request_write_lock(2, &tx("T1"));
        assert!(s.is_write_lock_acquired(2, &tx("T1")));
        s.write_record(2, 99, tx("T1"));
        s.commit_transaction(&tx("T1"), 10);
        assert!(s.is_read_ok_for_rw(2, &tx("T2")));
    }

    #[test]
    fn read_only_rejects_replicated_record_failed_between_commit_and_snapshot() {
        let mut s = Site::new(1, 20);
        s.write_record(2, 21, tx("T1"));
        s.commit_transaction(&tx("T1"), 5);
        s.fail(7).unwrap();
        s.recover().unwrap();
        // snapshot at time 10 sees the x2 version committed at 5, but this
        // site failed at time 7, strictly between 5 and 10: invalidated.
        assert_eq!(s.read_for_read_only(2, 10), None);
        // a snapshot taken before the failure is unaffected.
        assert_eq!(s.read_for_read_only(2, 6), Some(21));
    }

    #[test]
    fn dump_uses_latest_committed_value_only() {
        let mut s = Site::new(2, 2);
        s.write_record(1, 999, tx("T1"));
        assert_eq!(s.dump(), "Site 2: x1:10 x2:20");
    }
}
