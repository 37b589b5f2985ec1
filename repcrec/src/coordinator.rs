//! The global coordinator (§4.5): advances logical time, dispatches
//! commands to transactions, runs deadlock detection between ticks,
//! retries blocked operations, and handles `fail`/`recover`/`dump`.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace, warn};

use crate::command::{Command, RecordId, SiteId, TxId};
use crate::error::{CResult, Error};
use crate::output::OutputEvent;
use crate::sites::Sites;
use crate::transaction::{Operation, OperationKind, OperationStatus, Transaction, TransactionKind};

const NUM_SITES: SiteId = 10;
const NUM_RECORDS: RecordId = 20;

/// The result of one `tick`: the events produced, plus a fatal error if the
/// command itself was rejected (§7). The events already collected — the
/// `Time` banner, any deadlock resolution — are still meaningful and are
/// returned alongside the error rather than discarded, since logical time
/// and deadlock resolution happen *before* dispatch in the tick protocol.
#[derive(Debug)]
pub struct TickOutcome {
    pub events: Vec<OutputEvent>,
    pub error: Option<Error>,
}

impl TickOutcome {
    fn ok(events: Vec<OutputEvent>) -> Self {
        TickOutcome { events, error: None }
    }

    fn err(events: Vec<OutputEvent>, error: Error) -> Self {
        TickOutcome { events, error: Some(error) }
    }
}

/// One entry in the order operations were submitted, across every
/// transaction — the order the retry pass must honor (§5: "a write that
/// acquires all needed locks can unblock later reads").
#[derive(Debug, Clone)]
struct Submission {
    tx: TxId,
    op_idx: usize,
}

/// Owns every site and every transaction; the single entry point a driver
/// calls once per trace line.
pub struct Coordinator {
    time: u64,
    sites: Sites,
    transactions: BTreeMap<TxId, Transaction>,
    submissions: Vec<Submission>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Coordinator {
            time: 0,
            sites: Sites::new(NUM_SITES, NUM_RECORDS),
            transactions: BTreeMap::new(),
            submissions: Vec::new(),
        }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn transaction(&self, id: &TxId) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    /// Runs one tick of the protocol in §4.5: increment time, resolve
    /// deadlocks (retrying if a victim was aborted), dispatch the command,
    /// then retry every still-pending operation. `Command::Quit` is never
    /// expected to reach here — the driver stops its loop on it before
    /// advancing time — but is handled as a no-op for defensiveness.
    pub fn tick(&mut self, command: Command) -> TickOutcome {
        if command == Command::Quit {
            return TickOutcome::ok(Vec::new());
        }

        self.time += 1;
        let mut events = vec![OutputEvent::Time(self.time)];
        trace!("time advances to {}", self.time);

        if self.resolve_one_deadlock(&mut events) {
            self.retry_pending(&mut events);
        }

        if let Err(e) = self.dispatch(command, &mut events) {
            warn!("fatal: {e}");
            return TickOutcome::err(events, e);
        }

        self.retry_pending(&mut events);
        TickOutcome::ok(events)
    }

    fn dispatch(&mut self, command: Command, events: &mut Vec<OutputEvent>) -> CResult<()> {
        match command {
            Command::Begin(tx) => self.begin(tx, TransactionKind::ReadWrite),
            Command::BeginReadOnly(tx) => self.begin(tx, TransactionKind::ReadOnly),
            Command::Read { tx, record } => self.submit_read(tx, record, events),
            Command::Write { tx, record, value } => self.submit_write(tx, record, value, events),
            Command::End(tx) => self.submit_end(tx, events),
            Command::Dump => {
                self.dump(events);
                Ok(())
            }
            Command::Fail(site) => self.fail(site, events),
            Command::Recover(site) => self.recover(site, events),
            Command::Quit => Ok(()),
        }
    }

    fn begin(&mut self, id: TxId, kind: TransactionKind) -> CResult<()> {
        if self.transactions.contains_key(&id) {
            return Err(Error::DuplicateBegin(id));
        }
        debug!("{id} begins ({kind:?}) at time {}", self.time);
        self.transactions.insert(id.clone(), Transaction::new(id, self.time, kind));
        Ok(())
    }

    /// Looks up a transaction that may still receive `R`/`W`/`end`: known
    /// and not yet `finished` (§7's "unknown or already-completed
    /// transaction" class).
    fn live_transaction(&mut self, id: &TxId) -> CResult<&mut Transaction> {
        match self.transactions.get_mut(id) {
            None => Err(Error::UnknownTransaction(id.clone())),
            Some(tx) if tx.finished => Err(Error::TransactionAlreadyCompleted(id.clone())),
            Some(tx) => Ok(tx),
        }
    }

    fn submit_read(
        &mut self,
        tx_id: TxId,
        record: RecordId,
        events: &mut Vec<OutputEvent>,
    ) -> CResult<()> {
        let tx = self.live_transaction(&tx_id)?;
        let op_idx = tx.operations.len();
        tx.operations.push(Operation::new(OperationKind::Read(record)));
        self.submissions.push(Submission { tx: tx_id.clone(), op_idx });
        let tx = self.transactions.get_mut(&tx_id).expect("just inserted");
        tx.try_complete_read(op_idx, record, &mut self.sites, events);
        if !tx.operations[op_idx].is_completed() {
            debug!("{tx_id} will wait to read x{record}");
        }
        Ok(())
    }

    fn submit_write(
        &mut self,
        tx_id: TxId,
        record: RecordId,
        value: i64,
        events: &mut Vec<OutputEvent>,
    ) -> CResult<()> {
        let tx = self.live_transaction(&tx_id)?;
        if tx.is_read_only() {
            return Err(Error::WriteToReadOnly(tx_id));
        }
        let op_idx = tx.operations.len();
        tx.operations.push(Operation::new(OperationKind::Write(record, value)));
        self.submissions.push(Submission { tx: tx_id.clone(), op_idx });
        let tx = self.transactions.get_mut(&tx_id).expect("just inserted");
        tx.try_complete_write(op_idx, record, value, &mut self.sites, events);
        if !tx.operations[op_idx].is_completed() {
            debug!("{tx_id} will wait to write x{record}");
        }
        Ok(())
    }

    fn submit_end(&mut self, tx_id: TxId, events: &mut Vec<OutputEvent>) -> CResult<()> {
        let tx = self.live_transaction(&tx_id)?;
        if !tx.all_operations_completed() {
            return Err(Error::ProtocolViolation(tx_id));
        }
        let op_idx = tx.operations.len();
        let end_time = self.time;
        tx.operations.push(Operation::new(OperationKind::End(end_time)));
        self.submissions.push(Submission { tx: tx_id.clone(), op_idx });
        let tx = self.transactions.get_mut(&tx_id).expect("just inserted");
        tx.complete_end(op_idx, end_time, &mut self.sites, events);
        Ok(())
    }

    fn dump(&self, events: &mut Vec<OutputEvent>) {
        let lines = self.sites.in_id_order().map(|s| s.dump()).collect();
        events.push(OutputEvent::Dump(lines));
    }

    fn fail(&mut self, site_id: SiteId, events: &mut Vec<OutputEvent>) -> CResult<()> {
        let site = self.sites.get_mut(site_id).ok_or(Error::SiteOutOfRange(site_id))?;
        site.fail(self.time)?;
        events.push(OutputEvent::SiteFails { site: site_id });
        debug!("site {site_id} fails at time {}", self.time);

        for tx in self.transactions.values_mut() {
            if tx.kind == TransactionKind::ReadWrite
                && tx.status == crate::transaction::TransactionStatus::Alive
                && tx.sites_touched.contains(&site_id)
            {
                debug!("{} deferred-aborted: touched failed site {site_id}", tx.id);
                tx.abort_due_to_site_failure();
            }
        }
        Ok(())
    }

    fn recover(&mut self, site_id: SiteId, events: &mut Vec<OutputEvent>) -> CResult<()> {
        let site = self.sites.get_mut(site_id).ok_or(Error::SiteOutOfRange(site_id))?;
        site.recover()?;
        events.push(OutputEvent::SiteRecovers { site: site_id });
        debug!("site {site_id} recovers at time {}", self.time);
        Ok(())
    }

    /// The retry pass (§4.5 step 3 / §5): every operation ever submitted,
    /// in submission order, re-attempted if still `IN_PROGRESS` and its
    /// transaction hasn't finished.
    fn retry_pending(&mut self, events: &mut Vec<OutputEvent>) {
        for submission in self.submissions.clone() {
            let Some(tx) = self.transactions.get(&submission.tx) else { continue };
            if tx.finished {
                continue;
            }
            let Some(op) = tx.operations.get(submission.op_idx) else { continue };
            if op.status == OperationStatus::Completed {
                continue;
            }
            let kind = op.kind;
            let tx = self.transactions.get_mut(&submission.tx).expect("checked above");
            match kind {
                OperationKind::Read(record) => {
                    tx.try_complete_read(submission.op_idx, record, &mut self.sites, events)
                }
                OperationKind::Write(record, value) => tx.try_complete_write(
                    submission.op_idx,
                    record,
                    value,
                    &mut self.sites,
                    events,
                ),
                OperationKind::End(end_time) => {
                    tx.complete_end(submission.op_idx, end_time, &mut self.sites, events)
                }
            }
        }
    }

    /// Deadlock detection (§4.4/§4.5): build the waits-for graph from every
    /// site's lock queues, find every transaction that lies on some cycle,
    /// and abort exactly the youngest (greatest `start_time`; ties broken
    /// by the smaller id, for determinism). Returns whether a victim was
    /// aborted.
    fn resolve_one_deadlock(&mut self, events: &mut Vec<OutputEvent>) -> bool {
        let edges = self.sites.waits_for_edges();
        if edges.is_empty() {
            return false;
        }

        let mut graph: BTreeMap<TxId, Vec<TxId>> = BTreeMap::new();
        for (cur, prev) in &edges {
            graph.entry(cur.clone()).or_default().push(prev.clone());
            graph.entry(prev.clone()).or_default();
        }

        let mut marks: BTreeMap<TxId, Mark> = graph.keys().cloned().map(|k| (k, Mark::White)).collect();
        let mut on_cycle: BTreeSet<TxId> = BTreeSet::new();
        let nodes: Vec<TxId> = graph.keys().cloned().collect();
        for start in nodes {
            if marks[&start] != Mark::White {
                continue;
            }
            let mut stack = Vec::new();
            visit(&start, &graph, &mut marks, &mut stack, &mut on_cycle);
        }

        if on_cycle.is_empty() {
            return false;
        }

        let max_start = on_cycle
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|t| t.start_time))
            .max()
            .expect("on_cycle is non-empty");
        let victim = on_cycle
            .iter()
            .filter(|id| self.transactions.get(*id).map(|t| t.start_time) == Some(max_start))
            .min()
            .cloned()
            .expect("at least one candidate at max_start");

        debug!("deadlock cycle {on_cycle:?}, victim {victim}");
        events.push(OutputEvent::DeadlockDetected);
        if let Some(tx) = self.transactions.get_mut(&victim) {
            tx.abort_deadlocked(&mut self.sites);
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Standard DFS cycle detection with a recursion stack: when we reach a
/// `Gray` node, every node from its position in `stack` onward lies on a
/// cycle.
fn visit(
    node: &TxId,
    graph: &BTreeMap<TxId, Vec<TxId>>,
    marks: &mut BTreeMap<TxId, Mark>,
    stack: &mut Vec<TxId>,
    on_cycle: &mut BTreeSet<TxId>,
) {
    marks.insert(node.clone(), Mark::Gray);
    stack.push(node.clone());
    if let Some(neighbors) = graph.get(node) {
        for next in neighbors {
            match marks.get(next).copied().unwrap_or(Mark::White) {
                Mark::White => visit(next, graph, marks, stack, on_cycle),
                Mark::Gray => {
                    if let Some(pos) = stack.iter().position(|n| n == next) {
                        for n in &stack[pos..] {
                            on_cycle.insert(n.clone());
                        }
                    }
                }
                Mark::Black => {}
            }
        }
    }
    stack.pop();
    marks.insert(node.clone(), Mark::Black);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tx(name: &str) -> TxId {
        TxId(name.to_string())
    }

    fn run(c: &mut Coordinator, cmd: Command) -> Vec<OutputEvent> {
        let outcome = c.tick(cmd);
        assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
        outcome.events
    }

    #[test]
    fn read_own_write_then_commit_and_dump() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Write { tx: tx("T1"), record: 1, value: 101 });
        let events = run(&mut c, Command::Read { tx: tx("T1"), record: 1 });
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Read { value: 101, .. })));
        let events = run(&mut c, Command::End(tx("T1")));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Commits { .. })));
        let events = run(&mut c, Command::Dump);
        let OutputEvent::Dump(lines) = &events[1] else { panic!("expected dump") };
        // x1 is odd, holder site = 1 + (1 % 10) = 2.
        assert!(lines[1].contains("x1:101"));
    }

    #[test]
    fn available_copies_read_after_failure() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Write { tx: tx("T1"), record: 2, value: 22 });
        run(&mut c, Command::End(tx("T1")));
        run(&mut c, Command::Fail(3));
        run(&mut c, Command::Begin(tx("T2")));
        let events = run(&mut c, Command::Read { tx: tx("T2"), record: 2 });
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Read { value: 22, .. })));
        run(&mut c, Command::End(tx("T2")));
    }

    #[test]
    fn replicated_read_waits_for_recovery_commit() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Write { tx: tx("T1"), record: 4, value: 400 });
        run(&mut c, Command::End(tx("T1")));
        run(&mut c, Command::Fail(1));
        run(&mut c, Command::Recover(1));
        run(&mut c, Command::Begin(tx("T2")));
        let events = run(&mut c, Command::Read { tx: tx("T2"), record: 4 });
        // site 1 hasn't recovered x4 yet, so T2 must read from elsewhere.
        let read = events.iter().find_map(|e| match e {
            OutputEvent::Read { site, value, .. } => Some((*site, *value)),
            _ => None,
        });
        assert_eq!(read, Some((2, 400)));

        run(&mut c, Command::Begin(tx("T3")));
        run(&mut c, Command::Write { tx: tx("T3"), record: 4, value: 401 });
        run(&mut c, Command::End(tx("T3")));
        assert!(c.sites.get(1).unwrap().is_read_ok_for_rw(4, &tx("anyone")));
    }

    #[test]
    fn deadlock_aborts_the_youngest_participant() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Begin(tx("T2")));
        run(&mut c, Command::Write { tx: tx("T1"), record: 1, value: 1 });
        run(&mut c, Command::Write { tx: tx("T2"), record: 2, value: 2 });
        run(&mut c, Command::Read { tx: tx("T1"), record: 2 });
        // The cycle only completes once this dispatch adds T2's waits-for
        // edge; detection happens in the *next* tick's step 1, before that
        // tick's own command dispatches.
        run(&mut c, Command::Read { tx: tx("T2"), record: 1 });

        // `end(T1)`'s tick now finds the completed cycle in step 1, aborts
        // the younger T2, and — since retry reruns after that abort — T1's
        // still-blocked read on x2 unblocks in time for `end(T1)` itself to
        // see every operation completed and commit in this same tick.
        let events = run(&mut c, Command::End(tx("T1")));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::DeadlockDetected)));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Commits { .. })));
        assert!(c.transaction(&tx("T2")).unwrap().deadlocked);

        let events = run(&mut c, Command::End(tx("T2")));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::AbortedDueToDeadlock { .. })));
    }

    #[test]
    fn site_failure_abort_when_toucher_matches() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Read { tx: tx("T1"), record: 2 });
        // site 1 is first in id order and live, so T1 reads x2 there.
        run(&mut c, Command::Fail(1));
        let events = run(&mut c, Command::End(tx("T1")));
        assert!(events.iter().any(|e| matches!(e, OutputEvent::AbortsDueToSiteFailure { .. })));
    }

    #[test]
    fn snapshot_read_stability_for_read_only() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        run(&mut c, Command::Write { tx: tx("T1"), record: 2, value: 50 });
        run(&mut c, Command::End(tx("T1")));
        run(&mut c, Command::BeginReadOnly(tx("U")));
        run(&mut c, Command::Begin(tx("T2")));
        run(&mut c, Command::Write { tx: tx("T2"), record: 2, value: 60 });
        run(&mut c, Command::End(tx("T2")));
        let events = run(&mut c, Command::Read { tx: tx("U"), record: 2 });
        assert!(events.iter().any(|e| matches!(e, OutputEvent::Read { value: 50, .. })));
        run(&mut c, Command::End(tx("U")));
    }

    #[test]
    fn duplicate_begin_is_fatal() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Begin(tx("T1")));
        let outcome = c.tick(Command::Begin(tx("T1")));
        assert_eq!(outcome.error, Some(Error::DuplicateBegin(tx("T1"))));
        // the Time banner for this tick is still present.
        assert!(matches!(outcome.events[0], OutputEvent::Time(_)));
    }

    #[test]
    fn unknown_transaction_is_fatal() {
        let mut c = Coordinator::new();
        let outcome = c.tick(Command::Read { tx: tx("ghost"), record: 1 });
        assert_eq!(outcome.error, Some(Error::UnknownTransaction(tx("ghost"))));
    }

    #[test]
    fn write_to_read_only_is_fatal() {
        let mut c = Coordinator::new();
        run(&mut c, Command::BeginReadOnly(tx("U")));
        let outcome = c.tick(Command::Write { tx: tx("U"), record: 1, value: 1 });
        assert_eq!(outcome.error, Some(Error::WriteToReadOnly(tx("U"))));
    }

    #[test]
    fn double_fail_is_fatal() {
        let mut c = Coordinator::new();
        run(&mut c, Command::Fail(1));
        let outcome = c.tick(Command::Fail(1));
        assert_eq!(outcome.error, Some(Error::SiteAlreadyFailed(1)));
    }

    #[test]
    fn recover_while_live_is_fatal() {
        let mut c = Coordinator::new();
        let outcome = c.tick(Command::Recover(1));
        assert_eq!(outcome.error, Some(Error::SiteAlreadyLive(1)));
    }

    #[test]
    fn quit_is_a_no_op_and_does_not_advance_time() {
        let mut c = Coordinator::new();
        let outcome = c.tick(Command::Quit);
        assert!(outcome.events.is_empty());
        assert_eq!(c.time(), 0);
    }
}
