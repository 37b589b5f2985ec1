//! Structured output events and their rendering to the exact wording of
//! §6. The core never calls `println!` directly — it pushes `OutputEvent`s
//! onto whatever `OutputSink` the caller configured. This is what keeps
//! "formatting of human-readable log lines" a collaborator the core
//! merely calls, not something baked into the concurrency logic (§9).

use crate::command::{RecordId, SiteId, TxId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Opening banner for a tick.
    Time(u64),
    Read { tx: TxId, record: RecordId, site: SiteId, value: i64 },
    Wrote { tx: TxId, record: RecordId, value: i64, sites: Vec<SiteId> },
    Commits { tx: TxId },
    AbortsDueToSiteFailure { tx: TxId },
    AbortedDueToDeadlock { tx: TxId },
    SiteFails { site: SiteId },
    SiteRecovers { site: SiteId },
    DeadlockDetected,
    /// One already-rendered `Site s: x1:v1 ...` line per site, in id order.
    Dump(Vec<String>),
}

impl OutputEvent {
    /// Renders the event to the exact text mandated by §6. This is the
    /// only place that wording lives.
    pub fn render(&self) -> String {
        match self {
            OutputEvent::Time(t) => format!("---------- Time={t} ----------"),
            OutputEvent::Read { tx, record, site, value } => {
                format!("{tx} reads x{record}.{site} => {value}")
            }
            OutputEvent::Wrote { tx, record, value, sites } => {
                let sites = sites.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                format!("{tx} wrote {value} to x{record} in sites-[{sites}]")
            }
            OutputEvent::Commits { tx } => format!("{tx} commits."),
            OutputEvent::AbortsDueToSiteFailure { tx } => {
                format!("{tx} aborts due to a site failure.")
            }
            OutputEvent::AbortedDueToDeadlock { tx } => {
                format!("{tx} was aborted due to a deadlock")
            }
            OutputEvent::SiteFails { site } => format!("Site-{site} fails"),
            OutputEvent::SiteRecovers { site } => format!("Site-{site} recovers"),
            OutputEvent::DeadlockDetected => "Deadlock Detected".to_string(),
            OutputEvent::Dump(lines) => lines.join("\n"),
        }
    }

    /// Whether this event is a problem worth visually distinguishing
    /// (deadlocks and aborts) — used by the driver's colored sink, never
    /// by the core's own rendering.
    pub fn is_noteworthy(&self) -> bool {
        matches!(
            self,
            OutputEvent::DeadlockDetected
                | OutputEvent::AbortedDueToDeadlock { .. }
                | OutputEvent::AbortsDueToSiteFailure { .. }
        )
    }
}

/// Where rendered events go. The coordinator is generic over this so tests
/// can substitute `RecordingSink` for a real stdout stream.
pub trait OutputSink {
    fn emit(&mut self, event: OutputEvent);
}

/// Prints every event's rendering to standard output, one line per event
/// (a `Dump` event is several lines joined, matching §6's one-line-per-site
/// convention).
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, event: OutputEvent) {
        println!("{}", event.render());
    }
}

/// Collects events verbatim, for assertions against structured data rather
/// than strings.
#[derive(Debug, Default)]
pub struct RecordingSink(pub Vec<OutputEvent>);

impl OutputSink for RecordingSink {
    fn emit(&mut self, event: OutputEvent) {
        self.0.push(event);
    }
}
