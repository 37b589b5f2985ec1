//! The command-line driver (§10): reads a trace line by line, wires the
//! parser and coordinator together through the tick protocol, and owns the
//! process exit code. The core library never calls `std::process::exit` —
//! this is the only place that happens.

use std::io::BufRead;

use log::debug;
use repcrec::coordinator::Coordinator;
use repcrec::output::OutputSink;

use crate::parser::{parse_line, ParseError};

/// What happened after running a whole trace to completion or to its first
/// fatal error. The driver binary turns this into an exit code; tests
/// inspect it directly.
#[derive(Debug)]
pub enum RunOutcome {
    /// Reached EOF or `quit` without any fatal error.
    Finished,
    /// The parser rejected a line before it ever reached the coordinator.
    ParseFailed(ParseError),
    /// The coordinator rejected an otherwise well-formed command.
    CoordinatorFailed(repcrec::error::Error),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Finished)
    }
}

/// Runs every line of `reader` through the tick protocol, rendering events
/// to `sink` as they're produced. Stops at `quit`, EOF, or the first fatal
/// error — matching §4.5's "if input is the literal 'quit', terminate" and
/// §7's fatal-error contract.
pub fn run<R: BufRead, S: OutputSink>(reader: R, sink: &mut S) -> RunOutcome {
    let mut coordinator = Coordinator::new();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };

        let command = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => command,
            Err(e) => return RunOutcome::ParseFailed(e),
        };

        if command == repcrec::command::Command::Quit {
            debug!("quit received, stopping before time advances");
            return RunOutcome::Finished;
        }

        let outcome = coordinator.tick(command);
        for event in outcome.events {
            sink.emit(event);
        }
        if let Some(error) = outcome.error {
            return RunOutcome::CoordinatorFailed(error);
        }
    }

    RunOutcome::Finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use repcrec::output::RecordingSink;
    use std::io::Cursor;

    fn run_trace(trace: &str) -> (RunOutcome, Vec<repcrec::output::OutputEvent>) {
        let mut sink = RecordingSink::default();
        let outcome = run(Cursor::new(trace), &mut sink);
        (outcome, sink.0)
    }

    #[test]
    fn runs_a_full_trace_and_stops_at_quit() {
        let (outcome, events) = run_trace(
            "begin(T1)\nW(T1,x1,101)\nR(T1,x1)\nend(T1)\ndump()\nquit\nR(T1,x1)\n",
        );
        assert!(outcome.is_success());
        // the line after `quit` must never be reached.
        assert!(events.len() < 20);
    }

    #[test]
    fn stops_with_parse_failure_on_bad_grammar() {
        let (outcome, _events) = run_trace("begin(T1)\nbogus-line\n");
        assert!(matches!(outcome, RunOutcome::ParseFailed(_)));
    }

    #[test]
    fn stops_with_coordinator_failure_on_duplicate_begin() {
        let (outcome, _events) = run_trace("begin(T1)\nbegin(T1)\n");
        assert!(matches!(outcome, RunOutcome::CoordinatorFailed(_)));
    }

    #[test]
    fn blank_and_comment_lines_do_not_advance_time() {
        let (outcome, events) = run_trace("\n// just a comment\nbegin(T1)\nend(T1)\n");
        assert!(outcome.is_success());
        let time_events =
            events.iter().filter(|e| matches!(e, repcrec::output::OutputEvent::Time(_))).count();
        assert_eq!(time_events, 2);
    }
}
