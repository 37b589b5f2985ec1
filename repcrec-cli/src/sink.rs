//! A `repcrec::output::OutputSink` that prints to standard output, with
//! ANSI highlighting for deadlock/abort lines — the rendering layer the
//! core's design notes call out as a pure collaborator (§9).

use colored::Colorize;
use repcrec::output::{OutputEvent, OutputSink};

/// Prints every event's rendered line to stdout, coloring the ones
/// `OutputEvent::is_noteworthy` flags (deadlocks, aborts) yellow unless
/// `color` is disabled (`--no-color`, or stdout isn't a terminal).
pub struct TerminalSink {
    color: bool,
}

impl TerminalSink {
    pub fn new(color: bool) -> Self {
        TerminalSink { color }
    }
}

impl OutputSink for TerminalSink {
    fn emit(&mut self, event: OutputEvent) {
        let rendered = event.render();
        if self.color && event.is_noteworthy() {
            println!("{}", rendered.yellow());
        } else {
            println!("{rendered}");
        }
    }
}
