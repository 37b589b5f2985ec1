//! `repcrec-cli` is the driver crate for the RepCReC simulator (§10): the
//! line parser, process configuration, logging setup, terminal output
//! rendering, and the tick loop that wires the parser and
//! `repcrec::coordinator::Coordinator` together. The core simulator lives
//! in the `repcrec` crate; this crate owns everything text-format and
//! process-shaped.

pub mod config;
pub mod driver;
pub mod logging;
pub mod parser;
pub mod sink;
