//! Thin interactive adapter over the scheduler core: configuration loading,
//! user-program parsing, and report rendering. The `csopesy` binary wires
//! these into a REPL.

pub mod config_file;
pub mod program_parser;
pub mod report;
