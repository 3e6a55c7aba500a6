mod interpreter;
mod process;

pub use process::{Process, ProcessStatus, Violation, NO_CORE};
