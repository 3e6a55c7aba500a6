use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use types::{Instruction, SYMBOL_TABLE_SIZE};

/// Core slot sentinel for "not assigned to any core".
pub const NO_CORE: i32 = -1;

/// Terminal record of an out-of-range memory access.
#[derive(Debug, Clone)]
pub struct Violation {
    pub address: i32,
    pub at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Ready,
    Finished,
    MemFault,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Running => "Running",
            ProcessStatus::Ready => "Waiting/Ready",
            ProcessStatus::Finished => "Finished",
            ProcessStatus::MemFault => "MEM_FAULT",
        };
        write!(f, "{s}")
    }
}

/// One synthetic process.
///
/// Shared by the scheduler queues, the workers, and the shell as
/// `Arc<Process>`; all mutation happens through interior synchronization.
/// Control flags the workers poll between instructions are atomics; the
/// program, symbol table, logs, and violation record live behind one data
/// mutex, and `ip` only advances while that mutex is held.
pub struct Process {
    pid: u32,
    name: String,
    created_at: DateTime<Local>,
    memory_size: usize,
    /// Fully-unrolled static instruction count, fixed at creation. Runtime
    /// FOR expansion grows the program vector but never this number.
    total_instructions: usize,
    pub(crate) ip: AtomicUsize,
    pub(crate) finished: AtomicBool,
    pub(crate) fault_pending: AtomicBool,
    pub(crate) faulting_address: AtomicI32,
    pub(crate) sleep_until_tick: AtomicU64,
    core: AtomicI32,
    pub(crate) data: Mutex<ProcessData>,
}

pub(crate) struct ProcessData {
    /// Process-private program. Mutated only by FOR unrolling, which splices
    /// the repeated block in at `ip + 1` while this lock is held.
    pub program: Vec<Instruction>,
    symbols: HashMap<String, u16>,
    next_slot: u16,
    logs: Vec<String>,
    pub violation: Option<Violation>,
}

impl ProcessData {
    /// Byte offset of `var`, if declared.
    pub fn slot_of(&self, var: &str) -> Option<i32> {
        self.symbols.get(var).map(|&slot| i32::from(slot))
    }

    /// Offset of `var`, allocating the next free 2-byte slot for a new name.
    /// `None` when the symbol region is full; the caller drops the store.
    pub fn ensure_slot(&mut self, var: &str) -> Option<i32> {
        if let Some(&slot) = self.symbols.get(var) {
            return Some(i32::from(slot));
        }
        if usize::from(self.next_slot) + 2 > SYMBOL_TABLE_SIZE {
            return None;
        }
        let slot = self.next_slot;
        self.next_slot += 2;
        self.symbols.insert(var.to_string(), slot);
        Some(i32::from(slot))
    }

    pub fn push_log(&mut self, line: String) {
        self.logs.push(line);
    }
}

impl Process {
    pub fn new(
        pid: u32,
        name: impl Into<String>,
        program: Vec<Instruction>,
        total_instructions: usize,
        memory_size: usize,
    ) -> Self {
        Self {
            pid,
            name: name.into(),
            created_at: Local::now(),
            memory_size,
            total_instructions,
            ip: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            fault_pending: AtomicBool::new(false),
            faulting_address: AtomicI32::new(0),
            sleep_until_tick: AtomicU64::new(0),
            core: AtomicI32::new(NO_CORE),
            data: Mutex::new(ProcessData {
                program,
                symbols: HashMap::new(),
                next_slot: 0,
                logs: Vec::new(),
                violation: None,
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    pub fn total_instructions(&self) -> usize {
        self.total_instructions
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn creation_timestamp(&self) -> String {
        format_timestamp(self.created_at)
    }

    /// Instructions retired so far.
    pub fn executed_count(&self) -> usize {
        self.ip.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn is_sleeping(&self, tick: u64) -> bool {
        self.sleep_until_tick.load(Ordering::SeqCst) > tick
    }

    /// True when the last attempt hit an absent page and the process is
    /// waiting for fault service.
    pub fn fault_pending(&self) -> bool {
        self.fault_pending.load(Ordering::SeqCst)
    }

    pub fn faulting_address(&self) -> i32 {
        self.faulting_address.load(Ordering::SeqCst)
    }

    pub fn core(&self) -> i32 {
        self.core.load(Ordering::SeqCst)
    }

    pub fn set_core(&self, core: i32) {
        self.core.store(core, Ordering::SeqCst);
    }

    pub fn status(&self) -> ProcessStatus {
        if self.is_finished() {
            if self.data.lock().unwrap().violation.is_some() {
                ProcessStatus::MemFault
            } else {
                ProcessStatus::Finished
            }
        } else if self.core() != NO_CORE {
            ProcessStatus::Running
        } else {
            ProcessStatus::Ready
        }
    }

    pub fn logs(&self) -> Vec<String> {
        self.data.lock().unwrap().logs.clone()
    }

    pub fn violation(&self) -> Option<Violation> {
        self.data.lock().unwrap().violation.clone()
    }

    pub(crate) fn record_violation(&self, data: &mut ProcessData, address: i32) {
        if data.violation.is_none() {
            data.violation = Some(Violation {
                address,
                at: Local::now(),
            });
            data.push_log(format!(
                "FATAL: memory access violation at {address:#06x}. Process terminated."
            ));
        }
        self.finished.store(true, Ordering::SeqCst);
        log::warn!(
            "pid={} name={} memory violation at {address:#06x}",
            self.pid,
            self.name
        );
    }
}

pub(crate) fn format_timestamp(t: DateTime<Local>) -> String {
    t.format("%m/%d/%Y, %I:%M:%S %p").to_string()
}

pub(crate) fn now_string() -> String {
    format_timestamp(Local::now())
}
