use std::sync::atomic::Ordering;

use mmu::{Access, MemoryManager};
use types::{Instruction, Value};

use crate::process::{now_string, Process, ProcessData};

/// Why an instruction stopped before completing.
enum Interrupt {
    /// Absent page at this address. The instruction made no externally
    /// visible progress and re-executes from the start after page-in.
    PageFault(i32),
    /// Address outside the process's space. Terminal.
    Violation(i32),
}

type Exec<T> = Result<T, Interrupt>;

impl Process {
    /// Execute one instruction on `core` at time `tick`.
    ///
    /// No-ops while finished or sleeping. Otherwise clears the fault flag,
    /// runs the instruction at `ip` under the data lock, and advances `ip`
    /// only when the instruction completed: a page fault leaves `ip` where
    /// it was and raises the fault flag for the worker, and a violation
    /// terminates the process on the spot. The post-instruction delay, like
    /// the advance, applies only on successful retirement.
    pub fn execute_instruction(
        &self,
        memory: &MemoryManager,
        core: usize,
        tick: u64,
        delay_per_exec: u64,
    ) {
        if self.is_finished() || self.is_sleeping(tick) {
            return;
        }
        let mut data = self.data.lock().unwrap();
        let ip = self.ip.load(Ordering::SeqCst);
        if ip >= data.program.len() {
            self.finished.store(true, Ordering::SeqCst);
            return;
        }

        self.fault_pending.store(false, Ordering::SeqCst);
        let instruction = data.program[ip].clone();
        match self.run(&mut data, &instruction, memory, core, tick) {
            Err(Interrupt::PageFault(address)) => {
                self.faulting_address.store(address, Ordering::SeqCst);
                self.fault_pending.store(true, Ordering::SeqCst);
            }
            Err(Interrupt::Violation(address)) => {
                self.record_violation(&mut data, address);
            }
            Ok(()) => {
                let next = ip + 1;
                self.ip.store(next, Ordering::SeqCst);
                if delay_per_exec > 0 {
                    self.sleep_until_tick
                        .store(tick + delay_per_exec, Ordering::SeqCst);
                }
                if next >= data.program.len() {
                    self.finished.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    fn run(
        &self,
        data: &mut ProcessData,
        instruction: &Instruction,
        memory: &MemoryManager,
        core: usize,
        tick: u64,
    ) -> Exec<()> {
        match instruction {
            Instruction::Print(args) => {
                let message = if args.is_empty() {
                    format!("Hello from {}", self.name())
                } else {
                    let mut message = String::new();
                    for arg in args {
                        match arg {
                            // Unknown symbols print as their own text;
                            // everything else prints its resolved value.
                            Value::Symbol(name) if data.slot_of(name).is_none() => {
                                message.push_str(name);
                            }
                            value => {
                                let v = self.resolve(data, value, memory)?;
                                message.push_str(&v.to_string());
                            }
                        }
                    }
                    message
                };
                data.push_log(format!("({}) Core {}: {}", now_string(), core, message));
            }
            Instruction::Declare { var, value } => {
                let Some(slot) = data.ensure_slot(var) else {
                    // Symbol region full: the declaration is dropped whole.
                    return Ok(());
                };
                let value = self.resolve(data, value, memory)?;
                self.store(memory, slot, value)?;
            }
            Instruction::Add { dest, lhs, rhs } => {
                let lhs = self.resolve(data, lhs, memory)?;
                let rhs = self.resolve(data, rhs, memory)?;
                let sum = (u32::from(lhs) + u32::from(rhs)).min(u32::from(u16::MAX)) as u16;
                if let Some(slot) = data.ensure_slot(dest) {
                    self.store(memory, slot, sum)?;
                }
            }
            Instruction::Subtract { dest, lhs, rhs } => {
                let lhs = self.resolve(data, lhs, memory)?;
                let rhs = self.resolve(data, rhs, memory)?;
                let difference = (i32::from(lhs) - i32::from(rhs)).max(0) as u16;
                if let Some(slot) = data.ensure_slot(dest) {
                    self.store(memory, slot, difference)?;
                }
            }
            Instruction::Sleep(value) => {
                let ticks = self.resolve(data, value, memory)?;
                self.sleep_until_tick
                    .store(tick + u64::from(ticks), Ordering::SeqCst);
            }
            Instruction::For { block, repeats } => {
                // Unroll in place: the repeated block lands right after this
                // instruction, and the FOR itself retires normally.
                let at = self.ip.load(Ordering::SeqCst) + 1;
                let mut unrolled = Vec::with_capacity(block.len() * usize::from(*repeats));
                for _ in 0..*repeats {
                    unrolled.extend_from_slice(block);
                }
                data.program.splice(at..at, unrolled);
            }
            Instruction::Read { var, addr } => {
                let value = self.load(memory, *addr)?;
                if let Some(slot) = data.ensure_slot(var) {
                    self.store(memory, slot, value)?;
                }
            }
            Instruction::Write { addr, value } => {
                let value = self.resolve(data, value, memory)?;
                self.store(memory, *addr, value)?;
            }
        }
        Ok(())
    }

    /// Literal -> itself; raw address -> 2-byte read there; declared symbol
    /// -> 2-byte read at its slot; undeclared symbol -> 0 without allocating.
    fn resolve(&self, data: &ProcessData, value: &Value, memory: &MemoryManager) -> Exec<u16> {
        match value {
            Value::Literal(v) => Ok(*v),
            Value::Address(addr) => self.load(memory, *addr),
            Value::Symbol(name) => match data.slot_of(name) {
                Some(slot) => self.load(memory, slot),
                None => Ok(0),
            },
        }
    }

    fn load(&self, memory: &MemoryManager, addr: i32) -> Exec<u16> {
        match memory.read_u16(self.pid(), addr) {
            Access::Hit(v) => Ok(v),
            Access::Fault(absent) => Err(Interrupt::PageFault(absent)),
            Access::Violation => Err(Interrupt::Violation(addr)),
        }
    }

    fn store(&self, memory: &MemoryManager, addr: i32, value: u16) -> Exec<()> {
        match memory.write_u16(self.pid(), addr, value) {
            Access::Hit(()) => Ok(()),
            Access::Fault(absent) => Err(Interrupt::PageFault(absent)),
            Access::Violation => Err(Interrupt::Violation(addr)),
        }
    }
}
