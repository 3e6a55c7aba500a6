/// Dispatch policy for the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAlgorithm {
    Fcfs,
    Rr,
}

/// Emulator configuration, loaded from a key/value text file by the shell.
/// Defaults match an unconfigured system.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_cpu: usize,
    pub scheduler: SchedulerAlgorithm,
    /// RR preemption budget, counted in instructions retired per dispatch.
    pub quantum_cycles: u64,
    /// Ticks between auto-generated processes. Zero disables the generator.
    pub batch_process_freq: u64,
    pub min_ins: usize,
    pub max_ins: usize,
    /// Ticks of post-instruction cool-down.
    pub delay_per_exec: u64,
    pub max_overall_mem: usize,
    pub mem_per_frame: usize,
    pub min_mem_per_proc: usize,
    pub max_mem_per_proc: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_cpu: 1,
            scheduler: SchedulerAlgorithm::Fcfs,
            quantum_cycles: 10,
            batch_process_freq: 100,
            min_ins: 100,
            max_ins: 500,
            delay_per_exec: 0,
            max_overall_mem: 16384,
            mem_per_frame: 256,
            min_mem_per_proc: 1024,
            max_mem_per_proc: 4096,
        }
    }
}

/// Smallest accepted per-process memory size in bytes.
pub const MIN_PROC_MEMORY: usize = 64;
/// Largest accepted per-process memory size in bytes.
pub const MAX_PROC_MEMORY: usize = 65536;

/// Accepted sizes are powers of two in `[MIN_PROC_MEMORY, MAX_PROC_MEMORY]`.
pub fn is_valid_memory_size(size: usize) -> bool {
    size.is_power_of_two() && (MIN_PROC_MEMORY..=MAX_PROC_MEMORY).contains(&size)
}
