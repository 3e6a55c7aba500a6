mod clock;
pub mod generator;
mod worker;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mmu::MemoryManager;
use process::Process;
use types::{instruction::unrolled_total, Config, Instruction};

/// Real-time length of one simulation tick.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// State shared by the clock, the workers, the generator, and the shell.
pub(crate) struct Core {
    pub config: Config,
    pub memory: Arc<MemoryManager>,
    pub ready: Mutex<VecDeque<Arc<Process>>>,
    pub ready_cv: Condvar,
    pub fault_wait: Mutex<VecDeque<Arc<Process>>>,
    pub processes: Mutex<Vec<Arc<Process>>>,
    pub cpu_tick: AtomicU64,
    pub active_ticks: AtomicU64,
    pub next_pid: AtomicU32,
    pub running: AtomicBool,
    pub generating: AtomicBool,
    pub shutting_down: AtomicBool,
    pub cores_in_use: AtomicUsize,
}

/// Multi-core dispatcher over the paged memory subsystem.
///
/// Owns one clock thread (ticks every ~100 ms, drains fault-parked processes
/// back to the ready queue), `num_cpu` worker threads (condvar dispatch,
/// FCFS or round-robin), and an optional generator thread. Process handles
/// are `Arc<Process>`; the scheduler lends them to workers and the shell but
/// keeps the registry.
pub struct Scheduler {
    core: Arc<Core>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    generator: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Apply the configuration and spin up the clock and worker threads.
    /// Dispatch begins immediately; `start_generation` only controls the
    /// synthetic process feed.
    pub fn start(config: Config, memory: Arc<MemoryManager>) -> Self {
        let core = Arc::new(Core {
            config,
            memory,
            ready: Mutex::new(VecDeque::new()),
            ready_cv: Condvar::new(),
            fault_wait: Mutex::new(VecDeque::new()),
            processes: Mutex::new(Vec::new()),
            cpu_tick: AtomicU64::new(0),
            active_ticks: AtomicU64::new(0),
            next_pid: AtomicU32::new(1),
            running: AtomicBool::new(true),
            generating: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            cores_in_use: AtomicUsize::new(0),
        });

        let mut threads = Vec::with_capacity(core.config.num_cpu + 1);
        let clock_core = Arc::clone(&core);
        threads.push(thread::spawn(move || clock::clock_loop(clock_core)));
        for core_id in 0..core.config.num_cpu {
            let worker_core = Arc::clone(&core);
            threads.push(thread::spawn(move || {
                worker::worker_loop(worker_core, core_id)
            }));
        }
        log::info!(
            "scheduler started: {} cores, {:?}",
            core.config.num_cpu,
            core.config.scheduler
        );

        Self {
            core,
            threads: Mutex::new(threads),
            generator: Mutex::new(None),
        }
    }

    /// Create and enqueue a process. `program = None` draws a random program
    /// from the generator tables.
    pub fn submit(
        &self,
        name: &str,
        memory_size: usize,
        program: Option<Vec<Instruction>>,
    ) -> Arc<Process> {
        let (program, total) = match program {
            Some(program) => {
                let total = unrolled_total(&program);
                (program, total)
            }
            None => generator::generate_program(&self.core.config, &mut rand::thread_rng()),
        };
        submit_program(&self.core, Some(name), memory_size, program, total)
    }

    /// Begin feeding synthetic processes every `batch_process_freq` ticks.
    pub fn start_generation(&self) {
        let mut slot = self.generator.lock().unwrap();
        if self.core.generating.load(Ordering::SeqCst) {
            return;
        }
        // Reap a generator from an earlier start/stop cycle before re-arming
        // the flag, so the old thread cannot latch onto the new run.
        if let Some(handle) = slot.take() {
            let _ = handle.join();
        }
        self.core.generating.store(true, Ordering::SeqCst);
        let core = Arc::clone(&self.core);
        *slot = Some(thread::spawn(move || generator::generator_loop(core)));
    }

    pub fn stop_generation(&self) {
        self.core.generating.store(false, Ordering::SeqCst);
    }

    pub fn is_generating(&self) -> bool {
        self.core.generating.load(Ordering::SeqCst)
    }

    pub fn find_process(&self, name: &str) -> Option<Arc<Process>> {
        self.core
            .processes
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    pub fn all_processes(&self) -> Vec<Arc<Process>> {
        self.core.processes.lock().unwrap().clone()
    }

    pub fn running_processes(&self) -> Vec<Arc<Process>> {
        self.core
            .processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.is_finished())
            .cloned()
            .collect()
    }

    pub fn finished_processes(&self) -> Vec<Arc<Process>> {
        self.core
            .processes
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.is_finished())
            .cloned()
            .collect()
    }

    pub fn cores_used(&self) -> usize {
        self.core.cores_in_use.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.core.memory
    }

    pub fn cpu_tick(&self) -> u64 {
        self.core.cpu_tick.load(Ordering::SeqCst)
    }

    /// Tick budget across all cores since start.
    pub fn total_ticks(&self) -> u64 {
        self.cpu_tick() * self.core.config.num_cpu as u64
    }

    /// Ticks a worker spent attempting instructions.
    pub fn active_ticks(&self) -> u64 {
        self.core.active_ticks.load(Ordering::SeqCst)
    }

    /// Stop the clock, generator, and workers, and join them all. Idempotent.
    pub fn shutdown(&self) {
        if self.core.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.generating.store(false, Ordering::SeqCst);
        self.core.ready_cv.notify_all();
        log::info!("scheduler shutting down");
        if let Some(handle) = self.generator.lock().unwrap().take() {
            let _ = handle.join();
        }
        for handle in self.threads.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Registry + MMU + ready-queue insertion shared by `submit` and the
/// generator thread. The pid is claimed here, in one atomic step; a process
/// submitted without a name is named `p<pid>` from that same claim, so the
/// two can never disagree even with the shell submitting concurrently.
pub(crate) fn submit_program(
    core: &Core,
    name: Option<&str>,
    memory_size: usize,
    program: Vec<Instruction>,
    total_instructions: usize,
) -> Arc<Process> {
    let pid = core.next_pid.fetch_add(1, Ordering::SeqCst);
    let name = match name {
        Some(name) => name.to_string(),
        None => format!("p{pid}"),
    };
    let process = Arc::new(Process::new(
        pid,
        name,
        program,
        total_instructions,
        memory_size,
    ));
    core.memory.register_process(pid, memory_size);
    core.processes.lock().unwrap().push(Arc::clone(&process));
    core.ready.lock().unwrap().push_back(Arc::clone(&process));
    core.ready_cv.notify_one();
    log::info!(
        "created pid={pid} name={} memory_size={memory_size} instructions={total_instructions}",
        process.name()
    );
    process
}
