use std::sync::atomic::Ordering;
use std::sync::Arc;

use process::NO_CORE;
use types::SchedulerAlgorithm;

use crate::Core;

/// One CPU core. Pops a ready process, runs it one instruction per tick
/// until it finishes, sleeps, faults, or exhausts its quantum, then hands it
/// back to the right queue.
pub(crate) fn worker_loop(core: Arc<Core>, core_id: usize) {
    while !core.shutting_down.load(Ordering::SeqCst) {
        let current = {
            let ready = core.ready.lock().unwrap();
            let mut ready = core
                .ready_cv
                .wait_while(ready, |queue| {
                    !(core.shutting_down.load(Ordering::SeqCst)
                        || (core.running.load(Ordering::SeqCst) && !queue.is_empty()))
                })
                .unwrap();
            if core.shutting_down.load(Ordering::SeqCst) {
                break;
            }
            match ready.pop_front() {
                Some(process) => process,
                None => continue,
            }
        };

        core.cores_in_use.fetch_add(1, Ordering::SeqCst);
        current.set_core(core_id as i32);

        let quantum = match core.config.scheduler {
            SchedulerAlgorithm::Rr => Some(core.config.quantum_cycles),
            SchedulerAlgorithm::Fcfs => None,
        };
        // Retirements this dispatch; a faulted attempt does not count.
        let mut retired: u64 = 0;
        let mut fault_parked = false;

        while !current.is_finished() && !core.shutting_down.load(Ordering::SeqCst) {
            let tick = core.cpu_tick.load(Ordering::SeqCst);
            if current.is_sleeping(tick) {
                break;
            }
            core.active_ticks.fetch_add(1, Ordering::SeqCst);
            current.execute_instruction(&core.memory, core_id, tick, core.config.delay_per_exec);

            if current.fault_pending() {
                let page = current.faulting_address().max(0) as usize / core.config.mem_per_frame;
                if let Err(err) = core.memory.handle_page_fault(current.pid(), page) {
                    // The backing store is gone; the environment is broken.
                    log::error!("backing store I/O failure: {err}");
                    std::process::abort();
                }
                core.fault_wait.lock().unwrap().push_back(Arc::clone(&current));
                fault_parked = true;
                break;
            }

            retired += 1;
            if quantum.is_some_and(|q| retired >= q) {
                break;
            }
        }

        current.set_core(NO_CORE);
        core.cores_in_use.fetch_sub(1, Ordering::SeqCst);

        if current.is_finished() {
            core.memory.release_process(current.pid());
        } else if !fault_parked && !core.shutting_down.load(Ordering::SeqCst) {
            core.ready.lock().unwrap().push_back(current);
        }
        core.ready_cv.notify_one();
    }
}
