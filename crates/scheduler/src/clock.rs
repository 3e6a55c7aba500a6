use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::{Core, TICK_INTERVAL};

/// Clock task: the simulation's only time base.
///
/// Each iteration advances `cpu_tick` by exactly one, moves every
/// fault-parked process back to the ready queue in the order it parked, and
/// wakes the workers.
pub(crate) fn clock_loop(core: Arc<Core>) {
    while !core.shutting_down.load(Ordering::SeqCst) {
        if core.running.load(Ordering::SeqCst) {
            core.cpu_tick.fetch_add(1, Ordering::SeqCst);
            {
                let mut parked = core.fault_wait.lock().unwrap();
                let mut ready = core.ready.lock().unwrap();
                while let Some(process) = parked.pop_front() {
                    ready.push_back(process);
                }
            }
            core.ready_cv.notify_all();
        }
        thread::sleep(TICK_INTERVAL);
    }
}
