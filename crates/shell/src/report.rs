use std::path::Path;
use std::sync::Arc;
use std::{fmt::Write as _, fs};

use anyhow::{Context, Result};
use process::{Process, NO_CORE};
use scheduler::Scheduler;

fn core_label(process: &Process) -> String {
    match process.core() {
        NO_CORE => "wait".to_string(),
        core => core.to_string(),
    }
}

fn list_lines(out: &mut String, processes: &[Arc<Process>], finished: bool) {
    for process in processes {
        let progress = if finished {
            format!(
                "{0} / {0}",
                process.total_instructions()
            )
        } else {
            format!(
                "{} / {}",
                process.executed_count(),
                process.total_instructions()
            )
        };
        let middle = if finished {
            format!("{}", process.status())
        } else {
            format!("Core: {}", core_label(process))
        };
        let _ = writeln!(
            out,
            "{:<12} ({})  {}   {}",
            process.name(),
            process.creation_timestamp(),
            middle,
            progress
        );
    }
}

/// The `screen -ls` view, also written verbatim by `report-util`.
pub fn list_view(scheduler: &Scheduler) -> String {
    let running = scheduler.running_processes();
    let finished = scheduler.finished_processes();
    let cores_used = scheduler.cores_used();
    let num_cpu = scheduler.config().num_cpu;
    let utilization = cores_used as f64 / num_cpu as f64 * 100.0;

    let mut out = String::new();
    let _ = writeln!(out, "----------------------------------------");
    let _ = writeln!(out, "CPU utilization: {utilization:.2}%");
    let _ = writeln!(out, "Cores used: {cores_used}");
    let _ = writeln!(out, "Cores available: {}", num_cpu - cores_used);
    let _ = writeln!(out);
    let _ = writeln!(out, "Running processes:");
    list_lines(&mut out, &running, false);
    let _ = writeln!(out);
    let _ = writeln!(out, "Finished processes:");
    list_lines(&mut out, &finished, true);
    let _ = writeln!(out, "----------------------------------------");
    out
}

/// The `screen -r` process view: identity, logs, progress, and the
/// violation record if the process died on a bad access.
pub fn process_screen(process: &Process) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Process name: {}", process.name());
    let _ = writeln!(out, "ID: {}", process.pid());
    let _ = writeln!(out, "Logs:");
    for line in process.logs() {
        let _ = writeln!(out, "{line}");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Current instruction line: {}",
        process.executed_count()
    );
    let _ = writeln!(out, "Lines of code: {}", process.total_instructions());
    let _ = writeln!(out, "Memory size: {} bytes", process.memory_size());
    let _ = writeln!(out);
    match process.violation() {
        Some(violation) => {
            let _ = writeln!(
                out,
                "Memory access violation at {:#06x} ({})",
                violation.address,
                violation.at.format("%m/%d/%Y, %I:%M:%S %p")
            );
        }
        None if process.is_finished() => {
            let _ = writeln!(out, "Finished!");
        }
        None => {}
    }
    out
}

/// The `process-smi` table: pid, name, memory size, status.
pub fn process_smi(scheduler: &Scheduler) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<15} {:>10}  {}", "PID", "Name", "Memory", "Status");
    for process in scheduler.all_processes() {
        let _ = writeln!(
            out,
            "{:<6} {:<15} {:>8} B  {}",
            process.pid(),
            process.name(),
            process.memory_size(),
            process.status()
        );
    }
    out
}

/// The `vmstat` counters: memory in KB, tick totals, paging traffic.
pub fn vmstat(scheduler: &Scheduler) -> String {
    let memory = scheduler.memory();
    let total = memory.total_memory();
    let used = memory.used_memory();
    let total_ticks = scheduler.total_ticks();
    let active_ticks = scheduler.active_ticks();

    let mut out = String::new();
    let _ = writeln!(out, "Total memory: {} KB", total / 1024);
    let _ = writeln!(out, "Used memory: {} KB", used / 1024);
    let _ = writeln!(out, "Free memory: {} KB", (total - used) / 1024);
    let _ = writeln!(out, "Total CPU ticks: {total_ticks}");
    let _ = writeln!(out, "Active CPU ticks: {active_ticks}");
    let _ = writeln!(
        out,
        "Idle CPU ticks: {}",
        total_ticks.saturating_sub(active_ticks)
    );
    let _ = writeln!(out, "Pages paged in: {}", memory.stats().page_ins());
    let _ = writeln!(out, "Pages paged out: {}", memory.stats().page_outs());
    out
}

/// `report-util`: persist the `screen -ls` view.
pub fn write_report(scheduler: &Scheduler, path: &Path) -> Result<()> {
    fs::write(path, list_view(scheduler))
        .with_context(|| format!("could not write {}", path.display()))
}
