use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use mmu::MemoryManager;
use process::Process;
use scheduler::Scheduler;
use shell::{config_file, program_parser, report};
use types::config::is_valid_memory_size;
use types::SchedulerAlgorithm;

const BACKING_STORE_FILE: &str = "csopesy-backing-store.bin";
const REPORT_FILE: &str = "csopesy-log.txt";

/// Educational OS emulator: a multi-core scheduler over demand-paged memory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file applied by `initialize`.
    #[arg(short, long, default_value = "config.txt")]
    config: PathBuf,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    clear_screen();
    print_banner();

    let stdin = io::stdin();
    let mut scheduler: Option<Scheduler> = None;

    loop {
        print!("{}", "[main] Enter command: ".bright_yellow());
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("reading stdin")? == 0 {
            break;
        }
        let line = line.trim();
        let Some(command) = line.split_whitespace().next() else {
            continue;
        };

        match command {
            "exit" => break,
            "initialize" => {
                if scheduler.is_some() {
                    println!("System is already initialized.");
                } else {
                    match initialize(&args.config) {
                        Ok(started) => scheduler = Some(started),
                        Err(err) => println!("Initialization failed: {err:#}"),
                    }
                }
                continue;
            }
            _ => {}
        }

        let Some(sched) = scheduler.as_ref() else {
            println!("Please enter the command 'initialize' before using any other command.");
            continue;
        };

        match command {
            "screen" => {
                if let Err(err) = screen_command(sched, line) {
                    println!("{err:#}");
                }
            }
            "scheduler-start" => {
                println!("Starting process generation...");
                sched.start_generation();
            }
            "scheduler-stop" => {
                println!("Stopping process generation...");
                sched.stop_generation();
            }
            "process-smi" => print!("{}", report::process_smi(sched)),
            "vmstat" => print!("{}", report::vmstat(sched)),
            "report-util" => match report::write_report(sched, Path::new(REPORT_FILE)) {
                Ok(()) => println!("Report generated at {REPORT_FILE}!"),
                Err(err) => println!("{err:#}"),
            },
            "clear" => {
                clear_screen();
                print_banner();
            }
            other => println!("Unknown command: {other}. Please try again."),
        }
    }

    if let Some(sched) = scheduler {
        println!("Shutting down scheduler and worker threads...");
        sched.shutdown();
    }
    println!("Shutdown complete. Exiting.");
    Ok(())
}

/// Parse the config, build the MMU and its backing store, spin up the
/// scheduler threads, and echo the applied settings.
fn initialize(config_path: &Path) -> Result<Scheduler> {
    let config = config_file::load(config_path)?;
    let memory = Arc::new(
        MemoryManager::new(
            config.max_overall_mem,
            config.mem_per_frame,
            Path::new(BACKING_STORE_FILE),
        )
        .context("creating backing store")?,
    );

    println!("\nSystem initialized successfully with config:");
    println!("------------------------------------------");
    println!("CPU cores: {}", config.num_cpu);
    println!(
        "Scheduler: {}",
        match config.scheduler {
            SchedulerAlgorithm::Rr => "rr",
            SchedulerAlgorithm::Fcfs => "fcfs",
        }
    );
    println!("Quantum Cycles: {}", config.quantum_cycles);
    println!("Batch Process Frequency: {}", config.batch_process_freq);
    println!("Min Instructions: {}", config.min_ins);
    println!("Max Instructions: {}", config.max_ins);
    println!("Delay per Execution: {}", config.delay_per_exec);
    println!("Total Memory: {} bytes", config.max_overall_mem);
    println!("Frame Size: {} bytes", config.mem_per_frame);
    println!(
        "Process Memory: {} - {} bytes",
        config.min_mem_per_proc, config.max_mem_per_proc
    );
    println!("------------------------------------------\n");

    Ok(Scheduler::start(config, memory))
}

fn screen_command(scheduler: &Scheduler, line: &str) -> Result<()> {
    let mut words = line.split_whitespace().skip(1);
    match words.next() {
        Some("-ls") => {
            print!("{}", report::list_view(scheduler));
            Ok(())
        }
        Some("-s") => {
            let name = words.next().context("usage: screen -s <name> <size>")?;
            let size = parse_size(words.next().context("usage: screen -s <name> <size>")?)?;
            if scheduler.find_process(name).is_some() {
                println!("Screen '{name}' already exists. Use 'screen -r {name}' to attach.");
                return Ok(());
            }
            scheduler.submit(name, size, None);
            println!("Screen '{name}' created.");
            Ok(())
        }
        Some("-c") => {
            let name = words
                .next()
                .context("usage: screen -c <name> <size> \"<instructions>\"")?;
            let size = parse_size(
                words
                    .next()
                    .context("usage: screen -c <name> <size> \"<instructions>\"")?,
            )?;
            if scheduler.find_process(name).is_some() {
                println!("Screen '{name}' already exists. Use 'screen -r {name}' to attach.");
                return Ok(());
            }
            let source = quoted_payload(line)
                .ok_or_else(|| anyhow!("instructions must be wrapped in double quotes"))?;
            let program = program_parser::parse_program(source)?;
            scheduler.submit(name, size, Some(program));
            println!("Screen '{name}' created.");
            Ok(())
        }
        Some("-r") => {
            let name = words.next().context("usage: screen -r <name>")?;
            match scheduler.find_process(name) {
                Some(found) => attach_screen(&found),
                None => println!("Process <{name}> not found."),
            }
            Ok(())
        }
        _ => {
            println!("Unknown screen option. Use -s, -c, -r, or -ls.");
            Ok(())
        }
    }
}

/// Minimal per-process console: redraw on `process-smi`, leave on `exit`.
fn attach_screen(target: &Arc<Process>) {
    let stdin = io::stdin();
    loop {
        print!("{}", report::process_screen(target));
        print!("{}", "> ".cyan());
        io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match line.trim() {
            "exit" => break,
            "" | "process-smi" => continue,
            _ => println!("Unknown command inside process screen. Type 'exit' to return."),
        }
    }
}

fn parse_size(token: &str) -> Result<usize> {
    let size: usize = token
        .parse()
        .map_err(|_| anyhow!("`{token}` is not a valid memory size"))?;
    if !is_valid_memory_size(size) {
        bail!("memory size must be a power of two in [64, 65536]");
    }
    Ok(size)
}

/// The text between the first and last double quote on the line.
fn quoted_payload(line: &str) -> Option<&str> {
    let first = line.find('"')?;
    let last = line.rfind('"')?;
    (first < last).then(|| &line[first + 1..last])
}

fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    io::stdout().flush().ok();
}

fn print_banner() {
    let art = r#"
   ____ ____   ___  ____  _____ ______   __
  / ___/ ___| / _ \|  _ \| ____/ ___\ \ / /
 | |   \___ \| | | | |_) |  _| \___ \\ V /
 | |___ ___) | |_| |  __/| |___ ___) || |
  \____|____/ \___/|_|   |_____|____/ |_|
"#;
    println!("{}", art.cyan());
    println!(
        "{}",
        "Welcome to the CSOPESY command line!".bright_green()
    );
    println!(
        "{}",
        "Type 'initialize' to start, 'exit' to quit, 'clear' to clear the screen".bright_yellow()
    );
    println!();
}
