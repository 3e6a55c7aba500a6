use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use types::config::{MAX_PROC_MEMORY, MIN_PROC_MEMORY};
use types::{Config, SchedulerAlgorithm};

/// Load and validate the key/value configuration file.
pub fn load(path: &Path) -> Result<Config> {
    let text =
        fs::read_to_string(path).with_context(|| format!("could not open {}", path.display()))?;
    parse(&text).with_context(|| format!("in {}", path.display()))
}

/// Parse configuration text: whitespace-separated `key value` pairs in any
/// order, quotes stripped from the scheduler name, unknown keys skipped with
/// a warning. Missing keys keep their defaults.
pub fn parse(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut tokens = text.split_whitespace();
    while let Some(key) = tokens.next() {
        let Some(value) = tokens.next() else {
            bail!("configuration key `{key}` has no value");
        };
        match key {
            "num-cpu" => config.num_cpu = number(key, value)?,
            "scheduler" => {
                config.scheduler = match value.trim_matches('"') {
                    "rr" => SchedulerAlgorithm::Rr,
                    "fcfs" => SchedulerAlgorithm::Fcfs,
                    other => bail!("unknown scheduler `{other}` (expected fcfs or rr)"),
                }
            }
            "quantum-cycles" => config.quantum_cycles = number(key, value)?,
            "batch-process-freq" => config.batch_process_freq = number(key, value)?,
            "min-ins" => config.min_ins = number(key, value)?,
            "max-ins" => config.max_ins = number(key, value)?,
            "delay-per-exec" => config.delay_per_exec = number(key, value)?,
            "max-overall-mem" => config.max_overall_mem = number(key, value)?,
            "mem-per-frame" => config.mem_per_frame = number(key, value)?,
            "min-mem-per-proc" => config.min_mem_per_proc = number(key, value)?,
            "max-mem-per-proc" => config.max_mem_per_proc = number(key, value)?,
            other => log::warn!("ignoring unknown configuration key `{other}`"),
        }
    }
    validate(&config)?;
    Ok(config)
}

fn number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| anyhow!("bad value `{value}` for `{key}`: {err}"))
}

fn validate(config: &Config) -> Result<()> {
    if config.num_cpu == 0 {
        bail!("num-cpu must be at least 1");
    }
    if config.mem_per_frame == 0 {
        bail!("mem-per-frame must be at least 1");
    }
    if config.max_overall_mem < config.mem_per_frame {
        bail!("max-overall-mem must hold at least one frame");
    }
    if config.min_ins == 0 || config.min_ins > config.max_ins {
        bail!("min-ins must be in [1, max-ins]");
    }
    if config.min_mem_per_proc > config.max_mem_per_proc {
        bail!("min-mem-per-proc must not exceed max-mem-per-proc");
    }
    if config.min_mem_per_proc < MIN_PROC_MEMORY || config.max_mem_per_proc > MAX_PROC_MEMORY {
        bail!("per-process memory bounds must stay within [{MIN_PROC_MEMORY}, {MAX_PROC_MEMORY}]");
    }
    Ok(())
}
