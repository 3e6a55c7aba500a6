//! Synthetic process generation: the periodic feeder thread and the weighted
//! random program builder it draws from.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use rand::Rng;
use types::{Config, Instruction, Value};

use crate::{submit_program, Core, TICK_INTERVAL};

/// Generator names are `v0..v19`; no program declares more than this many.
const MAX_DECLARED_VARS: usize = 20;
/// FOR blocks stop nesting at this depth.
const MAX_FOR_DEPTH: usize = 3;

/// Feeder task: while generation is enabled, sleep `batch_process_freq`
/// ticks (polled at tick granularity so shutdown stays prompt), then submit
/// one process with a random program and a power-of-two memory size.
pub(crate) fn generator_loop(core: Arc<Core>) {
    if core.config.batch_process_freq == 0 {
        return;
    }
    let mut rng = rand::thread_rng();
    while core.generating.load(Ordering::SeqCst) && !core.shutting_down.load(Ordering::SeqCst) {
        for _ in 0..core.config.batch_process_freq {
            if !core.generating.load(Ordering::SeqCst)
                || core.shutting_down.load(Ordering::SeqCst)
            {
                break;
            }
            thread::sleep(TICK_INTERVAL);
        }
        if core.generating.load(Ordering::SeqCst) && !core.shutting_down.load(Ordering::SeqCst) {
            let memory_size = random_memory_size(&core.config, &mut rng);
            let (program, total) = generate_program(&core.config, &mut rng);
            submit_program(&core, None, memory_size, program, total);
        }
    }
}

/// Draw a memory size in `[min_mem_per_proc, max_mem_per_proc]` and round it
/// down to a power of two.
pub fn random_memory_size(config: &Config, rng: &mut impl Rng) -> usize {
    let sampled = rng.gen_range(config.min_mem_per_proc..=config.max_mem_per_proc);
    1 << sampled.ilog2()
}

/// Build a random program of roughly `U(min_ins, max_ins)` instructions and
/// return it with its projected fully-unrolled total, which becomes the
/// process's fixed instruction count.
pub fn generate_program(config: &Config, rng: &mut impl Rng) -> (Vec<Instruction>, usize) {
    let target = rng.gen_range(config.min_ins..=config.max_ins);
    let mut declared = Vec::new();
    let mut projected = 0;
    let program = generate_block(config, rng, target, &mut declared, 0, &mut projected);
    (program, projected)
}

/// One level of program generation. Instruction kinds are drawn from a
/// ten-sided die: 0-4 PRINT, 5 DECLARE, 6 ADD, 7 SUBTRACT, 8 SLEEP, 9 FOR.
/// A draw whose eligibility test fails (variable cap reached, fewer than two
/// declared variables, FOR too deep or over budget) falls back to PRINT.
fn generate_block(
    config: &Config,
    rng: &mut impl Rng,
    count: usize,
    declared: &mut Vec<String>,
    depth: usize,
    projected: &mut usize,
) -> Vec<Instruction> {
    let mut block = Vec::new();
    for _ in 0..count {
        if *projected >= config.max_ins {
            break;
        }
        let choice = rng.gen_range(0..10);
        if choice == 9 && depth < MAX_FOR_DEPTH {
            let repeats: u16 = rng.gen_range(2..=10);
            let inner_count = rng.gen_range(2..=5);
            let mut inner_projected = 0;
            let inner = generate_block(
                config,
                rng,
                inner_count,
                declared,
                depth + 1,
                &mut inner_projected,
            );
            let unrolled = inner_projected * usize::from(repeats);
            // Accept the loop only while the projected unrolled total stays
            // strictly under max_ins; the FOR itself contributes nothing.
            if !inner.is_empty() && *projected + unrolled < config.max_ins {
                block.push(Instruction::For {
                    block: inner,
                    repeats,
                });
                *projected += unrolled;
            } else {
                block.push(Instruction::Print(Vec::new()));
                *projected += 1;
            }
        } else {
            match choice {
                5 if declared.len() < MAX_DECLARED_VARS => {
                    let var = format!("v{}", declared.len());
                    declared.push(var.clone());
                    block.push(Instruction::Declare {
                        var,
                        value: Value::Literal(rng.gen_range(0..=1000)),
                    });
                }
                6 | 7 if declared.len() >= 2 => {
                    let dest = declared[rng.gen_range(0..declared.len())].clone();
                    let lhs = Value::Symbol(declared[rng.gen_range(0..declared.len())].clone());
                    let rhs = Value::Symbol(declared[rng.gen_range(0..declared.len())].clone());
                    block.push(if choice == 6 {
                        Instruction::Add { dest, lhs, rhs }
                    } else {
                        Instruction::Subtract { dest, lhs, rhs }
                    });
                }
                8 => block.push(Instruction::Sleep(Value::Literal(rng.gen_range(5..=20)))),
                _ => block.push(Instruction::Print(Vec::new())),
            }
            *projected += 1;
        }
    }
    block
}
