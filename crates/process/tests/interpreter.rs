use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use mmu::{Access, MemoryManager};
use process::{Process, ProcessStatus};
use types::{instruction::unrolled_total, Instruction, Value};

static STORE_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn store_path(tag: &str) -> PathBuf {
    let n = STORE_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "interp-test-{tag}-{}-{n}.bin",
        std::process::id()
    ))
}

fn manager(tag: &str) -> MemoryManager {
    MemoryManager::new(16384, 256, &store_path(tag)).expect("backing store")
}

fn spawn(m: &MemoryManager, memory_size: usize, program: Vec<Instruction>) -> Process {
    let total = unrolled_total(&program);
    let p = Process::new(1, "p1", program, total, memory_size);
    m.register_process(p.pid(), memory_size);
    p
}

/// Run to completion the way a worker would: service each fault, then let
/// the clock advance one tick per attempt.
fn drive(p: &Process, m: &MemoryManager) {
    let mut tick = 0u64;
    while !p.is_finished() {
        p.execute_instruction(m, 0, tick, 0);
        if p.fault_pending() {
            let page = p.faulting_address() as usize / m.frame_size();
            m.handle_page_fault(p.pid(), page).expect("fault service");
        }
        tick += 1;
        assert!(tick < 100_000, "process did not finish");
    }
}

fn declare(var: &str, value: u16) -> Instruction {
    Instruction::Declare {
        var: var.to_string(),
        value: Value::Literal(value),
    }
}

fn print_sym(var: &str) -> Instruction {
    Instruction::Print(vec![Value::Symbol(var.to_string())])
}

#[test]
fn add_saturates_at_u16_max() {
    let m = manager("add-sat");
    let p = spawn(
        &m,
        4096,
        vec![
            declare("a", 60000),
            declare("b", 10000),
            Instruction::Add {
                dest: "a".to_string(),
                lhs: Value::Symbol("a".to_string()),
                rhs: Value::Symbol("b".to_string()),
            },
            print_sym("a"),
        ],
    );
    drive(&p, &m);
    let logs = p.logs();
    assert!(logs.last().unwrap().ends_with("65535"), "logs: {logs:?}");
}

#[test]
fn subtract_saturates_at_zero() {
    let m = manager("sub-sat");
    let p = spawn(
        &m,
        4096,
        vec![
            declare("a", 3),
            declare("b", 5),
            Instruction::Subtract {
                dest: "a".to_string(),
                lhs: Value::Symbol("a".to_string()),
                rhs: Value::Symbol("b".to_string()),
            },
            print_sym("a"),
        ],
    );
    drive(&p, &m);
    assert!(p.logs().last().unwrap().ends_with(" 0"));
}

#[test]
fn for_unrolls_into_the_program() {
    let m = manager("for-unroll");
    let p = spawn(
        &m,
        4096,
        vec![Instruction::For {
            block: vec![
                Instruction::Print(Vec::new()),
                Instruction::Print(Vec::new()),
            ],
            repeats: 3,
        }],
    );
    // The displayed total is the projected unrolled count, fixed up front.
    assert_eq!(p.total_instructions(), 6);
    drive(&p, &m);
    assert_eq!(p.logs().len(), 6);
}

#[test]
fn fault_leaves_ip_alone_and_retry_completes() {
    let m = manager("fault-retry");
    let p = spawn(&m, 1024, vec![declare("a", 7)]);

    p.execute_instruction(&m, 0, 0, 0);
    assert!(p.fault_pending());
    assert_eq!(p.executed_count(), 0);
    assert!(!p.is_finished());

    let page = p.faulting_address() as usize / m.frame_size();
    m.handle_page_fault(p.pid(), page).unwrap();

    p.execute_instruction(&m, 0, 1, 0);
    assert!(!p.fault_pending());
    assert_eq!(p.executed_count(), 1);
    assert!(p.is_finished());
    assert_eq!(m.read_u16(p.pid(), 0), Access::Hit(7));
}

#[test]
fn out_of_range_write_terminates_with_violation() {
    let m = manager("violation");
    let p = spawn(
        &m,
        1024,
        vec![Instruction::Write {
            addr: 0xFFFF,
            value: Value::Literal(1),
        }],
    );
    p.execute_instruction(&m, 0, 0, 0);

    assert!(p.is_finished());
    assert_eq!(p.status(), ProcessStatus::MemFault);
    let violation = p.violation().expect("violation recorded");
    assert_eq!(violation.address, 0xFFFF);
    // The instruction never retired.
    assert_eq!(p.executed_count(), 0);
    assert!(p.logs().last().unwrap().starts_with("FATAL"));
}

#[test]
fn full_symbol_region_drops_declarations_silently() {
    let m = manager("symbols-full");
    // 64 bytes of symbol region = 32 two-byte slots; v32 does not fit.
    let mut program: Vec<Instruction> =
        (0..33).map(|i| declare(&format!("v{i}"), 5)).collect();
    program.push(print_sym("v32"));
    program.push(print_sym("v0"));

    let p = spawn(&m, 4096, program);
    drive(&p, &m);

    let logs = p.logs();
    // v32 was never allocated, so PRINT falls back to the symbol text.
    assert!(logs[logs.len() - 2].ends_with("v32"));
    assert!(logs[logs.len() - 1].ends_with(" 5"));
}

#[test]
fn undeclared_symbols_resolve_to_zero() {
    let m = manager("undeclared");
    let p = spawn(
        &m,
        4096,
        vec![
            Instruction::Add {
                dest: "sum".to_string(),
                lhs: Value::Symbol("nope".to_string()),
                rhs: Value::Symbol("also_nope".to_string()),
            },
            print_sym("sum"),
        ],
    );
    drive(&p, &m);
    assert!(p.logs().last().unwrap().ends_with(" 0"));
}

#[test]
fn print_concatenates_text_and_values() {
    let m = manager("print-mixed");
    let p = spawn(
        &m,
        4096,
        vec![
            declare("x", 5),
            Instruction::Print(vec![
                Value::Symbol("result_is_".to_string()),
                Value::Symbol("x".to_string()),
            ]),
        ],
    );
    drive(&p, &m);
    assert!(p.logs().last().unwrap().ends_with("result_is_5"));
}

#[test]
fn print_without_args_greets() {
    let m = manager("print-hello");
    let p = spawn(&m, 4096, vec![Instruction::Print(Vec::new())]);
    drive(&p, &m);
    assert!(p.logs()[0].contains("Hello from p1"));
}

#[test]
fn sleep_defers_the_next_instruction() {
    let m = manager("sleep");
    let p = spawn(
        &m,
        4096,
        vec![
            Instruction::Sleep(Value::Literal(3)),
            Instruction::Print(Vec::new()),
        ],
    );

    p.execute_instruction(&m, 0, 0, 0);
    assert_eq!(p.executed_count(), 1);
    assert!(p.is_sleeping(2));

    // Still parked at tick 2: nothing retires.
    p.execute_instruction(&m, 0, 2, 0);
    assert_eq!(p.logs().len(), 0);

    p.execute_instruction(&m, 0, 3, 0);
    assert_eq!(p.logs().len(), 1);
    assert!(p.is_finished());
}

#[test]
fn delay_per_exec_applies_only_after_success() {
    let m = manager("delay");
    let p = spawn(&m, 1024, vec![declare("a", 1), Instruction::Print(Vec::new())]);

    // First attempt faults: no retirement, so no cool-down either.
    p.execute_instruction(&m, 0, 10, 5);
    assert!(p.fault_pending());
    assert!(!p.is_sleeping(11));

    let page = p.faulting_address() as usize / m.frame_size();
    m.handle_page_fault(p.pid(), page).unwrap();

    p.execute_instruction(&m, 0, 10, 5);
    assert_eq!(p.executed_count(), 1);
    assert!(p.is_sleeping(14));
    assert!(!p.is_sleeping(15));
}

#[test]
fn raw_address_round_trip() {
    let m = manager("raw-addr");
    let p = spawn(
        &m,
        4096,
        vec![
            Instruction::Write {
                addr: 0x100,
                value: Value::Literal(42),
            },
            Instruction::Read {
                var: "x".to_string(),
                addr: 0x100,
            },
            print_sym("x"),
        ],
    );
    drive(&p, &m);
    assert!(p.logs().last().unwrap().ends_with("42"));
}
