use shell::config_file::parse;
use types::SchedulerAlgorithm;

const FULL: &str = r#"
num-cpu 4
scheduler "rr"
quantum-cycles 5
batch-process-freq 2
min-ins 100
max-ins 500
delay-per-exec 1
max-overall-mem 16384
mem-per-frame 256
min-mem-per-proc 1024
max-mem-per-proc 4096
"#;

#[test]
fn parses_a_full_file() {
    let config = parse(FULL).unwrap();
    assert_eq!(config.num_cpu, 4);
    assert_eq!(config.scheduler, SchedulerAlgorithm::Rr);
    assert_eq!(config.quantum_cycles, 5);
    assert_eq!(config.batch_process_freq, 2);
    assert_eq!(config.min_ins, 100);
    assert_eq!(config.max_ins, 500);
    assert_eq!(config.delay_per_exec, 1);
    assert_eq!(config.max_overall_mem, 16384);
    assert_eq!(config.mem_per_frame, 256);
    assert_eq!(config.min_mem_per_proc, 1024);
    assert_eq!(config.max_mem_per_proc, 4096);
}

#[test]
fn missing_keys_keep_defaults() {
    let config = parse("num-cpu 2").unwrap();
    assert_eq!(config.num_cpu, 2);
    assert_eq!(config.scheduler, SchedulerAlgorithm::Fcfs);
    assert_eq!(config.quantum_cycles, 10);
}

#[test]
fn scheduler_value_accepts_bare_and_quoted_names() {
    assert_eq!(
        parse("scheduler rr").unwrap().scheduler,
        SchedulerAlgorithm::Rr
    );
    assert_eq!(
        parse("scheduler \"fcfs\"").unwrap().scheduler,
        SchedulerAlgorithm::Fcfs
    );
    assert!(parse("scheduler lottery").is_err());
}

#[test]
fn unknown_keys_are_skipped() {
    let config = parse("mystery-knob 9 num-cpu 3").unwrap();
    assert_eq!(config.num_cpu, 3);
}

#[test]
fn rejects_inconsistent_settings() {
    assert!(parse("num-cpu 0").is_err());
    assert!(parse("min-ins 500 max-ins 100").is_err());
    assert!(parse("mem-per-frame 0").is_err());
    assert!(parse("max-overall-mem 128 mem-per-frame 256").is_err());
    assert!(parse("min-mem-per-proc 4096 max-mem-per-proc 1024").is_err());
    assert!(parse("min-mem-per-proc 32").is_err());
    assert!(parse("max-mem-per-proc 131072").is_err());
    assert!(parse("num-cpu").is_err());
    assert!(parse("num-cpu four").is_err());
}
