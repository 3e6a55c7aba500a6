use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use scheduler::generator::{generate_program, random_memory_size};
use types::{instruction::unrolled_total, Config, Instruction};

fn test_config() -> Config {
    Config {
        min_ins: 20,
        max_ins: 60,
        min_mem_per_proc: 1024,
        max_mem_per_proc: 4096,
        ..Config::default()
    }
}

fn for_depth(instruction: &Instruction) -> usize {
    match instruction {
        Instruction::For { block, .. } => {
            1 + block.iter().map(for_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

fn check_shape(instruction: &Instruction) {
    match instruction {
        Instruction::For { block, repeats } => {
            assert!((2..=10).contains(repeats), "repeats out of range: {repeats}");
            assert!(!block.is_empty());
            block.iter().for_each(check_shape);
        }
        Instruction::Declare { var, .. } => {
            assert!(var.starts_with('v'), "generated name `{var}`");
        }
        _ => {}
    }
}

#[test]
fn generated_totals_stay_within_bounds() {
    let config = test_config();
    for seed in 0..50 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (program, total) = generate_program(&config, &mut rng);
        assert!(!program.is_empty(), "seed {seed} produced an empty program");
        assert!(total <= config.max_ins, "seed {seed}: total {total}");
        // The reported total is exactly the fully-unrolled program length.
        assert_eq!(total, unrolled_total(&program), "seed {seed}");
    }
}

#[test]
fn for_loops_respect_depth_and_repeat_limits() {
    let config = test_config();
    for seed in 0..50 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (program, _) = generate_program(&config, &mut rng);
        for instruction in &program {
            check_shape(instruction);
            assert!(for_depth(instruction) <= 3, "seed {seed}");
        }
    }
}

#[test]
fn memory_sizes_are_powers_of_two_in_range() {
    let config = test_config();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..200 {
        let size = random_memory_size(&config, &mut rng);
        assert!(size.is_power_of_two(), "size {size}");
        assert!(
            (config.min_mem_per_proc..=config.max_mem_per_proc).contains(&size),
            "size {size}"
        );
    }
}

#[test]
fn same_seed_reproduces_the_same_program() {
    let config = test_config();
    let (a, total_a) = generate_program(&config, &mut ChaCha8Rng::seed_from_u64(99));
    let (b, total_b) = generate_program(&config, &mut ChaCha8Rng::seed_from_u64(99));
    assert_eq!(a, b);
    assert_eq!(total_a, total_b);
}
