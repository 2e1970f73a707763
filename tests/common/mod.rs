use rand::{rngs::StdRng, Rng, SeedableRng};
use webgpu_probe::{ContextOptions, GpuContext};

/// Initialize the logger for the test runner.
pub fn init_logger() {
    // We don't actually care if it fails
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a device from the adapter picked by the `WGPU_*` variables.
///
/// Returns `None` on machines without a usable adapter so GPU tests can bail
/// out instead of failing.
pub fn initialize_context() -> Option<GpuContext> {
    init_logger();
    match pollster::block_on(GpuContext::new(&ContextOptions::from_env())) {
        Ok(context) => {
            log::info!("Testing using adapter: {:#?}", context.adapter.get_info());
            Some(context)
        }
        Err(e) => {
            eprintln!("Skipping GPU test: {e}");
            None
        }
    }
}

/// Small pseudo-random values so totals stay well inside the 30-bit aggregate.
pub fn test_input(len: usize, seed: u64) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(0..16)).collect()
}

#[test]
fn test_input_is_seeded_and_small() {
    let input = test_input(4096, 3);
    assert_eq!(input, test_input(4096, 3));
    assert_ne!(input, test_input(4096, 4));
    assert!(input.iter().all(|&v| v < 16));
}
