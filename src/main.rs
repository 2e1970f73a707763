use webgpu_probe::probe::{self, WgpuInstanceFactory};

fn main() {
    env_logger::init();

    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    // The exit status is 0 whatever happens; failures are only reported.
    if let Err(e) = probe::run_probe(&mut output, &WgpuInstanceFactory) {
        log::error!("failed to write probe report: {e}");
    }
}
