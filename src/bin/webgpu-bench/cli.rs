use std::{ffi::OsString, io, process::exit};

use thiserror::Error;

use webgpu_probe::{
    human::{self, PrintingVerbosity},
    kernel::{tune, TuneOptions},
    report::GpuReport,
    ContextOptions, GpuContext,
};

const HELP: &str = "\
Usage: webgpu-bench <COMMAND> [OPTIONS]

Commands:
  adapters            Describe every adapter wgpu can see
  tune                Sweep the prefix-sum tuning space on the selected adapter

Options:
  -h, --help          Print this help
  -o, --output <PATH> Destination to write output to
  -j, --json          Output JSON information instead of text
  -q, --quiet         (adapters) Only print adapter names
  -v, --verbose       (adapters) Also print capabilities and limits
  -s, --size <N>      (tune) Vector size to scan, may be repeated
      --check         (tune) Verify every run against the CPU reference
      --fill <VALUE>  (tune) Value every input element is filled with [default: 1]

Environment:
  WGPU_BACKEND        Backends to use, e.g. `vulkan,gl`
  WGPU_POWER_PREF     `low` or `high` power adapter
  WGPU_ADAPTER_NAME   Pick the adapter whose name contains this
  RUST_LOG            Log filter, defaults to `info`
";

#[derive(Debug)]
enum Command {
    Adapters { verbosity: PrintingVerbosity },
    Tune(TuneOptions),
}

#[derive(Debug)]
struct Args {
    command: Command,
    output_path: Option<String>,
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("help requested")]
    Help,
    #[error("no command given")]
    MissingCommand,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("unexpected arguments: {0:?}")]
    Unexpected(Vec<OsString>),
    #[error(transparent)]
    Args(#[from] pico_args::Error),
}

fn parse_args(mut args: pico_args::Arguments) -> Result<Args, CliError> {
    if args.contains(["-h", "--help"]) {
        return Err(CliError::Help);
    }

    let output_path: Option<String> = args.opt_value_from_str(["-o", "--output"])?;
    let json = args.contains(["-j", "--json"]);

    let command = match args.subcommand()?.as_deref() {
        Some("adapters") => {
            let quiet = args.contains(["-q", "--quiet"]);
            let verbose = args.contains(["-v", "--verbose"]);
            let verbosity = match (quiet, verbose) {
                (true, _) => PrintingVerbosity::NameOnly,
                (false, true) => PrintingVerbosity::InformationLimits,
                (false, false) => PrintingVerbosity::Information,
            };
            Command::Adapters { verbosity }
        }
        Some("tune") => {
            let mut options = TuneOptions::default();
            let sizes: Vec<u32> = args.values_from_str(["-s", "--size"])?;
            if !sizes.is_empty() {
                options.vector_sizes = sizes;
            }
            options.check = args.contains("--check");
            if let Some(fill) = args.opt_value_from_str("--fill")? {
                options.fill = fill;
            }
            Command::Tune(options)
        }
        Some(other) => return Err(CliError::UnknownCommand(other.to_owned())),
        None => return Err(CliError::MissingCommand),
    };

    let remaining = args.finish();
    if !remaining.is_empty() {
        return Err(CliError::Unexpected(remaining));
    }

    Ok(Args {
        command,
        output_path,
        json,
    })
}

fn run(args: Args) -> webgpu_probe::Result<()> {
    let mut output: Box<dyn io::Write> = match args.output_path {
        Some(path) => Box::new(io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    let options = ContextOptions::from_env();
    match args.command {
        Command::Adapters { verbosity } => {
            let instance = options.create_instance();
            let report = GpuReport::generate(&instance, options.backends);
            if args.json {
                report.into_json(&mut output)?;
                writeln!(output)?;
            } else {
                human::print_adapters(&mut output, &report, verbosity)?;
            }
        }
        Command::Tune(tune_options) => {
            let records = pollster::block_on(async {
                let context = GpuContext::new(&options).await?;
                tune(&context, &tune_options).await
            })?;
            if args.json {
                serde_json::to_writer_pretty(&mut output, &records)?;
                writeln!(output)?;
            } else {
                webgpu_probe::kernel::tune::print_records(&mut output, &records)?;
            }
            if records.iter().any(|record| record.verified == Some(false)) {
                log::error!("Some configurations produced wrong results");
            }
        }
    }

    output.flush()?;
    Ok(())
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args(pico_args::Arguments::from_env()) {
        Ok(args) => args,
        Err(CliError::Help) => {
            eprintln!("{HELP}");
            exit(101);
        }
        Err(e) => {
            eprintln!("{e}\n\n{HELP}");
            exit(1);
        }
    };

    if let Err(e) = run(args) {
        log::error!("{e}");
        exit(1);
    }
}
