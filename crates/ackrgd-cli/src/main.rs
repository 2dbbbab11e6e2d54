//! ackrgd CLI - generate KRO ResourceGraphDefinitions from rendered ACK charts

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ackrgd_convert::{DirectoryRenderSource, GenerateOptions, generate_all};
use ackrgd_core::GraphsFile;
use clap::{Parser, ValueEnum};
use tracing::info;

mod display;
mod error;
mod exit_codes;

use error::{CliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "ackrgd")]
#[command(version)]
#[command(about = "Generate KRO ResourceGraphDefinitions from rendered ACK controller charts", long_about = None)]
struct Cli {
    /// Service list (graphs.yaml)
    #[arg(long, default_value = "graphs.yaml")]
    graphs: PathBuf,

    /// Directory of pre-rendered charts, one <service>/ sub-directory each
    #[arg(long)]
    rendered: PathBuf,

    /// Output directory; graphs are written to <out>/ack/
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Services generated at once [default: max(2, CPUs)]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Deadline for the whole run
    #[arg(long, default_value_t = 60)]
    timeout_minutes: u64,

    /// Also write <service>-defaults.yaml with schema references resolved
    #[arg(long)]
    defaults_example: bool,

    /// Default log level; RUST_LOG overrides it
    #[arg(long, value_enum, default_value_t = LogLevel::Info, env = "ACKRGD_LOG_LEVEL")]
    log_level: LogLevel,
}

fn init_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.directive())),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn options(cli: &Cli) -> Result<GenerateOptions> {
    let mut options = GenerateOptions::new(&cli.out);
    if let Some(concurrency) = cli.concurrency {
        if concurrency == 0 {
            return Err(CliError::usage("--concurrency must be at least 1"));
        }
        options.concurrency = concurrency;
    }
    if cli.timeout_minutes == 0 {
        return Err(CliError::usage("--timeout-minutes must be at least 1"));
    }
    options.timeout = Duration::from_secs(cli.timeout_minutes * 60);
    options.defaults_example = cli.defaults_example;
    Ok(options)
}

fn run(cli: Cli) -> Result<()> {
    let options = options(&cli)?;
    let graphs = GraphsFile::load(&cli.graphs)?;
    info!(
        path = %cli.graphs.display(),
        count = graphs.graphs.len(),
        "loaded service list"
    );

    let source = Arc::new(DirectoryRenderSource::new(&cli.rendered));
    let runtime = tokio::runtime::Runtime::new()?;
    let outputs = runtime.block_on(generate_all(graphs.graphs, source, options))?;

    display::print_summary(&outputs);
    Ok(())
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.log_level);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
