#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the checkpoint benchmark.
//!
//! Excluded from mutation testing because process entry and exit behavior is covered by the
//! integration tests, which spawn the binary as a subprocess.

use std::num::NonZero;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use argh::FromArgs;
use checkpoint_bench::{
    BenchConfig, CheckpointError, DEFAULT_CHECKPOINT_PATH, DEFAULT_MATRIX_SIZE, Matrix, Report,
    init_subscriber, run,
};

/// Measures the cost of checkpointing a matrix to a file after every parallel compute pass.
#[derive(FromArgs)]
struct Args {
    /// number of threads in the compute and checkpoint team
    #[argh(positional)]
    threads: NonZero<usize>,

    /// number of compute + checkpoint iterations
    #[argh(positional)]
    iterations: NonZero<u64>,

    /// matrix dimension N; the matrix has N * N cells (default: 360)
    #[argh(option)]
    size: Option<NonZero<usize>>,

    /// path of the checkpoint file (default: matrix.out)
    #[argh(option)]
    path: Option<PathBuf>,
}

// Process entry point, exercised by the subprocess tests in tests/cli.rs.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(exit_code) => return exit_code,
    };

    init_subscriber();

    let config = BenchConfig::new(args.threads, args.iterations)
        .with_matrix_size(args.size.unwrap_or(DEFAULT_MATRIX_SIZE))
        .with_checkpoint_path(
            args.path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
        );

    match execute(&config) {
        Ok(report) => {
            println!("io_bytes: {}", report.statistics().bytes_written());
            print!("{report}");
            println!();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Parses the command line. On failure, prints the problem followed by the usage text.
#[cfg_attr(test, mutants::skip)]
fn parse_args() -> Result<Args, ExitCode> {
    let env_args: Vec<String> = std::env::args().collect();
    let str_args: Vec<&str> = env_args.iter().map(String::as_str).collect();

    let program_name = str_args.first().copied().unwrap_or("checkpoint_bench");

    Args::from_args(&[program_name], str_args.get(1..).unwrap_or(&[])).map_err(|early_exit| {
        if early_exit.status.is_ok() {
            // --help was requested.
            println!("{}", early_exit.output);
            return ExitCode::SUCCESS;
        }

        eprintln!("{}", early_exit.output);

        if let Err(help) = Args::from_args(&[program_name], &["--help"]) {
            eprintln!("{}", help.output);
        }

        ExitCode::FAILURE
    })
}

#[cfg_attr(test, mutants::skip)]
fn execute(config: &BenchConfig) -> Result<Report, CheckpointError> {
    let mut matrix = Matrix::allocate(config.matrix_size())?;
    matrix.initialize();

    let start_time = Instant::now();
    let statistics = run(config, &mut matrix)?;
    let total_time = start_time.elapsed();

    Ok(Report::new(statistics, total_time))
}
