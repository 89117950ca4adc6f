//! CLI tool that drives an interactive program through a scripted scenario.
//!
//! ```text
//! ptyexpect-run -c "cargo run" \
//!     'timeout=120s' 'expect=Rust user shell\r\n>> ' \
//!     'sendline=ch8b_usertest' \
//!     'timeout=300s' 'success=Shell: Process 2 exited with code 0' 'failure=Panic'
//! ```
//!
//! The child's output is mirrored to stdout; the verdict is printed at the end
//! and becomes the exit status (0 success, 1 failure, 2 timeout, 3 unexpected
//! exit, 4 harness error).

use anyhow::Context;
use clap::Parser;
use ptyexpect::scenario::{parse_duration, parse_steps, Verdict};
use ptyexpect::{BackgroundMirror, Encoding, Session};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ptyexpect-run")]
#[command(author, version, about = "Drive an interactive program through a PTY and classify the run", long_about = None)]
struct Args {
    /// Command to spawn, split on whitespace (e.g. "cargo run")
    #[arg(short, long)]
    command: String,

    /// Working directory for the child
    #[arg(short = 'C', long)]
    cwd: Option<PathBuf>,

    /// Default timeout for expect steps (e.g. 30s, 500ms, 10m)
    #[arg(short, long, default_value = "30s", value_parser = parse_duration, env = "PTYEXPECT_TIMEOUT")]
    timeout: Duration,

    /// Encoding of the child's output (utf-8 or latin-1)
    #[arg(long, default_value = "utf-8")]
    encoding: Encoding,

    /// Strip ANSI escape sequences before matching
    #[arg(long)]
    strip_ansi: bool,

    /// Don't mirror the child's output to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Scenario steps as key=value (expect, expect-re, success, success-re,
    /// failure, failure-re, eof, send, sendline, timeout, sleep)
    #[arg(required = true)]
    steps: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't interleave with the mirrored transcript
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let scenario = parse_steps(&args.steps).context("Invalid scenario steps")?;

    let mut builder = Session::builder()
        .timeout(args.timeout)
        .encoding(args.encoding)
        .strip_ansi(args.strip_ansi);
    if let Some(cwd) = &args.cwd {
        builder = builder.working_dir(cwd);
    }
    if !args.quiet {
        builder = builder.mirror(BackgroundMirror::stdout().context("Failed to start mirror")?);
    }

    println!("Spawning {}...", args.command);
    let report = match builder.spawn(&args.command) {
        Ok(session) => scenario.run(session).await,
        Err(e) => {
            eprintln!("\n{}", Verdict::Error(e.to_string()));
            std::process::exit(Verdict::Error(String::new()).exit_code());
        }
    };

    match report.step {
        Some(step) => println!("\n{} (step {}, {:.1?})", report.verdict, step + 1, report.elapsed),
        None => println!("\n{} ({:.1?})", report.verdict, report.elapsed),
    }
    std::process::exit(report.verdict.exit_code());
}
