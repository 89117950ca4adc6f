//! Boot a kernel under `cargo run`, start the user test suite from its shell,
//! and report how it ended.
//!
//! Run from the kernel crate's directory:
//!
//! ```text
//! cargo run --example usertest -- ch8b_usertest
//! ```

use ptyexpect::{BackgroundMirror, Outcome, Pattern, PatternSet, Session};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let test = std::env::args().nth(1).unwrap_or_else(|| "ch8b_usertest".to_string());

    println!("Spawning qemu for {}...", test);
    let mut session = Session::builder()
        .timeout(Duration::from_secs(600))
        .mirror(BackgroundMirror::stdout()?)
        .spawn("cargo run")?;

    let shell = PatternSet::exact("Rust user shell\r\n>> ")?;
    if !session.expect(&shell, Duration::from_secs(120)).await?.is_match() {
        println!("\n[ERROR] user shell never came up");
        std::process::exit(4);
    }

    println!("Shell detected, sending {}...", test);
    session.send_line(&test).await?;

    let verdicts = PatternSet::new([
        Pattern::exact("Shell: Process 2 exited with code 0"),
        Pattern::exact("Panic"),
        Pattern::Timeout,
        Pattern::Eof,
    ])?;
    let outcome = session.expect(&verdicts, Duration::from_secs(300)).await?;
    session.terminate().await?;

    let code = match outcome {
        Outcome::Matched(m) if m.pattern_index == 0 => {
            println!("\n[SUCCESS] {} completed successfully.", test);
            0
        }
        Outcome::Matched(_) => {
            println!("\n[FAILURE] Kernel or user space PANIC detected.");
            1
        }
        Outcome::TimedOut { .. } => {
            println!("\n[TIMEOUT] {} timed out.", test);
            2
        }
        Outcome::EndOfStream { .. } => {
            println!("\n[EOF] QEMU exited unexpectedly.");
            3
        }
    };

    drop(session);
    std::process::exit(code);
}
