//! Drive a tiny prompt loop written in sh with a scenario.

use ptyexpect::scenario::{Expectation, Scenario, Verdict};
use ptyexpect::{BackgroundMirror, Session};
use std::time::Duration;

const ECHO_LOOP: &str = r#"while printf 'ready> ' && read line; do echo "input: $line"; done"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("ptyexpect - prompt loop scenario");
    println!("{}", "=".repeat(50));

    let session = Session::builder()
        .timeout(Duration::from_secs(5))
        .mirror(BackgroundMirror::stdout()?)
        .spawn_program("sh", &["-c", ECHO_LOOP])?;

    let scenario = Scenario::new()
        .expect(Expectation::new().pattern("ready> "))
        .send_line("hello")
        .expect(Expectation::new().pattern("input: hello"))
        .expect(Expectation::new().pattern("ready> "))
        .send_line("quit")
        .expect(
            Expectation::new()
                .on("input: quit", Verdict::Success)
                .on("error", Verdict::Failure),
        );

    let report = scenario.run(session).await;
    println!("\n{} after {:.1?}", report.verdict, report.elapsed);
    Ok(())
}
