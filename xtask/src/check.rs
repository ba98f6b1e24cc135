use anyhow::Result;

use crate::step::{run_all, Step};

const TARGET: &str = "thumbv7em-none-eabihf";

pub fn run() -> Result<()> {
    run_all(
        "🔍 Checking builds...",
        &[
            Step::cargo("Firmware (STM32H7)", &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"]),
            Step::cargo("Pipeline crates (no_std)", &["check", "-p", "platform", "-p", "recorder", "--target", TARGET]),
            Step::cargo("Recorder on the host (std + tracing)", &["check", "-p", "recorder", "--features", "std,tracing"]),
            Step::cargo("xtask", &["check", "-p", "xtask"]),
            Step::cargo("Clippy", &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"]).advisory(),
            Step::cargo("Formatting", &["fmt", "--all", "--check"]).advisory(),
        ],
    )
}
