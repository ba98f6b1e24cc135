use anyhow::Result;

use crate::step::{run_all, Step};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    let unit = [
        Step::cargo("Recorder unit tests", &["test", "-p", "recorder", "--lib", "--features", "std"]),
        Step::cargo("Platform unit tests", &["test", "-p", "platform", "--lib", "--features", "std"]),
        Step::cargo("Firmware host tests", &["test", "-p", "firmware", "--lib", "--features", "std"]),
        Step::cargo("xtask unit tests", &["test", "-p", "xtask"]),
    ];
    let integration = [
        Step::cargo("Pipeline and session tests", &["test", "-p", "recorder", "--features", "std", "--tests"]),
        Step::cargo("Platform contracts", &["test", "-p", "platform", "--features", "std", "--tests"]),
        Step::cargo("Firmware layout checks", &["test", "-p", "firmware", "--features", "std", "--tests"]),
    ];
    let doc = [Step::cargo("Doc tests", &["test", "--doc", "-p", "platform", "-p", "recorder", "--features", "std"]).advisory()];

    let mut steps = Vec::new();
    if !integration_only {
        steps.extend(unit);
    }
    if !unit_only {
        steps.extend(integration);
    }
    steps.extend(doc);
    run_all("🧪 Running tests...", &steps)
}
