//! One external command per step, timed and reported in color.

use std::process::{Command, Output};
use std::time::Instant;

use anyhow::{Context, Result};
use colored::Colorize;

/// What a failing step does to the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Print stderr and abort the task.
    Abort,
    /// Print a warning and keep going.
    Warn,
}

/// A command plus the label printed around it.
pub struct Step<'a> {
    pub label: &'a str,
    pub program: &'a str,
    pub args: &'a [&'a str],
    pub on_failure: OnFailure,
}

impl<'a> Step<'a> {
    /// A `cargo` step that aborts the task on failure.
    pub const fn cargo(label: &'a str, args: &'a [&'a str]) -> Self {
        Self { label, program: "cargo", args, on_failure: OnFailure::Abort }
    }

    /// Same step, but only warn on failure.
    pub fn advisory(mut self) -> Self {
        self.on_failure = OnFailure::Warn;
        self
    }

    /// Run the step. `Ok(None)` means it failed and was only advisory.
    pub fn run(&self) -> Result<Option<Output>> {
        println!("{}", format!("  {}...", self.label).cyan());
        let start = Instant::now();
        let output = Command::new(self.program)
            .args(self.args)
            .output()
            .with_context(|| format!("failed to start `{} {}`", self.program, self.args.join(" ")))?;

        if output.status.success() {
            let summary = test_summary(&String::from_utf8_lossy(&output.stdout))
                .map(|s| format!(" ({s})"))
                .unwrap_or_default();
            println!(
                "{}",
                format!("  ✓ {}{} in {:.2}s", self.label, summary, start.elapsed().as_secs_f64()).green()
            );
            println!();
            return Ok(Some(output));
        }

        match self.on_failure {
            OnFailure::Abort => {
                eprintln!("{}", format!("  ✗ {} failed", self.label).red().bold());
                eprintln!();
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                eprintln!("{}", String::from_utf8_lossy(&output.stdout));
                anyhow::bail!("{} failed", self.label);
            }
            OnFailure::Warn => {
                eprintln!("{}", format!("  ⚠ {} reported problems", self.label).yellow().bold());
                println!();
                Ok(None)
            }
        }
    }
}

/// Run steps in order, stopping at the first aborting failure.
pub fn run_all(title: &str, steps: &[Step<'_>]) -> Result<()> {
    println!();
    println!("{}", title.cyan().bold());
    println!();
    let start = Instant::now();
    for step in steps {
        step.run()?;
    }
    println!("{}", format!("✓ Done in {:.2}s", start.elapsed().as_secs_f64()).green().bold());
    println!();
    Ok(())
}

/// Totals from cargo test output, e.g. `ok. 5 passed; 0 failed; ...`,
/// summed over every test binary.
pub fn test_summary(output: &str) -> Option<String> {
    let mut passed = 0u64;
    let mut failed = 0u64;
    let mut seen = false;
    for line in output.lines() {
        let Some(result) = line.split("test result:").nth(1) else { continue };
        seen = true;
        for part in result.split(';') {
            let mut words = part.split_whitespace().rev();
            let (Some(kind), Some(count)) = (words.next(), words.next()) else { continue };
            let Ok(count) = count.parse::<u64>() else { continue };
            match kind {
                "passed" => passed = passed.saturating_add(count),
                "failed" => failed = failed.saturating_add(count),
                _ => {}
            }
        }
    }
    seen.then(|| format!("{passed} passed, {failed} failed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_sums_every_binary() {
        let out = "running 3 tests\ntest result: ok. 3 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out\n\
                   running 2 tests\ntest result: ok. 2 passed; 0 failed; 1 ignored; 0 measured; 0 filtered out\n";
        assert_eq!(test_summary(out).as_deref(), Some("5 passed, 0 failed"));
    }

    #[test]
    fn no_summary_without_test_output() {
        assert_eq!(test_summary("Finished dev profile"), None);
    }
}
