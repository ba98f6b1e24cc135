use anyhow::Result;
use colored::Colorize;

use crate::step::{OnFailure, Step};

const TARGET: &str = "thumbv7em-none-eabihf";
const CHIP: &str = "STM32H743ZITx";

fn elf_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/firmware")
}

pub fn run(release: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };
    println!();
    println!("{}", format!("🔨 Building firmware ({mode} mode)...").cyan().bold());
    println!();

    let mut build = vec!["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"];
    if release {
        build.push("--release");
    }
    Step::cargo("Build", &build).run()?;

    let elf = elf_path(release);
    let size = Step { label: "Section sizes", program: "rust-size", args: &["-A", elf.as_str()], on_failure: OnFailure::Warn };
    if let Some(out) = size.run()? {
        for line in String::from_utf8_lossy(&out.stdout).lines() {
            // Only the sections memory.x budgets for.
            if line.starts_with(".axisram") || line.starts_with(".text") || line.starts_with(".bss") {
                println!("   {}", line.dimmed());
            }
        }
        println!();
    }

    println!("{}", "📡 Flashing to STM32H7 (probe-rs)...".cyan().bold());
    Step { label: "Flash", program: "probe-rs", args: &["download", "--chip", CHIP, elf.as_str()], on_failure: OnFailure::Abort }
        .run()?;

    println!("{}", "🎙 Field recorder is running on hardware!".bold());
    println!("   {}", format!("RTT logs: probe-rs attach --chip {CHIP} {elf}").dimmed());
    println!("   {}", "Copy the card's files off and run `cargo xtask inspect --dir <path>`".dimmed());
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_path_follows_the_profile() {
        assert_eq!(elf_path(true), "target/thumbv7em-none-eabihf/release/firmware");
        assert_eq!(elf_path(false), "target/thumbv7em-none-eabihf/debug/firmware");
    }
}
