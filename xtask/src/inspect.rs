//! xtask inspect - summarize recordings copied off (or still on) a card.
//!
//! Reads every `audio_NNNNNN.wav` (or 8.3 `AUNNNNNN.WAV`) in a directory
//! through the same WAV reader the recorder uses, and pairs it with its
//! timestamp file. A WAV whose header disagrees with the file length was
//! cut off before its session closed (power loss, card pulled).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use embassy_futures::block_on;
use platform::storage_local::LocalFileStorage;
use platform::{AudioConfig, File, NameStyle, OpenMode, Storage};
use recorder::wav::{self, HEADER_LEN};
use recorder::{RecorderConfig, SessionNames};

/// One session found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionReport {
    pub index: u32,
    pub audio: String,
    /// Data-chunk size from the header, or the reason it could not be read.
    pub data_len: Result<u32, &'static str>,
    pub file_len: u64,
    pub timestamps: Option<TimestampSummary>,
}

/// Line counts of a timestamp file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TimestampSummary {
    pub entries: usize,
    pub malformed: usize,
}

/// Session index and naming style of an audio file name, if it is one.
pub(crate) fn parse_audio_name(name: &str) -> Option<(u32, NameStyle)> {
    let (digits, style) = if let Some(rest) = name.strip_prefix("audio_") {
        (rest.strip_suffix(".wav")?, NameStyle::Long)
    } else {
        (name.strip_prefix("AU")?.strip_suffix(".WAV")?, NameStyle::Short)
    };
    if digits.len() < 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, style))
}

/// Count entries in a timestamp file. Each entry is a `press release` pair
/// of millisecond offsets on its own line; anything else is malformed.
pub(crate) fn summarize_timestamps(text: &str) -> TimestampSummary {
    let mut summary = TimestampSummary::default();
    for line in text.lines().filter(|l| !l.is_empty()) {
        let mut fields = line.split(' ');
        let well_formed = matches!(
            (fields.next().map(str::parse::<u64>), fields.next().map(str::parse::<u64>), fields.next()),
            (Some(Ok(_)), Some(Ok(_)), None)
        );
        if well_formed {
            summary.entries = summary.entries.saturating_add(1);
        } else {
            summary.malformed = summary.malformed.saturating_add(1);
        }
    }
    summary
}

/// Recording length for `data_len` bytes of `format`.
pub(crate) fn duration_secs(data_len: u32, format: &AudioConfig) -> f64 {
    match format.byte_rate() {
        0 => 0.0,
        rate => f64::from(data_len) / f64::from(rate),
    }
}

fn read_session(storage: &mut LocalFileStorage, names: &SessionNames, format: &AudioConfig) -> Result<SessionReport> {
    let mut file = block_on(storage.open_file(names.audio(), OpenMode::Read))
        .with_context(|| format!("open {}", names.audio()))?;
    let file_len = block_on(file.size()).context("size")?;
    let data_len = block_on(wav::read_header(&mut file, format)).map_err(|e| e.as_str());
    block_on(storage.close_file(file)).context("close")?;

    let timestamps = std::fs::read_to_string(storage.root().join(names.timestamps()))
        .ok()
        .map(|text| summarize_timestamps(&text));

    Ok(SessionReport { index: names.index(), audio: names.audio().to_owned(), data_len, file_len, timestamps })
}

/// Scan `dir` and return one report per audio file, ordered by index.
pub(crate) fn scan(dir: &Path, only: Option<u32>, format: &AudioConfig) -> Result<Vec<SessionReport>> {
    let mut storage = LocalFileStorage::new(dir);
    block_on(storage.mount()).with_context(|| format!("mount {}", dir.display()))?;

    let mut found: Vec<(u32, NameStyle)> = std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .filter_map(|name| parse_audio_name(&name))
        .filter(|(index, _)| only.map_or(true, |o| o == *index))
        .collect();
    found.sort_unstable_by_key(|(index, _)| *index);

    found
        .into_iter()
        .map(|(index, style)| read_session(&mut storage, &SessionNames::new(index, style), format))
        .collect()
}

fn print_report(report: &SessionReport, format: &AudioConfig) {
    let stamps = match report.timestamps {
        Some(t) if t.malformed == 0 => format!("{} timestamps", t.entries),
        Some(t) => format!("{} timestamps, {} malformed lines", t.entries, t.malformed).yellow().to_string(),
        None => "no timestamp file".yellow().to_string(),
    };
    match report.data_len {
        Ok(data_len) => {
            let expected = u64::from(data_len).saturating_add(HEADER_LEN as u64);
            let line = format!(
                "  {:>6}  {}  {:>8.1}s  {}",
                report.index,
                report.audio,
                duration_secs(data_len, format),
                stamps
            );
            if expected == report.file_len {
                println!("{line}");
            } else {
                println!(
                    "{}  {}",
                    line,
                    format!("header says {} bytes, file has {}", expected, report.file_len).yellow()
                );
            }
        }
        Err(reason) => println!("  {:>6}  {}  {}", report.index, report.audio, reason.red()),
    }
}

/// Entry point called from main.rs
pub fn run(dir: Option<PathBuf>, index: Option<u32>) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => LocalFileStorage::from_env()
            .map(|s| s.root().to_path_buf())
            .context("pass --dir or set RECORDINGS_PATH")?,
    };
    let format = RecorderConfig::default().format;

    println!();
    println!("{}", format!("🎙 {} recordings in {}", platform::config::APP_NAME, dir.display()).cyan().bold());
    println!();

    let reports = scan(&dir, index, &format)?;
    if reports.is_empty() {
        println!("{}", "  no sessions found".yellow());
    }
    for report in &reports {
        print_report(report, &format);
    }
    println!();
    Ok(())
}
