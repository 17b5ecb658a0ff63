//! Download status inference from Steam's `content_log.txt`
//!
//! The log is append-only and only ever seen through a bounded tail window, so
//! a download's events can be spread across several polls. Each poll produces
//! a [`DownloadSnapshot`] and the previous snapshot is fed back in so state
//! carries forward when the current window has nothing new to say.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use codepage_strings::Coding;
use regex::Regex;

/// Rate shown for a paused download
pub const ZERO_RATE: &str = "0 Mbps";

/// Text encoding of the content log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEncoding {
    Utf8,
    /// Windows code page number
    Codepage(u16),
}

impl FromStr for LogEncoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        let encoding = match normalized.as_str() {
            "utf-8" | "utf8" | "utf-8-sig" => LogEncoding::Utf8,
            "latin-1" | "latin1" | "iso-8859-1" => LogEncoding::Codepage(28591),
            "ascii" | "us-ascii" => LogEncoding::Codepage(20127),
            "utf-16" | "utf-16le" => LogEncoding::Codepage(1200),
            "utf-16be" => LogEncoding::Codepage(1201),
            other => {
                let number = other
                    .strip_prefix("windows-")
                    .or_else(|| other.strip_prefix("cp"))
                    .unwrap_or(other);
                let codepage: u16 = number
                    .parse()
                    .map_err(|_| format!("Unsupported log encoding: {}", value))?;
                LogEncoding::Codepage(codepage)
            }
        };

        if let LogEncoding::Codepage(codepage) = encoding {
            Coding::new(codepage)
                .map_err(|_| format!("Unsupported log encoding: {}", value))?;
        }
        Ok(encoding)
    }
}

impl LogEncoding {
    /// Decodes bytes, replacing anything the encoding cannot represent
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            LogEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            LogEncoding::Codepage(codepage) => match Coding::new(*codepage) {
                Ok(coding) => coding.decode_lossy(bytes).into_owned(),
                Err(_) => String::from_utf8_lossy(bytes).into_owned(),
            },
        }
    }
}

/// Reads the trailing part of the content log
#[derive(Debug, Clone)]
pub struct ContentLogReader {
    log_path: PathBuf,
    tail_bytes: u64,
    encoding: LogEncoding,
}

impl ContentLogReader {
    pub fn new(log_path: PathBuf, tail_bytes: u64, encoding: LogEncoding) -> Self {
        Self {
            log_path,
            tail_bytes,
            encoding,
        }
    }

    /// Returns the last `tail_bytes` of the log as text
    ///
    /// A missing or unreadable log reads as empty text.
    pub fn read(&self) -> String {
        match read_tail(&self.log_path, self.tail_bytes) {
            Ok(bytes) => self.encoding.decode_lossy(&bytes),
            Err(err) => {
                tracing::debug!("{}", err);
                String::new()
            }
        }
    }
}

fn read_tail(path: &Path, tail_bytes: u64) -> Result<Vec<u8>, String> {
    let mut file = File::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let size = file
        .seek(SeekFrom::End(0))
        .map_err(|e| format!("Failed to seek {}: {}", path.display(), e))?;
    let start = size.saturating_sub(tail_bytes);
    file.seek(SeekFrom::Start(start))
        .map_err(|e| format!("Failed to seek {}: {}", path.display(), e))?;

    let mut data = Vec::with_capacity((size - start) as usize);
    file.read_to_end(&mut data)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    Ok(data)
}

/// Inferred state of the download Steam is working on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadStatus {
    Downloading,
    Paused,
    #[default]
    Unknown,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One poll's view of the active download
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadSnapshot {
    pub appid: Option<String>,
    /// Value and unit exactly as logged, e.g. `10.0 Mbps`
    pub rate: Option<String>,
    pub status: DownloadStatus,
}

struct RateReport {
    index: usize,
    value: Option<f64>,
    text: String,
}

/// Last positions of each signal since the most recent `update started`
#[derive(Default)]
struct SignalScan {
    appid: Option<String>,
    pause_idx: Option<usize>,
    resume_idx: Option<usize>,
    rate: Option<RateReport>,
}

fn rate_re() -> &'static Regex {
    static RATE_RE: OnceLock<Regex> = OnceLock::new();
    RATE_RE.get_or_init(|| {
        Regex::new(r"(?i)Current download rate:\s*([0-9.]+)\s*([A-Za-z/]+)").unwrap()
    })
}

fn update_started_re() -> &'static Regex {
    static STARTED_RE: OnceLock<Regex> = OnceLock::new();
    STARTED_RE.get_or_init(|| Regex::new(r"(?i)AppID\s+(\d+)\s+update started").unwrap())
}

fn pause_re() -> &'static Regex {
    static PAUSE_RE: OnceLock<Regex> = OnceLock::new();
    PAUSE_RE.get_or_init(|| {
        Regex::new(r"(?i)\bSuspended\b|update canceled|update cancelled|update stopped").unwrap()
    })
}

fn resume_re() -> &'static Regex {
    static RESUME_RE: OnceLock<Regex> = OnceLock::new();
    RESUME_RE.get_or_init(|| Regex::new(r"(?i)update resumed|update started").unwrap())
}

fn appid_mention_re() -> &'static Regex {
    static MENTION_RE: OnceLock<Regex> = OnceLock::new();
    MENTION_RE.get_or_init(|| Regex::new(r"(?i)AppID\s+(\d+)").unwrap())
}

/// True when the line mentions exactly `AppID <appid>`, not a longer ID that
/// shares the prefix
fn mentions_appid(line: &str, appid: &str) -> bool {
    appid_mention_re()
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .any(|m| m.as_str() == appid)
}

/// Turns a content log tail into a [`DownloadSnapshot`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentLogParser;

impl ContentLogParser {
    pub fn new() -> Self {
        Self
    }

    /// Infers the current download state from `text`
    ///
    /// Never fails. Text with no recognizable events returns `previous`
    /// unchanged, or an unknown snapshot when there is no previous one. A
    /// start line always sets the active id, even when the status has to be
    /// taken from `previous`.
    pub fn parse(&self, text: &str, previous: Option<&DownloadSnapshot>) -> DownloadSnapshot {
        resolve_snapshot(scan_signals(text), previous)
    }
}

/// Combines one scan with the previous snapshot
fn resolve_snapshot(scan: SignalScan, previous: Option<&DownloadSnapshot>) -> DownloadSnapshot {
    let fresh_status = decide_status(&scan);

    if fresh_status == DownloadStatus::Unknown && scan.appid.is_none() {
        return previous.cloned().unwrap_or_default();
    }

    let rate = match fresh_status {
        DownloadStatus::Paused => Some(ZERO_RATE.to_string()),
        DownloadStatus::Downloading => current_rate(&scan),
        DownloadStatus::Unknown => None,
    };

    let mut snapshot = DownloadSnapshot {
        appid: scan.appid,
        rate,
        status: fresh_status,
    };

    if let Some(previous) = previous {
        if snapshot.appid.is_none() {
            snapshot.appid = previous.appid.clone();
        }
        if snapshot.status == DownloadStatus::Unknown {
            snapshot.status = previous.status;
        }
        if snapshot.rate.is_none()
            && snapshot.status == DownloadStatus::Downloading
            && previous.status == DownloadStatus::Downloading
            && previous.appid == snapshot.appid
        {
            snapshot.rate = previous.rate.clone();
        }
    }

    snapshot
}

/// Single forward pass over the lines
///
/// An `update started` line restarts the scan: everything before the most
/// recent start describes an older state and is forgotten.
fn scan_signals(text: &str) -> SignalScan {
    let started = update_started_re();
    let pause = pause_re();
    let resume = resume_re();
    let rate = rate_re();

    let mut scan = SignalScan::default();

    for (idx, line) in text.lines().enumerate() {
        if let Some(caps) = started.captures(line) {
            scan = SignalScan {
                appid: caps.get(1).map(|m| m.as_str().to_string()),
                ..SignalScan::default()
            };
        }

        if let Some(appid) = scan.appid.as_deref() {
            if mentions_appid(line, appid) {
                if pause.is_match(line) {
                    scan.pause_idx = Some(idx);
                } else if resume.is_match(line) {
                    scan.resume_idx = Some(idx);
                }
            }
        }

        if let Some(caps) = rate.captures(line) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            scan.rate = Some(RateReport {
                index: idx,
                value: value.parse::<f64>().ok(),
                text: format!("{} {}", value, unit),
            });
        }
    }

    scan
}

fn decide_status(scan: &SignalScan) -> DownloadStatus {
    if let Some(pause) = scan.pause_idx {
        if scan.resume_idx.map_or(true, |resume| pause >= resume) {
            return DownloadStatus::Paused;
        }
    }
    if scan.resume_idx.is_some() {
        return DownloadStatus::Downloading;
    }

    match scan.rate.as_ref().and_then(|rate| rate.value) {
        Some(value) if value <= 0.0 => DownloadStatus::Paused,
        Some(_) => DownloadStatus::Downloading,
        None => DownloadStatus::Unknown,
    }
}

/// Rate for a downloading status, dropped when it was reported before the
/// resume that started the current run or at/before a pause
fn current_rate(scan: &SignalScan) -> Option<String> {
    let rate = scan.rate.as_ref()?;
    if scan.resume_idx.is_some_and(|resume| rate.index < resume) {
        return None;
    }
    if scan.pause_idx.is_some_and(|pause| rate.index <= pause) {
        return None;
    }
    Some(rate.text.clone())
}
