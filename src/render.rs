//! Plain-text report rendering

use crate::entries::{EntryStatus, GameEntry};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human readable size with two decimals, e.g. `1.50 MB`
pub fn format_bytes(value: u64) -> String {
    let mut size = value as f64;
    for (index, unit) in BYTE_UNITS.iter().enumerate() {
        if size < 1024.0 || index == BYTE_UNITS.len() - 1 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{value} B")
}

/// Progress column of one entry
///
/// The percentage is truncated, so an almost finished download never reads 100%.
pub fn format_progress(downloaded: u64, total: u64, remaining: u64) -> String {
    if total == 0 {
        return "Progress: N/A".to_string();
    }
    let percent = (downloaded as f64 / total as f64 * 100.0) as u64;
    format!(
        "Progress: {} / {} ({percent}%) | Remaining: {}",
        format_bytes(downloaded),
        format_bytes(total),
        format_bytes(remaining)
    )
}

/// Renders entries grouped by status under a timestamp header
#[derive(Debug, Clone, Default)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self
    }

    fn title(status: EntryStatus) -> &'static str {
        match status {
            EntryStatus::Downloading => "Downloading",
            EntryStatus::Paused => "Paused",
            EntryStatus::Queued => "Queued",
            EntryStatus::Unknown => "Unknown",
        }
    }

    pub fn render(&self, timestamp: &str, entries: &[GameEntry]) -> Vec<String> {
        let mut lines = vec![format!("[{timestamp}]")];
        let mut printed_any = false;

        for status in EntryStatus::ORDER {
            let group: Vec<&GameEntry> = entries.iter().filter(|e| e.status == status).collect();
            if group.is_empty() {
                continue;
            }
            printed_any = true;
            lines.push(format!("{} ({})", Self::title(status), group.len()));
            for entry in group {
                let progress = format_progress(
                    entry.downloaded_bytes,
                    entry.total_bytes,
                    entry.remaining_bytes,
                );
                lines.push(format!("- {} | Rate: {} | {progress}", entry.name, entry.rate));
            }
        }

        if !printed_any {
            lines.push("No active downloads".to_string());
        }
        lines.push(String::new());
        lines
    }
}
