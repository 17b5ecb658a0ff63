//! Reading of `appmanifest_<appid>.acf` files
//!
//! Steam keeps one manifest per installed or queued app. The byte counters in
//! it are the only progress ground truth we have, so they are re-read on every
//! poll.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::vdf::parse_key_values;

/// Data from one Steam app manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    /// Steam App ID
    pub appid: String,
    /// Human-readable game name (falls back to `AppID <appid>`)
    pub name: String,
    pub bytes_downloaded: u64,
    pub bytes_to_download: u64,
    /// Raw `StateFlags` value; stored but not interpreted
    pub state_flags: u64,
}

impl AppManifest {
    /// Bytes still to download, never negative
    pub fn remaining_bytes(&self) -> u64 {
        self.bytes_to_download.saturating_sub(self.bytes_downloaded)
    }
}

/// Display name used when nothing better is known about an app
pub fn placeholder_name(appid: &str) -> String {
    format!("AppID {}", appid)
}

/// Extracts the App ID embedded in a manifest file name
pub fn appid_from_filename(filename: &str) -> Option<String> {
    static APPID_RE: OnceLock<Regex> = OnceLock::new();
    let appid_re =
        APPID_RE.get_or_init(|| Regex::new(r"(?i)appmanifest_(\d+)\.acf").unwrap());

    appid_re
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_counter(value: Option<&String>) -> u64 {
    value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

/// Builds a manifest from already-read text
///
/// The App ID comes from the `appid` key, or from the file name when the key
/// is missing or empty. Returns `None` when neither yields an ID.
pub fn parse_manifest(text: &str, filename: &str) -> Option<AppManifest> {
    let data = parse_key_values(text);

    let appid = data
        .get("appid")
        .filter(|value| !value.is_empty())
        .cloned()
        .or_else(|| appid_from_filename(filename))?;

    let name = data
        .get("name")
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| placeholder_name(&appid));

    Some(AppManifest {
        name,
        bytes_downloaded: parse_counter(data.get("BytesDownloaded")),
        bytes_to_download: parse_counter(data.get("BytesToDownload")),
        state_flags: parse_counter(data.get("StateFlags")),
        appid,
    })
}

/// Reads and parses one manifest file
///
/// Unreadable files and files without an identifiable App ID yield `None`;
/// invalid UTF-8 is replaced rather than rejected.
pub fn read_manifest(path: &Path) -> Option<AppManifest> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!("Failed to read manifest {}: {}", path.display(), err);
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let manifest = parse_manifest(&text, &filename);
    if manifest.is_none() {
        tracing::debug!("Skipping manifest without appid: {}", path.display());
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::VdfBuilder;

    fn manifest_text(appid: &str, name: &str, downloaded: &str, total: &str) -> String {
        VdfBuilder::new()
            .open_section("AppState")
            .key_value("appid", appid)
            .key_value("name", name)
            .key_value("StateFlags", "1026")
            .key_value("BytesToDownload", total)
            .key_value("BytesDownloaded", downloaded)
            .close_section()
            .build()
    }

    #[test]
    fn test_read_manifest_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appmanifest_123.acf");
        fs::write(
            &path,
            "\"appid\" \"123\"\n\"name\" \"Test Game\"\n\"BytesDownloaded\" \"100\"\n\"BytesToDownload\" \"1000\"\n\"StateFlags\" \"0\"\n",
        )
        .unwrap();

        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.appid, "123");
        assert_eq!(manifest.name, "Test Game");
        assert_eq!(manifest.bytes_downloaded, 100);
        assert_eq!(manifest.bytes_to_download, 1000);
        assert_eq!(manifest.remaining_bytes(), 900);
    }

    #[test]
    fn test_appid_falls_back_to_filename() {
        let text = VdfBuilder::new()
            .open_section("AppState")
            .key_value("name", "No Id Game")
            .close_section()
            .build();

        let manifest = parse_manifest(&text, "appmanifest_4242.acf").unwrap();
        assert_eq!(manifest.appid, "4242");
        assert_eq!(manifest.name, "No Id Game");
    }

    #[test]
    fn test_missing_appid_everywhere_is_skipped() {
        assert!(parse_manifest("\"name\" \"Orphan\"\n", "notes.txt").is_none());
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let manifest = parse_manifest("\"appid\" \"77\"\n", "appmanifest_77.acf").unwrap();
        assert_eq!(manifest.name, "AppID 77");
    }

    #[test]
    fn test_remaining_bytes_never_negative() {
        let text = manifest_text("5", "Done", "2000", "1000");
        let manifest = parse_manifest(&text, "appmanifest_5.acf").unwrap();
        assert_eq!(manifest.remaining_bytes(), 0);
    }

    #[test]
    fn test_bad_counters_become_zero() {
        let text = manifest_text("9", "Broken", "lots", "-5");
        let manifest = parse_manifest(&text, "appmanifest_9.acf").unwrap();
        assert_eq!(manifest.bytes_downloaded, 0);
        assert_eq!(manifest.bytes_to_download, 0);
        assert_eq!(manifest.state_flags, 1026);
    }

    #[test]
    fn test_unreadable_manifest_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_manifest(&dir.path().join("appmanifest_1.acf")).is_none());
    }

    #[test]
    fn test_appid_from_filename_is_case_insensitive() {
        assert_eq!(appid_from_filename("AppManifest_10.ACF"), Some("10".to_string()));
        assert_eq!(appid_from_filename("appmanifest_x.acf"), None);
    }
}
