//! Merges the log-derived snapshot with manifest data into display entries

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::content_log::{DownloadSnapshot, DownloadStatus, ZERO_RATE};
use crate::manifest::{placeholder_name, AppManifest};

/// Rate shown when none is known
pub const NO_RATE: &str = "N/A";

/// Status of one displayed app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Downloading,
    Paused,
    Queued,
    Unknown,
}

impl EntryStatus {
    /// Display order of the status groups
    pub const ORDER: [EntryStatus; 4] = [
        EntryStatus::Downloading,
        EntryStatus::Paused,
        EntryStatus::Queued,
        EntryStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Downloading => "downloading",
            EntryStatus::Paused => "paused",
            EntryStatus::Queued => "queued",
            EntryStatus::Unknown => "unknown",
        }
    }
}

impl From<DownloadStatus> for EntryStatus {
    fn from(status: DownloadStatus) -> Self {
        match status {
            DownloadStatus::Downloading => EntryStatus::Downloading,
            DownloadStatus::Paused => EntryStatus::Paused,
            DownloadStatus::Unknown => EntryStatus::Unknown,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntry {
    pub name: String,
    pub status: EntryStatus,
    pub rate: String,
    pub appid: String,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub remaining_bytes: u64,
}

impl GameEntry {
    fn from_manifest(manifest: &AppManifest, status: EntryStatus, rate: String) -> Self {
        Self {
            name: manifest.name.clone(),
            status,
            rate,
            appid: manifest.appid.clone(),
            downloaded_bytes: manifest.bytes_downloaded,
            total_bytes: manifest.bytes_to_download,
            remaining_bytes: manifest.remaining_bytes(),
        }
    }
}

/// Last known display name per App ID, kept for the whole run
///
/// Lets an active download keep its real name while its manifest is briefly
/// missing.
#[derive(Debug, Default, Clone)]
pub struct NameCache {
    names: HashMap<String, String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, appid: &str) -> Option<&str> {
        self.names.get(appid).map(String::as_str)
    }

    pub fn remember(&mut self, appid: &str, name: &str) {
        self.names.insert(appid.to_string(), name.to_string());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Rate shown for the active app
fn active_rate(snapshot: &DownloadSnapshot) -> String {
    if snapshot.status == DownloadStatus::Paused {
        return ZERO_RATE.to_string();
    }
    snapshot
        .rate
        .clone()
        .unwrap_or_else(|| NO_RATE.to_string())
}

/// Builds the report entries for one poll
///
/// Every manifest with bytes left becomes an entry, queued unless it is the
/// active app. If the active app has no pending manifest, one extra entry is
/// appended for it so the current download is always shown. Names seen along
/// the way are written to `name_cache`.
pub fn build_entries(
    snapshot: &DownloadSnapshot,
    manifests: &[AppManifest],
    name_cache: &mut NameCache,
) -> Vec<GameEntry> {
    let all_by_appid: HashMap<&str, &AppManifest> = manifests
        .iter()
        .map(|manifest| (manifest.appid.as_str(), manifest))
        .collect();

    let active_appid = snapshot.appid.as_deref();
    let active_status = EntryStatus::from(snapshot.status);
    let rate = active_rate(snapshot);

    let mut entries = Vec::new();
    let mut pending_ids = HashSet::new();

    for manifest in manifests.iter().filter(|m| m.remaining_bytes() > 0) {
        if !pending_ids.insert(manifest.appid.as_str()) {
            continue;
        }
        name_cache.remember(&manifest.appid, &manifest.name);

        let entry = if active_appid == Some(manifest.appid.as_str()) {
            GameEntry::from_manifest(manifest, active_status, rate.clone())
        } else {
            GameEntry::from_manifest(manifest, EntryStatus::Queued, NO_RATE.to_string())
        };
        entries.push(entry);
    }

    if let Some(appid) = active_appid {
        if !pending_ids.contains(appid) {
            entries.push(active_fallback_entry(
                appid,
                all_by_appid.get(appid).copied(),
                active_status,
                rate,
                name_cache,
            ));
        }
    }

    entries
}

fn active_fallback_entry(
    appid: &str,
    manifest: Option<&AppManifest>,
    status: EntryStatus,
    rate: String,
    name_cache: &mut NameCache,
) -> GameEntry {
    if let Some(manifest) = manifest {
        name_cache.remember(appid, &manifest.name);
        return GameEntry {
            appid: appid.to_string(),
            ..GameEntry::from_manifest(manifest, status, rate)
        };
    }

    let name = name_cache
        .get(appid)
        .map(str::to_string)
        .unwrap_or_else(|| placeholder_name(appid));

    GameEntry {
        name,
        status,
        rate,
        appid: appid.to_string(),
        downloaded_bytes: 0,
        total_bytes: 0,
        remaining_bytes: 0,
    }
}
