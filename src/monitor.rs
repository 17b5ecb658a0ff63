//! Poll loop tying the log parser, manifest catalog and renderer together

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::catalog::ManifestCatalog;
use crate::console::LineSink;
use crate::content_log::{ContentLogParser, ContentLogReader, DownloadSnapshot};
use crate::entries::{build_entries, NameCache};
use crate::library::SteamLibrary;
use crate::render::ConsoleRenderer;

/// Timing and formatting of the poll loop
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub samples: u64,
    pub timestamp_format: String,
}

pub struct SteamDownloadMonitor<S: LineSink> {
    reader: ContentLogReader,
    parser: ContentLogParser,
    library: SteamLibrary,
    catalog: ManifestCatalog,
    renderer: ConsoleRenderer,
    sink: S,
    settings: MonitorSettings,
    last_snapshot: Option<DownloadSnapshot>,
    library_paths: Option<Vec<PathBuf>>,
    name_cache: NameCache,
}

impl<S: LineSink> SteamDownloadMonitor<S> {
    pub fn new(
        reader: ContentLogReader,
        library: SteamLibrary,
        catalog: ManifestCatalog,
        sink: S,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            reader,
            parser: ContentLogParser::new(),
            library,
            catalog,
            renderer: ConsoleRenderer::new(),
            sink,
            settings,
            last_snapshot: None,
            library_paths: None,
            name_cache: NameCache::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn last_snapshot(&self) -> Option<&DownloadSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Runs the configured number of samples, sleeping between them
    pub async fn run(&mut self) {
        for index in 0..self.settings.samples {
            let lines = self.sample().await;
            for line in &lines {
                self.sink.write_line(line);
            }
            if index + 1 < self.settings.samples {
                tokio::time::sleep(self.settings.interval).await;
            }
        }
    }

    /// Takes one sample and returns the rendered report lines
    pub async fn sample(&mut self) -> Vec<String> {
        let reader = self.reader.clone();
        let text = tokio::task::spawn_blocking(move || reader.read())
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("Content log read task failed: {}", err);
                String::new()
            });

        let snapshot = self.parser.parse(&text, self.last_snapshot.as_ref());
        tracing::debug!(
            appid = ?snapshot.appid,
            status = %snapshot.status,
            rate = ?snapshot.rate,
            "snapshot"
        );

        let library_paths = self.library_paths();
        let catalog = self.catalog.clone();
        let manifests = tokio::task::spawn_blocking(move || catalog.list_manifests(&library_paths))
            .await
            .unwrap_or_else(|err| {
                tracing::warn!("Manifest scan task failed: {}", err);
                Vec::new()
            });
        tracing::debug!(total = manifests.len(), "manifests");

        let entries = build_entries(&snapshot, &manifests, &mut self.name_cache);
        self.last_snapshot = Some(snapshot);

        let timestamp = Local::now()
            .format(&self.settings.timestamp_format)
            .to_string();
        self.renderer.render(&timestamp, &entries)
    }

    /// Library roots, resolved on first use and kept for the whole run
    fn library_paths(&mut self) -> Vec<PathBuf> {
        if let Some(paths) = &self.library_paths {
            return paths.clone();
        }
        let paths = self.library.list_paths();
        tracing::debug!(count = paths.len(), "library roots resolved");
        self.library_paths = Some(paths.clone());
        paths
    }
}
