//! Enumerates app manifests across all Steam libraries

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::manifest::{read_manifest, AppManifest};

/// Turns a `{appid}`-templated manifest pattern into a glob
///
/// `steamapps/appmanifest_{appid}.acf` becomes `steamapps/appmanifest_*.acf`.
/// `{id}` is accepted as an alias.
pub fn to_glob_pattern(pattern: &str) -> String {
    pattern.replace("{appid}", "*").replace("{id}", "*")
}

fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

fn component_matcher(component: &str) -> Result<GlobMatcher, String> {
    GlobBuilder::new(component)
        .case_insensitive(cfg!(windows))
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| format!("Invalid manifest pattern component {:?}: {}", component, e))
}

/// Manifest set for one poll, built from a pattern relative to each library
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    glob_pattern: String,
}

impl ManifestCatalog {
    pub fn new(manifest_pattern: &str) -> Self {
        Self {
            glob_pattern: to_glob_pattern(manifest_pattern),
        }
    }

    /// Reads every manifest matching the pattern under each library root
    ///
    /// Libraries are visited in order and files within a directory in name
    /// order. The first manifest seen for an App ID wins; later duplicates are
    /// dropped. Missing libraries, unreadable directories and unparsable
    /// manifests are skipped.
    pub fn list_manifests(&self, library_paths: &[PathBuf]) -> Vec<AppManifest> {
        let mut manifests = Vec::new();
        let mut seen = HashSet::new();

        for library in library_paths {
            if !library.exists() {
                continue;
            }
            let files = match self.matching_files(library) {
                Ok(files) => files,
                Err(err) => {
                    tracing::debug!("{}", err);
                    continue;
                }
            };
            for path in files {
                if let Some(manifest) = read_manifest(&path) {
                    if seen.insert(manifest.appid.clone()) {
                        manifests.push(manifest);
                    }
                }
            }
        }

        manifests
    }

    fn matching_files(&self, root: &Path) -> Result<Vec<PathBuf>, String> {
        let mut current = vec![root.to_path_buf()];

        let components: Vec<&str> = self
            .glob_pattern
            .split(['/', '\\'])
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();

        for component in components {
            let mut next = Vec::new();
            if has_glob_meta(component) {
                let matcher = component_matcher(component)?;
                for dir in &current {
                    next.extend(matching_children(dir, &matcher));
                }
            } else {
                for dir in &current {
                    let candidate = dir.join(component);
                    if candidate.exists() {
                        next.push(candidate);
                    }
                }
            }
            current = next;
        }

        Ok(current.into_iter().filter(|path| path.is_file()).collect())
    }
}

fn matching_children(dir: &Path, matcher: &GlobMatcher) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("Failed to list {}: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::VdfBuilder;

    fn write_manifest(library: &Path, appid: &str, name: &str, downloaded: u64, total: u64) {
        let steamapps = library.join("steamapps");
        fs::create_dir_all(&steamapps).unwrap();
        let text = VdfBuilder::new()
            .open_section("AppState")
            .key_value("appid", appid)
            .key_value("name", name)
            .key_value("BytesDownloaded", &downloaded.to_string())
            .key_value("BytesToDownload", &total.to_string())
            .close_section()
            .build();
        fs::write(steamapps.join(format!("appmanifest_{}.acf", appid)), text).unwrap();
    }

    #[test]
    fn test_to_glob_pattern() {
        assert_eq!(
            to_glob_pattern("steamapps/appmanifest_{appid}.acf"),
            "steamapps/appmanifest_*.acf"
        );
        assert_eq!(to_glob_pattern("apps/{id}.acf"), "apps/*.acf");
        assert_eq!(to_glob_pattern("fixed.acf"), "fixed.acf");
    }

    #[test]
    fn test_list_manifests_reads_single_library() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "123", "Test Game", 100, 1000);

        let catalog = ManifestCatalog::new("steamapps/appmanifest_{appid}.acf");
        let manifests = catalog.list_manifests(&[dir.path().to_path_buf()]);
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].appid, "123");
        assert_eq!(manifests[0].name, "Test Game");
        assert_eq!(manifests[0].remaining_bytes(), 900);
    }

    #[test]
    fn test_list_manifests_ignores_non_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "1", "One", 0, 10);
        fs::write(dir.path().join("steamapps").join("libraryfolders.vdf"), "\"path\" \"x\"").unwrap();
        fs::write(dir.path().join("steamapps").join("appmanifest_2.acf.tmp"), "\"appid\" \"2\"").unwrap();

        let catalog = ManifestCatalog::new("steamapps/appmanifest_{appid}.acf");
        let manifests = catalog.list_manifests(&[dir.path().to_path_buf()]);
        let ids: Vec<&str> = manifests.iter().map(|m| m.appid.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[test]
    fn test_first_seen_appid_wins_across_libraries() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_manifest(first.path(), "10", "From First", 0, 50);
        write_manifest(second.path(), "10", "From Second", 0, 70);
        write_manifest(second.path(), "20", "Only Second", 0, 30);

        let catalog = ManifestCatalog::new("steamapps/appmanifest_{appid}.acf");
        let manifests = catalog.list_manifests(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        assert_eq!(manifests.len(), 2);
        assert_eq!(manifests[0].name, "From First");
        assert_eq!(manifests[1].appid, "20");
    }

    #[test]
    fn test_missing_library_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "5", "Five", 1, 2);

        let catalog = ManifestCatalog::new("steamapps/appmanifest_{appid}.acf");
        let manifests = catalog.list_manifests(&[
            dir.path().join("does-not-exist"),
            dir.path().to_path_buf(),
        ]);
        assert_eq!(manifests.len(), 1);
    }

    #[test]
    fn test_discovery_order_is_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "300", "C", 0, 1);
        write_manifest(dir.path(), "100", "A", 0, 1);
        write_manifest(dir.path(), "200", "B", 0, 1);

        let catalog = ManifestCatalog::new("steamapps/appmanifest_{appid}.acf");
        let names: Vec<String> = catalog
            .list_manifests(&[dir.path().to_path_buf()])
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
