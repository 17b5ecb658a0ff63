//! Steam library folder discovery
//!
//! The primary Steam root is always a library. Additional libraries are listed
//! in `steamapps/libraryfolders.vdf` as `"path" "D:\\SteamLibrary"` entries,
//! with backslashes escaped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Resolves the set of library roots for one Steam install
#[derive(Debug, Clone)]
pub struct SteamLibrary {
    steam_root: PathBuf,
    library_vdf_path: PathBuf,
}

impl SteamLibrary {
    pub fn new(steam_root: PathBuf, library_vdf_path: PathBuf) -> Self {
        Self {
            steam_root,
            library_vdf_path,
        }
    }

    /// Returns the primary root followed by every declared library, without
    /// case-insensitive duplicates
    ///
    /// A missing or unreadable `libraryfolders.vdf` leaves just the primary
    /// root.
    pub fn list_paths(&self) -> Vec<PathBuf> {
        let mut libraries = vec![self.steam_root.clone()];

        match read_library_index(&self.library_vdf_path) {
            Ok(paths) => libraries.extend(paths),
            Err(err) => tracing::debug!("{}", err),
        }

        dedupe_paths(libraries)
    }
}

fn read_library_index(path: &Path) -> Result<Vec<PathBuf>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let bytes = fs::read(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    Ok(parse_library_paths(&String::from_utf8_lossy(&bytes)))
}

/// Extracts every `"path"` value from a `libraryfolders.vdf` body
pub fn parse_library_paths(text: &str) -> Vec<PathBuf> {
    static PATH_RE: OnceLock<Regex> = OnceLock::new();
    let path_re = PATH_RE.get_or_init(|| Regex::new(r#""path"\s+"([^"]+)""#).unwrap());

    path_re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str().replace("\\\\", "\\")))
        .collect()
}

/// Drops paths whose lowercased text was already seen, keeping first occurrences
pub fn dedupe_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(path.to_string_lossy().to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdf::VdfBuilder;

    #[test]
    fn test_parse_library_paths_unescapes_backslashes() {
        let text = VdfBuilder::new()
            .open_section("libraryfolders")
            .open_section("0")
            .key_value("path", "C:\\\\Program Files (x86)\\\\Steam")
            .close_section()
            .open_section("1")
            .key_value("path", "D:\\\\SteamLibrary")
            .key_value("label", "")
            .close_section()
            .close_section()
            .build();

        let paths = parse_library_paths(&text);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("C:\\Program Files (x86)\\Steam"),
                PathBuf::from("D:\\SteamLibrary"),
            ]
        );
    }

    #[test]
    fn test_list_paths_includes_root_first_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Steam");
        let extra = dir.path().join("Library2");
        let vdf_path = root.join("steamapps").join("libraryfolders.vdf");
        fs::create_dir_all(vdf_path.parent().unwrap()).unwrap();

        let root_upper = root.to_string_lossy().to_uppercase();
        let text = VdfBuilder::new()
            .open_section("libraryfolders")
            .open_section("0")
            .key_value("path", &root_upper)
            .close_section()
            .open_section("1")
            .key_value("path", &extra.to_string_lossy())
            .close_section()
            .close_section()
            .build();
        fs::write(&vdf_path, text).unwrap();

        let library = SteamLibrary::new(root.clone(), vdf_path);
        assert_eq!(library.list_paths(), vec![root, extra]);
    }

    #[test]
    fn test_missing_library_index_returns_root_only() {
        let dir = tempfile::tempdir().unwrap();
        let library = SteamLibrary::new(
            dir.path().to_path_buf(),
            dir.path().join("steamapps").join("libraryfolders.vdf"),
        );
        assert_eq!(library.list_paths(), vec![dir.path().to_path_buf()]);
    }
}
