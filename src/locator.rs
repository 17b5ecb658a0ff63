//! Steam install directory discovery
//!
//! There is no authoritative API for where Steam lives, so candidates are
//! pooled from several weak sources and each one is scored by what it
//! contains on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Registry hive named by a registry path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRoot {
    LocalMachine,
    CurrentUser,
}

impl RegistryRoot {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "HKEY_LOCAL_MACHINE" | "HKLM" => Some(RegistryRoot::LocalMachine),
            "HKEY_CURRENT_USER" | "HKCU" => Some(RegistryRoot::CurrentUser),
            _ => None,
        }
    }
}

/// Splits `HKCU\Software\Valve\Steam` into `("HKCU", "Software\Valve\Steam")`
pub fn split_registry_path(value: &str) -> Option<(&str, &str)> {
    if value.is_empty() {
        return None;
    }
    let (root, subkey) = value.split_once('\\').unwrap_or((value, ""));
    let root = root.trim();
    if root.is_empty() {
        return None;
    }
    Some((root, subkey))
}

/// Where install directory guesses come from
///
/// A source that is unavailable on the current platform yields no candidates.
#[derive(Debug, Clone)]
pub enum CandidateSource {
    /// Registry string values, one lookup per (path, value name) pair
    Registry {
        paths: Vec<String>,
        values: Vec<String>,
    },
    /// Directories of running Steam processes
    Processes,
    /// Configured paths, with environment variables and `~` expanded
    FixedPaths(Vec<String>),
}

impl CandidateSource {
    pub fn name(&self) -> &'static str {
        match self {
            CandidateSource::Registry { .. } => "registry",
            CandidateSource::Processes => "processes",
            CandidateSource::FixedPaths(_) => "fixed paths",
        }
    }

    pub fn candidates(&self) -> Vec<PathBuf> {
        match self {
            CandidateSource::Registry { paths, values } => registry_candidates(paths, values),
            CandidateSource::Processes => process_candidates(),
            CandidateSource::FixedPaths(candidates) => candidates
                .iter()
                .map(|candidate| PathBuf::from(expand_path(candidate)))
                .filter(|path| path.exists())
                .collect(),
        }
    }
}

fn registry_candidates(paths: &[String], values: &[String]) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for reg_path in paths {
        let Some((root_name, subkey)) = split_registry_path(reg_path) else {
            continue;
        };
        let Some(root) = RegistryRoot::from_name(root_name) else {
            continue;
        };
        for value_name in values {
            if let Some(value) = read_registry_value(root, subkey, value_name) {
                candidates.push(PathBuf::from(value));
            }
        }
    }
    candidates
}

#[cfg(windows)]
fn read_registry_value(root: RegistryRoot, subkey: &str, value_name: &str) -> Option<String> {
    use windows_sys::Win32::Foundation::ERROR_SUCCESS;
    use windows_sys::Win32::System::Registry::{
        RegGetValueW, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ,
    };

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }

    let hkey = match root {
        RegistryRoot::LocalMachine => HKEY_LOCAL_MACHINE,
        RegistryRoot::CurrentUser => HKEY_CURRENT_USER,
    };
    let subkey_w = to_wide(subkey);
    let value_w = to_wide(value_name);

    let mut size: u32 = 0;
    let status = unsafe {
        RegGetValueW(
            hkey,
            subkey_w.as_ptr(),
            value_w.as_ptr(),
            RRF_RT_REG_SZ,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut size,
        )
    };
    if status != ERROR_SUCCESS || size == 0 {
        return None;
    }

    let mut buffer = vec![0u16; (size as usize + 1) / 2];
    let status = unsafe {
        RegGetValueW(
            hkey,
            subkey_w.as_ptr(),
            value_w.as_ptr(),
            RRF_RT_REG_SZ,
            std::ptr::null_mut(),
            buffer.as_mut_ptr().cast(),
            &mut size,
        )
    };
    if status != ERROR_SUCCESS {
        return None;
    }

    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    let value = String::from_utf16_lossy(&buffer[..len]);
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(not(windows))]
fn read_registry_value(_root: RegistryRoot, _subkey: &str, _value_name: &str) -> Option<String> {
    None
}

fn process_candidates() -> Vec<PathBuf> {
    let mut system = sysinfo::System::new();
    system.refresh_processes();

    let mut candidates = Vec::new();
    for process in system.processes().values() {
        if cfg!(windows) {
            if let Some(exe) = process.exe() {
                let is_steam = exe
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case("steam.exe"));
                if is_steam {
                    if let Some(parent) = exe.parent() {
                        candidates.push(parent.to_path_buf());
                    }
                }
            }
        } else {
            candidates.extend(steam_dirs_from_args(process.cmd()));
        }
    }
    candidates
}

/// Finds `.../steam` or `.../steam.sh` launcher paths in a process argument
/// list and returns their directories
pub fn steam_dirs_from_args(args: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if !args.iter().any(|arg| arg.to_lowercase().contains("steam")) {
        return dirs;
    }

    for token in args.iter().flat_map(|arg| arg.split_whitespace()) {
        if !token.to_lowercase().contains("steam") {
            continue;
        }
        if !(token.starts_with('/') || token.starts_with('~')) {
            continue;
        }
        let path = PathBuf::from(expand_home(token));
        let is_launcher = path
            .file_name()
            .is_some_and(|name| name == "steam" || name == "steam.sh");
        if is_launcher && path.exists() {
            if let Some(parent) = path.parent() {
                dirs.push(parent.to_path_buf());
            }
        }
    }
    dirs
}

fn expand_home(value: &str) -> String {
    if value == "~" || value.starts_with("~/") || value.starts_with("~\\") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{}", home.display(), &value[1..]);
        }
    }
    value.to_string()
}

/// Expands `$VAR`, `${VAR}` and `%VAR%`, then a leading `~`
///
/// Unset variables are left as written.
pub fn expand_path(value: &str) -> String {
    static VAR_RE: OnceLock<Regex> = OnceLock::new();
    let var_re = VAR_RE.get_or_init(|| {
        Regex::new(r"\$\{(\w+)\}|\$(\w+)|%([\w()]+)%").unwrap()
    });

    let expanded = var_re.replace_all(value, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
    });

    expand_home(&expanded)
}

/// Picks the most plausible Steam root among pooled candidates
#[derive(Debug, Clone)]
pub struct SteamLocator {
    sources: Vec<CandidateSource>,
    log_rel_path: PathBuf,
}

impl SteamLocator {
    pub fn new(sources: Vec<CandidateSource>, log_rel_path: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            log_rel_path: log_rel_path.into(),
        }
    }

    /// Returns the Steam install path, or `None` when no candidate is convincing
    pub fn find_install_path(&self) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        for source in &self.sources {
            let found = source.candidates();
            tracing::debug!("{} candidates from {}", found.len(), source.name());
            candidates.extend(found);
        }
        self.pick_best_candidate(&candidates)
    }

    /// Highest score wins, ties go to the earlier candidate, and nothing below
    /// a score of 1 is accepted
    pub fn pick_best_candidate(&self, candidates: &[PathBuf]) -> Option<PathBuf> {
        let mut best: Option<(&PathBuf, i32)> = None;
        let mut seen = HashSet::new();

        for path in candidates {
            if path.as_os_str().is_empty() {
                continue;
            }
            if !seen.insert(path.to_string_lossy().to_lowercase()) {
                continue;
            }
            let score = self.score_candidate(path);
            tracing::debug!("candidate {} scored {}", path.display(), score);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((path, score));
            }
        }

        match best {
            Some((path, score)) if score >= 1 => Some(path.clone()),
            _ => None,
        }
    }

    /// Scores a directory by the Steam files it contains; missing paths score -1
    pub fn score_candidate(&self, path: &Path) -> i32 {
        if !path.exists() {
            return -1;
        }
        let mut score = 0;
        if path.join(&self.log_rel_path).exists() {
            score += 3;
        }
        if path.join("steamapps").exists() {
            score += 2;
        }
        if path.join("config").join("config.vdf").exists() {
            score += 1;
        }
        if path.join("logs").exists() {
            score += 1;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn locator() -> SteamLocator {
        SteamLocator::new(Vec::new(), "logs/content_log.txt")
    }

    fn full_install(root: &Path) {
        fs::create_dir_all(root.join("logs")).unwrap();
        fs::write(root.join("logs").join("content_log.txt"), "").unwrap();
        fs::create_dir_all(root.join("steamapps")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("config").join("config.vdf"), "").unwrap();
    }

    #[test]
    fn test_score_full_install() {
        let dir = tempfile::tempdir().unwrap();
        full_install(dir.path());
        assert_eq!(locator().score_candidate(dir.path()), 7);
    }

    #[test]
    fn test_score_missing_path_is_negative() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locator().score_candidate(&dir.path().join("nope")), -1);
    }

    #[test]
    fn test_log_and_apps_outscore_empty_dir() {
        let empty = tempfile::tempdir().unwrap();
        let steam = tempfile::tempdir().unwrap();
        fs::create_dir_all(steam.path().join("logs")).unwrap();
        fs::write(steam.path().join("logs").join("content_log.txt"), "").unwrap();
        fs::create_dir_all(steam.path().join("steamapps")).unwrap();

        let locator = locator();
        assert!(locator.score_candidate(steam.path()) > locator.score_candidate(empty.path()));

        let best = locator.pick_best_candidate(&[
            empty.path().to_path_buf(),
            steam.path().to_path_buf(),
        ]);
        assert_eq!(best, Some(steam.path().to_path_buf()));
    }

    #[test]
    fn test_no_existing_candidates_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let best = locator().pick_best_candidate(&[dir.path().join("a"), dir.path().join("b")]);
        assert_eq!(best, None);
        assert_eq!(locator().pick_best_candidate(&[]), None);
    }

    #[test]
    fn test_zero_score_is_not_confident() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locator().pick_best_candidate(&[dir.path().to_path_buf()]), None);
    }

    #[test]
    fn test_ties_go_to_first_candidate() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir_all(first.path().join("steamapps")).unwrap();
        fs::create_dir_all(second.path().join("steamapps")).unwrap();

        let best = locator().pick_best_candidate(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        assert_eq!(best, Some(first.path().to_path_buf()));
    }

    #[test]
    fn test_fixed_paths_keep_existing_only() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().to_string();
        let missing = dir.path().join("missing").to_string_lossy().to_string();

        let source = CandidateSource::FixedPaths(vec![missing, existing.clone()]);
        assert_eq!(source.candidates(), vec![PathBuf::from(existing)]);
    }

    #[test]
    fn test_find_install_path_from_fixed_paths() {
        let dir = tempfile::tempdir().unwrap();
        let steam = dir.path().join("Steam");
        full_install(&steam);

        let locator = SteamLocator::new(
            vec![CandidateSource::FixedPaths(vec![
                dir.path().to_string_lossy().to_string(),
                steam.to_string_lossy().to_string(),
            ])],
            "logs/content_log.txt",
        );
        assert_eq!(locator.find_install_path(), Some(steam));
    }

    #[test]
    fn test_split_registry_path() {
        assert_eq!(
            split_registry_path("HKCU\\Software\\Valve\\Steam"),
            Some(("HKCU", "Software\\Valve\\Steam"))
        );
        assert_eq!(split_registry_path("HKLM"), Some(("HKLM", "")));
        assert_eq!(split_registry_path(""), None);
        assert_eq!(RegistryRoot::from_name("hkey_local_machine"), Some(RegistryRoot::LocalMachine));
        assert_eq!(RegistryRoot::from_name("HKCR"), None);
    }

    #[test]
    fn test_expand_path_variables() {
        std::env::set_var("STEAM_MONITOR_TEST_EXPAND", "/opt/games");
        assert_eq!(expand_path("$STEAM_MONITOR_TEST_EXPAND/Steam"), "/opt/games/Steam");
        assert_eq!(expand_path("${STEAM_MONITOR_TEST_EXPAND}/Steam"), "/opt/games/Steam");
        assert_eq!(expand_path("%STEAM_MONITOR_TEST_EXPAND%/Steam"), "/opt/games/Steam");
        assert_eq!(
            expand_path("$STEAM_MONITOR_TEST_UNSET_VAR/Steam"),
            "$STEAM_MONITOR_TEST_UNSET_VAR/Steam"
        );
    }

    #[test]
    fn test_steam_dirs_from_args() {
        let dir = tempfile::tempdir().unwrap();
        let steam_dir = dir.path().join("steam-root");
        fs::create_dir_all(&steam_dir).unwrap();
        fs::write(steam_dir.join("steam.sh"), "").unwrap();
        let launcher = steam_dir.join("steam.sh").to_string_lossy().to_string();

        if launcher.starts_with('/') {
            let args = vec![launcher, "-silent".to_string()];
            assert_eq!(steam_dirs_from_args(&args), vec![steam_dir]);
        }
        assert!(steam_dirs_from_args(&["/usr/bin/bash".to_string()]).is_empty());
    }
}
