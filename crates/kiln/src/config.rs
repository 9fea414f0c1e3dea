//! Settings for kiln
//!
//! Settings are read from a TOML file with `camelCase` keys:
//!
//! ```toml
//! historyDir = "/var/cache/kiln/history"
//! buildCacheEnabled = true
//! defaultPathSensitivity = "relative"
//! projectRoot = "/home/me/project"
//! ```
//!
//! `KILN_HISTORY_DIR` and `KILN_BUILD_CACHE` override the file.

use crate::{Error, Result};
use dirs::{cache_dir, home_dir};
use kiln_fingerprint::PathSensitivity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable overriding the history directory.
pub const HISTORY_DIR_ENV: &str = "KILN_HISTORY_DIR";

/// Environment variable switching output caching on or off.
pub const BUILD_CACHE_ENV: &str = "KILN_BUILD_CACHE";

/// Main settings structure for kiln
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Where execution history is stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_dir: Option<PathBuf>,

    /// Global output caching switch
    pub build_cache_enabled: bool,

    /// Path policy for file inputs that declare none
    pub default_path_sensitivity: PathSensitivity,

    /// Root used to display paths in diagnostics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_dir: None,
            build_cache_enabled: true,
            default_path_sensitivity: PathSensitivity::Absolute,
            project_root: None,
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or unknown values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Failed to parse settings: {e}")))
    }

    /// Read settings from a TOML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, or when an
    /// override is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        settings.with_env_overrides()
    }

    /// Apply `KILN_HISTORY_DIR` and `KILN_BUILD_CACHE`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `KILN_BUILD_CACHE` is not a
    /// boolean.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(dir) = std::env::var(HISTORY_DIR_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            self.history_dir = Some(PathBuf::from(dir));
        }
        if let Ok(value) = std::env::var(BUILD_CACHE_ENV) {
            self.build_cache_enabled = parse_switch(&value).ok_or_else(|| {
                Error::configuration(format!("{BUILD_CACHE_ENV} must be a boolean, got '{value}'"))
            })?;
        }
        Ok(self)
    }

    /// Pick the history directory. Resolution order (first writable wins):
    /// 1) `historyDir` / `KILN_HISTORY_DIR`
    /// 2) `XDG_CACHE_HOME/kiln/history`
    /// 3) OS cache dir/kiln/history
    /// 4) `~/.kiln/history`
    /// 5) `TMPDIR/kiln/history`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no candidate is writable.
    pub fn resolve_history_dir(&self) -> Result<PathBuf> {
        history_dir_from_inputs(HistoryDirInputs {
            explicit: self.history_dir.clone(),
            xdg_cache_home: std::env::var("XDG_CACHE_HOME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            os_cache_dir: cache_dir(),
            home_dir: home_dir(),
            temp_dir: std::env::temp_dir(),
        })
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Where a history directory candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateSource {
    Settings,
    XdgCacheHome,
    OsCacheDir,
    Home,
    TempDir,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Settings => "historyDir",
            Self::XdgCacheHome => "XDG_CACHE_HOME",
            Self::OsCacheDir => "OS cache dir",
            Self::Home => "home dir",
            Self::TempDir => "temp dir",
        })
    }
}

/// Environment facts the history directory is chosen from
#[derive(Debug, Clone)]
struct HistoryDirInputs {
    explicit: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

impl HistoryDirInputs {
    fn candidates(self) -> Vec<(CandidateSource, PathBuf)> {
        let explicit = self.explicit.filter(|p| !p.as_os_str().is_empty());
        [
            (CandidateSource::Settings, explicit),
            (
                CandidateSource::XdgCacheHome,
                self.xdg_cache_home.map(|dir| dir.join("kiln/history")),
            ),
            (
                CandidateSource::OsCacheDir,
                self.os_cache_dir.map(|dir| dir.join("kiln/history")),
            ),
            (
                CandidateSource::Home,
                self.home_dir.map(|dir| dir.join(".kiln/history")),
            ),
            (
                CandidateSource::TempDir,
                Some(self.temp_dir.join("kiln/history")),
            ),
        ]
        .into_iter()
        .filter_map(|(source, path)| path.map(|path| (source, path)))
        .collect()
    }
}

/// Create `dir` and prove a history file can be written into it.
fn ensure_writable(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(".kiln-write-probe");
    fs::File::create(&probe)?;
    fs::remove_file(&probe)
}

fn history_dir_from_inputs(inputs: HistoryDirInputs) -> Result<PathBuf> {
    let mut rejected: Vec<String> = Vec::new();
    for (source, path) in inputs.candidates() {
        match ensure_writable(&path) {
            Ok(()) => {
                tracing::debug!(source = %source, path = %path.display(), "Using history directory");
                return Ok(path);
            }
            Err(e) => {
                tracing::debug!(
                    source = %source,
                    path = %path.display(),
                    error = %e,
                    "Rejected history directory candidate"
                );
                rejected.push(format!("{source} '{}': {e}", path.display()));
            }
        }
    }
    Err(Error::configuration(format!(
        "No writable history directory; rejected {}",
        rejected.join(", ")
    )))
}
