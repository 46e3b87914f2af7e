//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILBUNCH_CONFIG` (environment variable)
//! 2. `~/.config/mailbunch/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailbunch\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line values override the file; the merged result is a
//! [`RunSettings`], validated before any processing begins.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BunchError, Result};

/// Domain used in generated file names and synthetic Message-IDs.
pub const DEFAULT_DOMAIN: &str = "bunchmail.local";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Defaults for a bunching run.
    pub bunch: BunchConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Defaults for a bunching run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BunchConfig {
    /// Domain part of generated names.
    pub domain: String,
    /// Addresses you send mail from; their messages go to `Sent`.
    pub identities: Vec<String>,
    /// Maildir flag characters to drop from every message (e.g. "FRT").
    pub remove_flags: String,
    /// Do not write duplicates to the output.
    pub no_dupes: bool,
    /// Where the duplicates audit log is written.
    pub dupes_log: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for BunchConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            identities: Vec::new(),
            remove_flags: String::new(),
            no_dupes: false,
            dupes_log: PathBuf::from("dupes.log"),
        }
    }
}

/// Everything a run needs, after merging config file and command line.
#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    /// Output maildir root. Cleared before writing.
    pub output: PathBuf,
    /// Inbox-role input maildirs.
    pub inboxes: Vec<PathBuf>,
    /// Archive-role input maildirs.
    pub archives: Vec<PathBuf>,
    pub identities: Vec<String>,
    pub domain: String,
    pub remove_flags: String,
    pub no_dupes: bool,
    pub dupes_log: PathBuf,
}

impl RunSettings {
    /// Settings seeded from the config file; paths are left empty.
    pub fn from_config(config: &BunchConfig) -> Self {
        Self {
            output: PathBuf::new(),
            inboxes: Vec::new(),
            archives: Vec::new(),
            identities: config.identities.clone(),
            domain: config.domain.clone(),
            remove_flags: config.remove_flags.clone(),
            no_dupes: config.no_dupes,
            dupes_log: config.dupes_log.clone(),
        }
    }

    /// Reject settings that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.output.as_os_str().is_empty() {
            return Err(BunchError::InvalidConfig(
                "an output directory is required".to_string(),
            ));
        }
        if self.inboxes.is_empty() && self.archives.is_empty() {
            return Err(BunchError::InvalidConfig(
                "at least one inbox or archive directory is required".to_string(),
            ));
        }
        if self.domain.is_empty() || self.domain.contains(['/', ':']) {
            return Err(BunchError::InvalidConfig(format!(
                "domain '{}' cannot be used in a file name",
                self.domain
            )));
        }
        // The output tree is removed before reading, so it must not
        // contain an input or sit inside one.
        let output = resolve_path(&self.output);
        for input in self.inboxes.iter().chain(&self.archives) {
            let resolved = resolve_path(input);
            if resolved.starts_with(&output) || output.starts_with(&resolved) {
                return Err(BunchError::InvalidConfig(format!(
                    "output directory '{}' overlaps input '{}'",
                    self.output.display(),
                    input.display()
                )));
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` for overlap checks.
///
/// `.` and `..` are resolved lexically, then the longest existing prefix is
/// canonicalized so symlinked spellings of one directory compare equal.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }

    let mut existing = clean.as_path();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut real) = std::fs::canonicalize(existing) {
            real.extend(missing.iter().rev());
            return real;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return clean,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILBUNCH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailbunch").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailbunch")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> RunSettings {
        let mut s = RunSettings::from_config(&BunchConfig::default());
        s.output = PathBuf::from("/tmp/bunch");
        s.inboxes = vec![PathBuf::from("/mail/inbox")];
        s
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.bunch.domain, DEFAULT_DOMAIN);
        assert_eq!(cfg.bunch.dupes_log, PathBuf::from("dupes.log"));
        assert!(!cfg.bunch.no_dupes);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[bunch]
identities = ["me@example.com", "old@example.org"]
remove_flags = "T"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.bunch.identities.len(), 2);
        assert_eq!(cfg.bunch.remove_flags, "T");
        assert_eq!(cfg.bunch.domain, DEFAULT_DOMAIN);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_validate_accepts_minimal_settings() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_output() {
        let mut s = valid_settings();
        s.output = PathBuf::new();
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_requires_some_input() {
        let mut s = valid_settings();
        s.inboxes.clear();
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));
        s.archives.push(PathBuf::from("/mail/archive"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_domain() {
        let mut s = valid_settings();
        s.domain = "a/b".to_string();
        assert!(s.validate().is_err());
        s.domain = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_output_as_input() {
        let mut s = valid_settings();
        s.archives.push(s.output.clone());
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_input_inside_output() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = valid_settings();
        s.output = tmp.path().join("out");
        s.inboxes = vec![tmp.path().join("out").join("INBOX")];
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_output_inside_input() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = valid_settings();
        s.inboxes = vec![tmp.path().join("mail")];
        s.output = tmp.path().join("mail").join("bunched");
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_aliased_output() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("x")).unwrap();
        std::fs::create_dir_all(tmp.path().join("out")).unwrap();
        let mut s = valid_settings();
        s.output = tmp.path().join("x").join("..").join("out");
        s.inboxes = vec![tmp.path().join("out")];
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));

        s.output = tmp.path().join(".").join("out");
        assert!(matches!(s.validate(), Err(BunchError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_accepts_sibling_with_shared_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let mut s = valid_settings();
        s.output = tmp.path().join("out");
        s.inboxes = vec![tmp.path().join("out2"), tmp.path().join("inbox")];
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_resolve_path_is_absolute_and_clean() {
        let resolved = resolve_path(Path::new("a/./b/../c"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("a/c"));
    }
}
