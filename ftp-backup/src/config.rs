//! Configuration for a backup run.
//!
//! Loads an optional TOML file, then applies `.env` and environment variable
//! overrides for the remote connection and the backup root.

use crate::archive::{Compression, SourceSpec};
use crate::retention::DEFAULT_KEEP;
use crate::transfer::ftp::DEFAULT_PORT;
use crate::transfer::Credentials;
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Backup manifest, archived in this order
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Local directory holding per-source archives and the combined archive
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Archives kept per source directory and remotely
    #[serde(default = "default_keep")]
    pub keep: usize,

    /// Compression for per-source archives (deflate, zstd, stored)
    #[serde(default)]
    pub compression: Compression,

    /// Compression level, method specific
    #[serde(default)]
    pub compression_level: Option<i64>,

    /// Entry names containing any of these are left out of directory archives
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub pass: Option<String>,

    /// Remote directory receiving combined archives
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Remote settings after validation: everything present and non-empty.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub dir: String,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "***"))
            .field("dir", &self.dir)
            .finish()
    }
}

// Default values
fn default_root() -> PathBuf {
    PathBuf::from("/www/python_backup")
}

fn default_keep() -> usize {
    DEFAULT_KEEP
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sources() -> Vec<SourceSpec> {
    const APPS: &str = "/www/python-applications";
    vec![
        SourceSpec::new("AnonymousChatBot_data", format!("{APPS}/AnonymousChatBot/data")),
        SourceSpec::new("IdeaBot_data", format!("{APPS}/IdeaBot/data")),
        SourceSpec::new("DreamBot_db", format!("{APPS}/DreamBot/bot_data.db")),
        SourceSpec::new("QABot_db", format!("{APPS}/QABot/qa_bot.db")),
        SourceSpec::new("WriterBot_db", format!("{APPS}/WriterBot/bot_data.db")),
    ]
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            keep: default_keep(),
            compression: Compression::default(),
            compression_level: None,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            user: None,
            pass: None,
            dir: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup: BackupConfig::default(),
            remote: RemoteConfig::default(),
            log: LogConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// File (or defaults), then `.env`, then process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `REMOTE_*` and `BACKUP_ROOT` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REMOTE_HOST") {
            self.remote.host = Some(host);
        }
        if let Some(port) = lookup("REMOTE_PORT") {
            self.remote.port = port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("REMOTE_PORT must be a port number, got {:?}", port))?;
        }
        if let Some(user) = lookup("REMOTE_USER") {
            self.remote.user = Some(user);
        }
        if let Some(pass) = lookup("REMOTE_PASS") {
            self.remote.pass = Some(pass);
        }
        if let Some(dir) = lookup("REMOTE_DIR") {
            self.remote.dir = Some(dir);
        }
        if let Some(root) = lookup("BACKUP_ROOT") {
            self.backup.root = PathBuf::from(root);
        }
        Ok(())
    }

    /// Check everything a run needs before any work starts.
    pub fn validate(&self) -> Result<RemoteTarget> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };

        let host = present(&self.remote.host);
        let user = present(&self.remote.user);
        let pass = present(&self.remote.pass);
        let dir = present(&self.remote.dir);

        let missing: Vec<&str> = [
            ("REMOTE_HOST", host.is_none()),
            ("REMOTE_USER", user.is_none()),
            ("REMOTE_PASS", pass.is_none()),
            ("REMOTE_DIR", dir.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, missing)| missing.then_some(key))
        .collect();

        let (Some(host), Some(user), Some(pass), Some(dir)) = (host, user, pass, dir) else {
            return Err(BackupError::Configuration(format!(
                "missing remote settings: {}",
                missing.join(", ")
            )));
        };

        if self.backup.keep == 0 {
            return Err(BackupError::Configuration(
                "backup.keep must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name.as_str();
            let has_separator = name.contains(|c: char| c == '/' || c == '\\');
            if name.is_empty() || name == "." || name == ".." || has_separator {
                return Err(BackupError::Configuration(format!(
                    "invalid source name {:?}",
                    name
                )));
            }
            if !seen.insert(name) {
                return Err(BackupError::Configuration(format!(
                    "duplicate source name {:?}",
                    name
                )));
            }
        }

        Ok(RemoteTarget {
            host,
            port: self.remote.port,
            credentials: Credentials { user, pass },
            dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> Config {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("REMOTE_HOST", "ftp.example.com"),
                ("REMOTE_USER", "backup"),
                ("REMOTE_PASS", "secret"),
                ("REMOTE_DIR", "/backups"),
            ]))
            .unwrap();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backup.keep, 5);
        assert_eq!(config.backup.root, PathBuf::from("/www/python_backup"));
        assert_eq!(config.remote.port, 21);
        assert_eq!(config.sources.len(), 5);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_validate_complete_config() {
        let target = complete().validate().unwrap();
        assert_eq!(target.host, "ftp.example.com");
        assert_eq!(target.port, 21);
        assert_eq!(target.credentials.user, "backup");
        assert_eq!(target.dir, "/backups");
    }

    #[test]
    fn test_validate_reports_every_missing_key() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("REMOTE_HOST", "ftp.example.com"), ("REMOTE_PASS", "  ")]))
            .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BackupError::Configuration(_)));
        let message = err.to_string();
        assert!(message.contains("REMOTE_USER"));
        assert!(message.contains("REMOTE_PASS"));
        assert!(message.contains("REMOTE_DIR"));
        assert!(!message.contains("REMOTE_HOST"));
    }

    #[test]
    fn test_validate_rejects_bad_source_names() {
        for name in ["", "..", "a/b"] {
            let mut config = complete();
            config.sources = vec![SourceSpec::new(name, "/tmp")];
            assert!(config.validate().is_err(), "accepted {:?}", name);
        }

        let mut config = complete();
        config.sources = vec![SourceSpec::new("db", "/a"), SourceSpec::new("db", "/b")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_keep() {
        let mut config = complete();
        config.backup.keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_port_and_root() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[("REMOTE_PORT", "2121"), ("BACKUP_ROOT", "/srv/backups")]))
            .unwrap();
        assert_eq!(config.remote.port, 2121);
        assert_eq!(config.backup.root, PathBuf::from("/srv/backups"));

        assert!(config.apply_overrides(env(&[("REMOTE_PORT", "ftp")])).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [backup]
            root = "/srv/backups"
            keep = 3
            compression = "zstd"
            compression_level = 9
            exclude_patterns = ["cache"]

            [remote]
            host = "ftp.example.com"
            port = 2121
            user = "backup"
            pass = "secret"
            dir = "/backups"

            [log]
            level = "debug"

            [[sources]]
            name = "ServiceA_data"
            path = "/data/ServiceA/data"

            [[sources]]
            name = "ServiceB_db"
            path = "/data/ServiceB/store.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.backup.keep, 3);
        assert_eq!(config.backup.compression, Compression::Zstd);
        assert_eq!(config.backup.compression_level, Some(9));
        assert_eq!(config.remote.port, 2121);
        assert_eq!(config.log.level, "debug");
        assert_eq!(
            config.sources,
            vec![
                SourceSpec::new("ServiceA_data", "/data/ServiceA/data"),
                SourceSpec::new("ServiceB_db", "/data/ServiceB/store.db"),
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[remote]\nhost = \"ftp.example.com\"\n").unwrap();
        assert_eq!(config.remote.port, 21);
        assert_eq!(config.backup.keep, 5);
        assert_eq!(config.sources.len(), 5);
    }

    #[test]
    fn test_debug_hides_password() {
        let shown = format!("{:?}", complete());
        assert!(!shown.contains("secret"));
    }
}
