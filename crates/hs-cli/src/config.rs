//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hs_core::{BucketId, ClassifierConfig, StaticPermissionGate, SyncSettings, ValidationError};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Bucket receiving foreground activity heartbeats.
    pub primary_bucket: String,
    /// Bucket receiving screen unlock markers.
    pub unlock_bucket: String,
    /// Hostname recorded on created buckets.
    pub hostname: String,
    /// Client name recorded on created buckets.
    pub client: String,
    /// Seconds between periodic passes in `hs watch`.
    pub sync_interval_secs: u64,
    /// Longest plausible foreground session.
    pub session_bound_secs: u32,
    /// Acknowledged heartbeats between progress checkpoints.
    pub progress_every: usize,
    /// Tolerance for events delivered out of order.
    pub max_reorder_secs: u32,
    /// Whether application usage events may be read.
    pub usage_readable: bool,
    /// Whether window class names may be attached to heartbeats.
    pub accessibility_readable: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("primary_bucket", &self.primary_bucket)
            .field("unlock_bucket", &self.unlock_bucket)
            .field("hostname", &self.hostname)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("heartsync.db"),
            primary_bucket: "heartsync-activity".to_string(),
            unlock_bucket: "heartsync-unlock".to_string(),
            hostname: default_hostname(),
            client: "heartsync".to_string(),
            sync_interval_secs: 3600,
            session_bound_secs: 86_400,
            progress_every: 100,
            max_reorder_secs: 60,
            usage_readable: true,
            accessibility_readable: true,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HS_*)
        figment = figment.merge(Env::prefixed("HS_"));

        figment.extract()
    }

    /// Builds engine settings from the configured buckets and limits.
    pub fn sync_settings(&self) -> Result<SyncSettings, ValidationError> {
        let mut classifier = ClassifierConfig::new(
            BucketId::new(self.primary_bucket.as_str())?,
            BucketId::new(self.unlock_bucket.as_str())?,
        );
        classifier.session_bound = TimeDelta::seconds(i64::from(self.session_bound_secs));
        classifier.max_reorder = TimeDelta::seconds(i64::from(self.max_reorder_secs));

        let mut settings = SyncSettings::new(classifier, self.hostname.as_str());
        settings.client.clone_from(&self.client);
        settings.progress_every = self.progress_every;
        Ok(settings)
    }

    /// Permission answers configured for this host.
    pub const fn permission_gate(&self) -> StaticPermissionGate {
        StaticPermissionGate {
            usage: self.usage_readable,
            accessibility: self.accessibility_readable,
        }
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

fn default_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Returns the platform-specific config directory for heartsync.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("heartsync"))
}

/// Returns the platform-specific data directory for heartsync.
///
/// On Linux: `~/.local/share/heartsync`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("heartsync"))
}
