//! Configuration file handling for the ledger.
//!
//! The configuration file is stored at `$LEDGER_HOME/config.json` and holds the location of the
//! remote bucket, the sync timings, backup settings and the admin login.

use crate::backup::Backup;
use crate::db::Db;
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "ledger";
const CONFIG_VERSION: u8 = 1;
const BACKUPS: &str = ".backups";
const CONFIG_JSON: &str = "config.json";
const LEDGER_SQLITE: &str = "ledger.sqlite";

pub const DEFAULT_REMOTE_URL: &str = "https://kvdb.io";
pub const DEFAULT_RECORD_KEY: &str = "master_record";

/// The settings chosen at `ledger init` time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InitSettings {
    pub bucket: String,
    pub remote_url: String,
    pub record_key: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl InitSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            record_key: DEFAULT_RECORD_KEY.to_string(),
            admin_email: None,
            admin_password: None,
        }
    }
}

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$LEDGER_HOME` and from there it loads `$LEDGER_HOME/config.json`. It also owns the
/// handle to the local database.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    db: Db,
    sqlite_path: PathBuf,
}

impl Config {
    /// Creates the data directory, the backups directory, an initial `config.json` and an empty
    /// database.
    ///
    /// # Errors
    /// - Returns an error if the settings are invalid or any file operation fails, including when
    ///   the directory already holds a ledger database.
    pub async fn create(dir: impl Into<PathBuf>, settings: InitSettings) -> Result<Self> {
        let config_file = ConfigFile::from_settings(settings);
        config_file.validate()?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ledger home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A ledger already exists at '{}', refusing to overwrite it",
                root.display()
            );
        }

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        config_file.save(&config_path).await?;

        let sqlite_path = root.join(LEDGER_SQLITE);
        let db = Db::init(&sqlite_path)
            .await
            .context("Unable to create SQLite DB")?;

        Ok(Self {
            root,
            backups,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    /// This will
    /// - validate that `ledger_home` and the config file exist
    /// - load and validate the config file
    /// - open the database
    pub async fn load(ledger_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = ledger_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Ledger home is missing, run 'ledger init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let backups = root.join(BACKUPS);
        if !backups.is_dir() {
            bail!("The backups directory is missing '{}'", backups.display())
        }

        let sqlite_path = root.join(LEDGER_SQLITE);
        let db = Db::load(&sqlite_path)
            .await
            .context("Unable to load SQLite DB")?;

        Ok(Self {
            root,
            backups,
            config_path,
            config_file,
            db,
            sqlite_path,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn db(&self) -> &Db {
        &self.db
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    pub fn remote_url(&self) -> &str {
        &self.config_file.remote_url
    }

    pub fn bucket(&self) -> &str {
        &self.config_file.bucket
    }

    /// The key of the shared record used when the user has no sync token of their own.
    pub fn record_key(&self) -> &str {
        &self.config_file.record_key
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config_file.poll_interval_secs)
    }

    pub fn retry_attempts(&self) -> u32 {
        self.config_file.retry_attempts
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config_file.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.request_timeout_secs)
    }

    pub fn backup_copies(&self) -> u32 {
        self.config_file.backup_copies
    }

    /// Whether local changes are pushed to the remote record as soon as they are saved.
    pub fn auto_push(&self) -> bool {
        self.config_file.auto_push
    }

    /// Checks a login against the configured admin pair. The email is compared
    /// case-insensitively, the password exactly.
    pub fn validate_admin(&self, email: &str, password: &str) -> Result<bool> {
        let (Some(admin_email), Some(admin_password)) = (
            self.config_file.admin_email.as_deref(),
            self.config_file.admin_password.as_deref(),
        ) else {
            bail!(
                "No admin login is configured, set admin_email and admin_password in {}",
                self.config_path.display()
            );
        };
        Ok(email.trim().eq_ignore_ascii_case(admin_email) && password == admin_password)
    }

    /// Creates a new `Backup` instance for managing backup files.
    pub fn backup(&self) -> Backup {
        Backup::new(self)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "ledger",
///   "config_version": 1,
///   "remote_url": "https://kvdb.io",
///   "bucket": "family_fleet",
///   "record_key": "master_record",
///   "poll_interval_secs": 5,
///   "retry_attempts": 3,
///   "retry_delay_ms": 1500,
///   "request_timeout_secs": 15,
///   "backup_copies": 5,
///   "auto_push": true,
///   "admin_email": "admin@example.com",
///   "admin_password": "123456"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "ledger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Base URL of the key-value service
    #[serde(default = "default_remote_url")]
    remote_url: String,

    /// The bucket that holds the ledger record
    bucket: String,

    /// Key of the record when the user has no sync token
    #[serde(default = "default_record_key")]
    record_key: String,

    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,

    /// Extra attempts made by a pull that fails
    #[serde(default = "default_retry_attempts")]
    retry_attempts: u32,

    /// Delay before the first retry, doubled for each further retry
    #[serde(default = "default_retry_delay_ms")]
    retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// Number of backup copies to keep
    #[serde(default = "default_backup_copies")]
    backup_copies: u32,

    #[serde(default = "default_auto_push")]
    auto_push: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_password: Option<String>,
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_record_key() -> String {
    DEFAULT_RECORD_KEY.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1500
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_backup_copies() -> u32 {
    5
}

fn default_auto_push() -> bool {
    true
}

impl ConfigFile {
    fn from_settings(settings: InitSettings) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            remote_url: settings.remote_url,
            bucket: settings.bucket,
            record_key: settings.record_key,
            poll_interval_secs: default_poll_interval_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            backup_copies: default_backup_copies(),
            auto_push: default_auto_push(),
            admin_email: settings.admin_email,
            admin_password: settings.admin_password,
        }
    }

    /// Loads a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path).await?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path.as_ref(), data)
            .await
            .context("Unable to write config file")
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        ensure!(!self.bucket.trim().is_empty(), "The bucket must not be empty");
        ensure!(
            !self.record_key.trim().is_empty(),
            "The record_key must not be empty"
        );
        url::Url::parse(&self.remote_url)
            .with_context(|| format!("The remote_url '{}' is not a valid URL", self.remote_url))?;
        ensure!(
            (1..=3600).contains(&self.poll_interval_secs),
            "poll_interval_secs must be between 1 and 3600, got {}",
            self.poll_interval_secs
        );
        ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be greater than 0"
        );
        ensure!(self.backup_copies > 0, "backup_copies must be greater than 0");
        Ok(())
    }
}
