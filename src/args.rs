//! These structs provide the CLI interface for the ledger CLI.

use crate::config::{DEFAULT_RECORD_KEY, DEFAULT_REMOTE_URL};
use crate::dates::Month;
use crate::model::{BazarAmount, UnitAmount, UnitName};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// ledger: A command-line ledger for a family fleet of vehicles and the household bazar.
///
/// Record the daily income and running cost of each vehicle along with the day's bazar
/// (grocery) purchases, look at monthly totals, and keep every device in the family in step
/// through a shared record on a public key-value store.
///
/// The shared record has no access control. Anybody who knows the bucket and the key can read
/// and overwrite it, and the device that saves last wins.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory, the configuration file and the local database.
    ///
    /// This is the first command you should run. Every device that should share a ledger must be
    /// initialized with the same --bucket.
    Init(InitArgs),
    /// Log in with the admin email and password from the configuration file, then pull.
    Login(LoginArgs),
    /// Log out, clearing local entries (a backup is saved first).
    Logout,
    /// Show the logged in user, the number of entries and the sync status.
    Status,
    /// Record a new day.
    Add(EntryArgs),
    /// Replace an entry with a new version. The old version is kept in the history.
    Edit(EditArgs),
    /// Permanently remove one entry.
    Delete(DeleteArgs),
    /// Show the totals of a month, or the drill-down of a single unit.
    Dashboard(DashboardArgs),
    /// List the entries of a month with their earlier versions.
    History(MonthArgs),
    /// Write the entries of a month to Family_Cost_{month}.csv.
    Export(ExportArgs),
    /// Push local entries to the shared record, or pull them from it.
    Sync(SyncArgs),
    /// Keep pulling the shared record until interrupted with Ctrl-C.
    Watch(WatchArgs),
    /// Move the ledger to another device by copy and paste.
    #[command(subcommand)]
    Token(TokenCommand),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where ledger data and configuration is held. Defaults to ~/ledger
    #[arg(long, env = "LEDGER_HOME", default_value_t = default_ledger_home())]
    ledger_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, ledger_home: PathBuf) -> Self {
        Self {
            log_level,
            ledger_home: ledger_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn ledger_home(&self) -> &DisplayPath {
        &self.ledger_home
    }
}

/// (Not shown): Args for the `ledger init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The bucket on the key-value service that holds the shared record.
    #[arg(long)]
    bucket: String,

    /// Base URL of the key-value service.
    #[arg(long, default_value = DEFAULT_REMOTE_URL)]
    remote_url: String,

    /// Key of the shared record, used when a user logs in without a sync token.
    #[arg(long, default_value = DEFAULT_RECORD_KEY)]
    record_key: String,

    /// The email accepted by `ledger login`.
    #[arg(long)]
    admin_email: Option<String>,

    /// The password accepted by `ledger login`.
    #[arg(long)]
    admin_password: Option<String>,
}

impl InitArgs {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            record_key: DEFAULT_RECORD_KEY.to_string(),
            admin_email: None,
            admin_password: None,
        }
    }

    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_email = Some(email.into());
        self.admin_password = Some(password.into());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn record_key(&self) -> &str {
        &self.record_key
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password.as_deref()
    }
}

/// (Not shown): Args for the `ledger login` command.
#[derive(Debug, Parser, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    email: String,

    #[arg(long, env = "LEDGER_PASSWORD", hide_env_values = true)]
    password: String,

    /// A private key for the shared record. Devices logged in with the same token share a
    /// ledger; without one the configured record key is used.
    #[arg(long)]
    sync_token: Option<String>,
}

impl LoginArgs {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        sync_token: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            sync_token,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn sync_token(&self) -> Option<&str> {
        self.sync_token.as_deref()
    }
}

/// (Not shown): The values of a day, used by `ledger add` and `ledger edit`.
#[derive(Debug, Default, Parser, Clone)]
pub struct EntryArgs {
    /// The day, YYYY-MM-DD. `add` defaults to today in Dhaka, `edit` to the entry's date.
    #[arg(long)]
    date: Option<String>,

    /// Income and cost of a unit as UNIT=INCOME[:COST], e.g. --unit car=1500:200. May be repeated.
    /// Units: car, sharif-1, sharif-2, auto, roman-1, roman-2.
    #[arg(long = "unit", value_name = "UNIT=INCOME[:COST]")]
    units: Vec<UnitAmount>,

    /// A bazar purchase as NAME=COST, e.g. --bazar Rice=450. May be repeated.
    #[arg(long = "bazar", value_name = "NAME=COST")]
    bazar: Vec<BazarAmount>,
}

impl EntryArgs {
    pub fn new(date: Option<String>, units: Vec<UnitAmount>, bazar: Vec<BazarAmount>) -> Self {
        Self { date, units, bazar }
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn units(&self) -> &[UnitAmount] {
        &self.units
    }

    pub fn bazar(&self) -> &[BazarAmount] {
        &self.bazar
    }
}

/// (Not shown): Args for the `ledger edit` command.
#[derive(Debug, Parser, Clone)]
pub struct EditArgs {
    /// The id of the entry to replace.
    id: String,

    // Given units overwrite the old values, other units keep theirs. Given bazar items replace
    // the whole list.
    #[clap(flatten)]
    entry: EntryArgs,

    /// Remove all bazar items.
    #[arg(long, conflicts_with = "bazar")]
    clear_bazar: bool,
}

impl EditArgs {
    pub fn new(id: impl Into<String>, entry: EntryArgs, clear_bazar: bool) -> Self {
        Self {
            id: id.into(),
            entry,
            clear_bazar,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entry(&self) -> &EntryArgs {
        &self.entry
    }

    pub fn clear_bazar(&self) -> bool {
        self.clear_bazar
    }
}

/// (Not shown): Args for the `ledger delete` command.
#[derive(Debug, Parser, Clone)]
pub struct DeleteArgs {
    /// The id of the entry to remove.
    id: String,
}

impl DeleteArgs {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// (Not shown): Selects a month, defaulting to the current month in Dhaka.
#[derive(Debug, Default, Parser, Clone)]
pub struct MonthArgs {
    /// The month, YYYY-MM.
    #[arg(long)]
    month: Option<Month>,
}

impl MonthArgs {
    pub fn new(month: Option<Month>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Month {
        self.month.unwrap_or_else(Month::current)
    }
}

/// (Not shown): Args for the `ledger dashboard` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct DashboardArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// Show the entries of one unit instead of the month overview.
    #[arg(long)]
    unit: Option<UnitName>,
}

impl DashboardArgs {
    pub fn new(month: Option<Month>, unit: Option<UnitName>) -> Self {
        Self {
            month: MonthArgs::new(month),
            unit,
        }
    }

    pub fn month(&self) -> Month {
        self.month.month()
    }

    pub fn unit(&self) -> Option<UnitName> {
        self.unit
    }
}

/// (Not shown): Args for the `ledger export` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct ExportArgs {
    #[clap(flatten)]
    month: MonthArgs,

    /// The directory to write the CSV file to. Defaults to the current directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

impl ExportArgs {
    pub fn new(month: Option<Month>, out_dir: Option<PathBuf>) -> Self {
        Self {
            month: MonthArgs::new(month),
            out_dir,
        }
    }

    pub fn month(&self) -> Month {
        self.month.month()
    }

    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }
}

#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpDown {
    Up,
    #[default]
    Down,
}

serde_plain::derive_display_from_serialize!(UpDown);
serde_plain::derive_fromstr_from_deserialize!(UpDown);

/// (Not shown): Args for the `ledger sync` command.
#[derive(Debug, Parser, Clone)]
pub struct SyncArgs {
    /// The direction to sync: "up" or "down"
    direction: UpDown,

    /// With "down", replace local entries even if the shared record is not newer.
    #[arg(long)]
    force: bool,
}

impl SyncArgs {
    pub fn new(direction: UpDown, force: bool) -> Self {
        Self { direction, force }
    }

    pub fn direction(&self) -> UpDown {
        self.direction
    }

    pub fn force(&self) -> bool {
        self.force
    }
}

/// (Not shown): Args for the `ledger watch` command.
#[derive(Debug, Default, Parser, Clone)]
pub struct WatchArgs {
    /// Seconds between pulls. Defaults to poll_interval_secs from the configuration file.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    interval: Option<u64>,
}

impl WatchArgs {
    pub fn new(interval: Option<u64>) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Option<u64> {
        self.interval
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum TokenCommand {
    /// Print the whole ledger as a token.
    Export,
    /// Replace local entries with the ledger held in a token.
    Import(TokenImportArgs),
}

/// (Not shown): Args for the `ledger token import` command.
#[derive(Debug, Parser, Clone)]
pub struct TokenImportArgs {
    /// The token printed by `ledger token export`.
    token: String,
}

impl TokenImportArgs {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

fn default_ledger_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("ledger"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --ledger-home or LEDGER_HOME instead of relying on the default \
                ledger home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("ledger")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
