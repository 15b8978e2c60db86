use clap::Parser;
use fleet_ledger::args::{Args, Command, TokenCommand, UpDown};
use fleet_ledger::{commands, Config, Mode, Result};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().ledger_home().path();

    // This allows for running the program without a network. When LEDGER_IN_TEST_MODE is set and
    // non-zero in length, then the shared record is kept in memory for the life of the process.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Login(login_args) => {
            let config = Config::load(home).await?;
            commands::login(config, mode, login_args).await?.print()
        }

        Command::Logout => commands::logout(Config::load(home).await?).await?.print(),

        Command::Status => commands::status(Config::load(home).await?).await?.print(),

        Command::Add(entry_args) => {
            let config = Config::load(home).await?;
            commands::add(config, mode, entry_args).await?.print()
        }

        Command::Edit(edit_args) => {
            let config = Config::load(home).await?;
            commands::edit(config, mode, edit_args).await?.print()
        }

        Command::Delete(delete_args) => {
            let config = Config::load(home).await?;
            commands::delete(config, mode, delete_args).await?.print()
        }

        Command::Dashboard(dashboard_args) => {
            let config = Config::load(home).await?;
            let month = dashboard_args.month();
            match dashboard_args.unit() {
                Some(unit) => commands::unit_dashboard(config, month, unit)
                    .await?
                    .print(),
                None => commands::dashboard(config, month).await?.print(),
            }
        }

        Command::History(month_args) => {
            let config = Config::load(home).await?;
            commands::history(config, month_args.month()).await?.print()
        }

        Command::Export(export_args) => {
            let config = Config::load(home).await?;
            let out_dir = match export_args.out_dir() {
                Some(dir) => dir.to_path_buf(),
                None => std::env::current_dir()?,
            };
            commands::export(config, export_args.month(), &out_dir)
                .await?
                .print()
        }

        Command::Sync(sync_args) => {
            let config = Config::load(home).await?;
            match sync_args.direction() {
                UpDown::Up => commands::sync_up(config, mode).await?.print(),
                UpDown::Down => commands::sync_down(config, mode, sync_args.force())
                    .await?
                    .print(),
            }
        }

        Command::Watch(watch_args) => {
            let config = Config::load(home).await?;
            let interval = watch_args.interval().map(Duration::from_secs);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Unable to listen for Ctrl-C, stopping: {e}");
                }
            };
            commands::watch(config, mode, interval, shutdown)
                .await?
                .print()
        }

        Command::Token(token_command) => {
            let config = Config::load(home).await?;
            match token_command {
                TokenCommand::Export => commands::token_export(config).await?.print(),
                TokenCommand::Import(import_args) => {
                    commands::token_import(config, mode, import_args.token())
                        .await?
                        .print()
                }
            }
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and the binary only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
