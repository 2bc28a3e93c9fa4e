use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kopilka_core::{Period, TransactionFilter};

mod auth;
mod config;
mod goal_cmd;
mod ledger_cmd;
mod prompt;
mod report;
mod state;
mod sync_cmd;

use state::App;

#[derive(Parser, Debug)]
#[command(
    name = "kopilka",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("KOPILKA_BUILD_SHA"), ")"),
    about = "Kopilka: personal finance tracker"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.kopilka/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Create an account (on the server when reachable, locally otherwise)
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    Login {
        #[arg(long)]
        email: Option<String>,
    },

    Logout,

    /// Show the current session
    Session,

    /// Income and expense records
    Tx {
        #[command(subcommand)]
        command: ledger_cmd::TxCommand,
    },

    Category {
        #[command(subcommand)]
        command: ledger_cmd::CategoryCommand,
    },

    /// Monthly spending limits per expense category
    Budget {
        #[command(subcommand)]
        command: ledger_cmd::BudgetCommand,
    },

    /// Savings goals and their daily check-in plans
    Goal {
        #[command(subcommand)]
        command: goal_cmd::GoalCommand,
    },

    /// Totals, this month's budgets, goals and recent records
    Dashboard,

    /// Breakdown by category and by month
    Analytics {
        /// all | month | quarter | year
        #[arg(long, default_value = "month")]
        period: String,
    },

    /// Projected spending for the current month
    Forecast,

    Achievements,

    Notifications,

    /// Synchronise with the server
    Sync {
        /// Keep running and sync every [sync] interval_seconds
        #[arg(long)]
        watch: bool,
    },

    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: sync_cmd::ExportFormat,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        parts: sync_cmd::PartFlags,
    },

    /// Merge a JSON export into the current data
    Import {
        path: PathBuf,

        #[command(flatten)]
        parts: sync_cmd::PartFlags,
    },

    /// Application and security journals
    Logs(sync_cmd::LogsArgs),

    /// Show or set the colour theme (light | dark)
    Theme { value: Option<String> },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config file if none exists
    Init,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cfg.logging.level.as_str())).init();

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Show => config::show_config(),
        };
    }

    let mut app = App::open(cfg).context("opening local data")?;

    match cli.command {
        Command::Config { .. } => {}
        Command::Register { name, email } => auth::register(&mut app, name, email).await?,
        Command::Login { email } => auth::login(&mut app, email).await?,
        Command::Logout => auth::logout(&mut app)?,
        Command::Session => auth::session(&mut app)?,

        Command::Tx { command } => ledger_cmd::run_tx(&mut app, command).await?,
        Command::Category { command } => ledger_cmd::run_category(&mut app, command).await?,
        Command::Budget { command } => ledger_cmd::run_budget(&mut app, command).await?,
        Command::Goal { command } => goal_cmd::run(&mut app, command).await?,

        Command::Dashboard => {
            app.require_session()?;
            let data = app.dm.load_user_data().await?;
            let plans = app.dm.goal_plans(&data);
            print!("{}", report::dashboard(&data, &plans, app.dm.today(), app.currency()));
        }
        Command::Analytics { period } => {
            app.require_session()?;
            let period = Period::parse(&period).with_context(|| format!("unknown period {period:?}"))?;
            let today = app.dm.today();
            let filter = TransactionFilter::default().with_period(period, today);
            let transactions = app.dm.transactions(&filter).await?;
            let data = app.dm.load_user_data().await?;
            print!("{}", report::analytics(&transactions, &data, today, app.currency()));
        }
        Command::Forecast => {
            app.require_session()?;
            let data = app.dm.load_user_data().await?;
            print!("{}", report::forecast(&data, app.dm.today(), app.currency()));
        }
        Command::Achievements => {
            app.require_session()?;
            let data = app.dm.load_user_data().await?;
            print!("{}", report::achievements(&data, app.dm.today()));
        }
        Command::Notifications => {
            app.require_session()?;
            let data = app.dm.load_user_data().await?;
            let plans = app.dm.goal_plans(&data);
            print!("{}", report::notifications(&data, &plans, app.dm.today()));
        }

        Command::Sync { watch } => sync_cmd::sync(&mut app, watch).await?,
        Command::Export { format, out, parts } => sync_cmd::export(&mut app, format, out, &parts).await?,
        Command::Import { path, parts } => sync_cmd::import(&mut app, path, &parts).await?,
        Command::Logs(args) => sync_cmd::logs(&mut app, args)?,
        Command::Theme { value } => sync_cmd::theme(&mut app, value)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_flags() {
        let cli = Cli::try_parse_from(["kopilka", "export", "--format", "csv", "--no-goals"]).unwrap();
        match cli.command {
            Command::Export { format, out, parts } => {
                assert!(matches!(format, sync_cmd::ExportFormat::Csv));
                assert!(out.is_none());
                assert!(parts.no_goals);
                assert!(!parts.no_budgets);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_tx_add() {
        let cli = Cli::try_parse_from([
            "kopilka", "tx", "add", "--type", "expense", "--amount", "400", "--category", "Продукты",
        ])
        .unwrap();
        match cli.command {
            Command::Tx {
                command: ledger_cmd::TxCommand::Add { kind, amount, date, .. },
            } => {
                assert_eq!(kind, "expense");
                assert_eq!(amount, "400");
                assert!(date.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
