use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use kopilka_data::export::parse_bundle;
use kopilka_data::{ExportOptions, LogFilter, LogLevel, SyncOutcome, Theme};

use crate::state::App;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Which parts of the bundle to leave out.
#[derive(Args, Debug, Default)]
pub struct PartFlags {
    #[arg(long)]
    pub no_transactions: bool,
    #[arg(long)]
    pub no_categories: bool,
    #[arg(long)]
    pub no_budgets: bool,
    #[arg(long)]
    pub no_goals: bool,
}

impl PartFlags {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            transactions: !self.no_transactions,
            categories: !self.no_categories,
            budgets: !self.no_budgets,
            goals: !self.no_goals,
        }
    }
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Show the security journal instead of the application log
    #[arg(long)]
    pub security: bool,

    /// error | warn | info | debug | trace (that level or worse)
    #[arg(long)]
    pub level: Option<String>,

    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Summary of recorded errors
    #[arg(long)]
    pub report: bool,

    #[arg(long)]
    pub clear: bool,
}

fn describe(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Skipped => "пропущено (офлайн или синхронизация уже идет)",
        SyncOutcome::Pushed => "локальные изменения отправлены",
        SyncOutcome::UpToDate => "данные актуальны",
        SyncOutcome::Merged { pushed: true } => "данные объединены и отправлены",
        SyncOutcome::Merged { pushed: false } => "данные объединены, отправка отложена",
    }
}

pub async fn sync(app: &mut App, watch: bool) -> Result<()> {
    app.require_session()?;
    if app.dm.is_offline() {
        bail!("Offline mode: set [server] base_url (and offline = false) in config.toml");
    }

    if !watch {
        let outcome = app.dm.sync_with_server().await?;
        println!("Синхронизация: {}", describe(outcome));
        println!("{}", serde_json::to_string_pretty(&app.dm.sync_stats())?);
        return Ok(());
    }

    let every = Duration::from_secs(app.cfg.sync.interval_seconds.max(1));
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    println!("Синхронизация каждые {} с (Ctrl-C для выхода)", every.as_secs());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match app.dm.periodic_sync().await {
                    Ok(outcome) => log::info!("periodic sync: {}", describe(outcome)),
                    Err(e) => log::warn!("periodic sync failed: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Остановлено");
                return Ok(());
            }
        }
    }
}

pub async fn export(app: &mut App, format: ExportFormat, out: Option<PathBuf>, parts: &PartFlags) -> Result<()> {
    app.require_session()?;
    let text = match format {
        ExportFormat::Json => {
            let bundle = app.dm.export_json(parts.options()).await?;
            serde_json::to_string_pretty(&bundle)?
        }
        ExportFormat::Csv => app.dm.export_csv().await?,
    };
    match out {
        Some(path) => {
            fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
            println!("Экспортировано в {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

pub async fn import(app: &mut App, path: PathBuf, parts: &PartFlags) -> Result<()> {
    app.require_session()?;
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let bundle = parse_bundle(&text)?;
    let data = app.dm.import_bundle(&bundle, parts.options()).await?;
    println!(
        "Импортировано из {} (версия {}): {} операций, {} бюджетов, {} целей",
        path.display(),
        bundle.version,
        data.transactions.len(),
        data.budgets.len(),
        data.goals.len()
    );
    Ok(())
}

pub fn logs(app: &mut App, args: LogsArgs) -> Result<()> {
    if args.clear {
        app.dm.clear_logs();
        println!("Логи очищены");
        return Ok(());
    }
    if args.report {
        let report = app.dm.app_log().error_report(app.dm.now());
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if args.security {
        for e in app.dm.security_log().recent(args.limit) {
            println!("{}  {:<18} {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.event, e.details);
        }
        return Ok(());
    }

    let level = match args.level.as_deref() {
        Some(l) => Some(LogLevel::parse(l).with_context(|| format!("unknown log level {l:?}"))?),
        None => None,
    };
    let filter = LogFilter {
        level,
        search: args.search,
        ..LogFilter::default()
    };
    for e in app.dm.app_log().query(&filter).into_iter().take(args.limit) {
        let level = format!("{:?}", e.level).to_uppercase();
        match &e.data {
            Some(data) => println!("{}  {level:<5} {}  {data}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.message),
            None => println!("{}  {level:<5} {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.message),
        }
    }
    Ok(())
}

pub fn theme(app: &mut App, value: Option<String>) -> Result<()> {
    match value {
        Some(v) => {
            let theme = Theme::parse(&v).with_context(|| format!("unknown theme {v:?} (light or dark)"))?;
            app.dm.set_theme(theme)?;
            println!("Тема: {}", theme.as_str());
        }
        None => println!("{}", app.dm.theme().as_str()),
    }
    Ok(())
}
