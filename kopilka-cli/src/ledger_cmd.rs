use anyhow::{Context, Result};
use clap::Subcommand;

use kopilka_core::validator::{BudgetInput, TransactionInput};
use kopilka_core::{EntityId, Period, SortOrder, Totals, TransactionFilter, TxType, normalize_key};

use crate::report;
use crate::state::App;

#[derive(Subcommand, Debug)]
pub enum TxCommand {
    /// Record an income or expense
    Add {
        /// income | expense
        #[arg(long = "type", value_name = "TYPE")]
        kind: String,

        #[arg(long)]
        amount: String,

        #[arg(long)]
        category: String,

        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// List transactions, newest first unless --sort says otherwise
    List {
        /// all | month | quarter | year
        #[arg(long, default_value = "all")]
        period: String,

        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Case-insensitive match on description or category
        #[arg(long)]
        search: Option<String>,

        /// date-desc | date-asc | amount-desc | amount-asc
        #[arg(long, default_value = "date-desc")]
        sort: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    Add {
        /// income | expense
        #[arg(long = "type", value_name = "TYPE")]
        kind: String,
        label: String,
    },
    Remove {
        #[arg(long = "type", value_name = "TYPE")]
        kind: String,
        label: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum BudgetCommand {
    /// Set the monthly limit for an expense category (replaces an existing one)
    Set {
        #[arg(long)]
        category: String,
        #[arg(long)]
        limit: String,
    },
    /// Budgets with this month's spending
    List,
    /// Delete by id or category label
    Delete { target: String },
}

fn parse_kind(s: &str) -> Result<TxType> {
    TxType::parse(s).with_context(|| format!("unknown type {s:?} (expected income or expense)"))
}

pub async fn run_tx(app: &mut App, cmd: TxCommand) -> Result<()> {
    app.require_session()?;
    let currency = app.currency().to_string();
    match cmd {
        TxCommand::Add {
            kind,
            amount,
            category,
            date,
            description,
        } => {
            let input = TransactionInput {
                kind,
                category,
                amount,
                date: date.unwrap_or_else(|| app.dm.today().format("%Y-%m-%d").to_string()),
                description,
            };
            let tx = app.dm.add_transaction(&input).await?;
            let data = app.dm.load_user_data().await?;
            println!("Добавлено: {}", report::transaction_line(&tx, &data, &currency));
        }
        TxCommand::List {
            period,
            kind,
            category,
            search,
            sort,
            limit,
        } => {
            let period = Period::parse(&period).with_context(|| format!("unknown period {period:?}"))?;
            let sort = SortOrder::parse(&sort).with_context(|| format!("unknown sort order {sort:?}"))?;
            let filter = TransactionFilter {
                kind: kind.as_deref().map(parse_kind).transpose()?,
                category: category.as_deref().map(normalize_key),
                search,
                sort: Some(sort),
                ..TransactionFilter::default()
            }
            .with_period(period, app.dm.today());

            let list = app.dm.transactions(&filter).await?;
            let data = app.dm.load_user_data().await?;
            if list.is_empty() {
                println!("Нет операций");
                return Ok(());
            }
            for t in list.iter().take(limit) {
                println!("{}", report::transaction_line(t, &data, &currency));
            }
            let totals = Totals::compute(&list);
            println!(
                "\n{} операций; доходы {}, расходы {}",
                list.len(),
                report::money(totals.income, &currency),
                report::money(totals.expense, &currency)
            );
        }
        TxCommand::Delete { id } => {
            let removed = app.dm.delete_transaction(&EntityId::from(id.as_str())).await?;
            println!("Удалено: {}", removed.id);
        }
    }
    Ok(())
}

pub async fn run_category(app: &mut App, cmd: CategoryCommand) -> Result<()> {
    app.require_session()?;
    match cmd {
        CategoryCommand::Add { kind, label } => {
            let stored = app.dm.add_category(parse_kind(&kind)?, &label).await?;
            println!("Категория добавлена: {stored}");
        }
        CategoryCommand::Remove { kind, label } => {
            app.dm.remove_category(parse_kind(&kind)?, &label).await?;
            println!("Категория удалена: {label}");
        }
        CategoryCommand::List => {
            let categories = app.dm.load_user_data().await?.categories();
            for (title, kind) in [("Доходы", TxType::Income), ("Расходы", TxType::Expense)] {
                println!("{title}:");
                for label in categories.list(kind) {
                    println!("  {label}");
                }
            }
        }
    }
    Ok(())
}

pub async fn run_budget(app: &mut App, cmd: BudgetCommand) -> Result<()> {
    app.require_session()?;
    let currency = app.currency().to_string();
    match cmd {
        BudgetCommand::Set { category, limit } => {
            let budget = app.dm.set_budget(&BudgetInput { category, limit }).await?;
            println!(
                "Бюджет {}: {} в месяц",
                budget.category,
                report::money(budget.limit, &currency)
            );
        }
        BudgetCommand::List => {
            let data = app.dm.load_user_data().await?;
            let reports = report::month_budgets(&data, app.dm.today());
            if reports.is_empty() {
                println!("Бюджеты не заданы. Run: kopilka budget set --category <label> --limit <amount>");
                return Ok(());
            }
            for r in &reports {
                println!("{}", report::budget_line(r, &currency));
            }
        }
        BudgetCommand::Delete { target } => {
            let removed = app.dm.delete_budget(&target).await?;
            println!("Бюджет удален: {}", removed.category);
        }
    }
    Ok(())
}
