use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;

use kopilka_core::validator::GoalInput;
use kopilka_core::{EntityId, GoalProjection};

use crate::report;
use crate::state::App;

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        target: String,

        /// Already saved amount
        #[arg(long, default_value = "")]
        saved: String,

        /// YYYY-MM-DD; enables the daily check-in plan
        #[arg(long, default_value = "")]
        deadline: String,
    },

    /// Goals with progress and plan projection
    List,

    /// Add money to a goal
    Contribute { id: String, amount: String },

    /// Toggle the daily check-in (today unless --date is given)
    Checkin {
        id: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Move the plan's expected amount into the saved amount and reset the plan
    Close { id: String },

    Delete { id: String },
}

pub async fn run(app: &mut App, cmd: GoalCommand) -> Result<()> {
    app.require_session()?;
    let currency = app.currency().to_string();
    match cmd {
        GoalCommand::Add {
            name,
            target,
            saved,
            deadline,
        } => {
            let goal = app
                .dm
                .add_goal(&GoalInput {
                    name,
                    target,
                    saved,
                    deadline,
                })
                .await?;
            println!("Цель создана: {} ({})", goal.name, goal.id);
        }
        GoalCommand::List => {
            let data = app.dm.load_user_data().await?;
            if data.goals.is_empty() {
                println!("Целей пока нет");
                return Ok(());
            }
            let plans = app.dm.goal_plans(&data);
            let today = app.dm.today();
            for goal in &data.goals {
                let plan = plans.get(&goal.id).cloned().unwrap_or_default();
                let projection = GoalProjection::compute(goal, &plan, today);
                println!("{}", report::goal_line(goal, &projection, &currency));
            }
        }
        GoalCommand::Contribute { id, amount } => {
            let goal = app.dm.contribute_goal(&EntityId::from(id.as_str()), &amount).await?;
            println!(
                "{}: {} / {}",
                goal.name,
                report::money(goal.saved, &currency),
                report::money(goal.target, &currency)
            );
        }
        GoalCommand::Checkin { id, date } => {
            let id = EntityId::from(id.as_str());
            let date = date
                .as_deref()
                .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").with_context(|| format!("bad date {d:?}")))
                .transpose()?;
            let checked = app.dm.toggle_checkin(&id, date).await?;
            println!("{}", if checked { "Отмечено" } else { "Отметка снята" });
            let (goal, projection) = app.dm.goal_projection(&id).await?;
            println!("{}", report::goal_line(&goal, &projection, &currency));
        }
        GoalCommand::Close { id } => {
            let added = app.dm.close_goal_plan(&EntityId::from(id.as_str())).await?;
            println!("Добавлено к цели: {}", report::money(added, &currency));
        }
        GoalCommand::Delete { id } => {
            let goal = app.dm.delete_goal(&EntityId::from(id.as_str())).await?;
            println!("Цель удалена: {}", goal.name);
        }
    }
    Ok(())
}
