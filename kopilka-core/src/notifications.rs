//! Notification rules over budgets, goals and the forecast.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::budgets::{BudgetStatus, evaluate_all};
use crate::finance::{EntityId, Transaction, UserData};
use crate::forecast::Forecast;
use crate::goals::{GoalPlan, GoalProjection};
use crate::metrics::Totals;
use crate::time::in_month;

/// Goals with a deadline this close get a reminder.
pub const DEADLINE_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BudgetOver,
    BudgetWarning,
    GoalDeadline,
    GoalComplete,
    ForecastOverAverage,
    SpendingOverIncome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    fn new(kind: NotificationKind, severity: Severity, message: String) -> Self {
        Self {
            kind,
            severity,
            message,
        }
    }
}

/// Run every rule in order. Budgets are checked against the current month.
pub fn evaluate(
    data: &UserData,
    plans: &HashMap<EntityId, GoalPlan>,
    today: NaiveDate,
) -> Vec<Notification> {
    let mut out = Vec::new();
    let month: Vec<Transaction> = data
        .transactions
        .iter()
        .filter(|t| in_month(t.date, today.year(), today.month()) && t.date <= today)
        .cloned()
        .collect();

    for report in evaluate_all(&data.budgets, &month, &data.categories()) {
        match report.status {
            BudgetStatus::Over => out.push(Notification::new(
                NotificationKind::BudgetOver,
                Severity::Error,
                format!(
                    "Бюджет «{}» превышен на {:.2}",
                    report.category, -report.remaining
                ),
            )),
            BudgetStatus::Warning => out.push(Notification::new(
                NotificationKind::BudgetWarning,
                Severity::Warning,
                format!(
                    "Бюджет «{}» израсходован на {:.0}%",
                    report.category, report.percent
                ),
            )),
            BudgetStatus::Ok => {}
        }
    }

    let empty = GoalPlan::default();
    for goal in &data.goals {
        let plan = plans.get(&goal.id).unwrap_or(&empty);
        let projection = GoalProjection::compute(goal, plan, today);
        if projection.complete {
            out.push(Notification::new(
                NotificationKind::GoalComplete,
                Severity::Success,
                format!("Цель «{}» достигнута", goal.name),
            ));
        } else if projection.deadline_close(goal, DEADLINE_WINDOW_DAYS) {
            out.push(Notification::new(
                NotificationKind::GoalDeadline,
                Severity::Warning,
                format!(
                    "До срока цели «{}» осталось {} дн.",
                    goal.name, projection.days_remaining
                ),
            ));
        }
    }

    let forecast = Forecast::compute(&data.transactions, today);
    if forecast.over_average() {
        out.push(Notification::new(
            NotificationKind::ForecastOverAverage,
            Severity::Info,
            format!(
                "Прогноз расходов {:.2} выше среднего {:.2}",
                forecast.projected_month_expense, forecast.average_monthly_expense
            ),
        ));
    }

    let totals = Totals::compute(&month);
    if totals.expense > totals.income {
        out.push(Notification::new(
            NotificationKind::SpendingOverIncome,
            Severity::Warning,
            format!(
                "Расходы в этом месяце ({:.2}) превышают доходы ({:.2})",
                totals.expense, totals.income
            ),
        ));
    }

    out
}
