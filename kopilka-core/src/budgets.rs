//! Budget status evaluation.
//!
//! Thresholds are strict: exactly 80% of the limit is still `Ok` and exactly the
//! limit is not `Over`. Comparisons run on whole cents so that values like
//! `500.0 * 0.8` land on the boundary instead of a float neighbour.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::categories::Categories;
use crate::finance::{Budget, EntityId, Transaction, finite_or_zero};
use crate::time::{in_month, shift_month};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Over,
}

impl BudgetStatus {
    /// Classify `spent` against `limit` in cents: above the limit is Over, above 80% is
    /// Warning, so spending exactly the limit is Warning and exactly 80% is Ok.
    pub fn classify(spent: f64, limit: f64) -> Self {
        let spent = to_cents(spent);
        let limit = to_cents(limit);
        if spent > limit {
            BudgetStatus::Over
        } else if spent * 5 > limit * 4 {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Ok
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BudgetStatus::Ok => "ok",
            BudgetStatus::Warning => "warning",
            BudgetStatus::Over => "over",
        }
    }
}

fn to_cents(amount: f64) -> i128 {
    (finite_or_zero(amount) * 100.0).round() as i128
}

/// A budget checked against a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub id: EntityId,
    pub category: String,
    pub limit: f64,
    pub spent: f64,
    /// `limit - spent`, negative when over
    pub remaining: f64,
    /// `spent / limit * 100`, 0 for a zero limit
    pub percent: f64,
    pub status: BudgetStatus,
}

/// Sum of expenses whose resolved category label equals `label`.
pub fn spent_in_category(transactions: &[Transaction], categories: &Categories, label: &str) -> f64 {
    transactions
        .iter()
        .filter(|t| t.is_expense() && categories.resolve_label(&t.category) == label)
        .map(Transaction::safe_amount)
        .sum()
}

/// Evaluate one budget. The caller picks the reporting window by choosing which
/// transactions to pass.
pub fn evaluate(budget: &Budget, transactions: &[Transaction], categories: &Categories) -> BudgetReport {
    let spent = spent_in_category(transactions, categories, &budget.category);
    let limit = finite_or_zero(budget.limit);
    let percent = if limit > 0.0 { spent / limit * 100.0 } else { 0.0 };
    BudgetReport {
        id: budget.id.clone(),
        category: budget.category.clone(),
        limit,
        spent,
        remaining: limit - spent,
        percent,
        status: BudgetStatus::classify(spent, limit),
    }
}

/// Evaluate every budget in order.
pub fn evaluate_all(budgets: &[Budget], transactions: &[Transaction], categories: &Categories) -> Vec<BudgetReport> {
    budgets
        .iter()
        .map(|b| evaluate(b, transactions, categories))
        .collect()
}

/// Insert a budget, replacing any existing budget for the same category.
/// The replaced budget keeps its position and id.
pub fn upsert_budget(budgets: &mut Vec<Budget>, budget: Budget) {
    match budgets.iter_mut().find(|b| b.category == budget.category) {
        Some(existing) => {
            existing.limit = budget.limit;
            existing.updated = budget.updated.or(budget.created);
        }
        None => budgets.push(budget),
    }
}

/// Whether every budget stayed within its limit during the given month.
/// Without budgets there is nothing to comply with and the answer is false.
pub fn month_compliant(
    budgets: &[Budget],
    transactions: &[Transaction],
    categories: &Categories,
    year: i32,
    month: u32,
) -> bool {
    if budgets.is_empty() {
        return false;
    }
    let in_window: Vec<Transaction> = transactions
        .iter()
        .filter(|t| in_month(t.date, year, month))
        .cloned()
        .collect();
    // A month without any spending says nothing about discipline.
    if !in_window.iter().any(Transaction::is_expense) {
        return false;
    }
    evaluate_all(budgets, &in_window, categories)
        .iter()
        .all(|r| r.status != BudgetStatus::Over)
}

/// Length of the run of compliant months ending with the month before `today`.
pub fn compliant_streak(
    budgets: &[Budget],
    transactions: &[Transaction],
    categories: &Categories,
    today: NaiveDate,
    max_months: u32,
) -> u32 {
    let mut streak = 0;
    for back in 1..=max_months as i32 {
        let (y, m) = shift_month(today.year(), today.month(), -back);
        if !month_compliant(budgets, transactions, categories, y, m) {
            break;
        }
        streak += 1;
    }
    streak
}
