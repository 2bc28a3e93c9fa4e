//! Export and import of a user's data: a versioned JSON bundle and a CSV of
//! transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use kopilka_core::merge::{merge_by_id, union_labels};
use kopilka_core::{Budget, Categories, EntityId, Goal, Transaction, User, UserData};

pub const EXPORT_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportUser {
    pub id: EntityId,
    pub name: String,
    pub email: String,
}

/// Parts of the bundle; absent parts were excluded at export time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budgets: Option<Vec<Budget>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<Goal>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub user: ExportUser,
    pub export_date: DateTime<Utc>,
    pub version: String,
    pub data: ExportData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub transactions: bool,
    pub categories: bool,
    pub budgets: bool,
    pub goals: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            transactions: true,
            categories: true,
            budgets: true,
            goals: true,
        }
    }
}

/// Which parts of an imported bundle are merged in. Same shape as the export side.
pub type ImportOptions = ExportOptions;

pub fn build_bundle(user: &User, data: &UserData, options: ExportOptions, now: DateTime<Utc>) -> ExportBundle {
    ExportBundle {
        user: ExportUser {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        },
        export_date: now,
        version: EXPORT_VERSION.to_string(),
        data: ExportData {
            transactions: options.transactions.then(|| data.transactions.clone()),
            income_categories: options.categories.then(|| data.income_categories.clone()),
            expense_categories: options.categories.then(|| data.expense_categories.clone()),
            budgets: options.budgets.then(|| data.budgets.clone()),
            goals: options.goals.then(|| data.goals.clone()),
        },
    }
}

/// Parse an export file. Anything without a `data` object is rejected.
pub fn parse_bundle(json: &str) -> DataResult<ExportBundle> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.get("data").is_some_and(serde_json::Value::is_object) {
        return Err(DataError::Validation(vec![
            "Некорректная структура данных для импорта".to_string(),
        ]));
    }
    Ok(serde_json::from_value(value)?)
}

/// Merge a bundle into existing data with the same rules as server sync.
pub fn apply_import(target: &mut UserData, bundle: &ExportData, options: ImportOptions) {
    if options.transactions {
        if let Some(txs) = &bundle.transactions {
            target.transactions = merge_by_id(&target.transactions, txs);
        }
    }
    if options.categories {
        if let Some(labels) = &bundle.income_categories {
            target.income_categories = union_labels(&target.income_categories, labels);
        }
        if let Some(labels) = &bundle.expense_categories {
            target.expense_categories = union_labels(&target.expense_categories, labels);
        }
    }
    if options.budgets {
        if let Some(budgets) = &bundle.budgets {
            target.budgets = merge_by_id(&target.budgets, budgets);
        }
    }
    if options.goals {
        if let Some(goals) = &bundle.goals {
            target.goals = merge_by_id(&target.goals, goals);
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: String,
    date: String,
    #[serde(rename = "type")]
    kind: &'static str,
    category: String,
    amount: String,
    description: &'a str,
}

/// Transactions as CSV with resolved category labels.
pub fn transactions_csv(transactions: &[Transaction], categories: &Categories) -> DataResult<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for t in transactions {
        wtr.serialize(CsvRow {
            id: t.id.to_string(),
            date: t.date.format("%Y-%m-%d").to_string(),
            kind: t.kind.as_str(),
            category: categories.resolve_label(&t.category),
            amount: format!("{:.2}", t.safe_amount()),
            description: t.description.as_deref().unwrap_or(""),
        })?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| DataError::Storage(format!("flush csv: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DataError::Storage(format!("csv is not utf-8: {e}")))
}
