//! Finance record types: transactions, budgets, goals and the per-user bundle.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::categories::{self, Categories};

/// Identifier of a stored entity.
///
/// Locally created records use millisecond timestamps; records coming from the
/// server may carry arbitrary string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{n}"),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Num(n)
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        EntityId::Num(i64::from(n))
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => EntityId::Num(n),
            Err(_) => EntityId::Text(s.to_string()),
        }
    }
}

/// Transaction direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Income,
    Expense,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Income => "income",
            TxType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" => Some(TxType::Income),
            "expense" => Some(TxType::Expense),
            _ => None,
        }
    }
}

/// A logged income or expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: TxType,
    /// Normalized category key (lowercase, hyphenated)
    #[serde(default)]
    pub category: String,
    /// Non-negative; malformed input coalesces to 0
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl Transaction {
    pub fn new(
        id: impl Into<EntityId>,
        kind: TxType,
        category: &str,
        amount: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            category: categories::normalize_key(category),
            amount,
            date,
            description: None,
            created: None,
            updated: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_updated(mut self, updated: impl Into<String>) -> Self {
        self.updated = Some(updated.into());
        self
    }

    pub fn is_income(&self) -> bool {
        self.kind == TxType::Income
    }

    pub fn is_expense(&self) -> bool {
        self.kind == TxType::Expense
    }

    /// Amount with non-finite values coalesced to 0.
    pub fn safe_amount(&self) -> f64 {
        finite_or_zero(self.amount)
    }
}

/// Spending limit for one expense category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: EntityId,
    /// Expense category label, e.g. "Продукты"
    pub category: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub limit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl Budget {
    pub fn new(id: impl Into<EntityId>, category: impl Into<String>, limit: f64) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            limit,
            created: None,
            updated: None,
        }
    }
}

/// A savings goal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub target: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub saved: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

impl Goal {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, target: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            target,
            saved: 0.0,
            deadline: None,
            created: None,
            updated: None,
        }
    }

    pub fn with_saved(mut self, saved: f64) -> Self {
        self.saved = saved;
        self
    }

    pub fn with_deadline(mut self, deadline: NaiveDate) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Amount still missing, never negative.
    pub fn remaining(&self) -> f64 {
        (finite_or_zero(self.target) - finite_or_zero(self.saved)).max(0.0)
    }

    pub fn is_reached(&self) -> bool {
        finite_or_zero(self.saved) >= finite_or_zero(self.target) && self.target > 0.0
    }
}

/// Everything stored for one user under `user_<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub income_categories: Vec<String>,
    #[serde(default)]
    pub expense_categories: Vec<String>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

impl Default for UserData {
    fn default() -> Self {
        let defaults = Categories::default();
        Self {
            transactions: Vec::new(),
            income_categories: defaults.income,
            expense_categories: defaults.expense,
            budgets: Vec::new(),
            goals: Vec::new(),
        }
    }
}

impl UserData {
    /// Borrow the category lists as a resolver.
    pub fn categories(&self) -> Categories {
        Categories {
            income: self.income_categories.clone(),
            expense: self.expense_categories.clone(),
        }
    }
}

/// An account. Email is the unique key; all financial data is namespaced by `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    /// Hex SHA-256 of password + salt
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Non-finite numbers coalesce to 0.
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

/// Accept numbers, numeric strings (comma or dot decimal separator) and null;
/// anything else becomes 0.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().map(finite_or_zero).unwrap_or(0.0),
        serde_json::Value::String(s) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(finite_or_zero)
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_creation_normalizes_category() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 18).unwrap();
        let tx = Transaction::new(1, TxType::Expense, "Продукты", 400.0, date);
        assert_eq!(tx.category, "продукты");
        assert!(tx.is_expense());
        assert!(!tx.is_income());
    }

    #[test]
    fn test_transaction_wire_shape() {
        let json = r#"{"id":1739836800000,"type":"income","category":"зарплата",
            "amount":"1000,50","date":"2026-02-18","created":"2026-02-18T10:00:00.000Z"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.id, EntityId::Num(1739836800000));
        assert_eq!(tx.kind, TxType::Income);
        assert_eq!(tx.amount, 1000.5);
        assert!(tx.updated.is_none());

        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["type"], "income");
        assert!(back.get("description").is_none());
    }

    #[test]
    fn test_malformed_amount_coalesces_to_zero() {
        let json = r#"{"id":"abc","type":"expense","amount":"lots","date":"2026-02-18"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.id, EntityId::Text("abc".into()));

        let json = r#"{"id":2,"type":"expense","amount":null,"date":"2026-02-18"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, 0.0);
    }

    #[test]
    fn test_user_data_defaults_and_camel_case() {
        let data: UserData = serde_json::from_str(r#"{"transactions":[]}"#).unwrap();
        assert!(data.income_categories.is_empty());

        let fresh = UserData::default();
        assert_eq!(fresh.income_categories.len(), 5);
        assert_eq!(fresh.expense_categories.len(), 7);
        let v = serde_json::to_value(&fresh).unwrap();
        assert!(v.get("incomeCategories").is_some());
        assert!(v.get("expenseCategories").is_some());
    }

    #[test]
    fn test_goal_remaining() {
        let goal = Goal::new(1, "Отпуск", 1000.0).with_saved(1200.0);
        assert_eq!(goal.remaining(), 0.0);
        assert!(goal.is_reached());
    }

    #[test]
    fn test_entity_id_from_str() {
        assert_eq!(EntityId::from("42"), EntityId::Num(42));
        assert_eq!(EntityId::from("g-1"), EntityId::Text("g-1".into()));
        assert_eq!(EntityId::Num(7).to_string(), "7");
    }
}
