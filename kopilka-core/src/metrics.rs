//! Derived metrics over the transaction list: totals, category breakdowns,
//! monthly trend and listing filters.
//!
//! Everything here is total: bad amounts count as 0 and nothing returns an error.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::categories::Categories;
use crate::finance::{Transaction, TxType};
use crate::time::{in_month, month_start, quarter_start, shift_month, year_start};

/// Income, expense and what is left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    /// `balance / income * 100`, 0 when there is no income
    pub savings_rate: f64,
}

impl Totals {
    pub fn compute<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let (mut income, mut expense) = (0.0, 0.0);
        for t in transactions {
            match t.kind {
                TxType::Income => income += t.safe_amount(),
                TxType::Expense => expense += t.safe_amount(),
            }
        }
        let balance = income - expense;
        let savings_rate = if income > 0.0 { balance / income * 100.0 } else { 0.0 };
        Self {
            income,
            expense,
            balance,
            savings_rate,
        }
    }

    /// Savings rate the way the dashboard shows it: one decimal, "0" without income.
    pub fn savings_rate_display(&self) -> String {
        if self.income > 0.0 {
            format!("{:.1}", self.savings_rate)
        } else {
            "0".to_string()
        }
    }

    /// Income divided by expense; `None` when there was no expense.
    pub fn income_ratio(&self) -> Option<f64> {
        (self.expense > 0.0).then(|| self.income / self.expense)
    }
}

/// One row of a category breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub label: String,
    pub amount: f64,
    /// Share of the type total; NaN when the total is 0 (the renderer decides)
    pub percent: f64,
}

/// Group-sum transactions of one type by resolved category label.
/// Rows come in first-seen order.
pub fn category_breakdown(
    transactions: &[Transaction],
    categories: &Categories,
    kind: TxType,
) -> Vec<CategoryShare> {
    let mut rows: Vec<CategoryShare> = Vec::new();
    let mut total = 0.0;

    for t in transactions.iter().filter(|t| t.kind == kind) {
        let label = categories.resolve_label(&t.category);
        let amount = t.safe_amount();
        total += amount;
        match rows.iter_mut().find(|r| r.label == label) {
            Some(row) => row.amount += amount,
            None => rows.push(CategoryShare {
                label,
                amount,
                percent: 0.0,
            }),
        }
    }

    for row in &mut rows {
        row.percent = row.amount / total * 100.0;
    }
    rows
}

/// Headline numbers of the analytics tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub totals: Totals,
    pub income_by_category: Vec<CategoryShare>,
    pub expense_by_category: Vec<CategoryShare>,
    pub income_ratio: Option<f64>,
    /// Total expense spread over 30 days
    pub daily_average_expense: f64,
}

impl AnalyticsSummary {
    pub fn compute(transactions: &[Transaction], categories: &Categories) -> Self {
        let totals = Totals::compute(transactions);
        Self {
            income_by_category: category_breakdown(transactions, categories, TxType::Income),
            expense_by_category: category_breakdown(transactions, categories, TxType::Expense),
            income_ratio: totals.income_ratio(),
            daily_average_expense: totals.expense / 30.0,
            totals,
        }
    }
}

/// Income and expense of one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthPoint {
    pub year: i32,
    pub month: u32,
    pub income: f64,
    pub expense: f64,
}

/// Per-month totals for the last `months` months ending with the month of `today`,
/// oldest first.
pub fn monthly_trend(transactions: &[Transaction], today: NaiveDate, months: u32) -> Vec<MonthPoint> {
    (0..months as i32)
        .rev()
        .map(|back| {
            let (year, month) = shift_month(today.year(), today.month(), -back);
            let totals = Totals::compute(transactions.iter().filter(|t| in_month(t.date, year, month)));
            MonthPoint {
                year,
                month,
                income: totals.income,
                expense: totals.expense,
            }
        })
        .collect()
}

/// Sum of expenses inside one calendar month.
pub fn month_expense(transactions: &[Transaction], year: i32, month: u32) -> f64 {
    transactions
        .iter()
        .filter(|t| t.is_expense() && in_month(t.date, year, month))
        .map(Transaction::safe_amount)
        .sum()
}

/// Reporting window for the transaction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Some(Period::All),
            "month" => Some(Period::Month),
            "quarter" => Some(Period::Quarter),
            "year" => Some(Period::Year),
            _ => None,
        }
    }

    /// First date included in the window, `None` for all time.
    pub fn start(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::All => None,
            Period::Month => Some(month_start(today)),
            Period::Quarter => Some(quarter_start(today)),
            Period::Year => Some(year_start(today)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "date-desc")]
    DateDesc,
    #[serde(rename = "date-asc")]
    DateAsc,
    #[serde(rename = "amount-desc")]
    AmountDesc,
    #[serde(rename = "amount-asc")]
    AmountAsc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date-desc" => Some(SortOrder::DateDesc),
            "date-asc" => Some(SortOrder::DateAsc),
            "amount-desc" => Some(SortOrder::AmountDesc),
            "amount-asc" => Some(SortOrder::AmountAsc),
            _ => None,
        }
    }
}

/// Criteria for listing transactions. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub kind: Option<TxType>,
    /// Category key
    pub category: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive match on description or category
    pub search: Option<String>,
    pub sort: Option<SortOrder>,
}

impl TransactionFilter {
    pub fn with_period(mut self, period: Period, today: NaiveDate) -> Self {
        if let Some(start) = period.start(today) {
            self.date_from = Some(start);
        }
        self
    }

    pub fn matches(&self, t: &Transaction) -> bool {
        if self.kind.is_some_and(|k| k != t.kind) {
            return false;
        }
        if self.category.as_deref().is_some_and(|c| c != t.category) {
            return false;
        }
        if self.date_from.is_some_and(|from| t.date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| t.date > to) {
            return false;
        }
        if let Some(term) = self.search.as_deref().map(str::to_lowercase) {
            let in_description = t
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_description && !t.category.to_lowercase().contains(&term) {
                return false;
            }
        }
        true
    }

    /// Filter and sort. Sorting is stable; without a sort order input order is kept.
    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = transactions
            .iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect();

        match self.sort {
            Some(SortOrder::DateDesc) => out.sort_by(|a, b| b.date.cmp(&a.date)),
            Some(SortOrder::DateAsc) => out.sort_by(|a, b| a.date.cmp(&b.date)),
            Some(SortOrder::AmountDesc) => {
                out.sort_by(|a, b| b.safe_amount().total_cmp(&a.safe_amount()))
            }
            Some(SortOrder::AmountAsc) => {
                out.sort_by(|a, b| a.safe_amount().total_cmp(&b.safe_amount()))
            }
            None => {}
        }
        out
    }
}
