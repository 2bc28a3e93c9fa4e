//! Month-end expense forecast from a 3-month history.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::finance::Transaction;
use crate::metrics::month_expense;
use crate::time::{days_in_month, shift_month};

/// How many past months feed the average.
pub const HISTORY_MONTHS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Forecast {
    /// Mean monthly expense over the last 3 months that had any expense
    pub average_monthly_expense: f64,
    /// Months that contributed to the average
    pub history_months: u32,
    pub month_to_date_expense: f64,
    pub days_elapsed: u32,
    pub days_remaining: u32,
    /// Month-to-date expense extended by the current daily pace
    pub projected_month_expense: f64,
    /// What can still be spent per day to stay within the average, never negative
    pub daily_limit: f64,
}

impl Forecast {
    pub fn compute(transactions: &[Transaction], today: NaiveDate) -> Self {
        let (year, month) = (today.year(), today.month());

        let history: Vec<f64> = (1..=HISTORY_MONTHS)
            .map(|back| {
                let (y, m) = shift_month(year, month, -back);
                month_expense(transactions, y, m)
            })
            .filter(|&expense| expense > 0.0)
            .collect();
        let average_monthly_expense = if history.is_empty() {
            0.0
        } else {
            history.iter().sum::<f64>() / history.len() as f64
        };

        let month_to_date_expense: f64 = transactions
            .iter()
            .filter(|t| t.is_expense() && t.date.year() == year && t.date.month() == month && t.date <= today)
            .map(Transaction::safe_amount)
            .sum();

        Self::from_parts(
            average_monthly_expense,
            history.len() as u32,
            month_to_date_expense,
            today.day(),
            days_in_month(year, month),
        )
    }

    /// The arithmetic without the transaction scan.
    pub fn from_parts(
        average_monthly_expense: f64,
        history_months: u32,
        month_to_date_expense: f64,
        days_elapsed: u32,
        month_length: u32,
    ) -> Self {
        let days_elapsed = days_elapsed.clamp(1, month_length.max(1));
        let days_remaining = month_length.saturating_sub(days_elapsed);

        let daily_pace = month_to_date_expense / days_elapsed as f64;
        let projected_month_expense = month_to_date_expense + daily_pace * days_remaining as f64;

        let divisor = days_remaining.max(1) as f64;
        let daily_limit = ((average_monthly_expense - month_to_date_expense) / divisor).max(0.0);

        Self {
            average_monthly_expense,
            history_months,
            month_to_date_expense,
            days_elapsed,
            days_remaining,
            projected_month_expense,
            daily_limit,
        }
    }

    /// True when the current pace ends the month above the historical average.
    pub fn over_average(&self) -> bool {
        self.history_months > 0 && self.projected_month_expense > self.average_monthly_expense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::TxType;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn expense(id: i64, amount: f64, date: NaiveDate) -> Transaction {
        Transaction::new(id, TxType::Expense, "Продукты", amount, date)
    }

    fn history() -> Vec<Transaction> {
        vec![
            expense(1, 3000.0, d(2026, 5, 10)),
            // June had no spending and is skipped by the average
            expense(2, 2000.0, d(2026, 7, 3)),
            expense(3, 1000.0, d(2026, 7, 20)),
            // Older than the window
            expense(4, 99_999.0, d(2026, 1, 1)),
        ]
    }

    #[test]
    fn test_average_skips_empty_months() {
        let f = Forecast::compute(&history(), d(2026, 8, 10));
        assert_eq!(f.history_months, 2);
        assert_eq!(f.average_monthly_expense, 3000.0);
    }

    #[test]
    fn test_projection_and_daily_limit() {
        let mut txs = history();
        txs.push(expense(5, 1000.0, d(2026, 8, 5)));
        // Income does not count
        txs.push(Transaction::new(6, TxType::Income, "Зарплата", 5000.0, d(2026, 8, 1)));

        let f = Forecast::compute(&txs, d(2026, 8, 10));
        assert_eq!(f.month_to_date_expense, 1000.0);
        assert_eq!(f.days_elapsed, 10);
        assert_eq!(f.days_remaining, 21);
        // 1000 + 100/day * 21
        assert_eq!(f.projected_month_expense, 3100.0);
        // (3000 - 1000) / 21
        assert!((f.daily_limit - 95.238).abs() < 0.001);
        assert!(f.over_average());
    }

    #[test]
    fn test_daily_limit_floored_at_zero() {
        let f = Forecast::from_parts(1000.0, 3, 1500.0, 15, 30);
        assert_eq!(f.daily_limit, 0.0);
    }

    #[test]
    fn test_last_day_of_month() {
        let f = Forecast::from_parts(900.0, 3, 600.0, 31, 31);
        assert_eq!(f.days_remaining, 0);
        assert_eq!(f.projected_month_expense, 600.0);
        assert_eq!(f.daily_limit, 300.0);
    }

    #[test]
    fn test_no_history() {
        let f = Forecast::compute(&[], d(2026, 8, 10));
        assert_eq!(f.average_monthly_expense, 0.0);
        assert_eq!(f.projected_month_expense, 0.0);
        assert_eq!(f.daily_limit, 0.0);
        assert!(!f.over_average());
    }

    #[test]
    fn test_projection_is_monotone_in_month_to_date() {
        let today = d(2026, 8, 12);
        let mut previous = f64::MIN;
        for step in 0..50 {
            let mut txs = history();
            txs.push(expense(100, step as f64 * 37.5, d(2026, 8, 11)));
            let f = Forecast::compute(&txs, today);
            assert!(f.projected_month_expense >= previous);
            previous = f.projected_month_expense;
        }
    }
}
