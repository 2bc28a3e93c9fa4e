//! Plain-text renderings of the derived views.

use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::fmt::Write;

use kopilka_core::budgets::evaluate_all;
use kopilka_core::metrics::monthly_trend;
use kopilka_core::time::in_month;
use kopilka_core::{
    AchievementReport, AchievementStats, AnalyticsSummary, BudgetReport, CategoryShare, EntityId, Forecast, Goal,
    GoalPlan, GoalProjection, Notification, Totals, Transaction, UserData, notifications,
};

const RECENT_ROWS: usize = 5;
const TREND_MONTHS: u32 = 6;

/// Two decimals, thousands grouped with spaces: "1 234.50 RUB".
pub fn money(amount: f64, currency: &str) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02} {currency}", cents % 100)
}

/// Percentages that could not be computed render as a dash.
fn percent(p: f64) -> String {
    if p.is_finite() { format!("{p:.1}%") } else { "-".to_string() }
}

pub fn transaction_line(t: &Transaction, data: &UserData, currency: &str) -> String {
    let sign = if t.is_income() { "+" } else { "-" };
    let label = data.categories().resolve_label(&t.category);
    let mut line = format!(
        "{:>14}  {}  {sign}{:<18} {}",
        t.id.to_string(),
        t.date.format("%Y-%m-%d"),
        money(t.amount, currency),
        label
    );
    if let Some(d) = t.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(line, "  ({d})");
    }
    line
}

pub fn month_budgets(data: &UserData, today: NaiveDate) -> Vec<BudgetReport> {
    let month: Vec<Transaction> = data
        .transactions
        .iter()
        .filter(|t| in_month(t.date, today.year(), today.month()) && t.date <= today)
        .cloned()
        .collect();
    evaluate_all(&data.budgets, &month, &data.categories())
}

pub fn budget_line(r: &BudgetReport, currency: &str) -> String {
    format!(
        "{:<20} {} / {}  {:>7}  [{}]",
        r.category,
        money(r.spent, currency),
        money(r.limit, currency),
        percent(r.percent),
        r.status.label()
    )
}

pub fn goal_line(goal: &Goal, projection: &GoalProjection, currency: &str) -> String {
    let mut line = format!(
        "{:>14}  {:<20} {} / {}",
        goal.id.to_string(),
        goal.name,
        money(goal.saved, currency),
        money(goal.target, currency)
    );
    if let Some(deadline) = goal.deadline {
        let _ = write!(
            line,
            "  до {deadline} ({} дн.), {} в день, отмечено {}, ожидается {} ({})",
            projection.days_remaining,
            money(projection.daily_amount, currency),
            projection.checked_days,
            money(projection.expected_saved, currency),
            percent(projection.percent)
        );
    }
    if projection.complete {
        line.push_str("  ✓");
    }
    line
}

pub fn dashboard(data: &UserData, plans: &HashMap<EntityId, GoalPlan>, today: NaiveDate, currency: &str) -> String {
    let totals = Totals::compute(&data.transactions);
    let mut out = String::new();
    let _ = writeln!(out, "Доходы:     {}", money(totals.income, currency));
    let _ = writeln!(out, "Расходы:    {}", money(totals.expense, currency));
    let _ = writeln!(out, "Баланс:     {}", money(totals.balance, currency));
    let _ = writeln!(out, "Сбережения: {}%", totals.savings_rate_display());

    let budgets = month_budgets(data, today);
    if !budgets.is_empty() {
        let _ = writeln!(out, "\nБюджеты ({}):", today.format("%Y-%m"));
        for r in &budgets {
            let _ = writeln!(out, "  {}", budget_line(r, currency));
        }
    }

    if !data.goals.is_empty() {
        let _ = writeln!(out, "\nЦели:");
        for goal in &data.goals {
            let plan = plans.get(&goal.id).cloned().unwrap_or_default();
            let projection = GoalProjection::compute(goal, &plan, today);
            let _ = writeln!(out, "  {}", goal_line(goal, &projection, currency));
        }
    }

    let mut recent: Vec<&Transaction> = data.transactions.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    if !recent.is_empty() {
        let _ = writeln!(out, "\nПоследние операции:");
        for t in recent.into_iter().take(RECENT_ROWS) {
            let _ = writeln!(out, "  {}", transaction_line(t, data, currency));
        }
    }
    out
}

fn breakdown(out: &mut String, title: &str, rows: &[CategoryShare], currency: &str) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for row in rows {
        let _ = writeln!(out, "  {:<20} {:>18} {:>7}", row.label, money(row.amount, currency), percent(row.percent));
    }
}

pub fn analytics(transactions: &[Transaction], data: &UserData, today: NaiveDate, currency: &str) -> String {
    let summary = AnalyticsSummary::compute(transactions, &data.categories());
    let mut out = String::new();
    let _ = writeln!(out, "Доходы:  {}", money(summary.totals.income, currency));
    let _ = writeln!(out, "Расходы: {}", money(summary.totals.expense, currency));
    let _ = writeln!(out, "Баланс:  {}", money(summary.totals.balance, currency));
    let ratio = summary
        .income_ratio
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "Доход/расход: {ratio}");
    let _ = writeln!(
        out,
        "Средний расход в день: {}",
        money(summary.daily_average_expense, currency)
    );
    breakdown(&mut out, "Доходы по категориям", &summary.income_by_category, currency);
    breakdown(&mut out, "Расходы по категориям", &summary.expense_by_category, currency);

    let _ = writeln!(out, "\nПо месяцам:");
    for point in monthly_trend(&data.transactions, today, TREND_MONTHS) {
        let _ = writeln!(
            out,
            "  {}-{:02}  +{:<18} -{}",
            point.year,
            point.month,
            money(point.income, currency),
            money(point.expense, currency)
        );
    }
    out
}

pub fn forecast(data: &UserData, today: NaiveDate, currency: &str) -> String {
    let f = Forecast::compute(&data.transactions, today);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Средний расход за месяц: {} (месяцев в истории: {})",
        money(f.average_monthly_expense, currency),
        f.history_months
    );
    let _ = writeln!(
        out,
        "Потрачено с начала месяца: {} за {} дн.",
        money(f.month_to_date_expense, currency),
        f.days_elapsed
    );
    let _ = writeln!(out, "Прогноз на месяц: {}", money(f.projected_month_expense, currency));
    let _ = writeln!(
        out,
        "Можно тратить в день: {} (осталось {} дн.)",
        money(f.daily_limit, currency),
        f.days_remaining
    );
    if f.over_average() {
        let _ = writeln!(out, "Внимание: прогноз выше среднего");
    }
    out
}

pub fn achievements(data: &UserData, today: NaiveDate) -> String {
    let report = AchievementReport::evaluate(&AchievementStats::compute(data, today));
    let mut out = String::new();
    let _ = writeln!(out, "Уровень {} ({} очков)\n", report.level, report.points);
    for a in &report.achievements {
        let mark = if a.unlocked { "[x]" } else { "[ ]" };
        let _ = writeln!(out, "{mark} {:<28} {:>4}  {}", a.title, a.points, a.description);
    }
    out
}

pub fn notifications(data: &UserData, plans: &HashMap<EntityId, GoalPlan>, today: NaiveDate) -> String {
    let list: Vec<Notification> = notifications::evaluate(data, plans, today);
    if list.is_empty() {
        return "Нет уведомлений\n".to_string();
    }
    let mut out = String::new();
    for n in &list {
        let _ = writeln!(out, "[{}] {}", n.severity.as_str(), n.message);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopilka_core::{Budget, TxType};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn sample() -> UserData {
        let mut data = UserData::default();
        let d = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        data.transactions.push(Transaction::new(1, TxType::Income, "Зарплата", 1000.0, d));
        data.transactions.push(Transaction::new(2, TxType::Expense, "Продукты", 400.0, d));
        data.budgets.push(Budget::new(3, "Продукты", 500.0));
        data
    }

    #[test]
    fn test_money() {
        assert_eq!(money(1234567.5, "RUB"), "1 234 567.50 RUB");
        assert_eq!(money(-40.0, "RUB"), "-40.00 RUB");
        assert_eq!(money(f64::NAN, "RUB"), "0.00 RUB");
    }

    #[test]
    fn test_dashboard_scenario() {
        let text = dashboard(&sample(), &HashMap::new(), today(), "RUB");
        assert!(text.contains("Доходы:     1 000.00 RUB"));
        assert!(text.contains("Баланс:     600.00 RUB"));
        assert!(text.contains("Сбережения: 60.0%"));
        assert!(text.contains("80.0%"));
    }

    #[test]
    fn test_empty_breakdown_percent_renders_dash() {
        assert_eq!(percent(f64::NAN), "-");
        let text = analytics(&[], &UserData::default(), today(), "RUB");
        assert!(text.contains("Доход/расход: -"));
    }

    #[test]
    fn test_achievements_list_all_rules() {
        let text = achievements(&sample(), today());
        assert!(text.starts_with("Уровень 1 (45 очков)"));
        assert!(text.contains("[x]"));
        assert!(text.contains("[ ]"));
    }
}
