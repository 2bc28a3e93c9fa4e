//! Achievement rules, points and level.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::budgets::compliant_streak;
use crate::finance::UserData;
use crate::goals::total_saved;
use crate::metrics::Totals;
use crate::time::in_month;

/// Aggregates the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AchievementStats {
    pub transactions: usize,
    /// Savings rate of the current month; 0 without income
    pub monthly_savings_rate: f64,
    pub budgets: usize,
    /// Consecutive budget-compliant months before the current one
    pub compliant_months: u32,
    pub goals: usize,
    pub goals_reached: usize,
    pub total_goal_savings: f64,
}

impl AchievementStats {
    pub fn compute(data: &UserData, today: NaiveDate) -> Self {
        let this_month = Totals::compute(
            data.transactions
                .iter()
                .filter(|t| in_month(t.date, today.year(), today.month())),
        );
        let categories = data.categories();
        Self {
            transactions: data.transactions.len(),
            monthly_savings_rate: this_month.savings_rate,
            budgets: data.budgets.len(),
            compliant_months: compliant_streak(
                &data.budgets,
                &data.transactions,
                &categories,
                today,
                COMPLIANT_MONTHS_REQUIRED,
            ),
            goals: data.goals.len(),
            goals_reached: data.goals.iter().filter(|g| g.is_reached()).count(),
            total_goal_savings: total_saved(&data.goals),
        }
    }
}

const COMPLIANT_MONTHS_REQUIRED: u32 = 3;

/// A rule in the fixed achievement list.
pub struct AchievementRule {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub points: u32,
    check: fn(&AchievementStats) -> bool,
}

impl AchievementRule {
    pub fn is_unlocked(&self, stats: &AchievementStats) -> bool {
        (self.check)(stats)
    }
}

/// Evaluated in this order.
pub const RULES: &[AchievementRule] = &[
    AchievementRule {
        id: "first_transaction",
        title: "Первый шаг",
        description: "Добавьте первую транзакцию",
        points: 10,
        check: |s| s.transactions >= 1,
    },
    AchievementRule {
        id: "ten_transactions",
        title: "Учёт в привычке",
        description: "Добавьте 10 транзакций",
        points: 20,
        check: |s| s.transactions >= 10,
    },
    AchievementRule {
        id: "monthly_savings",
        title: "Бережливость",
        description: "Сохраните не менее 10% дохода за месяц",
        points: 25,
        check: |s| s.monthly_savings_rate >= 10.0,
    },
    AchievementRule {
        id: "first_budget",
        title: "Планировщик",
        description: "Создайте первый бюджет",
        points: 10,
        check: |s| s.budgets >= 1,
    },
    AchievementRule {
        id: "budget_streak",
        title: "Дисциплина",
        description: "Три месяца подряд в рамках бюджета",
        points: 50,
        check: |s| s.compliant_months >= COMPLIANT_MONTHS_REQUIRED,
    },
    AchievementRule {
        id: "first_goal",
        title: "Мечтатель",
        description: "Создайте первую цель",
        points: 10,
        check: |s| s.goals >= 1,
    },
    AchievementRule {
        id: "three_goals",
        title: "Целеустремлённость",
        description: "Создайте 3 цели",
        points: 20,
        check: |s| s.goals >= 3,
    },
    AchievementRule {
        id: "goal_reached",
        title: "Цель достигнута",
        description: "Накопите полную сумму по цели",
        points: 30,
        check: |s| s.goals_reached >= 1,
    },
    AchievementRule {
        id: "millionaire",
        title: "Миллионер",
        description: "Накопите 1 000 000 по всем целям",
        points: 100,
        check: |s| s.total_goal_savings >= 1_000_000.0,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub points: u32,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementReport {
    pub achievements: Vec<Achievement>,
    pub points: u32,
    pub level: u32,
}

impl AchievementReport {
    pub fn evaluate(stats: &AchievementStats) -> Self {
        let achievements: Vec<Achievement> = RULES
            .iter()
            .map(|rule| Achievement {
                id: rule.id,
                title: rule.title,
                description: rule.description,
                points: rule.points,
                unlocked: rule.is_unlocked(stats),
            })
            .collect();
        let points = achievements.iter().filter(|a| a.unlocked).map(|a| a.points).sum();
        Self {
            achievements,
            points,
            level: level_for(points),
        }
    }

    pub fn unlocked(&self) -> impl Iterator<Item = &Achievement> {
        self.achievements.iter().filter(|a| a.unlocked)
    }
}

pub fn level_for(points: u32) -> u32 {
    points / 100 + 1
}
