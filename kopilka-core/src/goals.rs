//! Savings-goal projection and calendar check-in plans.
//!
//! A plan is a `date -> bool` map of days on which the user says they put the
//! planned daily amount aside. The expected amount derived from it lives next to the
//! authoritative `Goal::saved` and only flows into it when the plan is closed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::finance::{Goal, finite_or_zero};
use crate::time::days_between;

/// Storage key for a goal's plan.
pub fn plan_key(goal_id: &impl std::fmt::Display) -> String {
    format!("goal_plan_{goal_id}")
}

/// Per-day check-ins for one goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalPlan {
    days: BTreeMap<NaiveDate, bool>,
}

impl GoalPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the check-in for `date` and return the new state.
    pub fn toggle(&mut self, date: NaiveDate) -> bool {
        let entry = self.days.entry(date).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn set(&mut self, date: NaiveDate, checked: bool) {
        self.days.insert(date, checked);
    }

    pub fn is_checked(&self, date: NaiveDate) -> bool {
        self.days.get(&date).copied().unwrap_or(false)
    }

    pub fn checked_days(&self) -> u32 {
        self.days.values().filter(|&&c| c).count() as u32
    }

    pub fn checked_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.iter().filter(|(_, c)| **c).map(|(d, _)| *d)
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.checked_days() == 0
    }
}

/// What the plan says about a goal as of a given day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProjection {
    /// Days from today to the deadline, at least 1; 0 without a deadline
    pub days_remaining: u32,
    /// Whole-unit amount to set aside per day to hit the target on time
    pub daily_amount: f64,
    pub checked_days: u32,
    pub expected_saved: f64,
    /// Expected progress, capped at 100
    pub percent: f64,
    pub complete: bool,
}

impl GoalProjection {
    pub fn compute(goal: &Goal, plan: &GoalPlan, today: NaiveDate) -> Self {
        let target = finite_or_zero(goal.target);
        let saved = finite_or_zero(goal.saved);

        let (days_remaining, daily_amount) = match goal.deadline {
            Some(deadline) => {
                let days = days_between(today, deadline).max(1) as u32;
                let missing = (target - saved).max(0.0);
                (days, (missing / days as f64).ceil())
            }
            None => (0, 0.0),
        };

        let checked_days = plan.checked_days();
        let expected_saved = saved + checked_days as f64 * daily_amount;
        let percent = if target > 0.0 {
            (expected_saved / target * 100.0).min(100.0)
        } else {
            0.0
        };

        Self {
            days_remaining,
            daily_amount,
            checked_days,
            expected_saved,
            percent,
            complete: target > 0.0 && expected_saved >= target,
        }
    }

    /// Days left for a deadline within `window` days that is not yet met.
    pub fn deadline_close(&self, goal: &Goal, window: u32) -> bool {
        goal.deadline.is_some() && !self.complete && self.days_remaining <= window
    }
}

/// Fold the plan's expected amount into `saved` and clear the plan.
/// Returns the amount that was added.
pub fn close_plan(goal: &mut Goal, plan: &mut GoalPlan, today: NaiveDate) -> f64 {
    let projection = GoalProjection::compute(goal, plan, today);
    let added = projection.expected_saved - finite_or_zero(goal.saved);
    goal.saved = projection.expected_saved;
    plan.clear();
    added
}

/// Add a one-off contribution. Non-positive or non-finite amounts are ignored.
pub fn contribute(goal: &mut Goal, amount: f64) -> f64 {
    if amount.is_finite() && amount > 0.0 {
        goal.saved = finite_or_zero(goal.saved) + amount;
    }
    goal.saved
}

/// Sum of `saved` over all goals.
pub fn total_saved(goals: &[Goal]) -> f64 {
    goals.iter().map(|g| finite_or_zero(g.saved)).sum()
}
