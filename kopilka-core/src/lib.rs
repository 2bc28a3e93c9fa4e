//! kopilka-core: domain types and pure computations for the Kopilka finance tracker

pub mod achievements;
pub mod budgets;
pub mod categories;
pub mod finance;
pub mod forecast;
pub mod goals;
pub mod merge;
pub mod metrics;
pub mod notifications;
pub mod security;
pub mod session;
pub mod time;
pub mod validator;

pub use achievements::{Achievement, AchievementReport, AchievementStats, level_for};
pub use budgets::{BudgetReport, BudgetStatus, upsert_budget};
pub use categories::{Categories, normalize_key};
pub use finance::{Budget, EntityId, Goal, Transaction, TxType, User, UserData};
pub use forecast::Forecast;
pub use goals::{GoalPlan, GoalProjection, close_plan, contribute, plan_key};
pub use merge::{fingerprint, has_changes, merge_by_id, resolve_conflicts};
pub use metrics::{AnalyticsSummary, CategoryShare, Period, SortOrder, Totals, TransactionFilter};
pub use notifications::{Notification, NotificationKind, Severity};
pub use security::{LoginAttempts, LoginCheck, LoginThrottle, SanitizeKind};
pub use session::{Session, SessionInfo, SessionState};
pub use validator::{FieldKind, FieldRules, FormValidation, ValidationResult, Validator};

/// Millisecond-clock identifiers for locally created records
pub mod ids {
    use chrono::{DateTime, Utc};

    use crate::finance::EntityId;
    use crate::time::epoch_millis;

    /// Hands out ids from the millisecond clock, bumping by one when two records
    /// are created within the same millisecond.
    #[derive(Debug, Clone, Default)]
    pub struct IdGenerator {
        last: i64,
    }

    impl IdGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Continue after an id that is already in use.
        pub fn seeded(last: i64) -> Self {
            Self { last }
        }

        pub fn next_id(&mut self, now: DateTime<Utc>) -> EntityId {
            let candidate = epoch_millis(now);
            self.last = if candidate > self.last { candidate } else { self.last + 1 };
            EntityId::Num(self.last)
        }
    }

    /// Largest numeric id in a list, 0 if there is none.
    pub fn max_numeric<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> i64 {
        ids.into_iter()
            .filter_map(|id| match id {
                EntityId::Num(n) => Some(*n),
                EntityId::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::TimeZone;

        #[test]
        fn test_ids_strictly_increase() {
            let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
            let mut ids = IdGenerator::new();
            let a = ids.next_id(now);
            let b = ids.next_id(now);
            assert_eq!(a, EntityId::Num(epoch_millis(now)));
            assert_eq!(b, EntityId::Num(epoch_millis(now) + 1));

            let mut seeded = IdGenerator::seeded(epoch_millis(now) + 10);
            assert_eq!(seeded.next_id(now), EntityId::Num(epoch_millis(now) + 11));
        }

        #[test]
        fn test_max_numeric_skips_text_ids() {
            let ids = [EntityId::Num(3), EntityId::Text("x".into()), EntityId::Num(9)];
            assert_eq!(max_numeric(&ids), 9);
            assert_eq!(max_numeric(&[]), 0);
        }
    }
}
