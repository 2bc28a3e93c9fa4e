//! Category lists and the label <-> key mapping.
//!
//! Transactions reference categories by a normalized key (lowercase, whitespace runs
//! replaced by `-`); budgets and reports use the human-readable label. The label is
//! recovered by scanning both lists for a label whose key matches.

use serde::{Deserialize, Serialize};

use crate::finance::TxType;

pub const DEFAULT_INCOME: [&str; 5] = ["Зарплата", "Фриланс", "Инвестиции", "Бонусы", "Подарки"];
pub const DEFAULT_EXPENSE: [&str; 7] = [
    "Продукты",
    "Транспорт",
    "Развлечения",
    "ЖКХ",
    "Здоровье",
    "Образование",
    "Прочее",
];

/// Normalize a label into a lookup key: "Мобильная связь" -> "мобильная-связь".
pub fn normalize_key(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// The user's ordered, de-duplicated category labels per transaction type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categories {
    pub income: Vec<String>,
    pub expense: Vec<String>,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            income: DEFAULT_INCOME.iter().map(|s| s.to_string()).collect(),
            expense: DEFAULT_EXPENSE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Categories {
    pub fn list(&self, kind: TxType) -> &[String] {
        match kind {
            TxType::Income => &self.income,
            TxType::Expense => &self.expense,
        }
    }

    /// Resolve a key back to its display label; unknown keys resolve to themselves.
    pub fn resolve_label(&self, key: &str) -> String {
        self.income
            .iter()
            .chain(self.expense.iter())
            .find(|label| normalize_key(label) == key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Whether a label (or anything normalizing to the same key) is in the list.
    pub fn contains(&self, kind: TxType, label: &str) -> bool {
        let key = normalize_key(label);
        self.list(kind).iter().any(|l| normalize_key(l) == key)
    }

    /// Append a label unless an equivalent one exists. Returns true when added.
    pub fn add(&mut self, kind: TxType, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.contains(kind, label) {
            return false;
        }
        let list = match kind {
            TxType::Income => &mut self.income,
            TxType::Expense => &mut self.expense,
        };
        list.push(label.to_string());
        true
    }

    /// Remove a label (matched by key). Returns true when something was removed.
    pub fn remove(&mut self, kind: TxType, label: &str) -> bool {
        let key = normalize_key(label);
        let list = match kind {
            TxType::Income => &mut self.income,
            TxType::Expense => &mut self.expense,
        };
        let before = list.len();
        list.retain(|l| normalize_key(l) != key);
        list.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Продукты"), "продукты");
        assert_eq!(normalize_key("  Мобильная   связь "), "мобильная-связь");
        assert_eq!(normalize_key("Side Hustle"), "side-hustle");
    }

    #[test]
    fn test_label_and_key_round_trip() {
        let cats = Categories::default();
        for label in cats.income.iter().chain(cats.expense.iter()) {
            assert_eq!(&cats.resolve_label(&normalize_key(label)), label);
        }
    }

    #[test]
    fn test_unknown_key_resolves_to_itself() {
        let cats = Categories::default();
        assert_eq!(cats.resolve_label("crypto"), "crypto");
    }

    #[test]
    fn test_add_is_deduplicated() {
        let mut cats = Categories::default();
        assert!(!cats.add(TxType::Expense, "продукты"));
        assert!(cats.add(TxType::Expense, "Кафе"));
        assert_eq!(cats.expense.last().unwrap(), "Кафе");
        assert!(!cats.add(TxType::Expense, "   "));
    }

    #[test]
    fn test_remove() {
        let mut cats = Categories::default();
        assert!(cats.remove(TxType::Income, "бонусы"));
        assert!(!cats.contains(TxType::Income, "Бонусы"));
        assert!(!cats.remove(TxType::Income, "Бонусы"));
    }
}
