//! Local/server reconciliation: last-write-wins merge by id.
//!
//! There are no vector clocks here. When both sides edit the same record offline
//! the one with the later `updated` stamp survives and the other is dropped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::collections::HashMap;

use crate::finance::{Budget, EntityId, Goal, Transaction, UserData};

/// Length of the change-detection fingerprint.
pub const FINGERPRINT_LEN: usize = 16;

/// Anything that can take part in a merge.
pub trait Identified {
    fn id(&self) -> &EntityId;
    /// ISO timestamp of the last update; `None` sorts as the epoch.
    fn updated(&self) -> Option<&str>;
}

macro_rules! identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> &EntityId {
                &self.id
            }

            fn updated(&self) -> Option<&str> {
                self.updated.as_deref()
            }
        })*
    };
}

identified!(Transaction, Budget, Goal);

/// Merge two collections of like records.
///
/// Local records keep their order and come first; records only the server has are
/// appended in server order. For a shared id the record with the greater `updated`
/// string wins; on a tie the local record stays.
pub fn merge_by_id<T: Identified + Clone>(local: &[T], server: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::with_capacity(local.len() + server.len());
    let mut index: HashMap<EntityId, usize> = HashMap::new();

    for item in local {
        if index.contains_key(item.id()) {
            continue;
        }
        index.insert(item.id().clone(), merged.len());
        merged.push(item.clone());
    }

    for item in server {
        match index.get(item.id()) {
            Some(&pos) => {
                let local_updated = merged[pos].updated().unwrap_or("");
                let server_updated = item.updated().unwrap_or("");
                if server_updated > local_updated {
                    merged[pos] = item.clone();
                }
            }
            None => {
                index.insert(item.id().clone(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}

/// Order-preserving de-duplicated union of label lists.
pub fn union_labels(local: &[String], server: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(local.len() + server.len());
    for label in local.iter().chain(server.iter()) {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

/// Resolve a local and a server copy of a user's data into one bundle.
pub fn resolve_conflicts(local: &UserData, server: &UserData) -> UserData {
    UserData {
        transactions: merge_by_id(&local.transactions, &server.transactions),
        income_categories: union_labels(&local.income_categories, &server.income_categories),
        expense_categories: union_labels(&local.expense_categories, &server.expense_categories),
        budgets: merge_by_id(&local.budgets, &server.budgets),
        goals: merge_by_id(&local.goals, &server.goals),
    }
}

/// Cheap change-detection fingerprint of a value's JSON form.
///
/// The JSON is folded into 12 bytes (length + FNV-1a) and base64-encoded, giving
/// a 16-character string. Not cryptographic: two different bundles may share a
/// fingerprint, and the worst case is a skipped no-op merge. A plain prefix of the
/// encoded JSON would not work here since every bundle starts with the same key.
pub fn fingerprint<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_vec(value).unwrap_or_default();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in &json {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    let mut folded = [0u8; 12];
    folded[..4].copy_from_slice(&(json.len() as u32).to_be_bytes());
    folded[4..].copy_from_slice(&hash.to_be_bytes());

    let mut encoded = STANDARD.encode(folded);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

/// True when the fingerprints of the two values differ.
pub fn has_changes<T: Serialize>(local: &T, server: &T) -> bool {
    fingerprint(local) != fingerprint(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::TxType;
    use chrono::NaiveDate;

    fn tx(id: i64, amount: f64, updated: Option<&str>) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut t = Transaction::new(id, TxType::Expense, "Продукты", amount, date);
        t.updated = updated.map(str::to_string);
        t
    }

    fn ids(items: &[Transaction]) -> Vec<EntityId> {
        items.iter().map(|t| t.id.clone()).collect()
    }

    fn num_ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().map(|n| EntityId::Num(*n)).collect()
    }

    #[test]
    fn test_merge_with_self_is_identity() {
        let a = vec![
            tx(1, 10.0, Some("2026-03-01T10:00:00.000Z")),
            tx(2, 20.0, None),
        ];
        assert_eq!(merge_by_id(&a, &a), a);
    }

    #[test]
    fn test_merge_disjoint_sets() {
        let a = vec![tx(1, 1.0, None), tx(2, 2.0, None)];
        let b = vec![tx(3, 3.0, None), tx(4, 4.0, None)];

        let ab = merge_by_id(&a, &b);
        let ba = merge_by_id(&b, &a);
        assert_eq!(ab.len(), 4);
        assert_eq!(ba.len(), 4);
        assert_eq!(ids(&ab), num_ids(&[1, 2, 3, 4]));
        assert_eq!(ids(&ba), num_ids(&[3, 4, 1, 2]));

        let mut sorted_ab = ids(&ab);
        let mut sorted_ba = ids(&ba);
        sorted_ab.sort();
        sorted_ba.sort();
        assert_eq!(sorted_ab, sorted_ba);
    }

    #[test]
    fn test_later_timestamp_wins() {
        let older = tx(1, 10.0, Some("2026-03-01T10:00:00.000Z"));
        let newer = tx(1, 99.0, Some("2026-03-02T08:00:00.000Z"));

        let merged = merge_by_id(&[older.clone()], &[newer.clone()]);
        assert_eq!(merged, vec![newer.clone()]);

        let merged = merge_by_id(&[newer.clone()], &[older]);
        assert_eq!(merged, vec![newer]);
    }

    #[test]
    fn test_missing_updated_loses_to_any_timestamp() {
        let local = tx(1, 10.0, None);
        let server = tx(1, 11.0, Some("1970-01-01T00:00:00.001Z"));
        assert_eq!(merge_by_id(&[local], &[server.clone()]), vec![server]);
    }

    #[test]
    fn test_tie_keeps_local() {
        let local = tx(1, 10.0, Some("2026-03-01T10:00:00.000Z"));
        let server = tx(1, 11.0, Some("2026-03-01T10:00:00.000Z"));
        assert_eq!(merge_by_id(&[local.clone()], &[server]), vec![local]);
    }

    #[test]
    fn test_union_labels_preserves_order() {
        let local = vec!["Продукты".to_string(), "Кафе".to_string()];
        let server = vec!["Транспорт".to_string(), "Продукты".to_string()];
        assert_eq!(
            union_labels(&local, &server),
            vec!["Продукты", "Кафе", "Транспорт"]
        );
    }

    #[test]
    fn test_resolve_conflicts_merges_every_collection() {
        let mut local = UserData::default();
        local.transactions.push(tx(1, 10.0, None));
        local.expense_categories.push("Кафе".into());

        let mut server = UserData::default();
        server.transactions.push(tx(2, 20.0, None));
        server.goals.push(Goal::new(5, "Отпуск", 50_000.0));
        server.budgets.push(Budget::new(9, "Продукты", 500.0));

        let resolved = resolve_conflicts(&local, &server);
        assert_eq!(resolved.transactions.len(), 2);
        assert_eq!(resolved.goals.len(), 1);
        assert_eq!(resolved.budgets.len(), 1);
        assert!(resolved.expense_categories.contains(&"Кафе".to_string()));
        assert_eq!(resolved.income_categories.len(), 5);
    }

    #[test]
    fn test_fingerprint_gate() {
        let a = UserData::default();
        let b = UserData::default();
        assert_eq!(fingerprint(&a).len(), FINGERPRINT_LEN);
        assert!(!has_changes(&a, &b));

        let mut c = UserData::default();
        c.goals.push(Goal::new(1, "Отпуск", 1.0));
        assert!(has_changes(&a, &c));

        let mut d = UserData::default();
        d.transactions.push(tx(1, 1.0, None));
        assert!(has_changes(&a, &d));
    }
}
