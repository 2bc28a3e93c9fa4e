mod common;

use chrono::{Duration, NaiveDate};
use common::{FakeRemote, signed_in};
use kopilka_core::validator::TransactionInput;
use kopilka_core::{EntityId, Transaction, TxType, UserData};
use kopilka_data::storage::{MemoryStore, user_data_key, write_json};
use kopilka_data::{ExportOptions, ImportOptions, SyncOutcome};

fn income(amount: &str) -> TransactionInput {
    TransactionInput {
        kind: "income".into(),
        category: "Зарплата".into(),
        amount: amount.into(),
        date: "2026-10-01".into(),
        description: "аванс".into(),
    }
}

fn bundle_with(ids: &[i64]) -> UserData {
    let mut data = UserData::default();
    let date = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
    for &id in ids {
        data.transactions
            .push(Transaction::new(id, TxType::Expense, "Продукты", 100.0, date));
    }
    data
}

#[tokio::test]
async fn test_save_pushes_when_server_is_up() {
    let remote = FakeRemote::up();
    let mut dm = signed_in(MemoryStore::new(), remote.clone(), false);

    let tx = dm.add_transaction(&income("1000")).await.unwrap();
    let server = remote.data(&EntityId::Num(1)).unwrap();
    assert_eq!(server.transactions, vec![tx]);

    let stats = dm.sync_stats();
    assert_eq!(stats.queue_length, 0);
    assert!(stats.last_sync_time.is_some());
    assert!(!stats.sync_in_progress);
}

#[tokio::test]
async fn test_failed_push_is_queued_and_flushed_later() {
    let remote = FakeRemote::default();
    let mut dm = signed_in(MemoryStore::new(), remote.clone(), false);

    dm.add_transaction(&income("1000")).await.unwrap();
    dm.add_transaction(&income("250")).await.unwrap();
    assert_eq!(dm.sync_stats().queue_length, 1);
    assert!(remote.data(&EntityId::Num(1)).is_none());

    // Pending edits are served from the local store, not the server
    remote.set_up(true);
    dm.clear_cache();
    assert_eq!(dm.load_user_data().await.unwrap().transactions.len(), 2);

    assert_eq!(dm.sync_with_server().await.unwrap(), SyncOutcome::Pushed);
    assert_eq!(dm.sync_stats().queue_length, 0);
    assert_eq!(remote.data(&EntityId::Num(1)).unwrap().transactions.len(), 2);
}

#[tokio::test]
async fn test_going_online_flushes_queue() {
    let remote = FakeRemote::up();
    let mut dm = signed_in(MemoryStore::new(), remote.clone(), true);

    dm.add_transaction(&income("1000")).await.unwrap();
    assert_eq!(remote.pushes(), 0);
    assert_eq!(dm.sync_with_server().await.unwrap(), SyncOutcome::Skipped);

    dm.set_offline(false).await.unwrap();
    assert_eq!(remote.pushes(), 1);
    assert!(!dm.sync_stats().offline_mode);
    assert_eq!(dm.sync_stats().queue_length, 0);
}

#[tokio::test]
async fn test_sync_merges_divergent_copies() {
    let remote = FakeRemote::up();
    let mut dm = signed_in(MemoryStore::new(), remote.clone(), false);
    write_json(dm.store_mut(), &user_data_key(&EntityId::Num(1)), &bundle_with(&[1, 2])).unwrap();
    remote.set_data(EntityId::Num(1), bundle_with(&[2, 3]));

    let outcome = dm.sync_with_server().await.unwrap();
    assert_eq!(outcome, SyncOutcome::Merged { pushed: true });

    let ids: Vec<EntityId> = dm
        .load_local(&EntityId::Num(1))
        .transactions
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![EntityId::Num(1), EntityId::Num(2), EntityId::Num(3)]);
    assert_eq!(remote.data(&EntityId::Num(1)).unwrap().transactions.len(), 3);

    // A second pass has nothing to do
    assert_eq!(dm.sync_with_server().await.unwrap(), SyncOutcome::UpToDate);
}

#[tokio::test]
async fn test_server_copy_is_loaded_and_mirrored_locally() {
    let remote = FakeRemote::up();
    remote.set_data(EntityId::Num(1), bundle_with(&[7]));
    let mut dm = signed_in(MemoryStore::new(), remote.clone(), false);

    let data = dm.load_user_data().await.unwrap();
    assert_eq!(data.transactions.len(), 1);
    assert_eq!(dm.load_local(&EntityId::Num(1)).transactions.len(), 1);

    // Within the TTL the cache answers without asking the server again
    remote.set_data(EntityId::Num(1), bundle_with(&[7, 8]));
    assert_eq!(dm.load_user_data().await.unwrap().transactions.len(), 1);
    dm.clock().advance(Duration::minutes(5));
    assert_eq!(dm.load_user_data().await.unwrap().transactions.len(), 2);
}

#[tokio::test]
async fn test_export_then_import_into_another_account() {
    let remote = FakeRemote::default();
    let mut dm = signed_in(MemoryStore::new(), remote, true);
    dm.add_transaction(&income("1000")).await.unwrap();
    dm.add_category(TxType::Expense, "Кафе").await.unwrap();

    let bundle = dm.export_json(ExportOptions::default()).await.unwrap();
    assert_eq!(bundle.version, "2.0.0");
    let csv = dm.export_csv().await.unwrap();
    assert!(csv.contains("Зарплата,1000.00,аванс"));

    dm.set_current_user(Some(common::user(2, "boris@example.ru")));
    let merged = dm
        .import_bundle(
            &bundle,
            ImportOptions {
                categories: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(merged.transactions.len(), 1);
    assert!(!merged.expense_categories.contains(&"Кафе".to_string()));
}
