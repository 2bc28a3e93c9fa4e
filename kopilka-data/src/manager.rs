//! Load/save/sync orchestration for the signed-in user's data.
//!
//! Reads go cache -> server -> local store -> defaults. Writes go to the local
//! store first, then the cache, then the server; a failed or skipped push leaves
//! an entry in the sync queue which is flushed the next time the app is online.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cell::Cell;
use std::collections::HashMap;

use crate::error::{DataError, DataResult};
use crate::export::{self, ExportBundle, ExportOptions, ImportOptions};
use crate::journal::{AppLog, LogLevel, SecurityLog};
use crate::remote::RemoteApi;
use crate::storage::{
    KEY_CURRENT_USER, KEY_LAST_SYNC, KEY_SYNC_QUEUE, KEY_THEME, KeyValueStore, read_json, user_data_key,
    write_json,
};
use kopilka_core::goals::{self, GoalPlan};
use kopilka_core::ids::{IdGenerator, max_numeric};
use kopilka_core::merge::{has_changes, resolve_conflicts};
use kopilka_core::time::{local_today, to_iso_millis};
use kopilka_core::validator::{BudgetInput, GoalInput, TransactionInput, parse_type, validate_amount};
use kopilka_core::{
    Budget, EntityId, FieldKind, Goal, GoalProjection, Transaction, TransactionFilter, TxType, User, UserData,
    Validator, normalize_key, upsert_budget,
};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub cache_ttl: Duration,
    /// Never talk to the server; every save is queued
    pub offline: bool,
    /// Decides what "today" is
    pub timezone: Tz,
    /// Threshold for the persisted application log
    pub log_level: LogLevel,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            offline: false,
            timezone: chrono_tz::Europe::Moscow,
            log_level: LogLevel::Info,
        }
    }
}

/// A pending push. The data itself is not queued; flushing pushes whatever
/// the local store holds at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: EntityId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
    pub offline_mode: bool,
    pub queue_length: usize,
    pub cache_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No user, offline, or another sync running
    Skipped,
    /// Pending local changes were pushed
    Pushed,
    /// Local and server copies already agree
    UpToDate,
    /// The copies differed and were merged; `pushed` tells whether the merged
    /// copy reached the server
    Merged { pushed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: UserData,
    stored_at: DateTime<Utc>,
}

pub struct DataManager<S, R, C = SystemClock> {
    store: S,
    remote: R,
    clock: C,
    options: ManagerOptions,
    cache: HashMap<EntityId, CacheEntry>,
    queue: Vec<SyncOperation>,
    sync_in_progress: bool,
    last_sync: Option<DateTime<Utc>>,
    current_user: Option<User>,
    app_log: AppLog,
    security_log: SecurityLog,
}

impl<S: KeyValueStore, R: RemoteApi> DataManager<S, R, SystemClock> {
    pub fn new(store: S, remote: R, options: ManagerOptions) -> Self {
        Self::with_clock(store, remote, SystemClock, options)
    }
}

impl<S: KeyValueStore, R: RemoteApi, C: Clock> DataManager<S, R, C> {
    pub fn with_clock(store: S, remote: R, clock: C, options: ManagerOptions) -> Self {
        let current_user = read_json(&store, KEY_CURRENT_USER);
        let queue = read_json(&store, KEY_SYNC_QUEUE).unwrap_or_default();
        let last_sync = read_json(&store, KEY_LAST_SYNC);
        let app_log = AppLog::load(&store, options.log_level);
        let security_log = SecurityLog::load(&store);
        Self {
            store,
            remote,
            clock,
            options,
            cache: HashMap::new(),
            queue,
            sync_in_progress: false,
            last_sync,
            current_user,
            app_log,
            security_log,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        local_today(self.clock.now(), self.options.timezone)
    }

    pub fn is_offline(&self) -> bool {
        self.options.offline
    }

    pub fn app_log(&self) -> &AppLog {
        &self.app_log
    }

    pub fn security_log(&self) -> &SecurityLog {
        &self.security_log
    }

    // ---- logging ----

    /// Record in the persisted application log (and the `log` facade).
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, data: Option<serde_json::Value>) {
        let now = self.now();
        if self.app_log.record(level, message, data, now) {
            if let Err(e) = self.app_log.save(&mut self.store) {
                log::error!("saving application log: {e}");
            }
        }
    }

    pub fn clear_logs(&mut self) {
        let now = self.now();
        self.app_log.clear(now);
        if let Err(e) = self.app_log.save(&mut self.store) {
            log::error!("saving application log: {e}");
        }
    }

    pub fn security_event(&mut self, event: &str, details: serde_json::Value) {
        let now = self.now();
        self.security_log.record(event, details, now);
        if let Err(e) = self.security_log.save(&mut self.store) {
            log::error!("saving security log: {e}");
        }
    }

    // ---- current user ----

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// Replace (or clear) the signed-in user and persist the choice.
    pub fn set_current_user(&mut self, user: Option<User>) {
        let result = match &user {
            Some(u) => write_json(&mut self.store, KEY_CURRENT_USER, u),
            None => self.store.remove(KEY_CURRENT_USER),
        };
        if let Err(e) = result {
            log::error!("persisting current user: {e}");
        }
        if user.is_none() {
            self.cache.clear();
        }
        self.current_user = user;
    }

    pub fn require_user(&self) -> DataResult<&User> {
        self.current_user.as_ref().ok_or(DataError::NotAuthenticated)
    }

    fn user_id(&self) -> DataResult<EntityId> {
        self.require_user().map(|u| u.id.clone())
    }

    // ---- load / save ----

    /// The user's bundle, from the freshest source available.
    pub async fn load_user_data(&mut self) -> DataResult<UserData> {
        let user_id = self.user_id()?;
        let now = self.now();
        if let Some(entry) = self.cache.get(&user_id) {
            if now - entry.stored_at < self.options.cache_ttl {
                return Ok(entry.data.clone());
            }
        }

        // Unpushed local edits win over the server copy until they are flushed.
        if !self.options.offline && !self.has_pending(&user_id) {
            match self.remote.fetch_user_data(&user_id).await {
                Ok(data) => {
                    self.write_local(&user_id, &data);
                    self.cache_put(user_id, data.clone());
                    return Ok(data);
                }
                Err(e) => log::debug!("server copy unavailable, using local data: {e}"),
            }
        }

        let data = self.load_local(&user_id);
        self.cache_put(user_id, data.clone());
        Ok(data)
    }

    /// The locally stored bundle, or the defaults when there is none.
    pub fn load_local(&self, user_id: &EntityId) -> UserData {
        read_json(&self.store, &user_data_key(user_id)).unwrap_or_default()
    }

    /// Validate, persist locally, refresh the cache, then push or queue.
    pub async fn save_user_data(&mut self, data: UserData) -> DataResult<()> {
        let user_id = self.user_id()?;
        let form = Validator::new(self.today()).validate_bundle(&data);
        if !form.valid {
            let messages = form.messages();
            self.log(LogLevel::Warn, "Данные не прошли проверку", Some(json!({ "errors": messages })));
            return Err(DataError::Validation(messages));
        }

        self.write_local(&user_id, &data);
        self.cache_put(user_id.clone(), data.clone());

        if self.options.offline {
            self.enqueue(&user_id);
        } else {
            self.sync_to_server(&user_id, &data).await;
        }
        Ok(())
    }

    /// Push one bundle. Returns whether the server accepted it; failures are
    /// queued.
    async fn sync_to_server(&mut self, user_id: &EntityId, data: &UserData) -> bool {
        if self.sync_in_progress {
            self.enqueue(user_id);
            return false;
        }
        self.sync_in_progress = true;
        let result = self.remote.push_user_data(user_id, data).await;
        self.sync_in_progress = false;

        match result {
            Ok(()) => {
                self.mark_synced();
                true
            }
            Err(e) => {
                self.log(
                    LogLevel::Warn,
                    "Не удалось отправить данные на сервер",
                    Some(json!({ "error": e.to_string() })),
                );
                self.enqueue(user_id);
                false
            }
        }
    }

    /// Reconcile the local bundle with the server copy.
    pub async fn sync_with_server(&mut self) -> DataResult<SyncOutcome> {
        let Some(user_id) = self.current_user.as_ref().map(|u| u.id.clone()) else {
            return Ok(SyncOutcome::Skipped);
        };
        if self.options.offline || self.sync_in_progress {
            return Ok(SyncOutcome::Skipped);
        }

        // Merging while local edits are unpushed would bring deleted records back.
        if self.has_pending(&user_id) {
            self.flush_queue().await?;
            return if self.has_pending(&user_id) {
                Err(DataError::Network("pending changes could not be pushed".to_string()))
            } else {
                Ok(SyncOutcome::Pushed)
            };
        }

        self.sync_in_progress = true;
        let fetched = self.remote.fetch_user_data(&user_id).await;
        let server = match fetched {
            Ok(server) => server,
            Err(e) => {
                self.sync_in_progress = false;
                self.log(
                    LogLevel::Warn,
                    "Синхронизация не удалась",
                    Some(json!({ "error": e.to_string() })),
                );
                return Err(e);
            }
        };

        let local = self.load_local(&user_id);
        if !has_changes(&local, &server) {
            self.sync_in_progress = false;
            self.cache_put(user_id, local);
            self.mark_synced();
            return Ok(SyncOutcome::UpToDate);
        }

        let resolved = resolve_conflicts(&local, &server);
        self.write_local(&user_id, &resolved);
        self.cache_put(user_id.clone(), resolved.clone());
        let pushed = self.remote.push_user_data(&user_id, &resolved).await;
        self.sync_in_progress = false;

        let pushed = match pushed {
            Ok(()) => {
                self.mark_synced();
                true
            }
            Err(e) => {
                log::warn!("pushing merged data failed: {e}");
                self.enqueue(&user_id);
                false
            }
        };
        self.log(LogLevel::Info, "Данные синхронизированы", Some(json!({ "pushed": pushed })));
        Ok(SyncOutcome::Merged { pushed })
    }

    /// One tick of the periodic sync: runs only when online and idle.
    pub async fn periodic_sync(&mut self) -> DataResult<SyncOutcome> {
        if self.options.offline || self.sync_in_progress || self.current_user.is_none() {
            return Ok(SyncOutcome::Skipped);
        }
        self.sync_with_server().await
    }

    /// Push the local bundle of every queued user. Stops at the first failure and
    /// keeps the rest queued. Returns how many pushes succeeded.
    pub async fn flush_queue(&mut self) -> DataResult<usize> {
        if self.options.offline || self.queue.is_empty() {
            return Ok(0);
        }
        let mut users: Vec<EntityId> = Vec::new();
        for op in &self.queue {
            if !users.contains(&op.user_id) {
                users.push(op.user_id.clone());
            }
        }

        let mut pushed = 0;
        self.sync_in_progress = true;
        for user_id in users {
            let data = self.load_local(&user_id);
            match self.remote.push_user_data(&user_id, &data).await {
                Ok(()) => {
                    self.queue.retain(|op| op.user_id != user_id);
                    pushed += 1;
                }
                Err(e) => {
                    log::warn!("flushing sync queue stopped: {e}");
                    break;
                }
            }
        }
        self.sync_in_progress = false;

        if pushed > 0 {
            self.mark_synced();
        }
        self.persist_queue();
        Ok(pushed)
    }

    /// Switch connectivity. Going online flushes the queue and syncs.
    pub async fn set_offline(&mut self, offline: bool) -> DataResult<()> {
        let was_offline = self.options.offline;
        self.options.offline = offline;
        if offline {
            self.log(LogLevel::Info, "Приложение работает офлайн", None);
            return Ok(());
        }
        if was_offline {
            self.log(LogLevel::Info, "Соединение восстановлено", None);
        }
        self.flush_queue().await?;
        self.sync_with_server().await?;
        Ok(())
    }

    pub fn sync_stats(&self) -> SyncStats {
        SyncStats {
            last_sync_time: self.last_sync,
            sync_in_progress: self.sync_in_progress,
            offline_mode: self.options.offline,
            queue_length: self.queue.len(),
            cache_size: self.cache.len(),
        }
    }

    pub fn queue(&self) -> &[SyncOperation] {
        &self.queue
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn has_pending(&self, user_id: &EntityId) -> bool {
        self.queue.iter().any(|op| &op.user_id == user_id)
    }

    fn enqueue(&mut self, user_id: &EntityId) {
        if !self.has_pending(user_id) {
            self.queue.push(SyncOperation {
                kind: "save".to_string(),
                user_id: user_id.clone(),
                timestamp: self.now(),
            });
            self.persist_queue();
        }
    }

    fn persist_queue(&mut self) {
        if let Err(e) = write_json(&mut self.store, KEY_SYNC_QUEUE, &self.queue) {
            log::error!("persisting sync queue: {e}");
        }
    }

    fn mark_synced(&mut self) {
        let now = self.now();
        self.last_sync = Some(now);
        if let Err(e) = write_json(&mut self.store, KEY_LAST_SYNC, &now) {
            log::error!("persisting last sync time: {e}");
        }
    }

    /// A failed write leaves the data in memory only.
    fn write_local(&mut self, user_id: &EntityId, data: &UserData) {
        if let Err(e) = write_json(&mut self.store, &user_data_key(user_id), data) {
            self.log(
                LogLevel::Error,
                "Ошибка сохранения данных",
                Some(json!({ "type": "StorageError", "error": e.to_string() })),
            );
        }
    }

    fn cache_put(&mut self, user_id: EntityId, data: UserData) {
        let stored_at = self.now();
        self.cache.insert(user_id, CacheEntry { data, stored_at });
    }

    fn next_id(&self, data: &UserData) -> EntityId {
        let last = max_numeric(
            data.transactions
                .iter()
                .map(|t| &t.id)
                .chain(data.budgets.iter().map(|b| &b.id))
                .chain(data.goals.iter().map(|g| &g.id)),
        );
        IdGenerator::seeded(last).next_id(self.now())
    }

    fn stamp(&self) -> String {
        to_iso_millis(self.now())
    }

    // ---- transactions ----

    pub async fn add_transaction(&mut self, input: &TransactionInput) -> DataResult<Transaction> {
        let validator = Validator::new(self.today());
        let form = validator.validate_transaction(input);
        if !form.valid {
            return Err(DataError::Validation(form.messages()));
        }
        let kind = parse_type(&input.kind)
            .ok_or_else(|| DataError::Validation(vec!["Некорректный тип операции".to_string()]))?;
        let amount = validate_amount(&input.amount).map_err(DataError::Validation)?;
        let date = validator.validate_date(&input.date).map_err(DataError::Validation)?;
        let label = form.value("category").to_string();
        let description = form.value("description").to_string();

        let mut data = self.load_user_data().await?;
        let mut categories = data.categories();
        if categories.add(kind, &label) {
            log::info!("new {} category {label}", kind.as_str());
            data.income_categories = categories.list(TxType::Income).to_vec();
            data.expense_categories = categories.list(TxType::Expense).to_vec();
        }

        let stamp = self.stamp();
        let mut tx = Transaction::new(self.next_id(&data), kind, &label, amount, date);
        if !description.is_empty() {
            tx = tx.with_description(description);
        }
        tx.created = Some(stamp.clone());
        tx.updated = Some(stamp);
        data.transactions.push(tx.clone());

        self.save_user_data(data).await?;
        self.log(
            LogLevel::Info,
            "Транзакция добавлена",
            Some(json!({ "id": tx.id, "type": kind.as_str(), "amount": amount })),
        );
        Ok(tx)
    }

    pub async fn delete_transaction(&mut self, id: &EntityId) -> DataResult<Transaction> {
        let mut data = self.load_user_data().await?;
        let Some(pos) = data.transactions.iter().position(|t| &t.id == id) else {
            return Err(DataError::NotFound(format!("transaction {id}")));
        };
        let removed = data.transactions.remove(pos);
        self.save_user_data(data).await?;
        self.log(LogLevel::Info, "Транзакция удалена", Some(json!({ "id": id })));
        Ok(removed)
    }

    pub async fn transactions(&mut self, filter: &TransactionFilter) -> DataResult<Vec<Transaction>> {
        let data = self.load_user_data().await?;
        Ok(filter.apply(&data.transactions))
    }

    // ---- categories ----

    /// Add a category label. Returns the sanitized label that was stored.
    pub async fn add_category(&mut self, kind: TxType, label: &str) -> DataResult<String> {
        let result = Validator::new(self.today()).validate_field(FieldKind::Category, label);
        if !result.valid {
            return Err(DataError::Validation(result.errors));
        }
        let label = result.sanitized_value;

        let mut data = self.load_user_data().await?;
        let mut categories = data.categories();
        if !categories.add(kind, &label) {
            return Err(DataError::Validation(vec!["Такая категория уже существует".to_string()]));
        }
        data.income_categories = categories.list(TxType::Income).to_vec();
        data.expense_categories = categories.list(TxType::Expense).to_vec();
        self.save_user_data(data).await?;
        Ok(label)
    }

    /// Remove a category label. Transactions keep their category key.
    pub async fn remove_category(&mut self, kind: TxType, label: &str) -> DataResult<()> {
        let mut data = self.load_user_data().await?;
        let mut categories = data.categories();
        if !categories.remove(kind, label) {
            return Err(DataError::NotFound(format!("category {label}")));
        }
        data.income_categories = categories.list(TxType::Income).to_vec();
        data.expense_categories = categories.list(TxType::Expense).to_vec();
        self.save_user_data(data).await
    }

    // ---- budgets ----

    /// Create the budget for a category, or update the limit of the existing one.
    pub async fn set_budget(&mut self, input: &BudgetInput) -> DataResult<Budget> {
        let form = Validator::new(self.today()).validate_budget(input);
        if !form.valid {
            return Err(DataError::Validation(form.messages()));
        }
        let limit = validate_amount(&input.limit).map_err(DataError::Validation)?;

        let mut data = self.load_user_data().await?;
        let key = normalize_key(form.value("category"));
        let Some(label) = data
            .expense_categories
            .iter()
            .find(|l| normalize_key(l) == key)
            .cloned()
        else {
            return Err(DataError::Validation(vec![
                "Бюджет можно задать только для категории расходов".to_string(),
            ]));
        };

        let stamp = self.stamp();
        let mut budget = Budget::new(self.next_id(&data), label.clone(), limit);
        budget.created = Some(stamp.clone());
        budget.updated = Some(stamp);
        upsert_budget(&mut data.budgets, budget);
        let stored = data
            .budgets
            .iter()
            .find(|b| b.category == label)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("budget {label}")))?;

        self.save_user_data(data).await?;
        self.log(
            LogLevel::Info,
            "Бюджет сохранен",
            Some(json!({ "category": label, "limit": limit })),
        );
        Ok(stored)
    }

    /// Delete a budget by id or by category label.
    pub async fn delete_budget(&mut self, id_or_category: &str) -> DataResult<Budget> {
        let mut data = self.load_user_data().await?;
        let key = normalize_key(id_or_category);
        let Some(pos) = data
            .budgets
            .iter()
            .position(|b| b.id.to_string() == id_or_category || normalize_key(&b.category) == key)
        else {
            return Err(DataError::NotFound(format!("budget {id_or_category}")));
        };
        let removed = data.budgets.remove(pos);
        self.save_user_data(data).await?;
        Ok(removed)
    }

    // ---- goals ----

    pub async fn add_goal(&mut self, input: &GoalInput) -> DataResult<Goal> {
        let validator = Validator::new(self.today());
        let form = validator.validate_goal(input);
        if !form.valid {
            return Err(DataError::Validation(form.messages()));
        }
        let target = validate_amount(&input.target).map_err(DataError::Validation)?;
        let saved = if input.saved.trim().is_empty() {
            0.0
        } else {
            validate_amount(&input.saved).map_err(DataError::Validation)?
        };

        let mut data = self.load_user_data().await?;
        let stamp = self.stamp();
        let mut goal = Goal::new(self.next_id(&data), form.value("name"), target).with_saved(saved);
        if let Some(deadline) = validator.parse_deadline(&input.deadline).map_err(DataError::Validation)? {
            goal = goal.with_deadline(deadline);
        }
        goal.created = Some(stamp.clone());
        goal.updated = Some(stamp);
        data.goals.push(goal.clone());

        self.save_user_data(data).await?;
        self.log(LogLevel::Info, "Цель создана", Some(json!({ "id": goal.id, "target": target })));
        Ok(goal)
    }

    /// Add money to a goal's saved amount.
    pub async fn contribute_goal(&mut self, id: &EntityId, amount: &str) -> DataResult<Goal> {
        let amount = validate_amount(amount).map_err(DataError::Validation)?;
        let mut data = self.load_user_data().await?;
        let stamp = self.stamp();
        let goal = find_goal(&mut data, id)?;
        goals::contribute(goal, amount);
        goal.updated = Some(stamp);
        let goal = goal.clone();
        self.save_user_data(data).await?;
        Ok(goal)
    }

    /// Delete a goal together with its check-in plan.
    pub async fn delete_goal(&mut self, id: &EntityId) -> DataResult<Goal> {
        let mut data = self.load_user_data().await?;
        let Some(pos) = data.goals.iter().position(|g| &g.id == id) else {
            return Err(DataError::NotFound(format!("goal {id}")));
        };
        let removed = data.goals.remove(pos);
        self.save_user_data(data).await?;
        if let Err(e) = self.store.remove(&goals::plan_key(id)) {
            log::warn!("removing plan of goal {id}: {e}");
        }
        Ok(removed)
    }

    pub fn goal_plan(&self, id: &EntityId) -> GoalPlan {
        read_json(&self.store, &goals::plan_key(id)).unwrap_or_default()
    }

    /// Plans of every goal in the bundle, keyed by goal id.
    pub fn goal_plans(&self, data: &UserData) -> HashMap<EntityId, GoalPlan> {
        data.goals
            .iter()
            .map(|g| (g.id.clone(), self.goal_plan(&g.id)))
            .collect()
    }

    /// Flip the check-in for `date` (today when absent). Returns the new state.
    pub async fn toggle_checkin(&mut self, id: &EntityId, date: Option<NaiveDate>) -> DataResult<bool> {
        let data = self.load_user_data().await?;
        if !data.goals.iter().any(|g| &g.id == id) {
            return Err(DataError::NotFound(format!("goal {id}")));
        }
        let mut plan = self.goal_plan(id);
        let checked = plan.toggle(date.unwrap_or_else(|| self.today()));
        write_json(&mut self.store, &goals::plan_key(id), &plan)?;
        Ok(checked)
    }

    pub async fn goal_projection(&mut self, id: &EntityId) -> DataResult<(Goal, GoalProjection)> {
        let data = self.load_user_data().await?;
        let goal = data
            .goals
            .iter()
            .find(|g| &g.id == id)
            .cloned()
            .ok_or_else(|| DataError::NotFound(format!("goal {id}")))?;
        let projection = GoalProjection::compute(&goal, &self.goal_plan(id), self.today());
        Ok((goal, projection))
    }

    /// Fold the plan's expected amount into the goal and clear the plan.
    /// Returns the amount added.
    pub async fn close_goal_plan(&mut self, id: &EntityId) -> DataResult<f64> {
        let mut data = self.load_user_data().await?;
        let mut plan = self.goal_plan(id);
        let today = self.today();
        let stamp = self.stamp();
        let goal = find_goal(&mut data, id)?;
        let added = goals::close_plan(goal, &mut plan, today);
        goal.updated = Some(stamp);

        self.save_user_data(data).await?;
        if let Err(e) = self.store.remove(&goals::plan_key(id)) {
            log::warn!("removing plan of goal {id}: {e}");
        }
        self.log(LogLevel::Info, "План цели закрыт", Some(json!({ "id": id, "added": added })));
        Ok(added)
    }

    // ---- preferences ----

    pub fn theme(&self) -> Theme {
        read_json(&self.store, KEY_THEME).unwrap_or_default()
    }

    pub fn set_theme(&mut self, theme: Theme) -> DataResult<()> {
        write_json(&mut self.store, KEY_THEME, &theme)
    }

    // ---- export / import ----

    pub async fn export_json(&mut self, options: ExportOptions) -> DataResult<ExportBundle> {
        let data = self.load_user_data().await?;
        let user = self.require_user()?;
        Ok(export::build_bundle(user, &data, options, self.now()))
    }

    pub async fn export_csv(&mut self) -> DataResult<String> {
        let data = self.load_user_data().await?;
        export::transactions_csv(&data.transactions, &data.categories())
    }

    pub async fn import_bundle(&mut self, bundle: &ExportBundle, options: ImportOptions) -> DataResult<UserData> {
        let mut data = self.load_user_data().await?;
        export::apply_import(&mut data, &bundle.data, options);
        self.save_user_data(data.clone()).await?;
        self.log(
            LogLevel::Info,
            "Данные импортированы",
            Some(json!({ "version": bundle.version, "exportDate": bundle.export_date })),
        );
        Ok(data)
    }
}

fn find_goal<'a>(data: &'a mut UserData, id: &EntityId) -> DataResult<&'a mut Goal> {
    data.goals
        .iter_mut()
        .find(|g| &g.id == id)
        .ok_or_else(|| DataError::NotFound(format!("goal {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Offline;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn user() -> User {
        serde_json::from_value(json!({"id": 1, "name": "Анна", "email": "anna@example.ru"})).unwrap()
    }

    fn manager() -> DataManager<MemoryStore, Offline, ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        let options = ManagerOptions {
            offline: true,
            ..Default::default()
        };
        let mut dm = DataManager::with_clock(MemoryStore::new(), Offline, clock, options);
        dm.set_current_user(Some(user()));
        dm
    }

    fn tx(kind: &str, category: &str, amount: &str) -> TransactionInput {
        TransactionInput {
            kind: kind.into(),
            category: category.into(),
            amount: amount.into(),
            date: "2026-10-10".into(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_requires_user() {
        let mut dm = DataManager::new(MemoryStore::new(), Offline, ManagerOptions::default());
        assert!(matches!(dm.load_user_data().await, Err(DataError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_fresh_user_gets_defaults() {
        let mut dm = manager();
        let data = dm.load_user_data().await.unwrap();
        assert!(data.transactions.is_empty());
        assert!(data.income_categories.contains(&"Зарплата".to_string()));
    }

    #[tokio::test]
    async fn test_offline_saves_are_queued_once() {
        let mut dm = manager();
        dm.add_transaction(&tx("income", "Зарплата", "1000")).await.unwrap();
        dm.add_transaction(&tx("expense", "Продукты", "400")).await.unwrap();
        let stats = dm.sync_stats();
        assert!(stats.offline_mode);
        assert_eq!(stats.queue_length, 1);
        assert_eq!(stats.cache_size, 1);

        let stored: Vec<SyncOperation> = read_json(dm.store(), KEY_SYNC_QUEUE).unwrap();
        assert_eq!(stored[0].kind, "save");
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let mut dm = manager();
        let a = dm.add_transaction(&tx("income", "Зарплата", "1")).await.unwrap();
        let b = dm.add_transaction(&tx("income", "Зарплата", "2")).await.unwrap();
        match (a.id, b.id) {
            (EntityId::Num(a), EntityId::Num(b)) => assert_eq!(b, a + 1),
            other => panic!("unexpected ids {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_transaction_rejected() {
        let mut dm = manager();
        let err = dm.add_transaction(&tx("income", "Зарплата", "-5")).await.unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
        assert!(dm.load_user_data().await.unwrap().transactions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_transaction() {
        let mut dm = manager();
        let err = dm.delete_transaction(&EntityId::Num(42)).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_budget_upsert_keeps_id() {
        let mut dm = manager();
        let first = dm
            .set_budget(&BudgetInput {
                category: "Продукты".into(),
                limit: "500".into(),
            })
            .await
            .unwrap();
        let second = dm
            .set_budget(&BudgetInput {
                category: "продукты".into(),
                limit: "700".into(),
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.limit, 700.0);
        assert_eq!(dm.load_user_data().await.unwrap().budgets.len(), 1);

        let err = dm
            .set_budget(&BudgetInput {
                category: "Зарплата".into(),
                limit: "100".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));

        dm.delete_budget("Продукты").await.unwrap();
        assert!(dm.load_user_data().await.unwrap().budgets.is_empty());
    }

    #[tokio::test]
    async fn test_goal_plan_close() {
        let mut dm = manager();
        let goal = dm
            .add_goal(&GoalInput {
                name: "Отпуск".into(),
                target: "2000".into(),
                saved: "500".into(),
                deadline: "2026-11-02".into(),
            })
            .await
            .unwrap();
        // 15 days left, 1500 to go: 100 per day
        for day in 10..=13 {
            let date = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
            assert!(dm.toggle_checkin(&goal.id, Some(date)).await.unwrap());
        }
        assert!(dm.toggle_checkin(&goal.id, None).await.unwrap());
        let (_, projection) = dm.goal_projection(&goal.id).await.unwrap();
        assert_eq!(projection.daily_amount, 100.0);
        assert_eq!(projection.expected_saved, 1000.0);

        let added = dm.close_goal_plan(&goal.id).await.unwrap();
        assert_eq!(added, 500.0);
        assert!(dm.goal_plan(&goal.id).is_empty());
        let (goal, _) = dm.goal_projection(&goal.id).await.unwrap();
        assert_eq!(goal.saved, 1000.0);
    }

    #[tokio::test]
    async fn test_cache_expires() {
        let mut dm = manager();
        dm.add_transaction(&tx("income", "Зарплата", "1000")).await.unwrap();
        // Edit the store behind the manager's back
        write_json(dm.store_mut(), &user_data_key(&EntityId::Num(1)), &UserData::default()).unwrap();
        assert_eq!(dm.load_user_data().await.unwrap().transactions.len(), 1);
        dm.clock().advance(Duration::seconds(DEFAULT_CACHE_TTL_SECS));
        assert!(dm.load_user_data().await.unwrap().transactions.is_empty());
    }

    #[tokio::test]
    async fn test_read_only_store_keeps_data_in_memory() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        let options = ManagerOptions {
            offline: true,
            ..Default::default()
        };
        let mut dm = DataManager::with_clock(MemoryStore::read_only(), Offline, clock, options);
        dm.set_current_user(Some(user()));
        dm.add_transaction(&tx("income", "Зарплата", "1000")).await.unwrap();
        assert_eq!(dm.load_user_data().await.unwrap().transactions.len(), 1);
    }

    #[test]
    fn test_theme() {
        let mut dm = manager();
        assert_eq!(dm.theme(), Theme::Light);
        dm.set_theme(Theme::Dark).unwrap();
        assert_eq!(dm.theme(), Theme::Dark);
        assert_eq!(Theme::parse("DARK"), Some(Theme::Dark));
    }

    #[test]
    fn test_logout_clears_cache() {
        let mut dm = manager();
        dm.set_current_user(None);
        assert_eq!(dm.sync_stats().cache_size, 0);
        assert!(dm.require_user().is_err());
    }
}
