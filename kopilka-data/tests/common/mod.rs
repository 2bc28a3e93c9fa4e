#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kopilka_core::{EntityId, User, UserData};
use kopilka_data::manager::{DataManager, ManagerOptions, ManualClock};
use kopilka_data::storage::KeyValueStore;
use kopilka_data::{DataError, DataResult, RemoteApi};

#[derive(Debug, Default)]
pub struct ServerState {
    pub up: bool,
    pub users: Vec<(User, String)>,
    pub data: HashMap<EntityId, UserData>,
    pub pushes: usize,
    pub fetches: usize,
}

/// In-process stand-in for the server. Clones share state, so a test can keep a
/// handle while the manager owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeRemote {
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeRemote {
    pub fn up() -> Self {
        let remote = Self::default();
        remote.set_up(true);
        remote
    }

    pub fn set_up(&self, up: bool) {
        self.state.lock().unwrap().up = up;
    }

    pub fn add_user(&self, user: User, password: &str) {
        self.state.lock().unwrap().users.push((user, password.to_string()));
    }

    pub fn set_data(&self, user_id: EntityId, data: UserData) {
        self.state.lock().unwrap().data.insert(user_id, data);
    }

    pub fn data(&self, user_id: &EntityId) -> Option<UserData> {
        self.state.lock().unwrap().data.get(user_id).cloned()
    }

    pub fn pushes(&self) -> usize {
        self.state.lock().unwrap().pushes
    }

    fn check_up(&self) -> DataResult<()> {
        if self.state.lock().unwrap().up {
            Ok(())
        } else {
            Err(DataError::Network("connection refused".to_string()))
        }
    }
}

impl RemoteApi for FakeRemote {
    async fn login(&self, email: &str, password: &str) -> DataResult<User> {
        self.check_up()?;
        let state = self.state.lock().unwrap();
        state
            .users
            .iter()
            .find(|(u, p)| u.email == email && p == password)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| DataError::Network("Неверный email или пароль".to_string()))
    }

    async fn register(&self, user: &User) -> DataResult<User> {
        self.check_up()?;
        let mut state = self.state.lock().unwrap();
        state.users.push((user.clone(), String::new()));
        Ok(user.clone())
    }

    async fn fetch_user_data(&self, user_id: &EntityId) -> DataResult<UserData> {
        self.check_up()?;
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        Ok(state.data.get(user_id).cloned().unwrap_or_default())
    }

    async fn push_user_data(&self, user_id: &EntityId, data: &UserData) -> DataResult<()> {
        self.check_up()?;
        let mut state = self.state.lock().unwrap();
        state.pushes += 1;
        state.data.insert(user_id.clone(), data.clone());
        Ok(())
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
}

pub fn user(id: i64, email: &str) -> User {
    serde_json::from_value(serde_json::json!({ "id": id, "name": "Анна", "email": email })).unwrap()
}

pub fn signed_in<S: KeyValueStore>(store: S, remote: FakeRemote, offline: bool) -> DataManager<S, FakeRemote, ManualClock> {
    let options = ManagerOptions {
        offline,
        ..Default::default()
    };
    let mut dm = DataManager::with_clock(store, remote, ManualClock::new(start()), options);
    dm.set_current_user(Some(user(1, "anna@example.ru")));
    dm
}
