//! kopilka-data: key-value storage, journals, server client, data manager and auth

pub mod auth;
pub mod error;
pub mod export;
pub mod journal;
pub mod manager;
pub mod remote;
pub mod storage;

pub use auth::{AuthConfig, AuthService};
pub use error::{DataError, DataResult};
pub use export::{ExportBundle, ExportOptions, ImportOptions};
pub use journal::{AppLog, LogEntry, LogFilter, LogLevel, SecurityEvent, SecurityLog};
pub use manager::{Clock, DataManager, ManagerOptions, ManualClock, SyncOutcome, SyncStats, SystemClock, Theme};
pub use remote::{HttpRemote, Offline, Remote, RemoteApi};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
