//! Registration, login and logout on top of the data manager.
//!
//! Local accounts live under `users`; the server is tried when local
//! credentials do not match. Failed logins feed a per-email throttle persisted
//! under `loginAttempts`, and every outcome lands in the security log.

use chrono::Duration;
use serde_json::json;

use crate::error::{DataError, DataResult};
use crate::journal::{LogLevel, events};
use crate::manager::{Clock, DataManager};
use crate::remote::RemoteApi;
use crate::storage::{KEY_LOGIN_ATTEMPTS, KEY_USERS, KeyValueStore, read_json, write_json};
use kopilka_core::ids::{IdGenerator, max_numeric};
use kopilka_core::security::{self, LoginAttempts, LoginCheck, LoginThrottle};
use kopilka_core::session::DEFAULT_TIMEOUT_MINUTES;
use kopilka_core::time::to_iso_millis;
use kopilka_core::validator::RegistrationInput;
use kopilka_core::{Session, SessionState, User, Validator};

pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

/// Bytes of randomness in a session id.
const SESSION_ID_BYTES: usize = 16;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub max_login_attempts: u32,
    pub lockout: Duration,
    pub session_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            lockout: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
            session_timeout: Duration::minutes(DEFAULT_TIMEOUT_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an account. The server gets the first try; without one the
    /// account is added to the local `users` list.
    pub async fn register<S, R, C>(&self, dm: &mut DataManager<S, R, C>, input: &RegistrationInput) -> DataResult<User>
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        let email = normalize_email(&input.email);
        let form = Validator::new(dm.today()).validate_registration(input);
        if !form.valid {
            dm.security_event(
                events::REGISTRATION_FAILED,
                json!({ "email": email, "reason": "validation" }),
            );
            return Err(DataError::Validation(form.messages()));
        }

        let mut throttle = self.load_throttle(dm);
        if let LoginCheck::Blocked { remaining } = throttle.check(&email, dm.now()) {
            dm.security_event(events::BLOCKED_LOGIN, json!({ "email": email, "action": "register" }));
            return Err(DataError::Locked { remaining });
        }

        let mut users = local_users(dm);
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
            dm.security_event(
                events::REGISTRATION_FAILED,
                json!({ "email": email, "reason": "duplicate" }),
            );
            return Err(DataError::DuplicateEmail(email));
        }

        let salt = security::generate_salt();
        let hash = security::hash_password(&input.password, &salt)?;
        let last_id = max_numeric(users.iter().map(|u| &u.id));
        let user = User {
            id: IdGenerator::seeded(last_id).next_id(dm.now()),
            name: form.value("name").to_string(),
            email: email.clone(),
            password: hash,
            salt,
            created: Some(to_iso_millis(dm.now())),
            last_activity: None,
            is_active: true,
            email_verified: false,
            session_id: None,
        };

        let registered = if dm.is_offline() {
            None
        } else {
            match dm.remote().register(&user).await {
                Ok(server_user) => Some(server_user),
                Err(e) => {
                    log::info!("server registration unavailable, registering locally: {e}");
                    None
                }
            }
        };
        let user = match registered {
            Some(server_user) => server_user,
            None => {
                users.push(user.clone());
                write_json(dm.store_mut(), KEY_USERS, &users)?;
                user
            }
        };

        dm.security_event(
            events::REGISTRATION_SUCCESS,
            json!({ "email": user.email, "userId": user.id }),
        );
        dm.log(LogLevel::Info, "Пользователь зарегистрирован", Some(json!({ "userId": user.id })));
        Ok(user)
    }

    /// Check credentials, locally first and then against the server. On success
    /// the user becomes the current user and an authenticated session is returned.
    pub async fn login<S, R, C>(
        &self,
        dm: &mut DataManager<S, R, C>,
        email: &str,
        password: &str,
    ) -> DataResult<(User, Session)>
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(DataError::Validation(vec!["Введите email и пароль".to_string()]));
        }

        let mut session = Session::new(self.config.session_timeout);
        session.begin_login(email.clone())?;

        let mut throttle = self.load_throttle(dm);
        let check = throttle.check(&email, dm.now());
        let attempts_remaining = match check {
            LoginCheck::Blocked { remaining } => {
                dm.security_event(
                    events::BLOCKED_LOGIN,
                    json!({ "email": email, "remainingMinutes": check.minutes_remaining() }),
                );
                session.reject();
                return Err(DataError::Locked { remaining });
            }
            LoginCheck::Allowed { attempts_remaining } => attempts_remaining,
        };

        let mut users = local_users(dm);
        let local = users.iter().position(|u| {
            u.is_active && u.email.eq_ignore_ascii_case(&email) && security::verify_password(password, &u.salt, &u.password)
        });

        let user = match local {
            Some(pos) => Some(users[pos].clone()),
            None if !dm.is_offline() => match dm.remote().login(&email, password).await {
                Ok(user) => Some(user),
                Err(e) => {
                    log::debug!("server login failed: {e}");
                    None
                }
            },
            None => None,
        };

        let Some(mut user) = user else {
            throttle.record_failure(&email, dm.now());
            self.save_throttle(dm, &throttle);
            session.reject();
            dm.security_event(
                events::LOGIN_FAILED,
                json!({ "email": email, "attemptsRemaining": attempts_remaining.saturating_sub(1) }),
            );
            return Err(DataError::InvalidCredentials);
        };

        throttle.clear(&email);
        self.save_throttle(dm, &throttle);

        user.last_activity = Some(to_iso_millis(dm.now()));
        user.session_id = Some(security::generate_secure_random(SESSION_ID_BYTES));
        if let Some(pos) = local {
            users[pos] = user.clone();
            if let Err(e) = write_json(dm.store_mut(), KEY_USERS, &users) {
                log::error!("updating local user record: {e}");
            }
        }

        session.authenticate(&user, dm.now())?;
        dm.set_current_user(Some(user.clone()));
        dm.security_event(
            events::LOGIN_SUCCESS,
            json!({ "email": email, "userId": user.id, "source": if local.is_some() { "local" } else { "server" } }),
        );
        Ok((user, session))
    }

    /// Rebuild the session of the persisted current user and record activity.
    /// An idle-expired session signs the user out.
    pub fn resume<S, R, C>(&self, dm: &mut DataManager<S, R, C>) -> DataResult<Session>
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        let user = dm.require_user()?.clone();
        let now = dm.now();
        let mut session = Session::restore(&user, self.config.session_timeout, now);
        if let SessionState::Expired { user_id } = session.check(now) {
            dm.security_event(events::SESSION_EXPIRED, json!({ "userId": user_id }));
            dm.set_current_user(None);
            return Err(DataError::NotAuthenticated);
        }

        session.touch(now);
        let mut user = user;
        user.last_activity = Some(to_iso_millis(now));
        dm.set_current_user(Some(user));
        Ok(session)
    }

    /// Forget the current user and its cached data.
    pub fn logout<S, R, C>(&self, dm: &mut DataManager<S, R, C>)
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        let Some(user) = dm.current_user().cloned() else {
            return;
        };
        dm.set_current_user(None);
        dm.security_event(events::LOGOUT, json!({ "userId": user.id, "email": user.email }));
    }

    fn load_throttle<S, R, C>(&self, dm: &DataManager<S, R, C>) -> LoginThrottle
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        let attempts: LoginAttempts = read_json(dm.store(), KEY_LOGIN_ATTEMPTS).unwrap_or_default();
        LoginThrottle::new(self.config.max_login_attempts, self.config.lockout).with_attempts(attempts)
    }

    fn save_throttle<S, R, C>(&self, dm: &mut DataManager<S, R, C>, throttle: &LoginThrottle)
    where
        S: KeyValueStore,
        R: RemoteApi,
        C: Clock,
    {
        if let Err(e) = write_json(dm.store_mut(), KEY_LOGIN_ATTEMPTS, throttle.attempts()) {
            log::error!("persisting login attempts: {e}");
        }
    }
}

pub fn local_users<S, R, C>(dm: &DataManager<S, R, C>) -> Vec<User>
where
    S: KeyValueStore,
    R: RemoteApi,
    C: Clock,
{
    read_json(dm.store(), KEY_USERS).unwrap_or_default()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ManagerOptions, ManualClock};
    use crate::remote::Offline;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn manager() -> DataManager<MemoryStore, Offline, ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        let options = ManagerOptions {
            offline: true,
            ..Default::default()
        };
        DataManager::with_clock(MemoryStore::new(), Offline, clock, options)
    }

    fn registration() -> RegistrationInput {
        RegistrationInput {
            name: "Анна Петрова".into(),
            email: "Anna@Example.ru".into(),
            password: "Zebra@Moon42".into(),
            password_confirm: "Zebra@Moon42".into(),
        }
    }

    #[tokio::test]
    async fn test_register_locally_then_login() {
        let auth = AuthService::default();
        let mut dm = manager();
        let user = auth.register(&mut dm, &registration()).await.unwrap();
        assert_eq!(user.email, "anna@example.ru");
        assert_ne!(user.password, "Zebra@Moon42");
        assert_eq!(local_users(&dm).len(), 1);

        let (user, session) = auth.login(&mut dm, "anna@example.ru", "Zebra@Moon42").await.unwrap();
        assert!(session.is_authenticated());
        assert!(user.session_id.is_some());
        assert_eq!(dm.current_user().map(|u| u.id.clone()), Some(user.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let auth = AuthService::default();
        let mut dm = manager();
        auth.register(&mut dm, &registration()).await.unwrap();
        let err = auth.register(&mut dm, &registration()).await.unwrap_err();
        assert!(matches!(err, DataError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_lockout_after_failures() {
        let auth = AuthService::new(AuthConfig {
            max_login_attempts: 3,
            ..Default::default()
        });
        let mut dm = manager();
        auth.register(&mut dm, &registration()).await.unwrap();
        for _ in 0..3 {
            let err = auth.login(&mut dm, "anna@example.ru", "wrong").await.unwrap_err();
            assert!(matches!(err, DataError::InvalidCredentials));
        }
        let err = auth.login(&mut dm, "anna@example.ru", "Zebra@Moon42").await.unwrap_err();
        assert!(matches!(err, DataError::Locked { .. }));

        dm.clock().advance(Duration::minutes(DEFAULT_LOCKOUT_MINUTES));
        assert!(auth.login(&mut dm, "anna@example.ru", "Zebra@Moon42").await.is_ok());
        let events: Vec<&str> = dm.security_log().recent(10).iter().map(|e| e.event.as_str()).collect();
        assert!(events.contains(&events::BLOCKED_LOGIN));
        assert_eq!(events.last(), Some(&events::LOGIN_SUCCESS));
    }

    #[tokio::test]
    async fn test_resume_expires_idle_session() {
        let auth = AuthService::default();
        let mut dm = manager();
        auth.register(&mut dm, &registration()).await.unwrap();
        auth.login(&mut dm, "anna@example.ru", "Zebra@Moon42").await.unwrap();

        dm.clock().advance(Duration::minutes(10));
        assert!(auth.resume(&mut dm).is_ok());
        dm.clock().advance(Duration::minutes(DEFAULT_TIMEOUT_MINUTES + 1));
        assert!(matches!(auth.resume(&mut dm), Err(DataError::NotAuthenticated)));
        assert!(dm.current_user().is_none());
    }

    #[tokio::test]
    async fn test_logout() {
        let auth = AuthService::default();
        let mut dm = manager();
        auth.register(&mut dm, &registration()).await.unwrap();
        auth.login(&mut dm, "anna@example.ru", "Zebra@Moon42").await.unwrap();
        auth.logout(&mut dm);
        assert!(dm.current_user().is_none());
        assert_eq!(dm.security_log().recent(1)[0].event, events::LOGOUT);
    }
}
