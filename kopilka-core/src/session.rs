//! Session state machine with an idle timeout.
//!
//! `Anonymous -> PendingCredentials -> Authenticated -> Expired | LoggedOut`.
//! The idle timer is a convenience for the interactive shell, not an access
//! control: anyone who can read the store can read the data.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::finance::{EntityId, User};

pub const DEFAULT_TIMEOUT_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    PendingCredentials {
        email: String,
    },
    Authenticated {
        user_id: EntityId,
        email: String,
        session_id: Option<String>,
        last_activity: DateTime<Utc>,
        /// Set while the timer is paused
        paused_at: Option<DateTime<Utc>>,
    },
    Expired {
        user_id: EntityId,
    },
    LoggedOut,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::PendingCredentials { .. } => "pending-credentials",
            SessionState::Authenticated { .. } => "authenticated",
            SessionState::Expired { .. } => "expired",
            SessionState::LoggedOut => "logged-out",
        }
    }
}

/// Snapshot for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub state: &'static str,
    pub user_id: Option<EntityId>,
    pub email: Option<String>,
    pub session_id: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    timeout: Duration,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_TIMEOUT_MINUTES))
    }
}

impl Session {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: SessionState::Anonymous,
            timeout,
        }
    }

    /// Rebuild a session from a persisted user. Users whose last activity is older
    /// than the timeout (or missing) come back expired.
    pub fn restore(user: &User, timeout: Duration, now: DateTime<Utc>) -> Self {
        let last_activity = user
            .last_activity
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let state = match last_activity {
            Some(last) if now - last <= timeout && !user.email.is_empty() => {
                SessionState::Authenticated {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    session_id: user.session_id.clone(),
                    last_activity: last,
                    paused_at: None,
                }
            }
            _ => SessionState::Expired {
                user_id: user.id.clone(),
            },
        };
        Self { state, timeout }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// Start a login attempt.
    pub fn begin_login(&mut self, email: impl Into<String>) -> Result<()> {
        match self.state {
            SessionState::Anonymous
            | SessionState::Expired { .. }
            | SessionState::LoggedOut
            | SessionState::PendingCredentials { .. } => {
                self.state = SessionState::PendingCredentials { email: email.into() };
                Ok(())
            }
            SessionState::Authenticated { .. } => bail!("already signed in; log out first"),
        }
    }

    /// Credentials were accepted.
    pub fn authenticate(&mut self, user: &User, now: DateTime<Utc>) -> Result<()> {
        let SessionState::PendingCredentials { email } = &self.state else {
            bail!("cannot authenticate from state {}", self.state.name());
        };
        if !email.eq_ignore_ascii_case(&user.email) {
            bail!("credentials were submitted for a different account");
        }
        self.state = SessionState::Authenticated {
            user_id: user.id.clone(),
            email: user.email.clone(),
            session_id: user.session_id.clone(),
            last_activity: now,
            paused_at: None,
        };
        Ok(())
    }

    /// Credentials were rejected.
    pub fn reject(&mut self) {
        if matches!(self.state, SessionState::PendingCredentials { .. }) {
            self.state = SessionState::Anonymous;
        }
    }

    /// Expire the session if it has been idle too long. Returns the current state.
    pub fn check(&mut self, now: DateTime<Utc>) -> &SessionState {
        if let SessionState::Authenticated {
            user_id,
            last_activity,
            paused_at: None,
            ..
        } = &self.state
        {
            if now - *last_activity > self.timeout {
                log::info!("session for user {user_id} expired");
                self.state = SessionState::Expired {
                    user_id: user_id.clone(),
                };
            }
        }
        &self.state
    }

    /// Record user activity. Returns false when there was no live session to extend.
    pub fn touch(&mut self, now: DateTime<Utc>) -> bool {
        self.check(now);
        match &mut self.state {
            SessionState::Authenticated {
                last_activity,
                paused_at: None,
                ..
            } => {
                *last_activity = now;
                true
            }
            _ => false,
        }
    }

    /// Stop the idle timer, e.g. while the app is in the background.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.check(now);
        if let SessionState::Authenticated { paused_at, .. } = &mut self.state {
            paused_at.get_or_insert(now);
        }
    }

    /// Restart the idle timer from `now`.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let SessionState::Authenticated {
            last_activity,
            paused_at,
            ..
        } = &mut self.state
        {
            if paused_at.take().is_some() {
                *last_activity = now;
            }
        }
    }

    pub fn logout(&mut self) {
        self.state = SessionState::LoggedOut;
    }

    /// Time left before the idle timeout; zero unless authenticated.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match &self.state {
            SessionState::Authenticated {
                paused_at: Some(_), ..
            } => self.timeout,
            SessionState::Authenticated { last_activity, .. } => {
                (self.timeout - (now - *last_activity)).max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }

    pub fn info(&self, now: DateTime<Utc>) -> SessionInfo {
        let remaining = self.remaining(now);
        match &self.state {
            SessionState::Authenticated {
                user_id,
                email,
                session_id,
                last_activity,
                ..
            } => SessionInfo {
                state: self.state.name(),
                user_id: Some(user_id.clone()),
                email: Some(email.clone()),
                session_id: session_id.clone(),
                last_activity: Some(*last_activity),
                remaining_seconds: remaining.num_seconds(),
                expires_at: Some(now + remaining),
            },
            other => SessionInfo {
                state: other.name(),
                user_id: match other {
                    SessionState::Expired { user_id } => Some(user_id.clone()),
                    _ => None,
                },
                email: None,
                session_id: None,
                last_activity: None,
                remaining_seconds: 0,
                expires_at: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn user() -> User {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Анна",
            "email": "anna@example.ru",
        }))
        .unwrap()
    }

    fn signed_in() -> Session {
        let mut s = Session::new(Duration::minutes(30));
        s.begin_login("anna@example.ru").unwrap();
        s.authenticate(&user(), at(0)).unwrap();
        s
    }

    #[test]
    fn test_login_flow() {
        let mut s = Session::default();
        assert_eq!(s.state().name(), "anonymous");
        assert!(s.authenticate(&user(), at(0)).is_err());

        s.begin_login("anna@example.ru").unwrap();
        assert_eq!(s.state().name(), "pending-credentials");
        s.reject();
        assert_eq!(s.state(), &SessionState::Anonymous);

        let mut s = signed_in();
        assert!(s.is_authenticated());
        assert!(s.begin_login("other@example.ru").is_err());
        s.logout();
        assert_eq!(s.state(), &SessionState::LoggedOut);
    }

    #[test]
    fn test_idle_timeout() {
        let mut s = signed_in();
        assert!(s.touch(at(20)));
        assert_eq!(s.check(at(50)).name(), "authenticated");
        assert_eq!(s.check(at(51)).name(), "expired");
        assert!(!s.touch(at(52)));
    }

    #[test]
    fn test_pause_stops_the_clock() {
        let mut s = signed_in();
        s.pause(at(10));
        assert_eq!(s.check(at(120)).name(), "authenticated");
        assert_eq!(s.remaining(at(120)), Duration::minutes(30));

        s.resume(at(120));
        assert_eq!(s.remaining(at(130)), Duration::minutes(20));
        assert_eq!(s.check(at(151)).name(), "expired");
    }

    #[test]
    fn test_restore_checks_last_activity() {
        let mut u = user();
        u.last_activity = Some("2026-10-18T08:45:00.000Z".into());
        let s = Session::restore(&u, Duration::minutes(30), at(0));
        assert!(s.is_authenticated());
        assert_eq!(s.info(at(0)).remaining_seconds, 15 * 60);

        let s = Session::restore(&u, Duration::minutes(10), at(0));
        assert_eq!(s.state().name(), "expired");

        u.last_activity = None;
        let s = Session::restore(&u, Duration::minutes(30), at(0));
        assert!(!s.is_authenticated());
    }
}
