//! Error taxonomy for the service layer.

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// User-correctable input problems, one message per line.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("too many login attempts; try again in {} min", minutes_up(.remaining))]
    Locked { remaining: Duration },

    #[error("wrong email or password")]
    InvalidCredentials,

    #[error("an account with email {0} already exists")]
    DuplicateEmail(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DataError {
    /// Whether retrying later may help.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::Network(_) | DataError::Locked { .. })
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Network(err.to_string())
    }
}

fn minutes_up(d: &Duration) -> i64 {
    (d.num_milliseconds() + 59_999) / 60_000
}

pub type DataResult<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = DataError::Validation(vec!["amount: bad".into(), "date: bad".into()]);
        assert_eq!(e.to_string(), "validation failed: amount: bad; date: bad");

        let e = DataError::Locked {
            remaining: Duration::seconds(61),
        };
        assert_eq!(e.to_string(), "too many login attempts; try again in 2 min");
        assert!(e.is_transient());
        assert!(!DataError::InvalidCredentials.is_transient());
    }
}
