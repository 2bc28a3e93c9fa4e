//! Password hashing, input scrubbing and login throttling.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::time::epoch_millis;

static XSS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static SQL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT)\b").unwrap()
});
static HTML_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static SPECIAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>"'&]"#).unwrap());
static MALICIOUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)javascript:|data:text/html|vbscript:|onload=|onerror=|onclick=|eval\s*\(|expression\s*\(")
        .unwrap()
});

pub const SALT_BYTES: usize = 16;

/// Hex SHA-256 of `password + salt`.
pub fn hash_password(password: &str, salt: &str) -> Result<String> {
    if password.is_empty() || salt.is_empty() {
        bail!("password and salt are both required for hashing");
    }
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a password against a stored hash.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt)
        .map(|h| h.eq_ignore_ascii_case(expected_hash))
        .unwrap_or(false)
}

/// `len` random bytes as lowercase hex.
pub fn generate_secure_random(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn generate_salt() -> String {
    generate_secure_random(SALT_BYTES)
}

/// Which scrubbing pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizeKind {
    Xss,
    Sql,
    Html,
    #[default]
    All,
}

/// Strip script blocks, SQL keywords, tags or special characters. Input that
/// still looks like an injection attempt afterwards comes back empty.
pub fn sanitize_input(input: &str, kind: SanitizeKind) -> String {
    let mut out = input.trim().to_string();
    let passes: &[&LazyLock<Regex>] = match kind {
        SanitizeKind::Xss => &[&XSS_RE],
        SanitizeKind::Sql => &[&SQL_RE],
        SanitizeKind::Html => &[&HTML_RE],
        SanitizeKind::All => &[&XSS_RE, &SQL_RE, &HTML_RE, &SPECIAL_RE],
    };
    for re in passes {
        out = re.replace_all(&out, "").into_owned();
    }

    if contains_malicious_content(&out) {
        log::warn!("potentially malicious input rejected");
        return String::new();
    }
    out
}

pub fn contains_malicious_content(input: &str) -> bool {
    MALICIOUS_RE.is_match(input)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    /// 0..=5
    pub score: u8,
    pub label: &'static str,
    pub valid: bool,
    pub errors: Vec<String>,
}

const STRENGTH_LABELS: [&str; 6] = [
    "Очень слабый",
    "Слабый",
    "Средний",
    "Хороший",
    "Сильный",
    "Очень сильный",
];

/// Score a password for the strength meter. Valid means no errors and a score
/// of at least 4.
pub fn password_strength(password: &str) -> PasswordStrength {
    if password.is_empty() {
        return PasswordStrength {
            score: 0,
            label: STRENGTH_LABELS[0],
            valid: false,
            errors: vec!["Пароль обязателен".to_string()],
        };
    }

    let mut errors = Vec::new();
    let mut score: u8 = 0;
    let len = password.chars().count();
    if len < 8 {
        errors.push("Минимум 8 символов".to_string());
    } else {
        score += 1;
        if len >= 12 {
            score += 1;
        }
    }

    let checks: [(bool, &str); 4] = [
        (password.chars().any(|c| c.is_ascii_lowercase()), "Добавьте строчные буквы"),
        (password.chars().any(|c| c.is_ascii_uppercase()), "Добавьте заглавные буквы"),
        (password.chars().any(|c| c.is_ascii_digit()), "Добавьте цифры"),
        (password.chars().any(|c| !c.is_ascii_alphanumeric()), "Добавьте специальные символы"),
    ];
    for (ok, hint) in checks {
        if ok {
            score += 1;
        } else {
            errors.push(hint.to_string());
        }
    }

    if ["password", "123456", "qwerty", "admin", "letmein"].contains(&password.to_lowercase().as_str()) {
        errors.push("Слишком простой пароль".to_string());
        score = 0;
    }

    let score = score.min(5);
    PasswordStrength {
        score,
        label: STRENGTH_LABELS[score as usize],
        valid: errors.is_empty() && score >= 4,
        errors,
    }
}

/// Outcome of a throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginCheck {
    Allowed { attempts_remaining: u32 },
    Blocked { remaining: Duration },
}

impl LoginCheck {
    pub fn is_blocked(&self) -> bool {
        matches!(self, LoginCheck::Blocked { .. })
    }

    /// Whole minutes left, rounded up.
    pub fn minutes_remaining(&self) -> i64 {
        match self {
            LoginCheck::Blocked { remaining } => (remaining.num_milliseconds() + 59_999) / 60_000,
            LoginCheck::Allowed { .. } => 0,
        }
    }
}

/// Sliding-window failed-login counter per email.
///
/// Serializes as `email -> [epoch millis]`, the shape kept under `loginAttempts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginAttempts {
    attempts: HashMap<String, Vec<i64>>,
}

impl LoginAttempts {
    pub fn len(&self, email: &str) -> usize {
        self.attempts.get(email).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LoginThrottle {
    pub max_attempts: u32,
    pub lockout: Duration,
    attempts: LoginAttempts,
}

impl LoginThrottle {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            max_attempts,
            lockout,
            attempts: LoginAttempts::default(),
        }
    }

    pub fn with_attempts(mut self, attempts: LoginAttempts) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn attempts(&self) -> &LoginAttempts {
        &self.attempts
    }

    /// Drop attempts older than the lockout window, then decide.
    pub fn check(&mut self, email: &str, now: DateTime<Utc>) -> LoginCheck {
        let now_ms = epoch_millis(now);
        let window = self.lockout.num_milliseconds();
        let recent = self.attempts.attempts.entry(email.to_string()).or_default();
        recent.retain(|&ts| now_ms - ts < window);

        let count = recent.len() as u32;
        let oldest = recent.iter().min().copied();
        if recent.is_empty() {
            self.attempts.attempts.remove(email);
        }

        match oldest {
            Some(oldest) if count >= self.max_attempts => LoginCheck::Blocked {
                remaining: Duration::milliseconds(window - (now_ms - oldest)),
            },
            _ => LoginCheck::Allowed {
                attempts_remaining: self.max_attempts.saturating_sub(count),
            },
        }
    }

    pub fn record_failure(&mut self, email: &str, now: DateTime<Utc>) {
        self.attempts
            .attempts
            .entry(email.to_string())
            .or_default()
            .push(epoch_millis(now));
    }

    pub fn clear(&mut self, email: &str) {
        self.attempts.attempts.remove(email);
    }
}
