//! Field and form validation.
//!
//! Validation never fails with an error: every check returns the sanitized value
//! and a list of user-facing messages. Sanitization only trims, collapses
//! whitespace and drops angle brackets. It is not an HTML sanitizer.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::finance::{TxType, UserData};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Zа-яА-ЯёЁ\s-]+$").unwrap());
static CATEGORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Zа-яА-ЯёЁ0-9\s-]+$").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(\.\d{1,2})?$").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(income|expense)$").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub const MAX_AMOUNT: f64 = 999_999_999.99;
const SANITIZED_MAX_CHARS: usize = 1000;
const PASSWORD_SPECIALS: &str = "@$!%*?&";
const COMMON_PASSWORDS: [&str; 10] = [
    "password", "123456", "qwerty", "admin", "letmein", "welcome", "monkey", "dragon", "master",
    "sunshine",
];

const MSG_REQUIRED: &str = "Это поле обязательно для заполнения";

/// What a field holds; picks the default rules and the bespoke checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Name,
    Password,
    Amount,
    Date,
    Description,
    Category,
    /// Transaction type: `income` or `expense`
    Type,
}

/// Declarative rules for one field.
#[derive(Debug, Clone)]
pub struct FieldRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<&'static Regex>,
    pub sanitize: bool,
}

impl FieldRules {
    pub fn for_kind(kind: FieldKind) -> Self {
        let base = Self {
            required: true,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            pattern: None,
            sanitize: false,
        };
        match kind {
            FieldKind::Text => Self {
                min_length: Some(1),
                max_length: Some(255),
                sanitize: true,
                ..base
            },
            FieldKind::Email => Self {
                max_length: Some(254),
                pattern: Some(&*EMAIL_RE),
                sanitize: true,
                ..base
            },
            FieldKind::Name => Self {
                min_length: Some(2),
                max_length: Some(50),
                pattern: Some(&*NAME_RE),
                sanitize: true,
                ..base
            },
            // Composition is checked separately: the regex crate has no lookahead.
            FieldKind::Password => Self {
                min_length: Some(8),
                max_length: Some(128),
                ..base
            },
            FieldKind::Amount => Self {
                min: Some(0.0),
                max: Some(MAX_AMOUNT),
                pattern: Some(&*AMOUNT_RE),
                ..base
            },
            FieldKind::Date => Self {
                pattern: Some(&*DATE_RE),
                ..base
            },
            FieldKind::Description => Self {
                required: false,
                max_length: Some(500),
                sanitize: true,
                ..base
            },
            FieldKind::Category => Self {
                min_length: Some(2),
                max_length: Some(50),
                pattern: Some(&*CATEGORY_RE),
                sanitize: true,
                ..base
            },
            FieldKind::Type => Self {
                pattern: Some(&*TYPE_RE),
                ..base
            },
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub sanitized_value: String,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn ok(value: impl Into<String>) -> Self {
        Self {
            valid: true,
            sanitized_value: value.into(),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }
}

/// Result of validating several fields at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormValidation {
    pub valid: bool,
    pub errors: BTreeMap<String, Vec<String>>,
    pub sanitized: BTreeMap<String, String>,
}

impl FormValidation {
    fn new() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.valid = false;
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    /// Sanitized value of a field, empty when absent.
    pub fn value(&self, field: &str) -> &str {
        self.sanitized.get(field).map(String::as_str).unwrap_or("")
    }

    /// All messages flattened as `field: message`.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{field}: {m}")))
            .collect()
    }
}

/// Password check with a strength score and hints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasswordCheck {
    pub valid: bool,
    pub errors: Vec<String>,
    /// 0..=5
    pub strength: u8,
    pub suggestions: Vec<String>,
}

/// Raw transaction form input.
#[derive(Debug, Clone, Default)]
pub struct TransactionInput {
    pub kind: String,
    pub category: String,
    pub amount: String,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default)]
pub struct GoalInput {
    pub name: String,
    pub target: String,
    pub saved: String,
    pub deadline: String,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetInput {
    pub category: String,
    pub limit: String,
}

/// Validator bound to a calendar day, which decides what "future" means.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    today: NaiveDate,
}

impl Validator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Validate one value under the default rules for its kind.
    pub fn validate_field(&self, kind: FieldKind, value: &str) -> ValidationResult {
        self.validate_with(kind, value, &FieldRules::for_kind(kind))
    }

    /// Validate one value under explicit rules.
    pub fn validate_with(&self, kind: FieldKind, value: &str, rules: &FieldRules) -> ValidationResult {
        let mut result = ValidationResult::ok(value);
        if value.is_empty() {
            if rules.required {
                result.fail(MSG_REQUIRED);
            }
            return result;
        }

        if rules.sanitize {
            result.sanitized_value = sanitize(value);
        }
        let text = match kind {
            FieldKind::Amount => value.trim().replace(',', "."),
            _ => value.to_string(),
        };
        if kind == FieldKind::Amount {
            result.sanitized_value = text.clone();
        }

        let len = text.chars().count();
        if let Some(min) = rules.min_length {
            if len < min {
                result.fail(format!("Минимальная длина: {min} символов"));
            }
        }
        if let Some(max) = rules.max_length {
            if len > max {
                result.fail(format!("Максимальная длина: {max} символов"));
            }
        }

        if rules.min.is_some() || rules.max.is_some() {
            if let Ok(n) = text.parse::<f64>() {
                if let Some(min) = rules.min {
                    if n < min {
                        result.fail(format!("Минимальное значение: {min}"));
                    }
                }
                if let Some(max) = rules.max {
                    if n > max {
                        result.fail(format!("Максимальное значение: {max}"));
                    }
                }
            }
        }

        if let Some(pattern) = rules.pattern {
            if !pattern.is_match(&text) {
                result.fail(pattern_message(kind));
            }
        }

        match kind {
            FieldKind::Email => result.errors.extend(validate_email(&text)),
            FieldKind::Password => {
                if !has_password_composition(&text) {
                    result.fail(pattern_message(kind));
                }
                result.errors.extend(validate_password(&text).errors);
            }
            FieldKind::Date => result.errors.extend(self.validate_date(&text).err().unwrap_or_default()),
            _ => {}
        }
        result.errors.dedup();
        result.valid = result.errors.is_empty();
        result
    }

    /// Check a calendar date: `YYYY-MM-DD`, real, not in the future, not before 1900.
    pub fn validate_date(&self, value: &str) -> Result<NaiveDate, Vec<String>> {
        if value.is_empty() {
            return Err(vec!["Дата обязательна".to_string()]);
        }
        if !DATE_RE.is_match(value) {
            return Err(vec!["Некорректный формат даты (ГГГГ-ММ-ДД)".to_string()]);
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| vec!["Некорректная дата".to_string()])?;

        let mut errors = Vec::new();
        if date > self.today {
            errors.push("Дата не может быть в будущем".to_string());
        }
        if date < min_date() {
            errors.push("Дата не может быть ранее 1900 года".to_string());
        }
        if errors.is_empty() { Ok(date) } else { Err(errors) }
    }

    /// Validate a list of `(field, kind, rules, value)` entries.
    pub fn validate_form(&self, fields: &[(&str, FieldKind, FieldRules, &str)]) -> FormValidation {
        let mut form = FormValidation::new();
        for (name, kind, rules, value) in fields {
            let result = self.validate_with(*kind, value, rules);
            for e in result.errors {
                form.add_error(name, e);
            }
            form.sanitized.insert(name.to_string(), result.sanitized_value);
        }
        form
    }

    pub fn validate_transaction(&self, input: &TransactionInput) -> FormValidation {
        self.validate_form(&[
            ("type", FieldKind::Type, FieldRules::for_kind(FieldKind::Type), input.kind.as_str()),
            ("category", FieldKind::Category, FieldRules::for_kind(FieldKind::Category), input.category.as_str()),
            ("amount", FieldKind::Amount, FieldRules::for_kind(FieldKind::Amount), input.amount.as_str()),
            ("date", FieldKind::Date, FieldRules::for_kind(FieldKind::Date), input.date.as_str()),
            (
                "description",
                FieldKind::Description,
                FieldRules::for_kind(FieldKind::Description),
                input.description.as_str(),
            ),
        ])
    }

    pub fn validate_registration(&self, input: &RegistrationInput) -> FormValidation {
        let mut form = self.validate_form(&[
            ("name", FieldKind::Name, FieldRules::for_kind(FieldKind::Name), input.name.as_str()),
            ("email", FieldKind::Email, FieldRules::for_kind(FieldKind::Email), input.email.as_str()),
            ("password", FieldKind::Password, FieldRules::for_kind(FieldKind::Password), input.password.as_str()),
        ]);
        if input.password_confirm.is_empty() {
            form.add_error("passwordConfirm", MSG_REQUIRED);
        } else if input.password_confirm != input.password {
            form.add_error("passwordConfirm", "Пароли не совпадают");
        }
        form
    }

    /// Goal form. Goal names follow the category rules, the target must be positive
    /// and the deadline, when given, must fall strictly after today.
    pub fn validate_goal(&self, input: &GoalInput) -> FormValidation {
        let deadline_rules = FieldRules::for_kind(FieldKind::Date).optional();
        let mut form = self.validate_form(&[
            ("name", FieldKind::Category, FieldRules::for_kind(FieldKind::Category), input.name.as_str()),
            ("target", FieldKind::Amount, FieldRules::for_kind(FieldKind::Amount), input.target.as_str()),
            (
                "saved",
                FieldKind::Amount,
                FieldRules::for_kind(FieldKind::Amount).optional(),
                input.saved.as_str(),
            ),
            ("deadline", FieldKind::Text, deadline_rules, input.deadline.as_str()),
        ]);

        let target = form.value("target").parse::<f64>().ok();
        let saved = form.value("saved").parse::<f64>().ok();
        if let (Some(target), Some(saved)) = (target, saved) {
            if saved > target {
                form.errors.insert(
                    "saved".into(),
                    vec!["Накопленная сумма не может превышать цель".into()],
                );
                form.valid = false;
            }
        }

        if form.value("target").parse::<f64>().map(|t| t <= 0.0).unwrap_or(false) {
            form.add_error("target", "Цель должна быть больше нуля");
        }
        if let Err(errors) = self.parse_deadline(&input.deadline) {
            form.errors.insert("deadline".into(), errors);
            form.valid = false;
        }
        form
    }

    /// Goal deadline: empty means none, otherwise a real `YYYY-MM-DD` date after today.
    pub fn parse_deadline(&self, value: &str) -> Result<Option<NaiveDate>, Vec<String>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if !DATE_RE.is_match(value) {
            return Err(vec!["Некорректный формат даты (ГГГГ-ММ-ДД)".to_string()]);
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| vec!["Некорректная дата".to_string()])?;
        if date <= self.today {
            return Err(vec!["Дата дедлайна должна быть в будущем".to_string()]);
        }
        Ok(Some(date))
    }

    pub fn validate_budget(&self, input: &BudgetInput) -> FormValidation {
        let mut form = self.validate_form(&[
            ("category", FieldKind::Category, FieldRules::for_kind(FieldKind::Category), input.category.as_str()),
            ("limit", FieldKind::Amount, FieldRules::for_kind(FieldKind::Amount), input.limit.as_str()),
        ]);
        if form.value("limit").parse::<f64>().map(|l| l <= 0.0).unwrap_or(false) {
            form.add_error("limit", "Лимит должен быть больше нуля");
        }
        form
    }

    /// Shape check of a stored bundle before it is written.
    pub fn validate_bundle(&self, data: &UserData) -> FormValidation {
        let mut form = FormValidation::new();
        for (i, t) in data.transactions.iter().enumerate() {
            if !t.amount.is_finite() || t.amount < 0.0 {
                form.add_error(&format!("transactions[{i}].amount"), "Некорректная сумма");
            }
            if t.date < min_date() {
                form.add_error(&format!("transactions[{i}].date"), "Дата не может быть ранее 1900 года");
            }
            if t.description.as_deref().is_some_and(|d| d.chars().count() > 500) {
                form.add_error(&format!("transactions[{i}].description"), "Максимальная длина: 500 символов");
            }
        }
        for (i, b) in data.budgets.iter().enumerate() {
            if !(b.limit.is_finite() && b.limit > 0.0) {
                form.add_error(&format!("budgets[{i}].limit"), "Лимит должен быть больше нуля");
            }
        }
        for (i, g) in data.goals.iter().enumerate() {
            if !(g.target.is_finite() && g.target > 0.0) {
                form.add_error(&format!("goals[{i}].target"), "Цель должна быть больше нуля");
            }
            if !g.saved.is_finite() || g.saved < 0.0 {
                form.add_error(&format!("goals[{i}].saved"), "Некорректная сумма");
            }
        }
        form
    }
}

fn min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn pattern_message(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Email => "Введите корректный email адрес",
        FieldKind::Password => "Пароль должен содержать заглавные/строчные буквы, цифры и специальные символы",
        FieldKind::Name => "Имя может содержать только буквы, пробелы и дефисы",
        FieldKind::Amount => "Введите корректную сумму",
        FieldKind::Date => "Введите корректную дату в формате ГГГГ-ММ-ДД",
        FieldKind::Category => "Категория может содержать только буквы, цифры, пробелы и дефисы",
        _ => "Некорректный формат",
    }
}

fn has_password_composition(password: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c);
    password.chars().next().is_some_and(allowed)
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Trim, collapse whitespace, drop `<` and `>`, cap at 1000 characters.
pub fn sanitize(input: &str) -> String {
    WHITESPACE_RE
        .replace_all(input.trim(), " ")
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .take(SANITIZED_MAX_CHARS)
        .collect()
}

/// Email checks beyond the pattern. Returns the messages; empty means valid.
pub fn validate_email(email: &str) -> Vec<String> {
    if email.is_empty() {
        return vec!["Email обязателен".to_string()];
    }
    let mut errors = Vec::new();
    if !EMAIL_RE.is_match(email) {
        errors.push("Некорректный формат email".to_string());
    }
    if email.chars().count() > 254 {
        errors.push("Email слишком длинный (максимум 254 символа)".to_string());
    }
    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    if local.chars().count() > 64 {
        errors.push("Локальная часть email слишком длинная".to_string());
    }
    if domain.chars().count() > 253 {
        errors.push("Домен email слишком длинный".to_string());
    }
    errors
}

pub fn validate_password(password: &str) -> PasswordCheck {
    let mut check = PasswordCheck {
        valid: true,
        errors: Vec::new(),
        strength: 0,
        suggestions: Vec::new(),
    };
    if password.is_empty() {
        check.valid = false;
        check.errors.push("Пароль обязателен".to_string());
        return check;
    }

    let len = password.chars().count();
    if len < 8 {
        check.valid = false;
        check.errors.push("Минимум 8 символов".to_string());
    } else if len >= 12 {
        check.strength += 1;
    }

    let classes: [(fn(&char) -> bool, &str); 4] = [
        (|c| c.is_ascii_lowercase(), "Добавьте строчные буквы"),
        (|c| c.is_ascii_uppercase(), "Добавьте заглавные буквы"),
        (|c| c.is_ascii_digit(), "Добавьте цифры"),
        (|c| !c.is_ascii_alphanumeric(), "Добавьте специальные символы"),
    ];
    for (present, hint) in classes {
        if password.chars().any(|c| present(&c)) {
            check.strength += 1;
        } else {
            check.suggestions.push(hint.to_string());
        }
    }

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        check.valid = false;
        check.errors.push("Слишком простой пароль".to_string());
    }
    if has_sequential_chars(password) {
        check.suggestions.push("Избегайте последовательных символов".to_string());
    }
    check
}

/// Three consecutive code points in a row, like `abc` or `123`.
pub fn has_sequential_chars(s: &str) -> bool {
    let codes: Vec<u32> = s.chars().map(u32::from).collect();
    codes
        .windows(3)
        .any(|w| w[1] == w[0] + 1 && w[2] == w[1] + 1)
}

/// Parse a user-typed amount: comma or dot separator, at most 2 fraction digits,
/// within `0..=MAX_AMOUNT`.
pub fn validate_amount(value: &str) -> Result<f64, Vec<String>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(vec!["Сумма обязательна".to_string()]);
    }
    let normalized = value.replace(',', ".");
    let amount: f64 = normalized
        .parse()
        .map_err(|_| vec!["Некорректный формат суммы".to_string()])?;
    if !amount.is_finite() {
        return Err(vec!["Некорректный формат суммы".to_string()]);
    }

    let mut errors = Vec::new();
    if amount < 0.0 {
        errors.push("Сумма не может быть отрицательной".to_string());
    }
    if amount > MAX_AMOUNT {
        errors.push("Сумма слишком велика".to_string());
    }
    if normalized.split_once('.').is_some_and(|(_, frac)| frac.len() > 2) {
        errors.push("Максимум 2 десятичных знака".to_string());
    }
    if errors.is_empty() { Ok(amount) } else { Err(errors) }
}

/// Parse a transaction type typed by the user.
pub fn parse_type(value: &str) -> Option<TxType> {
    TxType::parse(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  hello   <b>world</b>  "), "hello bworld/b");
        assert_eq!(sanitize(&"x".repeat(1500)).len(), 1000);
    }

    #[test]
    fn test_required_and_optional() {
        let v = validator();
        let r = v.validate_field(FieldKind::Category, "");
        assert!(!r.valid);
        assert_eq!(r.errors, vec![MSG_REQUIRED]);

        let r = v.validate_field(FieldKind::Description, "");
        assert!(r.valid);
    }

    #[test]
    fn test_email() {
        let v = validator();
        assert!(v.validate_field(FieldKind::Email, "anna@example.ru").valid);
        assert!(!v.validate_field(FieldKind::Email, "anna@example").valid);
        let long_local = format!("{}@example.com", "a".repeat(65));
        assert!(validate_email(&long_local).contains(&"Локальная часть email слишком длинная".to_string()));
    }

    #[test]
    fn test_password_rules() {
        let v = validator();
        assert!(v.validate_field(FieldKind::Password, "Secur3!pass").valid);
        assert!(!v.validate_field(FieldKind::Password, "short1!").valid);
        assert!(!v.validate_field(FieldKind::Password, "alllowercase1!").valid);

        let check = validate_password("password");
        assert!(!check.valid);
        assert!(check.errors.contains(&"Слишком простой пароль".to_string()));

        let check = validate_password("Abc12345!xyzQ");
        assert_eq!(check.strength, 5);
        assert!(check.suggestions.contains(&"Избегайте последовательных символов".to_string()));
    }

    #[test]
    fn test_sequential_chars() {
        assert!(has_sequential_chars("xx123"));
        assert!(has_sequential_chars("abc"));
        assert!(!has_sequential_chars("a1b2c3"));
        assert!(!has_sequential_chars("ab"));
    }

    #[test]
    fn test_dates() {
        let v = validator();
        assert!(v.validate_date("2026-10-18").is_ok());
        assert!(v.validate_date("2026-10-19").is_err());
        assert!(v.validate_date("1899-12-31").is_err());
        assert!(v.validate_date("2026-02-30").is_err());
        assert!(v.validate_date("18.10.2026").is_err());
        assert!(!v.validate_field(FieldKind::Date, "2030-01-01").valid);
    }

    #[test]
    fn test_amounts() {
        assert_eq!(validate_amount("1000,50"), Ok(1000.5));
        assert_eq!(validate_amount(" 42 "), Ok(42.0));
        assert!(validate_amount("-1").is_err());
        assert!(validate_amount("1.234").is_err());
        assert!(validate_amount("1000000000").is_err());
        assert!(validate_amount("abc").is_err());

        let v = validator();
        let r = v.validate_field(FieldKind::Amount, "12,5");
        assert!(r.valid);
        assert_eq!(r.sanitized_value, "12.5");
    }

    #[test]
    fn test_transaction_form() {
        let v = validator();
        let input = TransactionInput {
            kind: "expense".into(),
            category: "Продукты".into(),
            amount: "400".into(),
            date: "2026-10-01".into(),
            description: "  молоко   <и> хлеб ".into(),
        };
        let form = v.validate_transaction(&input);
        assert!(form.valid, "{:?}", form.errors);
        assert_eq!(form.value("description"), "молоко и хлеб");

        let bad = TransactionInput {
            kind: "gift".into(),
            ..input
        };
        let form = v.validate_transaction(&bad);
        assert!(!form.valid);
        assert!(form.errors.contains_key("type"));
    }

    #[test]
    fn test_registration_form() {
        let v = validator();
        let mut input = RegistrationInput {
            name: "Анна Иванова".into(),
            email: "anna@example.ru".into(),
            password: "Secur3!pass".into(),
            password_confirm: "Secur3!pass".into(),
        };
        assert!(v.validate_registration(&input).valid);

        input.password_confirm = "other".into();
        let form = v.validate_registration(&input);
        assert_eq!(form.errors["passwordConfirm"], vec!["Пароли не совпадают"]);
    }

    #[test]
    fn test_goal_form() {
        let v = validator();
        let mut input = GoalInput {
            name: "Отпуск".into(),
            target: "1000".into(),
            saved: "".into(),
            deadline: "2026-12-31".into(),
        };
        assert!(v.validate_goal(&input).valid);

        input.saved = "2000".into();
        assert!(v.validate_goal(&input).errors.contains_key("saved"));

        input.saved = "0".into();
        input.deadline = "2026-10-18".into();
        let form = v.validate_goal(&input);
        assert_eq!(form.errors["deadline"], vec!["Дата дедлайна должна быть в будущем"]);
    }

    #[test]
    fn test_goal_form_edge_cases() {
        let v = validator();
        let base = GoalInput {
            name: "Ноутбук".into(),
            target: "1000".into(),
            saved: "".into(),
            deadline: "".into(),
        };
        assert!(v.validate_goal(&base).valid);

        let zero = GoalInput {
            target: "0".into(),
            ..base.clone()
        };
        let form = v.validate_goal(&zero);
        assert!(!form.valid);
        assert_eq!(form.errors["target"], vec!["Цель должна быть больше нуля"]);

        for deadline in ["2026-10-17", "2026-10-18"] {
            let form = v.validate_goal(&GoalInput {
                deadline: deadline.into(),
                ..base.clone()
            });
            assert_eq!(form.errors["deadline"], vec!["Дата дедлайна должна быть в будущем"], "{deadline}");
        }

        for deadline in ["31.12.2026", "2026-02-30"] {
            let form = v.validate_goal(&GoalInput {
                deadline: deadline.into(),
                ..base.clone()
            });
            assert!(form.errors.contains_key("deadline"), "{deadline}");
        }

        let tomorrow = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(v.parse_deadline("2026-10-19"), Ok(Some(tomorrow)));
        assert_eq!(v.parse_deadline(""), Ok(None));
    }

    #[test]
    fn test_budget_form() {
        let v = validator();
        let ok = BudgetInput {
            category: "Продукты".into(),
            limit: "500".into(),
        };
        assert!(v.validate_budget(&ok).valid);
        let zero = BudgetInput {
            limit: "0".into(),
            ..ok
        };
        assert!(!v.validate_budget(&zero).valid);
    }

    #[test]
    fn test_bundle_shape() {
        let v = validator();
        let mut data = UserData::default();
        assert!(v.validate_bundle(&data).valid);
        data.budgets.push(crate::finance::Budget::new(1, "Продукты", -5.0));
        let form = v.validate_bundle(&data);
        assert!(form.errors.contains_key("budgets[0].limit"));
        assert_eq!(form.messages().len(), 1);
    }
}
