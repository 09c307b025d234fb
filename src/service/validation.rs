//! Field-level validation primitives shared by every form.
//!
//! Each check records a message under the field name and returns the cleaned value, so a form
//! reports every bad field at once instead of stopping at the first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

/// Key for errors that belong to the form as a whole (e.g. a duplicate unique pair).
pub const NON_FIELD_ERRORS: &str = "__all__";
pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));
/// Plain decimal text: optional sign, digits, optional fraction. No exponent.
static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("decimal pattern compiles"));

/// Field name → messages. Serializes as a plain JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        FieldErrors(BTreeMap::new())
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Accumulates errors while cleaning raw form strings into typed values.
#[derive(Debug, Default)]
pub struct FieldValidator {
    errors: FieldErrors,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(field)
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// Required text, trimmed, at most `max` characters.
    pub fn text(&mut self, field: &str, value: &str, max: Option<usize>) -> Option<String> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        self.check_length(field, v, max).then(|| v.to_string())
    }

    /// Optional text; blank yields an empty string.
    pub fn optional_text(&mut self, field: &str, value: &str, max: Option<usize>) -> String {
        let v = value.trim();
        self.check_length(field, v, max);
        v.to_string()
    }

    fn check_length(&mut self, field: &str, v: &str, max: Option<usize>) -> bool {
        if let Some(max) = max {
            let len = v.chars().count();
            if len > max {
                self.add(
                    field,
                    format!("Ensure this value has at most {} characters (it has {}).", max, len),
                );
                return false;
            }
        }
        true
    }

    pub fn matches(&mut self, field: &str, value: &str, re: &Regex, message: &str) -> bool {
        if re.is_match(value) {
            true
        } else {
            self.add(field, message);
            false
        }
    }

    pub fn email(&mut self, field: &str, value: &str) -> Option<String> {
        let v = self.text(field, value, Some(254))?;
        self.matches(field, &v, &EMAIL_RE, "Enter a valid email address.")
            .then_some(v)
    }

    pub fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        self.parse_date(field, v)
    }

    pub fn optional_date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        self.parse_date(field, v)
    }

    fn parse_date(&mut self, field: &str, v: &str) -> Option<NaiveDate> {
        match parse_date(v) {
            Some(d) => Some(d),
            None => {
                self.add(field, "Enter a valid date.");
                None
            }
        }
    }

    /// Required timestamp; values without an offset are taken as UTC.
    pub fn datetime(&mut self, field: &str, value: &str) -> Option<DateTime<Utc>> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        match parse_datetime(v) {
            Some(dt) => Some(dt),
            None => {
                self.add(field, "Enter a valid date/time.");
                None
            }
        }
    }

    /// Required integer.
    pub fn integer(&mut self, field: &str, value: &str) -> Option<i32> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        match v.parse::<i32>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.add(field, "Enter a whole number.");
                None
            }
        }
    }

    /// Required integer ≥ 0.
    pub fn non_negative_integer(&mut self, field: &str, value: &str) -> Option<i32> {
        let n = self.integer(field, value)?;
        if n < 0 {
            self.add(field, "Ensure this value is greater than or equal to 0.");
            return None;
        }
        Some(n)
    }

    /// Required decimal ≥ 0 with at most 5 digits, 2 of them after the point.
    pub fn marks(&mut self, field: &str, value: &str) -> Option<f64> {
        const MAX_DIGITS: usize = 5;
        const DECIMAL_PLACES: usize = 2;
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        let parsed = DECIMAL_RE.is_match(v).then(|| v.parse::<f64>().ok()).flatten();
        let n = match parsed {
            Some(n) => n,
            None => {
                self.add(field, "Enter a number.");
                return None;
            }
        };
        let unsigned = v.trim_start_matches(['-', '+']);
        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let whole_digits = whole.trim_start_matches('0').len();
        let mut ok = true;
        if frac.len() > DECIMAL_PLACES {
            self.add(
                field,
                format!("Ensure that there are no more than {} decimal places.", DECIMAL_PLACES),
            );
            ok = false;
        }
        if whole_digits > MAX_DIGITS - DECIMAL_PLACES {
            self.add(
                field,
                format!("Ensure that there are no more than {} digits in total.", MAX_DIGITS),
            );
            ok = false;
        }
        if n < 0.0 {
            self.add(field, "Ensure this value is greater than or equal to 0.");
            ok = false;
        }
        ok.then_some(n)
    }

    /// Required foreign-key id. Existence is checked separately against the store.
    pub fn reference(&mut self, field: &str, value: &str) -> Option<i64> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        self.parse_reference(field, v)
    }

    pub fn optional_reference(&mut self, field: &str, value: &str) -> Option<i64> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        self.parse_reference(field, v)
    }

    fn parse_reference(&mut self, field: &str, v: &str) -> Option<i64> {
        match v.parse::<i64>() {
            Ok(id) if id > 0 => Some(id),
            _ => {
                self.add(field, INVALID_CHOICE);
                None
            }
        }
    }

    /// Required value from an enumerated set.
    pub fn choice<T: FromStr>(&mut self, field: &str, value: &str) -> Option<T> {
        let v = value.trim();
        if v.is_empty() {
            self.add(field, REQUIRED);
            return None;
        }
        self.parse_choice(field, v)
    }

    /// Optional enumerated value; blank means "none".
    pub fn optional_choice<T: FromStr>(&mut self, field: &str, value: &str) -> Option<T> {
        let v = value.trim();
        if v.is_empty() {
            return None;
        }
        self.parse_choice(field, v)
    }

    fn parse_choice<T: FromStr>(&mut self, field: &str, v: &str) -> Option<T> {
        match v.parse::<T>() {
            Ok(t) => Some(t),
            Err(_) => {
                self.add(
                    field,
                    format!("Select a valid choice. {} is not one of the available choices.", v),
                );
                None
            }
        }
    }
}

pub fn parse_date(v: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(v, "%Y-%m-%d").ok()
}

pub fn parse_datetime(v: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(v, f).ok())
        .map(|naive| naive.and_utc())
}

/// HTML checkbox semantics: a missing field is unchecked.
pub fn checkbox(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("on" | "true" | "1" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn collects_every_failing_field() {
        let mut v = FieldValidator::new();
        assert!(v.text("title", "  ", Some(10)).is_none());
        assert!(v.date("exam_date", "2024-13-40").is_none());
        assert!(v.marks("total_marks", "-1").is_none());
        let errors = v.into_errors();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["exam_date", "title", "total_marks"]);
        assert_eq!(errors.get("title").unwrap(), [REQUIRED.to_string()]);
    }

    #[test]
    fn marks_enforce_decimal_shape() {
        let mut v = FieldValidator::new();
        assert_eq!(v.marks("m", "85.5"), Some(85.5));
        assert_eq!(v.marks("m", "0"), Some(0.0));
        assert_eq!(v.marks("m", "999.99"), Some(999.99));
        assert!(v.finish().is_ok());

        let mut v = FieldValidator::new();
        assert!(v.marks("a", "1.234").is_none());
        assert!(v.marks("b", "1000").is_none());
        assert!(v.marks("c", "abc").is_none());
        assert!(v.marks("d", "1e2").is_none());
        assert!(v.marks("e", "inf").is_none());
        let errors = v.into_errors();
        assert!(errors.contains("a") && errors.contains("b") && errors.contains("c"));
        assert_eq!(errors.get("d").unwrap(), ["Enter a number.".to_string()]);
        assert!(errors.contains("e"));
    }

    #[test]
    fn text_length_limit() {
        let mut v = FieldValidator::new();
        assert!(v.text("code", "ABCDEFGHIJK", Some(10)).is_none());
        assert_eq!(v.text("name", "  Maths ", Some(10)), Some("Maths".to_string()));
        let errors = v.into_errors();
        assert!(errors.get("code").unwrap()[0].contains("at most 10 characters (it has 11)"));
    }

    #[test]
    fn choices_and_references() {
        let mut v = FieldValidator::new();
        assert_eq!(v.choice::<Role>("role", "teacher"), Some(Role::Teacher));
        assert_eq!(v.optional_choice::<Role>("target_role", ""), None);
        assert_eq!(v.optional_reference("parent", ""), None);
        assert_eq!(v.reference("student", "12"), Some(12));
        assert!(v.finish().is_ok());

        let mut v = FieldValidator::new();
        assert!(v.choice::<Role>("role", "janitor").is_none());
        assert!(v.reference("student", "abc").is_none());
        assert!(v.reference("subject", "").is_none());
        let errors = v.into_errors();
        assert_eq!(errors.get("student").unwrap()[0], INVALID_CHOICE);
        assert_eq!(errors.get("subject").unwrap()[0], REQUIRED);
    }

    #[test]
    fn datetimes_accept_form_and_rfc3339_inputs() {
        assert!(parse_datetime("2024-05-01T14:30").is_some());
        assert!(parse_datetime("2024-05-01 14:30:15").is_some());
        assert_eq!(
            parse_datetime("2024-05-01T14:30:00+02:00").unwrap(),
            parse_datetime("2024-05-01T12:30").unwrap()
        );
        assert!(parse_datetime("tomorrow").is_none());
    }

    #[test]
    fn email_shape() {
        let mut v = FieldValidator::new();
        assert!(v.email("email", "jane@school.test").is_some());
        assert!(v.email("email2", "jane").is_none());
        assert!(v.has_error("email2"));
    }

    #[test]
    fn checkbox_values() {
        assert!(checkbox(Some("on")));
        assert!(!checkbox(Some("")));
        assert!(!checkbox(None));
    }
}
