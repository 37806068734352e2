//! Form validation.
//!
//! Predicates are plain functions; [`Validator`] collects the messages for
//! whichever of them failed. Handlers embed a `Validator` in their form type,
//! run every check, and re-render the page with the collected errors when
//! [`Validator::is_valid`] says no.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Loose email shape check, as recommended by the WHATWG for `type=email`.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// Field errors keyed by field name, plus errors about the form as a whole.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Validator {
    pub field_errors: HashMap<String, String>,
    pub non_field_errors: Vec<String>,
}

impl Validator {
    /// True iff no error of either kind was recorded.
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Record `message` for `key` unless `key` already has one.
    pub fn add_field_error(&mut self, key: &str, message: &str) {
        self.field_errors
            .entry(key.to_owned())
            .or_insert_with(|| message.to_owned());
    }

    pub fn add_non_field_error(&mut self, message: &str) {
        self.non_field_errors.push(message.to_owned());
    }

    /// Record `message` for `key` if the check failed. The first failure
    /// recorded for a field is the one the user sees.
    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

/// Something other than whitespace.
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// At most `n` characters. Counts Unicode scalar values, not bytes.
pub fn max_length(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

/// At least `n` characters. Counts Unicode scalar values, not bytes.
pub fn min_length(value: &str, n: usize) -> bool {
    value.chars().count() >= n
}

pub fn matches_pattern(value: &str, pattern: &Regex) -> bool {
    pattern.is_match(value)
}

pub fn is_one_of<T: PartialEq>(value: &T, allowed: &[T]) -> bool {
    allowed.contains(value)
}
