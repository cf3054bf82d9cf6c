// Value normalization for duplicate matching

use once_cell::sync::Lazy;
use regex::Regex;
use crate::config::DEFAULT_COUNTRY_PREFIX;
use crate::models::{is_phone_name, FieldKind};

/// Normalized values shorter than this never take part in a match key
pub const MIN_MATCH_LEN: usize = 2;

static PHONE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-()+]").unwrap());

/// How a field's values are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Phone,
    Email,
    Plain,
}

impl ValueKind {
    /// Classify a field. A declared schema type wins over the field name.
    pub fn classify(field_name: &str, schema: Option<FieldKind>) -> Self {
        match schema {
            Some(FieldKind::Phone) => return ValueKind::Phone,
            Some(FieldKind::Email) => return ValueKind::Email,
            _ => {}
        }
        if is_phone_name(field_name) {
            ValueKind::Phone
        } else if field_name.to_lowercase().contains("mail") {
            ValueKind::Email
        } else {
            ValueKind::Plain
        }
    }
}

/// Normalizes raw attribute values so equivalent spellings compare equal.
///
/// Every normalization is idempotent: feeding an output back in returns it
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    country_prefix: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTRY_PREFIX)
    }
}

impl Normalizer {
    pub fn new(country_prefix: &str) -> Self {
        Self { country_prefix: country_prefix.trim().to_string() }
    }

    pub fn normalize(&self, kind: ValueKind, raw: &str) -> String {
        match kind {
            ValueKind::Phone => self.normalize_phone(raw),
            ValueKind::Email | ValueKind::Plain => raw.trim().to_lowercase(),
        }
    }

    /// Strip separators and `+`, then peel international prefixes.
    ///
    /// `00` and the country prefix are removed repeatedly until neither
    /// leads the string, so "+370 600 12345", "0037060012345" and
    /// "60012345" all become "60012345".
    pub fn normalize_phone(&self, raw: &str) -> String {
        let mut digits = PHONE_NOISE.replace_all(raw, "").to_lowercase();
        loop {
            if let Some(rest) = digits.strip_prefix("00") {
                digits = rest.to_string();
            } else if let Some(rest) = self.strip_country_prefix(&digits) {
                digits = rest;
            } else {
                return digits;
            }
        }
    }

    fn strip_country_prefix(&self, digits: &str) -> Option<String> {
        if self.country_prefix.is_empty() {
            return None;
        }
        digits.strip_prefix(self.country_prefix.as_str()).map(str::to_string)
    }
}
