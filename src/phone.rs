//! Ugandan mobile number normalization
//!
//! Every phone number entering the system is normalized to the canonical
//! `+2567XXXXXXXX` / `+2563XXXXXXXX` form before it is stored, throttled
//! against or sent to a provider. Raw input may use a local (`07…`),
//! short-code (`2567…`) or international (`+2567…`) prefix.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    #[error("invalid Ugandan mobile number: {input}")]
    InvalidPhone { input: String },
}

fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+256[73]\d{8}$").expect("canonical phone pattern"))
}

/// A Ugandan mobile number in canonical international form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize raw user input into the canonical `+256…` form.
    ///
    /// Non-digit characters (spaces, dashes, the leading `+`) are stripped
    /// before prefix matching. A recognized prefix (`0`, `256` or `+256`) is
    /// required; a bare subscriber number is rejected.
    pub fn normalize(raw: &str) -> Result<Self, PhoneError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        let subscriber = if let Some(rest) = digits.strip_prefix("256") {
            Some(rest)
        } else {
            digits.strip_prefix('0')
        };

        let candidate = match subscriber {
            Some(rest) => format!("+256{rest}"),
            None => {
                return Err(PhoneError::InvalidPhone {
                    input: raw.to_string(),
                })
            }
        };

        if canonical_pattern().is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(PhoneError::InvalidPhone {
                input: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The number without the leading `+`, as most provider APIs expect it.
    pub fn msisdn(&self) -> &str {
        self.0.trim_start_matches('+')
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_accepted_prefixes_normalize_to_the_same_canonical_value() {
        for raw in ["0771234567", "256771234567", "+256771234567"] {
            let phone = PhoneNumber::normalize(raw).expect(raw);
            assert_eq!(phone.as_str(), "+256771234567", "input {raw}");
        }
    }

    #[test]
    fn separators_are_stripped_before_matching() {
        let cases = [
            ("077 123 4567", "+256771234567"),
            ("077-123-4567", "+256771234567"),
            ("+256 771 234 567", "+256771234567"),
            ("(0)771234567", "+256771234567"),
        ];
        for (raw, canonical) in cases {
            assert_eq!(PhoneNumber::normalize(raw).expect(raw).as_str(), canonical);
        }
    }

    #[test]
    fn three_series_subscribers_are_accepted() {
        let phone = PhoneNumber::normalize("0312345678").expect("3-series number");
        assert_eq!(phone.as_str(), "+256312345678");
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let cases = [
            "",
            "   ",
            "771234567",      // bare subscriber, no prefix
            "0661234567",     // subscriber must start with 7 or 3
            "077123456",      // too short
            "07712345678",    // too long
            "25677123456",    // short after 256 prefix
            "2567712345678",  // long after 256 prefix
            "+254771234567",  // wrong country code
            "not-a-number",
            "07712345ab",
        ];
        for raw in cases {
            assert!(
                matches!(
                    PhoneNumber::normalize(raw),
                    Err(PhoneError::InvalidPhone { .. })
                ),
                "expected rejection for {raw:?}"
            );
        }
    }

    #[test]
    fn msisdn_drops_the_plus_sign() {
        let phone = PhoneNumber::normalize("0701234567").unwrap();
        assert_eq!(phone.msisdn(), "256701234567");
    }

    #[test]
    fn canonical_form_serializes_transparently() {
        let phone = PhoneNumber::normalize("0771234567").unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+256771234567\"");
    }
}
