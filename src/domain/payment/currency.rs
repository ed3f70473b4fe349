//! Currency code value object.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// ISO 4217 codes the pipeline accepts.
///
/// Matches the currencies the provider account is configured to settle in.
static RECOGNIZED_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "AUD", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF", "IDR", "ILS",
        "INR", "JPY", "KRW", "MXN", "MYR", "NOK", "NZD", "PHP", "PLN", "RON", "SEK", "SGD", "THB",
        "TRY", "USD", "ZAR",
    ]
    .into_iter()
    .collect()
});

/// Recognized ISO 4217 currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses a currency code, normalizing to upper case.
    ///
    /// Providers commonly send lower-case codes (`"usd"`); the internal
    /// representation is always the upper-case ISO form.
    pub fn parse(code: &str) -> Result<Self, ValidationError> {
        let normalized = code.trim().to_ascii_uppercase();
        if !RECOGNIZED_CODES.contains(normalized.as_str()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not a recognized ISO 4217 code", code),
            ));
        }
        Ok(Self(normalized))
    }

    /// Returns the upper-case code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
