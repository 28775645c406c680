use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::OidcError;

/// Verified ID token claim set.
///
/// Providers attach arbitrary claims, so this keeps the raw map and offers
/// typed accessors for the handful of claims the gateway needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(pub serde_json::Map<String, Value>);

impl Claims {
    /// String claim that must be present and non-empty.
    pub fn required_str(&self, name: &str) -> Result<&str, OidcError> {
        self.optional_str(name)
            .ok_or_else(|| OidcError::ClaimMissing(name.to_string()))
    }

    /// String claim, `None` if absent, non-string, or empty.
    pub fn optional_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}
