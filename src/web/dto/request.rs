//! Request DTOs for the HTTP surface.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Loose boolean: `false`, `0`, `""` and `null` are false, anything else true.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Login request.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(default, deserialize_with = "null_as_default")]
    pub identifier: String,
    /// Password.
    #[serde(default, deserialize_with = "null_as_default")]
    pub password: String,
    /// Keep the session for 30 days instead of 8 hours.
    #[serde(default, deserialize_with = "truthy")]
    pub remember: bool,
}

impl LoginRequest {
    /// Identifier as compared against accounts.
    pub fn normalized_identifier(&self) -> String {
        self.identifier.trim().to_lowercase()
    }
}

/// Signup request.
#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    /// Username.
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    /// Email.
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    /// Password.
    #[serde(default, deserialize_with = "null_as_default")]
    pub password: String,
    /// Password confirmation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub confirm: String,
}

/// Bootstrap request.
#[derive(Debug, Default, Deserialize)]
pub struct BootstrapRequest {
    /// Email of the account to create.
    #[serde(default)]
    pub email: Option<String>,
    /// Initial password.
    #[serde(default)]
    pub password: Option<String>,
}

/// `?id=` query of the update and delete endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    /// Row identifier.
    #[serde(default)]
    pub id: Option<String>,
}

impl IdQuery {
    /// Non-empty id or `None`.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}
