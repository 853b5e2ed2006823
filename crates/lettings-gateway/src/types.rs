//! Wire types for the auth gateway REST surface.
//!
//! Field names follow the backend's camelCase JSON convention.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// User role as reported by the gateway.
///
/// The set of known roles is closed, but deserialization is total: an
/// unrecognized role string is preserved as [`Role::Other`] rather than
/// failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Landlord,
    Tenant,
    Agent,
    ServiceProvider,
    Caretaker,
    Other(String),
}

impl Role {
    /// The wire string for this role.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Landlord => "landlord",
            Role::Tenant => "tenant",
            Role::Agent => "agent",
            Role::ServiceProvider => "service-provider",
            Role::Caretaker => "caretaker",
            Role::Other(s) => s,
        }
    }

    /// Parse a wire string into a role. Never fails; unknown strings map
    /// to [`Role::Other`].
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "landlord" => Role::Landlord,
            "tenant" => Role::Tenant,
            "agent" => Role::Agent,
            "service-provider" => Role::ServiceProvider,
            "caretaker" => Role::Caretaker,
            other => Role::Other(other.to_string()),
        }
    }

    /// The landing route an authenticated user of this role is sent to.
    ///
    /// The mapping is total: roles without a dedicated area land on the
    /// generic dashboard.
    pub fn landing_route(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Landlord => "/landlord",
            Role::Tenant => "/tenant",
            Role::Agent => "/agent",
            Role::ServiceProvider => "/service-provider",
            _ => "/dashboard",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse(&s))
    }
}

/// User record returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    /// Whether the account's email has been verified
    #[serde(default)]
    pub is_verified: bool,
    /// Capability strings, populated for caretaker accounts
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Agent-specific referral code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Agent-specific referral code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_code: Option<String>,
    /// Caretaker capability grants
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub permissions: Vec<String>,
}

/// Response payload for login and register.
///
/// A complete success carries `success = true` plus both tokens and the
/// user record; anything less is returned verbatim for the caller to
/// inspect.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthPayload {
    /// True when the payload carries everything a session needs: both
    /// tokens and a user record.
    pub fn is_complete(&self) -> bool {
        self.success && self.token.is_some() && self.refresh_token.is_some() && self.user.is_some()
    }

    /// A failure payload carrying only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Response payload for a token refresh.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RefreshPayload {
    /// True when the payload carries a fresh token pair.
    pub fn is_complete(&self) -> bool {
        self.success && self.token.is_some() && self.refresh_token.is_some()
    }
}
