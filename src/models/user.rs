//! User profile model for storage and API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Application role attached to a profile record.
///
/// Stored as `"student"`, `"admin"` or `null`; anything unrecognized reads as `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    Student,
    Admin,
    #[default]
    Unset,
}

impl Role {
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Role::Student => Some("student"),
            Role::Admin => Some("admin"),
            Role::Unset => None,
        }
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref() {
            Some("student") => Role::Student,
            Some("admin") => Role::Admin,
            _ => Role::Unset,
        })
    }
}

/// Profile record stored in the `users` collection, keyed by uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity provider uid (also used as document ID)
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// The signed-in user as seen by the rest of the application:
/// principal identity merged with the profile record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CurrentUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[cfg_attr(
        feature = "binding-generation",
        ts(type = "\"student\" | \"admin\" | null")
    )]
    pub role: Role,
}

impl CurrentUser {
    /// Merge a profile record with principal data.
    ///
    /// The profile name wins; the principal's display name fills in when it is missing.
    pub fn from_profile(profile: User, email: Option<String>, display_name: Option<String>) -> Self {
        Self {
            uid: profile.uid,
            email: email.or(profile.email),
            name: profile.name.filter(|n| !n.is_empty()).or(display_name),
            role: profile.role,
        }
    }

    /// Up to two leading characters of the name, upper-cased, for avatars.
    pub fn initials(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.chars().take(2).collect::<String>().to_uppercase(),
            None => "U".to_string(),
        }
    }
}
