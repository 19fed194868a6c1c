//! User model
//!
//! A user is one identity linked to the OAuth provider. The local `id` is
//! the surrogate key; `external_id` is the provider's id and the natural key
//! used for upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity linked to a provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Local identifier
    pub id: i64,
    /// Provider-assigned identifier (unique, immutable)
    pub external_id: i64,
    /// Provider login handle
    pub login: String,
    /// Display name, if the provider profile has one
    pub display_name: Option<String>,
    /// Public email, if shared by the provider. Stored, never sent to clients.
    #[serde(skip_serializing)]
    pub email: Option<String>,
    /// Avatar image URL
    pub avatar_url: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last profile refresh
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name shown next to guestbook entries
    pub fn public_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.login)
    }

    /// Overwrite the mutable profile fields from a fresh provider profile
    pub fn apply_profile(&mut self, profile: &ProviderProfile) {
        self.login = profile.login.clone();
        self.display_name = profile.display_name.clone();
        self.email = profile.email.clone();
        self.avatar_url = profile.avatar_url.clone();
    }
}

/// Profile returned by the identity provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub external_id: i64,
    pub login: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            external_id: 42,
            login: "alice".to_string(),
            display_name: Some("Alice".to_string()),
            email: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_public_name_prefers_display_name() {
        let mut user = test_user();
        assert_eq!(user.public_name(), "Alice");

        user.display_name = Some("  ".to_string());
        assert_eq!(user.public_name(), "alice");

        user.display_name = None;
        assert_eq!(user.public_name(), "alice");
    }

    #[test]
    fn test_apply_profile_keeps_identity() {
        let mut user = test_user();
        let profile = ProviderProfile {
            external_id: 42,
            login: "alice2".to_string(),
            display_name: None,
            email: Some("alice@example.com".to_string()),
            avatar_url: Some("https://avatars.example/42".to_string()),
        };

        user.apply_profile(&profile);

        assert_eq!(user.id, 1);
        assert_eq!(user.external_id, 42);
        assert_eq!(user.login, "alice2");
        assert_eq!(user.display_name, None);
        assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_serialize_omits_email() {
        let mut user = test_user();
        user.email = Some("alice@example.com".to_string());

        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["login"], "alice");
        assert_eq!(json["external_id"], 42);
        assert!(json.get("email").is_none());
    }
}
