//! User (owner) and user profile (exclusively-owned singleton) models.
//!
//! # Invariants
//! - `id` is assigned by storage on create and never changes afterwards.
//! - `orders` only changes through `association::attach`/`detach`, so every
//!   listed order points back at this user.
//! - The profile is held by value; no two users can share one instance.

use crate::model::order::Order;
use crate::model::validation::{
    check_date_of_birth, check_email, check_username, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Storage-assigned user identifier.
pub type UserId = i64;

/// Storage-assigned profile identifier.
pub type ProfileId = i64;

/// Personal details owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(skip_deserializing)]
    pub(crate) id: Option<ProfileId>,
    pub first_name: String,
    pub last_name: String,
    /// ISO day, `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

impl UserProfile {
    /// Creates an unsaved profile with trimmed, non-blank names.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let profile = Self {
            id: None,
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            date_of_birth: None,
            bio: None,
            phone_number: None,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Sets the date of birth, validating the `YYYY-MM-DD` shape.
    pub fn with_date_of_birth(
        mut self,
        date_of_birth: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let value = date_of_birth.into().trim().to_string();
        check_date_of_birth(&value)?;
        self.date_of_birth = Some(value);
        Ok(self)
    }

    pub fn id(&self) -> Option<ProfileId> {
        self.id
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::BlankFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::BlankLastName);
        }
        if let Some(value) = self.date_of_birth.as_deref() {
            check_date_of_birth(value)?;
        }
        Ok(())
    }
}

/// Partial profile update. Both fields are written as given; `None` clears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub phone_number: Option<String>,
}

/// Account record owning one optional profile and many orders.
///
/// Identity, timestamps and the order collection are never read from
/// serialized input; orders only arrive through `association::attach` or a
/// storage load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_deserializing)]
    pub(crate) id: Option<UserId>,
    /// Unique natural key.
    pub username: String,
    pub email: String,
    pub(crate) profile: Option<UserProfile>,
    #[serde(skip_deserializing)]
    pub(crate) orders: Vec<Order>,
    #[serde(skip_deserializing)]
    pub(crate) created_at: Option<i64>,
    #[serde(skip_deserializing)]
    pub(crate) updated_at: Option<i64>,
}

impl User {
    /// Creates an unsaved user with no profile and no orders.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let user = Self {
            id: None,
            username: username.into().trim().to_string(),
            email: email.into().trim().to_string(),
            profile: None,
            orders: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        user.validate()?;
        Ok(user)
    }

    /// Creates a user whose identity already exists in storage.
    ///
    /// The order collection starts empty; callers that need it populated
    /// should load the user through a repository instead.
    pub fn with_id(
        id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let mut user = Self::new(username, email)?;
        user.id = Some(id);
        Ok(user)
    }

    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Installs `profile`, returning the one it replaces.
    ///
    /// The returned profile is an orphan and no longer reachable from any
    /// user.
    pub fn set_profile(&mut self, profile: Option<UserProfile>) -> Option<UserProfile> {
        std::mem::replace(&mut self.profile, profile)
    }

    /// Orders in insertion order.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_username(&self.username)?;
        check_email(&self.email)?;
        if let Some(profile) = self.profile.as_ref() {
            profile.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserProfile};
    use crate::model::validation::ValidationError;

    #[test]
    fn new_user_starts_without_dependents() {
        let user = User::new("alice", "alice@example.com").unwrap();
        assert_eq!(user.id(), None);
        assert!(user.profile().is_none());
        assert!(user.orders().is_empty());
    }

    #[test]
    fn profile_rejects_blank_names() {
        assert_eq!(
            UserProfile::new("  ", "Johnson").unwrap_err(),
            ValidationError::BlankFirstName
        );
        assert_eq!(
            UserProfile::new("Alice", "").unwrap_err(),
            ValidationError::BlankLastName
        );
    }

    #[test]
    fn user_deserialization_ignores_identity_and_orders() {
        let user: User = serde_json::from_str(
            r#"{"id": 5, "username": "alice", "email": "alice@example.com",
                "profile": {"id": 9, "first_name": "Alice", "last_name": "Johnson",
                            "date_of_birth": null, "bio": null, "phone_number": null},
                "orders": [{"order_number": "ORD-1", "total_amount": 100, "status": "pending"}],
                "created_at": 1, "updated_at": 2}"#,
        )
        .unwrap();

        assert_eq!(user.id(), None);
        assert!(user.orders().is_empty());
        assert_eq!(user.created_at(), None);
        assert_eq!(user.profile().unwrap().id(), None);
        assert_eq!(user.profile().unwrap().full_name(), "Alice Johnson");
    }

    #[test]
    fn set_profile_returns_replaced_profile() {
        let mut user = User::new("alice", "alice@example.com").unwrap();
        let first = UserProfile::new("Alice", "Johnson").unwrap();
        let second = UserProfile::new("Alice", "Smith").unwrap();

        assert!(user.set_profile(Some(first.clone())).is_none());
        assert_eq!(user.set_profile(Some(second)), Some(first));
        assert_eq!(user.profile().unwrap().full_name(), "Alice Smith");
    }
}
