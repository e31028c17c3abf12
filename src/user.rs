//! The user profile record created when someone signs up.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A newtype wrapper for the user IDs issued by the identity service.
///
/// This helps disambiguate user IDs from the other string IDs that flow
/// through the app (account IDs, item IDs, record IDs).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The user ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application as stored in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The ID the identity service assigned to the user.
    pub user_id: UserId,
    /// The user's email address.
    pub email: String,
    /// The user's first name.
    pub first_name: String,
    /// The user's last name.
    pub last_name: String,
    /// The ID of the user's customer record on the payment rail.
    pub customer_id: String,
    /// The URL of the user's customer record on the payment rail.
    pub customer_url: String,
}

impl User {
    /// The user's first and last name separated by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The fields needed to create a user record.
pub type NewUser = User;
