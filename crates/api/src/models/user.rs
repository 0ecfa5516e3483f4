//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bookstore_core::{Email, Phone, UserId, UserRole, UserStatus};

/// A registered user. The password hash is never part of this type.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: Option<Phone>,
    pub email: Email,
    pub role: UserRole,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The caller identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl CurrentUser {
    /// Whether the caller has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
