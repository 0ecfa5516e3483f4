//! Customer profile.

use serde::Serialize;

use super::user::User;

/// Order history and known delivery addresses for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: User,
    /// Distinct addresses in the order they were first used.
    pub addresses: Vec<String>,
    /// Order numbers, newest first.
    pub orders: Vec<String>,
}
