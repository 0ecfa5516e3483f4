//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::token::TokenError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more signup fields are invalid.
    #[error("invalid data in fields: {}", .0.join("; "))]
    InvalidFields(Vec<String>),

    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but is not ACTIVE.
    #[error("account is not active")]
    AccountInactive,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
