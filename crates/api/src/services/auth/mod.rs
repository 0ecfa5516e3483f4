//! Authentication service.
//!
//! Password signup and login with argon2 hashes, and access-token issuance.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};

use bookstore_core::{Email, Phone, UserId, UserRole, UserStatus};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::{CurrentUser, User};
use crate::services::token::TokenKeys;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Signup request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Issued token plus the identity it carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
}

/// Signup fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub name: String,
    pub email: Email,
    pub phone: Option<Phone>,
    pub password: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    tokens: &'a TokenKeys,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenKeys) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens,
        }
    }

    /// Register a customer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidFields` with every failing field,
    /// `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip_all)]
    pub async fn signup(&self, input: &SignupInput) -> Result<AuthResponse, AuthError> {
        let valid = validate_signup(input).map_err(AuthError::InvalidFields)?;
        let user = register(&self.users, &valid, UserRole::Customer).await?;
        info!(user_id = %user.id, "Customer signed up");
        self.session_for(&user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::AccountInactive` for INACTIVE or BLOCKED accounts.
    #[instrument(skip_all)]
    pub async fn login(&self, input: &LoginInput) -> Result<AuthResponse, AuthError> {
        let email = Email::parse(&input.email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&input.password, &password_hash)?;

        if user.status != UserStatus::Active {
            return Err(AuthError::AccountInactive);
        }

        self.session_for(&user)
    }

    /// Load the account behind a token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account was deleted.
    pub async fn current(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    fn session_for(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let identity = CurrentUser {
            id: user.id,
            email: user.email.to_string(),
            role: user.role,
        };
        let token = self
            .tokens
            .issue(&identity, chrono::Utc::now().timestamp())?;

        Ok(AuthResponse {
            token,
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        })
    }
}

/// Create an account with an explicit role. Signup uses this for customers;
/// the CLI uses it for admins.
///
/// # Errors
///
/// Returns `AuthError::UserAlreadyExists` if the email is taken.
pub async fn register(
    users: &UserRepository<'_>,
    valid: &ValidSignup,
    role: UserRole,
) -> Result<User, AuthError> {
    let password_hash = hash_password(&valid.password)?;

    users
        .create(&NewUser {
            name: &valid.name,
            email: &valid.email,
            phone: valid.phone.as_ref(),
            password_hash: &password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
            other => AuthError::Repository(other),
        })
}

/// Validate every signup field, collecting all failures.
///
/// # Errors
///
/// Returns one message per invalid field.
pub fn validate_signup(input: &SignupInput) -> Result<ValidSignup, Vec<String>> {
    let mut errors = Vec::new();

    let name = input.name.trim();
    if name.is_empty() {
        errors.push("name: must not be empty".to_owned());
    }

    let email = Email::parse(&input.email)
        .map_err(|e| errors.push(format!("email: {e}")))
        .ok();

    if let Err(msg) = validate_password(&input.password) {
        errors.push(format!("password: {msg}"));
    }

    let phone = match input.phone.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Phone::parse(raw)
            .map_err(|e| errors.push(format!("phone: {e}")))
            .ok(),
    };

    match email {
        Some(email) if errors.is_empty() => Ok(ValidSignup {
            name: name.to_owned(),
            email,
            phone,
            password: input.password.clone(),
        }),
        _ => Err(errors),
    }
}

/// Validate password meets requirements: at least eight ASCII letters and
/// digits, with at least one of each.
fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("may only contain letters and digits".to_owned());
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err("must contain at least one letter and one digit".to_owned());
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
