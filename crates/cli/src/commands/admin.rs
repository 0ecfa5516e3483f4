//! Admin account management.
//!
//! Signup over HTTP always creates customers; admins are created here.
//!
//! ```bash
//! bookstore-cli admin create -e admin@example.com -n "Admin Name" -p 'Shelf2024secret'
//! ```

use bookstore_api::db::UserRepository;
use bookstore_api::services::auth::{AuthError, SignupInput, register, validate_signup};
use bookstore_core::{UserId, UserRole};

/// Create an admin account.
///
/// # Errors
///
/// Returns an error listing every invalid field, if the email is taken, or
/// if the database is unreachable.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
) -> Result<UserId, Box<dyn std::error::Error>> {
    let input = SignupInput {
        name: name.to_owned(),
        email: email.to_owned(),
        password: password.to_owned(),
        phone: None,
    };
    let valid = validate_signup(&input).map_err(|errors| errors.join(", "))?;

    let pool = super::connect().await?;

    tracing::info!("Creating admin user: {}", valid.email);
    let user = match register(&UserRepository::new(&pool), &valid, UserRole::Admin).await {
        Ok(user) => user,
        Err(AuthError::UserAlreadyExists) => {
            return Err(format!("User already exists with email: {email}").into());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
