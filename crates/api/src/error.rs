//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Service errors convert
//! into `AppError` with `?`; the response is a JSON body
//! `{"message": "...", "errors": [...]}` where `errors` lists per-field
//! validation failures. Server errors are captured to Sentry and their
//! details never reach the client.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;

/// Message returned with every field-validation failure.
pub const INVALID_FIELDS: &str = "Invalid Data in Fields";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Bag mutation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Per-field validation failures.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [String]>,
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidFields(_) | AuthError::UserAlreadyExists => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AuthError::InvalidCredentials | AuthError::UserNotFound | AuthError::Token(_) => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::AccountInactive => StatusCode::FORBIDDEN,
                AuthError::Repository(err) => repository_status(err),
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::InvalidQuantity
                | CartError::TotalTooLarge
                | CartError::BookInactive(_)
                | CartError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
                CartError::BookNotFound(_)
                | CartError::EmptyBag
                | CartError::NotInBag(_)
                | CartError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                CartError::RemoveExceedsQuantity { .. } => StatusCode::CONFLICT,
                CartError::Repository(err) => repository_status(err),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::NOT_FOUND,
                CheckoutError::MissingAddress => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::TotalTooLarge => StatusCode::BAD_REQUEST,
                CheckoutError::BookGone(_)
                | CheckoutError::BookInactive(_)
                | CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::Repository(err) => repository_status(err),
            },
            Self::Order(err) => match err {
                OrderError::NotFound(_) | OrderError::ProfileNotFound => StatusCode::NOT_FOUND,
                OrderError::Forbidden(_) => StatusCode::FORBIDDEN,
                OrderError::InvalidTransition { .. } => StatusCode::CONFLICT,
                OrderError::Repository(err) => repository_status(err),
            },
            Self::Catalog(err) => match err {
                CatalogError::InvalidFields(_) => StatusCode::UNPROCESSABLE_ENTITY,
                CatalogError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CatalogError::BookNotFound(_) | CatalogError::AuthorNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                CatalogError::IsbnTaken | CatalogError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                CatalogError::Repository(err) => repository_status(err),
            },
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn field_errors(&self) -> Option<&[String]> {
        match self {
            Self::Validation(errors)
            | Self::Auth(AuthError::InvalidFields(errors))
            | Self::Catalog(CatalogError::InvalidFields(errors)) => Some(errors),
            _ => None,
        }
    }

    /// Client-facing message. Server errors get a generic message.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return "Internal server error".to_string();
        }
        if self.field_errors().is_some() {
            return INVALID_FIELDS.to_string();
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::UserAlreadyExists => "User already exists".to_string(),
                AuthError::AccountInactive => "Account is not active".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::Token(_) => "Invalid or expired token".to_string(),
                _ => "Authentication error".to_string(),
            },
            Self::Checkout(CheckoutError::MissingAddress) => INVALID_FIELDS.to_string(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::BadRequest(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let address_error;
        let errors = match &self {
            Self::Checkout(err @ CheckoutError::MissingAddress) => {
                address_error = [err.to_string()];
                Some(&address_error[..])
            }
            _ => self.field_errors(),
        };

        let body = ErrorBody {
            message: self.public_message(),
            errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Prefix axum puts in front of body deserialization errors.
const JSON_DATA_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // Well-formed JSON with a wrong type or missing field
            JsonRejection::JsonDataError(err) => {
                let text = err.body_text();
                let field = text.strip_prefix(JSON_DATA_PREFIX).unwrap_or(&text);
                Self::Validation(vec![field.to_string()])
            }
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bookstore_core::{BookId, OrderStatus};

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::Validation(vec!["a: bad".to_string(), "b: worse".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a: bad; b: worse");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_domain_status_codes() {
        assert_eq!(
            AppError::from(AuthError::UserAlreadyExists).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(AuthError::AccountInactive).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(CartError::InsufficientStock {
                title: "Dune".to_string(),
                available: 1,
                requested: 2
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::from(CartError::EmptyBag).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(CartError::TotalTooLarge).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CheckoutError::TotalTooLarge).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CartError::RemoveExceedsQuantity {
                title: "Dune".to_string(),
                present: 1,
                requested: 2
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CheckoutError::EmptyCart).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CheckoutError::InsufficientStock {
                title: "Dune".to_string(),
                available: 0,
                requested: 1
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Cancelled
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CatalogError::BookNotFound(BookId::new(1))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(RepositoryError::Conflict("x".to_string())).status(),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let (status, body) = body_json(AppError::from(AuthError::InvalidFields(vec![
            "email: email cannot be empty".to_string(),
            "password: must be at least 8 characters".to_string(),
        ])))
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], INVALID_FIELDS);
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_address_is_a_field_error() {
        let (status, body) = body_json(AppError::from(CheckoutError::MissingAddress)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0], "address: must not be empty");
    }

    #[tokio::test]
    async fn test_checkout_stock_message_names_book() {
        let (_, body) = body_json(AppError::from(CheckoutError::InsufficientStock {
            title: "Dune".to_string(),
            available: 1,
            requested: 3,
        }))
        .await;

        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Dune"));
        assert!(message.contains("1 available"));
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let (status, body) = body_json(AppError::from(RepositoryError::DataCorruption(
            "negative quantity in bag_items".to_string(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
