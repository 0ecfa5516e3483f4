//! Book genres.

use serde::{Deserialize, Serialize};

/// Catalog genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "genre", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    Fiction,
    NonFiction,
    Science,
    History,
    Technology,
    #[default]
    Other,
}
