//! Core types for the bookstore.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod genre;
pub mod id;
pub mod isbn;
pub mod phone;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use genre::Genre;
pub use id::*;
pub use isbn::{Isbn, IsbnError};
pub use phone::{Phone, PhoneError};
pub use price::{Price, PriceError};
pub use status::*;
