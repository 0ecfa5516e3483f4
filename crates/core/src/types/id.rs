//! Newtype IDs for type-safe entity references.
//!
//! Every table in the bookstore uses a `SERIAL` primary key. Wrapping each key
//! in its own type keeps a `BookId` from being passed where a `BagId` is
//! expected.

/// Define a type-safe ID wrapper around `i32`.
///
/// The generated type is `Copy`, serializes transparently, parses from a
/// string (for path segments), and encodes as `INT4` with the `postgres`
/// feature.
///
/// ```rust
/// # use bookstore_core::define_id;
/// define_id!(ShelfId);
///
/// let shelf = ShelfId::new(7);
/// assert_eq!(shelf.as_i32(), 7);
/// assert_eq!("7".parse::<ShelfId>().ok(), Some(shelf));
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database key.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw database key.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(UserId);
define_id!(AuthorId);
define_id!(BookId);
define_id!(BagId);
define_id!(BagItemId);
define_id!(OrderId);
define_id!(StockMovementId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_path_segment() {
        assert_eq!("42".parse::<BookId>().unwrap(), BookId::new(42));
        assert_eq!(" 3 ".parse::<BagItemId>().unwrap().as_i32(), 3);
        assert!("abc".parse::<OrderId>().is_err());
    }

    #[test]
    fn test_serializes_transparently() {
        let json = serde_json::to_string(&UserId::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UserId::new(9));
    }

    #[test]
    fn test_ordering_follows_raw_key() {
        let mut ids = vec![BookId::new(5), BookId::new(1), BookId::new(3)];
        ids.sort();
        assert_eq!(ids, vec![BookId::new(1), BookId::new(3), BookId::new(5)]);
    }
}
