//! Newtype IDs for type-safe entity references.
//!
//! Every persisted record uses a `SERIAL` primary key. The `define_id!` macro
//! wraps that `i32` so a `SaleId` can never be passed where a `ProductId` is
//! expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()`, `as_i32()`, `Display`, `FromStr`, `From<i32>` and `Into<i32>`
/// - `sqlx` `Type`, `Encode`, `Decode` and array support (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use counterline_core::define_id;
/// define_id!(TicketId);
/// define_id!(DrawerId);
///
/// let ticket = TicketId::new(7);
/// assert_eq!(ticket.to_string(), "7");
/// assert_eq!("7".parse::<TicketId>().unwrap(), ticket);
///
/// // These are different types, so this won't compile:
/// // let _: DrawerId = ticket;
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
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
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
        impl ::sqlx::postgres::PgHasArrayType for $name {
            fn array_type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::postgres::PgHasArrayType>::array_type_info()
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
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

// Store and catalog
define_id!(StoreId);
define_id!(ProductId);
define_id!(ProductImageId);
define_id!(FamilyId);
define_id!(UnitId);
define_id!(WarehouseId);
define_id!(AdId);

// Selling
define_id!(OrderId);
define_id!(SaleId);
define_id!(CashSessionId);
define_id!(CustomerId);

// Settings
define_id!(CurrencyRateId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&SaleId::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: ProductId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed.as_i32(), 9);
    }

    #[test]
    fn test_id_from_str_trims() {
        assert_eq!(" 12 ".parse::<OrderId>().unwrap(), OrderId::new(12));
        assert!("twelve".parse::<OrderId>().is_err());
    }

    #[test]
    fn test_id_ordering_follows_inner_value() {
        let mut ids = vec![SaleId::new(3), SaleId::new(1), SaleId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![SaleId::new(1), SaleId::new(2), SaleId::new(3)]);
    }
}
