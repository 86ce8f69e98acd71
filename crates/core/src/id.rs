//! Strongly-typed identifiers used across the domain.
//!
//! Domain crates declare their own UUID-backed ids with [`uuid_newtype!`]; the
//! core itself only needs [`AggregateId`] to key event streams.

/// Declare a UUID-backed identifier newtype.
///
/// The generated type is `Copy + Eq + Hash + Ord`, displays and parses as a
/// hyphenated UUID (parse failures are `DomainError::InvalidId`), converts
/// to/from `Uuid`, and serializes transparently.
///
/// ```ignore
/// dddkit_core::uuid_newtype! {
///     /// Identifier of a user.
///     pub struct UserId;
/// }
///
/// let id = UserId::generate();
/// assert_eq!(id, id.to_string().parse().unwrap());
/// ```
#[macro_export]
macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $vis struct $name($crate::__private::uuid::Uuid);

        impl $name {
            /// Generate a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn generate() -> Self {
                Self($crate::__private::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: $crate::__private::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &$crate::__private::uuid::Uuid {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::convert::From<$crate::__private::uuid::Uuid> for $name {
            fn from(value: $crate::__private::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl ::core::convert::From<$name> for $crate::__private::uuid::Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl ::core::cmp::PartialEq<$crate::__private::uuid::Uuid> for $name {
            fn eq(&self, other: &$crate::__private::uuid::Uuid) -> bool {
                self.0 == *other
            }
        }

        impl ::core::cmp::PartialEq<$name> for $crate::__private::uuid::Uuid {
            fn eq(&self, other: &$name) -> bool {
                *self == other.0
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                let uuid = <$crate::__private::uuid::Uuid as ::core::str::FromStr>::from_str(s)
                    .map_err(|e| {
                        $crate::DomainError::invalid_id(format!("{}: {}", stringify!($name), e))
                    })?;
                Ok(Self(uuid))
            }
        }

        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                $crate::__private::serde::Serialize::serialize(&self.0, serializer)
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                <$crate::__private::uuid::Uuid as $crate::__private::serde::Deserialize<'de>>::deserialize(
                    deserializer,
                )
                .map(Self)
            }
        }
    };
}

uuid_newtype! {
    /// Identifier of an aggregate root (keys its event stream).
    pub struct AggregateId;
}

impl AggregateId {
    /// Create a new identifier (alias of [`AggregateId::generate`]).
    pub fn new() -> Self {
        Self::generate()
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}
