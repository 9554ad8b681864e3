//! Newtype IDs for type-safe entity references.
//!
//! Product and order identifiers are opaque strings issued by the catalogue
//! and the order API respectively. Use the `define_id!` macro to create
//! wrappers that prevent accidentally mixing them up.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use ququ_core::define_id;
/// define_id!(BannerId);
/// define_id!(ReviewId);
///
/// let banner = BannerId::new("b-1");
/// let review = ReviewId::new("b-1");
///
/// // These are different types, so this won't compile:
/// // let _: BannerId = review;
/// # let _ = (banner, review);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Catalogue product identifier, also the cart line identity key.
define_id!(ProductId);
// Identifier assigned by the order API when an order is created.
define_id!(OrderId);
// Identifier of an order held by the payment provider.
define_id!(RemoteOrderId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids() {
        assert!(ProductId::new("").is_blank());
        assert!(ProductId::new("  ").is_blank());
        assert!(!ProductId::new("p1").is_blank());
    }

    #[test]
    fn test_serde_transparent() {
        let id = OrderId::new("64f1c0ffee");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"64f1c0ffee\""));
    }

    #[test]
    fn test_display() {
        assert_eq!(ProductId::from("sku-9").to_string(), "sku-9");
    }
}
