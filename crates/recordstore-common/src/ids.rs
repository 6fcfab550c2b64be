//! Typed key wrappers for entities whose primary key is caller-supplied text.
//!
//! Each key is a newtype over `String`, so a `WalletId` cannot be passed
//! where a `UserId` is expected. An empty key is the "absent" value that
//! insert hooks may replace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a newtype key wrapper over `String`.
///
/// The macro produces a struct with:
/// - `new(impl Into<String>)`, `as_str()`, `is_empty()`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Default`, `Serialize`, `Deserialize`
/// - `Display` and `From<&str>` / `From<String>` conversions
macro_rules! string_key {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                /// Wrap a key value.
                #[must_use]
                pub fn new(key: impl Into<String>) -> Self {
                    Self(key.into())
                }

                /// Borrow the key text.
                #[must_use]
                pub fn as_str(&self) -> &str {
                    &self.0
                }

                /// An empty key has not been assigned yet.
                #[must_use]
                pub fn is_empty(&self) -> bool {
                    self.0.is_empty()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(s: &str) -> Self {
                    Self(s.to_string())
                }
            }

            impl From<String> for $name {
                fn from(s: String) -> Self {
                    Self(s)
                }
            }

            impl From<$name> for String {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

string_key! {
    /// Primary key of a user.
    UserId,
    /// Primary key of a wallet.
    WalletId,
    /// Primary key of a product.
    ProductId,
}
