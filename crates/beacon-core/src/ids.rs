//! Branded ID newtypes for type safety.
//!
//! Page and session identifiers travel on every beacon (`pid`, `rt.si`).
//! Wrapping them prevents passing a session ID where a page ID is expected.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a generated page id.
pub const PAGE_ID_LEN: usize = 8;

const PAGE_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::generate()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier for one page view. Eight lowercase alphanumerics.
    PageId
}

branded_id! {
    /// Identifier for a browser session, shared by every page in it.
    ///
    /// Generated client-side; the collector may override it.
    SessionId
}

impl PageId {
    /// Generate a new random page id.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..PAGE_ID_LEN)
            .map(|_| char::from(PAGE_ID_ALPHABET[rng.random_range(0..PAGE_ID_ALPHABET.len())]))
            .collect();
        Self(id)
    }
}

impl SessionId {
    /// Generate a new random session id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
