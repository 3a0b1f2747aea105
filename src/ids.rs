//! Type-safe ID newtypes for chat entities
//!
//! All IDs are strings wrapped in newtypes for compile-time safety.
//! Session and message ids are assigned by the backend; tab ids come from
//! the workbench shell. Locally synthesized ids (optimistic messages) are
//! random UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to define a type-safe ID newtype
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create from an existing string (for values assigned elsewhere)
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(SessionId, "Identifies a chat session (global or copilot)");
define_id!(MessageId, "Identifies a message within a session");
define_id!(TabId, "Identifies an editor tab in the workbench shell");
define_id!(ConnectionId, "Identifies a database connection");
