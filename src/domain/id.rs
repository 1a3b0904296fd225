//! Domain ID Types with NewType Pattern
//!
//! Type-safe wrappers for the names that end up as logical identifiers in
//! the emitted resource graph. The provisioning engine only accepts
//! alphanumeric logical ids, so every ID is validated on construction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{EdgeplaneError, Result};

static LOGICAL_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{0,63}$").expect("static regex"));

/// Macro to generate NewType ID wrappers with all required traits
macro_rules! logical_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an ID, rejecting anything that is not a valid logical name
            pub fn new(s: impl Into<String>) -> Result<Self> {
                let s = s.into();
                if !LOGICAL_NAME_REGEX.is_match(&s) {
                    return Err(EdgeplaneError::validation_field(
                        format!(
                            "'{}' is not a valid {}: expected a letter followed by up to 63 letters or digits",
                            s,
                            stringify!($name)
                        ),
                        stringify!($name),
                    ));
                }
                Ok(Self(s))
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Convert to inner string value
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EdgeplaneError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = EdgeplaneError;

            fn try_from(s: String) -> Result<Self> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

logical_id!(
    /// Identifier of a backend service registered with a listener
    ServiceId
);

logical_id!(
    /// Logical identifier of a resource in an emitted stack
    LogicalId
);

impl LogicalId {
    /// Build a child id by appending a suffix to this one.
    pub fn child(&self, suffix: &str) -> Result<LogicalId> {
        LogicalId::new(format!("{}{}", self.0, suffix))
    }
}

impl ServiceId {
    /// Logical id derived from this service with the given suffix.
    pub fn logical(&self, suffix: &str) -> Result<LogicalId> {
        LogicalId::new(format!("{}{}", self.0, suffix))
    }
}
