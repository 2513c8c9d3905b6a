use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identity of the party asking to be verified, e.g. a messaging
/// platform user id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequesterId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RequesterId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for RequesterId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}
