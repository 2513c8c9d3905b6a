use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of the ERP employee record a requester is being linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub i64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CandidateId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: CandidateId,
    pub name: String,
    pub work_email: String,
}

/// Lowercases and trims an email the way directory lookups expect it.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
