use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{employee::CandidateId, requester::RequesterId};

/// Keyed digest of an issued code. The cleartext code is never retained.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct CodeDigest(pub(crate) Vec<u8>);

impl fmt::Debug for CodeDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeDigest([REDACTED])")
    }
}

/// One pending identity-link attempt.
#[derive(Clone, Debug)]
pub struct VerificationSession {
    pub requester_id: RequesterId,
    pub requester_handle: Option<String>,
    pub candidate_id: CandidateId,
    pub candidate_email: String,
    pub(crate) code_digest: CodeDigest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl VerificationSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub(crate) fn status(&self, max_attempts: u32) -> SessionStatus {
        SessionStatus {
            requester_id: self.requester_id.clone(),
            requester_handle: self.requester_handle.clone(),
            candidate_id: self.candidate_id,
            candidate_email: self.candidate_email.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            attempts: self.attempts,
            attempts_remaining: max_attempts.saturating_sub(self.attempts),
        }
    }
}

/// Non-secret view of a live session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub requester_id: RequesterId,
    pub requester_handle: Option<String>,
    pub candidate_id: CandidateId,
    pub candidate_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub attempts_remaining: u32,
}

/// Payload handed back when a submitted code matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCandidate {
    pub candidate_id: CandidateId,
    pub candidate_email: String,
}

/// Expected, non-fatal outcomes of a failed verification.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error("no active verification session")]
    SessionNotFound,
    #[error("verification session expired")]
    SessionExpired,
    #[error("maximum verification attempts reached")]
    AttemptsExhausted,
    #[error("verification code did not match ({attempts_remaining} attempts remaining)")]
    CodeMismatch { attempts_remaining: u32 },
}

impl VerificationFailure {
    /// Stable identifier for transports that map outcomes to their own codes.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "verification.session_not_found",
            Self::SessionExpired => "verification.session_expired",
            Self::AttemptsExhausted => "verification.attempts_exhausted",
            Self::CodeMismatch { .. } => "verification.code_mismatch",
        }
    }

    /// Whether the requester has to start over with a fresh session.
    pub fn requires_restart(&self) -> bool {
        !matches!(self, Self::CodeMismatch { .. })
    }
}
