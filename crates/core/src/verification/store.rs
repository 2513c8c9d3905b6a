use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Duration;
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::config::VerificationConfig;
use crate::domain::{employee::CandidateId, requester::RequesterId};
use crate::verification::clock::{Clock, SystemClock};
use crate::verification::code::{generate_code, DEFAULT_CODE_LENGTH};
use crate::verification::session::{
    CodeDigest, SessionStatus, VerificationFailure, VerificationSession, VerifiedCandidate,
};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_EXPIRY_MINUTES: i64 = 10;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub code_length: usize,
    pub expiry_window: Duration,
    pub max_attempts: u32,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            expiry_window: Duration::minutes(DEFAULT_EXPIRY_MINUTES),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&VerificationConfig> for VerificationPolicy {
    fn from(config: &VerificationConfig) -> Self {
        let expiry_secs = i64::try_from(config.expiry_secs).unwrap_or(i64::MAX);
        Self {
            code_length: config.code_length,
            expiry_window: Duration::try_seconds(expiry_secs)
                .unwrap_or_else(|| Duration::minutes(DEFAULT_EXPIRY_MINUTES)),
            max_attempts: config.max_attempts,
        }
    }
}

/// In-memory store of pending verification sessions, keyed by requester.
///
/// All operations on the map run under one lock, so the
/// lookup/check/increment/delete sequence of [`verify`](Self::verify) is
/// atomic and a correct code can be spent at most once. Construct it once
/// per process and share it behind an `Arc`.
pub struct VerificationStore {
    policy: VerificationPolicy,
    clock: Arc<dyn Clock>,
    mac: HmacSha256,
    sessions: Mutex<HashMap<RequesterId, VerificationSession>>,
}

impl fmt::Debug for VerificationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationStore")
            .field("policy", &self.policy)
            .field("active_sessions", &self.active_sessions())
            .finish_non_exhaustive()
    }
}

impl Default for VerificationStore {
    fn default() -> Self {
        Self::new(VerificationPolicy::default())
    }
}

impl VerificationStore {
    pub fn new(policy: VerificationPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: VerificationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { policy, clock, mac: keyed_mac(), sessions: Mutex::new(HashMap::new()) }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Starts (or restarts) verification for `requester_id` and returns the
    /// code to deliver out-of-band. Any earlier session for the same
    /// requester is discarded.
    pub fn create_session(
        &self,
        requester_id: RequesterId,
        candidate_id: CandidateId,
        candidate_email: impl Into<String>,
        requester_handle: Option<String>,
    ) -> SecretString {
        let code = generate_code(self.policy.code_length);
        let created_at = self.clock.now();
        let session = VerificationSession {
            requester_id: requester_id.clone(),
            requester_handle,
            candidate_id,
            candidate_email: candidate_email.into(),
            code_digest: self.digest(code.expose_secret()),
            created_at,
            expires_at: created_at + self.policy.expiry_window,
            attempts: 0,
        };
        let expires_at = session.expires_at;

        let replaced = self.lock().insert(requester_id.clone(), session).is_some();

        info!(
            event_name = "verification.session.created",
            requester_id = %requester_id,
            candidate_id = %candidate_id,
            expires_at = %expires_at.to_rfc3339(),
            replaced,
            "verification session created"
        );
        code
    }

    pub fn verify(
        &self,
        requester_id: &RequesterId,
        submitted_code: &str,
    ) -> Result<VerifiedCandidate, VerificationFailure> {
        let now = self.clock.now();
        let max_attempts = self.policy.max_attempts;
        let mut sessions = self.lock();

        let Some(session) = sessions.get_mut(requester_id) else {
            warn!(
                event_name = "verification.verify.session_not_found",
                requester_id = %requester_id,
                "no verification session for requester"
            );
            return Err(VerificationFailure::SessionNotFound);
        };

        if session.is_expired_at(now) {
            sessions.remove(requester_id);
            warn!(
                event_name = "verification.verify.session_expired",
                requester_id = %requester_id,
                "verification session expired"
            );
            return Err(VerificationFailure::SessionExpired);
        }

        session.attempts = session.attempts.saturating_add(1);
        let attempts = session.attempts;
        let matched = self.matches(&session.code_digest, submitted_code);

        if matched {
            let Some(session) = sessions.remove(requester_id) else {
                return Err(VerificationFailure::SessionNotFound);
            };
            info!(
                event_name = "verification.verify.succeeded",
                requester_id = %requester_id,
                candidate_id = %session.candidate_id,
                attempts,
                "verification code accepted"
            );
            return Ok(VerifiedCandidate {
                candidate_id: session.candidate_id,
                candidate_email: session.candidate_email,
            });
        }

        if attempts >= max_attempts {
            sessions.remove(requester_id);
            warn!(
                event_name = "verification.verify.attempts_exhausted",
                requester_id = %requester_id,
                attempts,
                max_attempts,
                "verification attempts exhausted"
            );
            return Err(VerificationFailure::AttemptsExhausted);
        }

        let attempts_remaining = max_attempts - attempts;
        warn!(
            event_name = "verification.verify.code_mismatch",
            requester_id = %requester_id,
            attempts,
            max_attempts,
            "verification code mismatch"
        );
        Err(VerificationFailure::CodeMismatch { attempts_remaining })
    }

    /// Non-secret metadata for a live session. Expired sessions read as
    /// absent even before a sweep removes them.
    pub fn session_status(&self, requester_id: &RequesterId) -> Option<SessionStatus> {
        let now = self.clock.now();
        self.lock()
            .get(requester_id)
            .filter(|session| !session.is_expired_at(now))
            .map(|session| session.status(self.policy.max_attempts))
    }

    /// Drops the session for `requester_id`, if any. Returns whether one
    /// existed.
    pub fn cancel_session(&self, requester_id: &RequesterId) -> bool {
        let removed = self.lock().remove(requester_id).is_some();
        if removed {
            info!(
                event_name = "verification.session.cancelled",
                requester_id = %requester_id,
                "verification session cancelled"
            );
        }
        removed
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let removed = before - sessions.len();
        drop(sessions);

        if removed > 0 {
            info!(
                event_name = "verification.cleanup.completed",
                removed,
                "expired verification sessions removed"
            );
        } else {
            debug!(event_name = "verification.cleanup.idle", "no expired verification sessions");
        }
        removed
    }

    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    fn digest(&self, code: &str) -> CodeDigest {
        let mut mac = self.mac.clone();
        mac.update(code.as_bytes());
        CodeDigest(mac.finalize().into_bytes().to_vec())
    }

    // `verify_slice` compares in constant time.
    fn matches(&self, expected: &CodeDigest, submitted: &str) -> bool {
        let mut mac = self.mac.clone();
        mac.update(submitted.as_bytes());
        mac.verify_slice(&expected.0).is_ok()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequesterId, VerificationSession>> {
        match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn keyed_mac() -> HmacSha256 {
    let mut key = Key::<HmacSha256>::default();
    OsRng.fill_bytes(&mut key);
    <HmacSha256 as KeyInit>::new(&key)
}
