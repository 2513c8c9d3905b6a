//! One-time code verification for linking a requester identity to an
//! employee record.
//!
//! The [`VerificationStore`](store::VerificationStore) issues short numeric
//! codes, keeps one pending session per requester, and settles each
//! submission as success or one of the [`VerificationFailure`] outcomes.
//! Sessions live only in memory; a restart drops them.

pub mod clock;
pub mod code;
pub mod session;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use code::{generate_code, DEFAULT_CODE_LENGTH};
pub use session::{SessionStatus, VerificationFailure, VerificationSession, VerifiedCandidate};
pub use store::{VerificationPolicy, VerificationStore};
