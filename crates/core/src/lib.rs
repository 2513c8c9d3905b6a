pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod linking;
pub mod verification;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use domain::employee::{CandidateId, EmployeeRecord};
pub use domain::requester::RequesterId;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use linking::{
    AccountLink, CodeDelivery, CollaboratorError, EmployeeDirectory, LinkError, LinkRepository,
    LinkStarted, LinkingService,
};
pub use verification::{
    generate_code, SessionStatus, VerificationFailure, VerificationPolicy, VerificationStore,
    VerifiedCandidate,
};
