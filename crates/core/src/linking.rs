//! Account linking: ties a messaging identity to an employee record once the
//! requester proves control of the employee's mailbox.
//!
//! ```text
//! start(email) -> directory lookup -> create session -> deliver code
//! confirm(code) -> verify -> persist link
//! ```
//!
//! The directory, the delivery channel and the durable link store are
//! collaborators behind traits; this module only sequences them around the
//! [`VerificationStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::employee::{normalize_email, CandidateId, EmployeeRecord};
use crate::domain::requester::RequesterId;
use crate::errors::{ApplicationError, DomainError};
use crate::verification::{VerificationFailure, VerificationStore};

const AUDIT_ACTOR: &str = "linking-service";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("employee directory failure: {0}")]
    Directory(String),
    #[error("code delivery failure: {0}")]
    Delivery(String),
    #[error("link storage failure: {0}")]
    Storage(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl From<VerificationFailure> for LinkError {
    fn from(value: VerificationFailure) -> Self {
        Self::Domain(DomainError::Verification(value))
    }
}

impl From<LinkError> for ApplicationError {
    fn from(value: LinkError) -> Self {
        match value {
            LinkError::Domain(error) => Self::Domain(error),
            LinkError::Collaborator(CollaboratorError::Storage(message)) => {
                Self::Persistence(message)
            }
            LinkError::Collaborator(error) => Self::Integration(error.to_string()),
        }
    }
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<EmployeeRecord>, CollaboratorError>;
}

/// Out-of-band channel (mail, SMS) that hands the code to the employee.
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(
        &self,
        recipient: &EmployeeRecord,
        code: &SecretString,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn find_link(
        &self,
        requester_id: &RequesterId,
    ) -> Result<Option<AccountLink>, CollaboratorError>;
    async fn save_link(&self, link: AccountLink) -> Result<(), CollaboratorError>;
    async fn remove_link(&self, requester_id: &RequesterId) -> Result<bool, CollaboratorError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    pub requester_id: RequesterId,
    pub requester_handle: Option<String>,
    pub candidate_id: CandidateId,
    pub candidate_email: String,
    pub linked_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStarted {
    pub requester_id: RequesterId,
    pub candidate_id: CandidateId,
    pub employee_name: String,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: u32,
}

pub struct LinkingService {
    store: Arc<VerificationStore>,
    directory: Arc<dyn EmployeeDirectory>,
    delivery: Arc<dyn CodeDelivery>,
    links: Arc<dyn LinkRepository>,
    audit: Arc<dyn AuditSink>,
}

impl LinkingService {
    pub fn new(
        store: Arc<VerificationStore>,
        directory: Arc<dyn EmployeeDirectory>,
        delivery: Arc<dyn CodeDelivery>,
        links: Arc<dyn LinkRepository>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, directory, delivery, links, audit }
    }

    pub async fn start(
        &self,
        requester_id: &RequesterId,
        requester_handle: Option<String>,
        email: &str,
        correlation_id: &str,
    ) -> Result<LinkStarted, LinkError> {
        if self.links.find_link(requester_id).await?.is_some() {
            self.record(
                requester_id,
                None,
                correlation_id,
                "link.start_rejected",
                AuditOutcome::Rejected,
                "link.already_linked",
            );
            return Err(DomainError::AlreadyLinked.into());
        }

        let email = normalize_email(email);
        let Some(employee) = self.directory.find_by_email(&email).await? else {
            self.record(
                requester_id,
                None,
                correlation_id,
                "link.start_rejected",
                AuditOutcome::Rejected,
                "link.employee_not_found",
            );
            return Err(DomainError::EmployeeNotFound.into());
        };

        let code =
            self.store.create_session(requester_id.clone(), employee.id, email, requester_handle);

        if let Err(error) = self.delivery.deliver(&employee, &code).await {
            self.store.cancel_session(requester_id);
            warn!(
                event_name = "link.delivery_failed",
                requester_id = %requester_id,
                candidate_id = %employee.id,
                correlation_id,
                error = %error,
                "verification code delivery failed; session discarded"
            );
            self.record(
                requester_id,
                Some(employee.id),
                correlation_id,
                "link.start_failed",
                AuditOutcome::Failed,
                "link.delivery_failed",
            );
            return Err(error.into());
        }

        let status = self
            .store
            .session_status(requester_id)
            .ok_or(LinkError::from(VerificationFailure::SessionNotFound))?;

        info!(
            event_name = "link.code_sent",
            requester_id = %requester_id,
            candidate_id = %employee.id,
            correlation_id,
            "verification code delivered"
        );
        self.record(
            requester_id,
            Some(employee.id),
            correlation_id,
            "link.code_sent",
            AuditOutcome::Success,
            "link.code_sent",
        );

        Ok(LinkStarted {
            requester_id: requester_id.clone(),
            candidate_id: employee.id,
            employee_name: employee.name,
            expires_at: status.expires_at,
            attempts_remaining: status.attempts_remaining,
        })
    }

    pub async fn confirm(
        &self,
        requester_id: &RequesterId,
        requester_handle: Option<String>,
        submitted_code: &str,
        correlation_id: &str,
    ) -> Result<AccountLink, LinkError> {
        let verified = match self.store.verify(requester_id, submitted_code.trim()) {
            Ok(verified) => verified,
            Err(failure) => {
                self.record(
                    requester_id,
                    None,
                    correlation_id,
                    "link.confirm_rejected",
                    AuditOutcome::Rejected,
                    failure.reason_code(),
                );
                return Err(failure.into());
            }
        };

        let link = AccountLink {
            requester_id: requester_id.clone(),
            requester_handle,
            candidate_id: verified.candidate_id,
            candidate_email: verified.candidate_email,
            linked_at: Utc::now(),
        };

        if let Err(error) = self.links.save_link(link.clone()).await {
            self.record(
                requester_id,
                Some(link.candidate_id),
                correlation_id,
                "link.confirm_failed",
                AuditOutcome::Failed,
                "link.storage_failed",
            );
            return Err(error.into());
        }

        info!(
            event_name = "link.confirmed",
            requester_id = %requester_id,
            candidate_id = %link.candidate_id,
            correlation_id,
            "requester linked to employee record"
        );
        self.record(
            requester_id,
            Some(link.candidate_id),
            correlation_id,
            "link.confirmed",
            AuditOutcome::Success,
            "link.confirmed",
        );
        Ok(link)
    }

    pub fn cancel(&self, requester_id: &RequesterId) -> bool {
        self.store.cancel_session(requester_id)
    }

    pub fn attempts_remaining(&self, requester_id: &RequesterId) -> Option<u32> {
        self.store.session_status(requester_id).map(|status| status.attempts_remaining)
    }

    pub async fn unlink(
        &self,
        requester_id: &RequesterId,
        correlation_id: &str,
    ) -> Result<bool, LinkError> {
        let removed = self.links.remove_link(requester_id).await?;
        if removed {
            self.record(
                requester_id,
                None,
                correlation_id,
                "link.removed",
                AuditOutcome::Success,
                "link.removed",
            );
        }
        Ok(removed)
    }

    fn record(
        &self,
        requester_id: &RequesterId,
        candidate_id: Option<CandidateId>,
        correlation_id: &str,
        event_type: &str,
        outcome: AuditOutcome,
        reason: &str,
    ) {
        let mut event = AuditEvent::new(
            Some(requester_id.clone()),
            correlation_id,
            event_type,
            AuditCategory::Linking,
            AUDIT_ACTOR,
            outcome,
        )
        .with_metadata("reason", reason);
        if let Some(candidate_id) = candidate_id {
            event = event.with_candidate(candidate_id);
        }
        self.audit.emit(event);
    }
}
