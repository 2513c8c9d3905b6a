use thiserror::Error;

use crate::verification::VerificationFailure;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Verification(#[from] VerificationFailure),
    #[error("requester is already linked to an employee record")]
    AlreadyLinked,
    #[error("no employee record matches the supplied email")]
    EmployeeNotFound,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Transport-facing error. `reason` is a stable machine code; clients own
/// the wording they show to people.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { reason: &'static str, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { reason: &'static str, message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { reason: &'static str, message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadRequest { reason, .. }
            | Self::ServiceUnavailable { reason, .. }
            | Self::Internal { reason, .. } => reason,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl DomainError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Verification(failure) => failure.reason_code(),
            Self::AlreadyLinked => "link.already_linked",
            Self::EmployeeNotFound => "link.employee_not_found",
            Self::InvariantViolation(_) => "domain.invariant_violation",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                reason: error.reason_code(),
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) => Self::ServiceUnavailable {
                reason: "persistence.unavailable",
                message,
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Integration(message) => Self::ServiceUnavailable {
                reason: "integration.unavailable",
                message,
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Configuration(message) => Self::Internal {
                reason: "configuration.invalid",
                message,
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::verification::VerificationFailure;

    #[test]
    fn each_verification_failure_maps_to_its_own_stable_reason() {
        let cases = [
            (VerificationFailure::SessionNotFound, "verification.session_not_found"),
            (VerificationFailure::SessionExpired, "verification.session_expired"),
            (VerificationFailure::AttemptsExhausted, "verification.attempts_exhausted"),
            (
                VerificationFailure::CodeMismatch { attempts_remaining: 1 },
                "verification.code_mismatch",
            ),
        ];

        for (failure, expected) in cases {
            let interface = ApplicationError::from(DomainError::from(failure)).into_interface("req-1");
            assert!(matches!(interface, InterfaceError::BadRequest { .. }));
            assert_eq!(interface.reason(), expected);
            assert_eq!(interface.correlation_id(), "req-1");
        }
    }

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::EmployeeNotFound).into_interface("req-2");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                reason: "link.employee_not_found",
                ..
            } if correlation_id == "req-2"
        ));
    }

    #[test]
    fn integration_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Integration("directory lookup timed out".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.reason(), "integration.unavailable");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("bad expiry window".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.reason(), "configuration.invalid");
    }
}
