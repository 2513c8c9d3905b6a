use std::sync::Arc;

use staffbridge_core::audit::{AuditSink, TracingAuditSink};
use staffbridge_core::config::AppConfig;
use staffbridge_core::verification::{VerificationPolicy, VerificationStore};
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<VerificationStore>,
    pub audit: Arc<dyn AuditSink>,
}

pub fn bootstrap_with_config(config: AppConfig) -> Application {
    let policy = VerificationPolicy::from(&config.verification);
    let store = Arc::new(VerificationStore::new(policy));
    info!(
        event_name = "system.bootstrap.store_ready",
        correlation_id = "bootstrap",
        code_length = config.verification.code_length,
        expiry_secs = config.verification.expiry_secs,
        max_attempts = config.verification.max_attempts,
        "verification store initialized"
    );

    Application { config, store, audit: Arc::new(TracingAuditSink) }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use secrecy::ExposeSecret;
    use staffbridge_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use staffbridge_core::{CandidateId, RequesterId, VerificationFailure};

    use crate::bootstrap::bootstrap_with_config;

    #[test]
    fn bootstrap_wires_configured_policy_into_the_store() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                code_length: Some(8),
                expiry_secs: Some(90),
                max_attempts: Some(2),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load with valid overrides");
        let app = bootstrap_with_config(config);

        let policy = app.store.policy();
        assert_eq!(policy.code_length, 8);
        assert_eq!(policy.expiry_window, Duration::seconds(90));
        assert_eq!(policy.max_attempts, 2);

        let requester = RequesterId::from("tg-1");
        let code = app.store.create_session(requester.clone(), CandidateId(5), "x@y.z", None);
        assert_eq!(code.expose_secret().len(), 8);

        let wrong = "0".repeat(8);
        if wrong != code.expose_secret() {
            assert_eq!(
                app.store.verify(&requester, &wrong),
                Err(VerificationFailure::CodeMismatch { attempts_remaining: 1 })
            );
        }
    }
}
