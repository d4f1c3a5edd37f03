//! Auth state and configuration.

use secrecy::SecretString;
use std::time::Duration;

use super::tickets::VerificationTickets;
use crate::token::{DEFAULT_SESSION_TTL_SECONDS, SessionSigner};

const DEFAULT_OTP_TTL_SECONDS: u64 = 10 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    otp_ttl_seconds: u64,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: u64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn otp_ttl_seconds(&self) -> u64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared auth machinery; the config is consumed at construction.
pub struct AuthState {
    tickets: VerificationTickets,
    signer: SessionSigner,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, session_secret: SecretString) -> Self {
        let tickets = VerificationTickets::new(Duration::from_secs(config.otp_ttl_seconds()));
        let signer = SessionSigner::new(session_secret, config.session_ttl_seconds());
        Self { tickets, signer }
    }

    pub(super) fn tickets(&self) -> &VerificationTickets {
        &self.tickets
    }

    pub(super) fn signer(&self) -> &SessionSigner {
        &self.signer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new();

        assert_eq!(config.otp_ttl_seconds(), super::DEFAULT_OTP_TTL_SECONDS);
        assert_eq!(
            config.session_ttl_seconds(),
            crate::token::DEFAULT_SESSION_TTL_SECONDS
        );

        let config = config
            .with_otp_ttl_seconds(120)
            .with_session_ttl_seconds(7200);

        assert_eq!(config.otp_ttl_seconds(), 120);
        assert_eq!(config.session_ttl_seconds(), 7200);
    }

    #[tokio::test]
    async fn auth_state_wires_tickets_and_signer() -> anyhow::Result<()> {
        let state = AuthState::new(
            AuthConfig::new().with_session_ttl_seconds(60),
            SecretString::from("state-test-secret"),
        );

        state.tickets().issue("a@b.com", "123456".to_string()).await;
        assert!(state.tickets().verify("a@b.com", "123456").await);

        let token = state.signer().issue("user-1", "STUDENT", 1_700_000_000)?;
        let claims = state.signer().verify(&token, 1_700_000_000)?;
        assert_eq!(claims.exp, 1_700_000_060);
        Ok(())
    }
}
