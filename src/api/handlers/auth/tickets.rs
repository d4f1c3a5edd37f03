//! In-memory verification tickets for the email OTP flow.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Lifecycle of a single email's verification ticket.
enum TicketState {
    /// A code was issued and waits for the matching verify call.
    PendingOtp { code: String, issued_at: Instant },
    /// The code was confirmed; signup may consume this marker once.
    Verified { verified_at: Instant },
}

impl TicketState {
    fn age(&self) -> Duration {
        match self {
            Self::PendingOtp { issued_at, .. } => issued_at.elapsed(),
            Self::Verified { verified_at } => verified_at.elapsed(),
        }
    }
}

/// TTL map of verification tickets keyed by normalized email.
///
/// Tickets never touch the database. A process restart simply means users
/// request a fresh code. Expired entries are pruned on insert and treated
/// as absent on access.
pub struct VerificationTickets {
    ttl: Duration,
    tickets: Mutex<HashMap<String, TicketState>>,
}

impl VerificationTickets {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tickets: Mutex::new(HashMap::new()),
        }
    }

    /// Store a fresh pending code, replacing any previous ticket for the email.
    pub(super) async fn issue(&self, email: &str, code: String) {
        let mut tickets = self.tickets.lock().await;
        tickets.retain(|_, entry| entry.age() < self.ttl);
        tickets.insert(
            email.to_string(),
            TicketState::PendingOtp {
                code,
                issued_at: Instant::now(),
            },
        );
    }

    /// Drop any ticket for the email, e.g. when the code email failed to send.
    pub(super) async fn revoke(&self, email: &str) {
        self.tickets.lock().await.remove(email);
    }

    /// Check a submitted code against the pending ticket.
    ///
    /// On success the ticket flips to `Verified` with a fresh TTL and the
    /// code cannot be replayed. A wrong code leaves the pending ticket
    /// untouched so the user can retry.
    pub(super) async fn verify(&self, email: &str, submitted_code: &str) -> bool {
        let submitted = submitted_code.trim();
        let mut tickets = self.tickets.lock().await;
        match tickets.get(email) {
            Some(TicketState::PendingOtp { code, issued_at }) => {
                if issued_at.elapsed() >= self.ttl {
                    tickets.remove(email);
                    return false;
                }
                if code != submitted {
                    return false;
                }
                tickets.insert(
                    email.to_string(),
                    TicketState::Verified {
                        verified_at: Instant::now(),
                    },
                );
                true
            }
            // Absent, or already verified: nothing to match a code against.
            _ => false,
        }
    }

    /// Whether a live `Verified` marker exists, without consuming it.
    ///
    /// Signup checks this before touching the database and only consumes
    /// the marker once the account row exists, so a failed signup does not
    /// force the user back through the OTP flow.
    pub(super) async fn is_verified(&self, email: &str) -> bool {
        let tickets = self.tickets.lock().await;
        matches!(
            tickets.get(email),
            Some(TicketState::Verified { verified_at }) if verified_at.elapsed() < self.ttl
        )
    }

    /// Remove a live `Verified` marker, returning whether one existed.
    ///
    /// Runs under the map lock, so concurrent signups for the same email
    /// cannot both consume the marker.
    pub(super) async fn consume_verified(&self, email: &str) -> bool {
        let mut tickets = self.tickets.lock().await;
        match tickets.get(email) {
            Some(TicketState::Verified { verified_at }) if verified_at.elapsed() < self.ttl => {
                tickets.remove(email);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const EMAIL: &str = "a@b.com";

    fn tickets(ttl_ms: u64) -> VerificationTickets {
        VerificationTickets::new(Duration::from_millis(ttl_ms))
    }

    #[tokio::test]
    async fn issue_verify_consume_happy_path() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(tickets.verify(EMAIL, "123456").await);
        assert!(tickets.consume_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn verify_trims_submitted_code() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(tickets.verify(EMAIL, " 123456 ").await);
    }

    #[tokio::test]
    async fn wrong_code_leaves_pending_ticket() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(!tickets.verify(EMAIL, "000000").await);
        assert!(!tickets.verify(EMAIL, "12345").await);
        // The right code still works after failed attempts.
        assert!(tickets.verify(EMAIL, "123456").await);
    }

    #[tokio::test]
    async fn reissue_overwrites_previous_code() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "111111".to_string()).await;
        tickets.issue(EMAIL, "222222".to_string()).await;

        assert!(!tickets.verify(EMAIL, "111111").await);
        assert!(tickets.verify(EMAIL, "222222").await);
    }

    #[tokio::test]
    async fn code_cannot_be_replayed_after_verification() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(tickets.verify(EMAIL, "123456").await);
        assert!(!tickets.verify(EMAIL, "123456").await);
        // The marker itself is still intact for signup.
        assert!(tickets.consume_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn expired_pending_code_is_rejected() {
        let tickets = tickets(50);
        tickets.issue(EMAIL, "123456".to_string()).await;

        sleep(Duration::from_millis(80)).await;
        assert!(!tickets.verify(EMAIL, "123456").await);
    }

    #[tokio::test]
    async fn verified_marker_expires() {
        let tickets = tickets(150);
        tickets.issue(EMAIL, "123456".to_string()).await;
        assert!(tickets.verify(EMAIL, "123456").await);

        sleep(Duration::from_millis(200)).await;
        assert!(!tickets.consume_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn verification_extends_the_ticket() {
        let tickets = tickets(150);
        tickets.issue(EMAIL, "123456".to_string()).await;

        sleep(Duration::from_millis(100)).await;
        assert!(tickets.verify(EMAIL, "123456").await);

        // The verified marker got a fresh TTL at verification time.
        sleep(Duration::from_millis(100)).await;
        assert!(tickets.consume_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn is_verified_does_not_consume() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(!tickets.is_verified(EMAIL).await);
        assert!(tickets.verify(EMAIL, "123456").await);

        // Peeking any number of times leaves the marker in place.
        assert!(tickets.is_verified(EMAIL).await);
        assert!(tickets.is_verified(EMAIL).await);
        assert!(tickets.consume_verified(EMAIL).await);
        assert!(!tickets.is_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn marker_is_consumed_exactly_once() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;
        assert!(tickets.verify(EMAIL, "123456").await);

        assert!(tickets.consume_verified(EMAIL).await);
        assert!(!tickets.consume_verified(EMAIL).await);
    }

    #[tokio::test]
    async fn pending_ticket_does_not_count_as_verified() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;

        assert!(!tickets.consume_verified(EMAIL).await);
        // The pending ticket survives the failed consume.
        assert!(tickets.verify(EMAIL, "123456").await);
    }

    #[tokio::test]
    async fn revoke_drops_the_ticket() {
        let tickets = tickets(60_000);
        tickets.issue(EMAIL, "123456".to_string()).await;
        tickets.revoke(EMAIL).await;

        assert!(!tickets.verify(EMAIL, "123456").await);
    }

    #[tokio::test]
    async fn tickets_are_per_email() {
        let tickets = tickets(60_000);
        tickets.issue("a@b.com", "111111".to_string()).await;
        tickets.issue("c@d.com", "222222".to_string()).await;

        assert!(!tickets.verify("a@b.com", "222222").await);
        assert!(tickets.verify("a@b.com", "111111").await);
        assert!(tickets.verify("c@d.com", "222222").await);
    }
}
