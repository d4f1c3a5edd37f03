//! Account handlers and supporting modules.
//!
//! This module coordinates the email OTP flow, signup, sign-in, and the
//! bearer-token principal used by every protected endpoint.
//!
//! ## Verification Tickets
//!
//! OTP state lives only in memory ([`tickets::VerificationTickets`]): a code
//! is issued per email, confirmed by the user, and the resulting verified
//! marker is consumed exactly once by signup. Codes and markers share one
//! TTL, refreshed at each transition.
//!
//! ## Single Admin
//!
//! The first account may register as `ADMIN`; afterwards the slot is closed.
//! Signup enforces this inside a transaction and the database backs it with
//! a partial unique index, so the rule holds under concurrency.

pub(crate) mod otp;
pub(crate) mod principal;
pub(crate) mod signin;
pub(crate) mod signup;
mod state;
mod storage;
mod tickets;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
pub use types::{MessageResponse, UserRole};
