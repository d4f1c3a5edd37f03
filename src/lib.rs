//! # NoteNexus (Student Note Sharing API)
//!
//! `notenexus` is the backend for a student note sharing platform. Students
//! sign up after verifying their email with a one-time password, upload notes
//! and study tips, and everything stays hidden until an admin approves it.
//!
//! ## Accounts
//!
//! - **Email OTP:** Signup requires a 6-digit code sent to the email address.
//!   Verification tickets live in memory with a short TTL and are consumed on use.
//! - **Single Admin:** There is at most one `admin` account. The constraint is
//!   enforced in a transaction and backed by a partial unique index.
//! - **Sessions:** Successful sign-in returns an HMAC signed token (HS256)
//!   carrying the user id and role, valid for about an hour.
//!
//! ## Moderation
//!
//! Notes, tips and files are created `pending` and become visible once an
//! admin approves them. Bulk approval only touches rows that are still
//! pending and reports how many rows actually changed. Content can be deleted
//! by its creator or by the admin.

pub mod api;
pub mod cli;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
