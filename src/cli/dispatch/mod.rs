//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, outbox};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let uploads_dir = matches
        .get_one::<String>("uploads-dir")
        .cloned()
        .unwrap_or_else(|| "uploads".to_string());
    let uploads_base_url = matches
        .get_one::<String>("uploads-base-url")
        .cloned()
        .unwrap_or_else(|| "/uploads".to_string());

    let auth_opts = auth::Options::parse(matches)?;
    let outbox_opts = outbox::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        uploads_dir,
        uploads_base_url,
        email_outbox_poll_seconds: outbox_opts.poll_seconds,
        email_outbox_batch_size: outbox_opts.batch_size,
        email_outbox_max_attempts: outbox_opts.max_attempts,
        email_outbox_backoff_base_seconds: outbox_opts.backoff_base_seconds,
        email_outbox_backoff_max_seconds: outbox_opts.backoff_max_seconds,
    }))
}
