use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-secret")
                .long("session-secret")
                .help("Secret used to sign session tokens (HS256)")
                .env("NOTENEXUS_SESSION_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("NOTENEXUS_SESSION_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("Verification code and verified-marker TTL in seconds")
                .env("NOTENEXUS_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub otp_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let session_secret = matches
            .get_one::<String>("session-secret")
            .cloned()
            .context("missing required argument: --session-secret")?;

        Ok(Self {
            session_secret: SecretString::from(session_secret),
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .unwrap_or(3600),
            otp_ttl_seconds: matches
                .get_one::<u64>("otp-ttl-seconds")
                .copied()
                .unwrap_or(600),
        })
    }
}
