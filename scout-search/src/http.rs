//! Shared HTTP client and failure classification for catalog connectors.
//!
//! Provides a configured [`reqwest::Client`] with rotating User-Agent
//! strings, and maps HTTP statuses and transport errors onto
//! [`ConnectorErrorKind`] so every connector reports failures the same way.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::StatusCode;

use crate::error::{ConnectorError, ConnectorErrorKind};

/// Realistic browser User-Agent strings, rotated per client.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Connection establishment bound; request deadlines are set per call.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a [`reqwest::Client`] for catalog requests.
///
/// Uses `user_agent` when given, otherwise a random browser User-Agent.
/// Per-request deadlines are applied by the connectors themselves.
///
/// # Errors
///
/// Returns a [`ConnectorErrorKind::Transient`] error if the client cannot
/// be constructed.
pub fn build_client(user_agent: Option<&str>) -> Result<reqwest::Client, ConnectorError> {
    let ua = user_agent.unwrap_or_else(|| random_user_agent());

    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ConnectorError::transient(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Map a non-success HTTP status onto a connector failure, or `None` when
/// the status is a success.
pub fn classify_status(status: StatusCode) -> Option<ConnectorError> {
    if status.is_success() {
        return None;
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ConnectorErrorKind::Unauthorized,
        StatusCode::NOT_FOUND => ConnectorErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ConnectorErrorKind::RateLimited,
        StatusCode::REQUEST_TIMEOUT => ConnectorErrorKind::Transient,
        s if s.is_server_error() => ConnectorErrorKind::Transient,
        _ => ConnectorErrorKind::Malformed,
    };
    Some(ConnectorError::new(kind, format!("HTTP {}", status.as_u16())))
}

/// Map a transport-level [`reqwest::Error`] onto a connector failure.
pub fn classify_reqwest_error(err: &reqwest::Error) -> ConnectorError {
    if err.is_timeout() {
        ConnectorError::timeout(format!("request timed out: {err}"))
    } else if err.is_connect() {
        ConnectorError::transient(format!("connection failed: {err}"))
    } else if err.is_decode() || err.is_body() {
        ConnectorError::malformed(format!("unreadable response body: {err}"))
    } else if let Some(status) = err.status() {
        classify_status(status)
            .unwrap_or_else(|| ConnectorError::transient(format!("transport error: {err}")))
    } else {
        ConnectorError::transient(format!("transport error: {err}"))
    }
}
