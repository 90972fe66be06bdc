// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Crate-wide error taxonomy.
//!
//! Every surfaced error carries a stable machine code (for the REST error
//! envelope's `error.code` field) and a human message. `NetworkError` is
//! never surfaced to a REST caller; it is produced by [`crate::http_client`]
//! and converted into a logged webhook execution-log row by
//! [`crate::webhooks`].

use custom_error::custom_error;

pub type AmityResult<T> = std::result::Result<T, AmityError>;

custom_error! {
    #[derive(Clone, PartialEq, Eq)]
    pub AmityError
    NotFound{what: String} = "{what} was not found",
    Unauthenticated = "missing, invalid or expired session token",
    Forbidden = "you do not have permission to perform this action",
    BadRequest{reason: String} = "{reason}",
    Conflict{reason: String} = "{reason}",
    RateLimited{retry_after_secs: u64} = "rate limited, retry after {retry_after_secs}s",
    Internal{reason: String} = "internal error: {reason}",
    NetworkError{reason: String} = "network error: {reason}",
}

impl AmityError {
    /// The stable snake_case code used in the REST error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AmityError::NotFound { .. } => "not_found",
            AmityError::Unauthenticated => "unauthenticated",
            AmityError::Forbidden => "forbidden",
            AmityError::BadRequest { .. } => "bad_request",
            AmityError::Conflict { .. } => "conflict",
            AmityError::RateLimited { .. } => "rate_limited",
            AmityError::Internal { .. } => "internal",
            AmityError::NetworkError { .. } => "network_error",
        }
    }

    /// The HTTP status a routing layer should translate this error into.
    pub fn http_status(&self) -> u16 {
        match self {
            AmityError::NotFound { .. } => 404,
            AmityError::Unauthenticated => 401,
            AmityError::Forbidden => 403,
            AmityError::BadRequest { .. } => 400,
            AmityError::Conflict { .. } => 409,
            AmityError::RateLimited { .. } => 429,
            AmityError::Internal { .. } | AmityError::NetworkError { .. } => 500,
        }
    }
}

impl From<reqwest::Error> for AmityError {
    fn from(value: reqwest::Error) -> Self {
        AmityError::NetworkError {
            reason: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for AmityError {
    fn from(value: serde_json::Error) -> Self {
        AmityError::BadRequest {
            reason: format!("malformed json: {value}"),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AmityError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => AmityError::NotFound {
                what: "resource".to_string(),
            },
            other => AmityError::Internal {
                reason: other.to_string(),
            },
        }
    }
}

custom_error! {
    /// Gateway close-code family.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub GatewayCloseError
    NotAuthenticated = "4003: client did not identify within identify_timeout",
    AuthenticationFailed = "4004: bearer token sent with Identify is invalid",
    InvalidSequence = "4007: resume sequence number is outside the replay window",
    Backpressure = "4008: session dispatch could not keep up, send_timeout exceeded",
    GoingAway = "1001: heartbeat ack timeout, session is being dropped",
}

impl GatewayCloseError {
    pub fn close_code(self) -> u16 {
        match self {
            GatewayCloseError::NotAuthenticated => 4003,
            GatewayCloseError::AuthenticationFailed => 4004,
            GatewayCloseError::InvalidSequence => 4007,
            GatewayCloseError::Backpressure => 4008,
            GatewayCloseError::GoingAway => 1001,
        }
    }
}

custom_error! {
    /// Errors produced while executing a plugin invocation.
    #[derive(Clone, PartialEq, Eq)]
    pub SandboxError
    Timeout = "execution exceeded max_execution_time",
    MemoryLimitExceeded = "execution exceeded max_memory",
    CpuLimitExceeded = "execution exceeded max_cpu_ms",
    NetworkDenied = "plugin attempted network access without allow_network",
    Panicked{reason: String} = "plugin invocation panicked: {reason}",
}
