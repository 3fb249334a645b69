// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::directive::DirectiveStatus;

/// Error codes shared by the HTTP API and the WebSocket protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    InsufficientStake,
    DuplicateIdentifier,
    ValidationError,
    AgentNotFound,
    AgentUnreachable,
    UnknownDirective,
    StaleTransition,
    NotRegistered,
    TransportFailure,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest | Self::ValidationError => 400,
            Self::InsufficientStake => 402,
            Self::DuplicateIdentifier | Self::StaleTransition => 409,
            Self::AgentNotFound | Self::AgentUnreachable | Self::UnknownDirective => 404,
            Self::NotRegistered => 403,
            Self::TransportFailure => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::InsufficientStake => "INSUFFICIENT_STAKE",
            Self::DuplicateIdentifier => "DUPLICATE_IDENTIFIER",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::AgentUnreachable => "AGENT_UNREACHABLE",
            Self::UnknownDirective => "UNKNOWN_DIRECTIVE",
            Self::StaleTransition => "STALE_TRANSITION",
            Self::NotRegistered => "NOT_REGISTERED",
            Self::TransportFailure => "TRANSPORT_FAILURE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

// -- Domain errors ------------------------------------------------------------

/// Why an agent was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("insufficient stake: offered {offered}, required {required}")]
    InsufficientStake { offered: u64, required: u64 },
    #[error("agent id '{0}' is already registered")]
    DuplicateIdentifier(String),
}

impl AdmissionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InsufficientStake { .. } => ErrorCode::InsufficientStake,
            Self::DuplicateIdentifier(_) => ErrorCode::DuplicateIdentifier,
        }
    }
}

/// A directive request that cannot be created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("payload must be a JSON object")]
    PayloadNotObject,
}

/// A write to a connection that did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("connection closed")]
    Closed,
    #[error("send timed out")]
    Timeout,
}

/// Failure of `create_and_dispatch`. No directive is retained in any case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("agent '{0}' is not connected")]
    AgentUnreachable(String),
    #[error("delivery to agent '{agent_id}' failed: {source}")]
    Transport { agent_id: String, source: TransportFailure },
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::AgentUnreachable(_) => ErrorCode::AgentUnreachable,
            Self::Transport { .. } => ErrorCode::TransportFailure,
        }
    }
}

/// A status report that was rejected and not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("unknown directive '{0}'")]
    UnknownDirective(String),
    #[error("directive '{id}' is already {current}")]
    StaleTransition { id: String, current: DirectiveStatus },
}

impl TransitionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownDirective(_) => ErrorCode::UnknownDirective,
            Self::StaleTransition { .. } => ErrorCode::StaleTransition,
        }
    }
}

/// An inbound frame that could not be turned into a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not a JSON object: {0}")]
    Malformed(String),
    #[error("message has no action")]
    MissingAction,
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("invalid '{action}' message: {reason}")]
    InvalidFields { action: String, reason: String },
}

impl ProtocolError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::BadRequest
    }
}
