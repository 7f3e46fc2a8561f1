//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! The WebSocket dispatcher reuses the same codes when it translates a
//! failed command into a room-scoped error event.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 6001,
///     "message": "room is full",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                |
/// |-----------|---------------|----------------------------|
/// | 1000–1999 | Validation    | 400 Bad Request            |
/// | 2000–2999 | Not Found     | 404 Not Found              |
/// | 3000–3999 | Server/Store  | 500 Internal Server Error  |
/// | 4000–4999 | Conflict      | 409 Conflict               |
/// | 5000–5999 | Forbidden     | 403 Forbidden              |
/// | 6000–6999 | Invalid State | 422 Unprocessable Entity   |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed (malformed payload, out-of-range values).
    #[error("invalid request: {0}")]
    Validation(String),

    /// Room with the given ID was not found.
    #[error("room not found: {0}")]
    RoomNotFound(uuid::Uuid),

    /// Quiz session with the given ID was not found.
    #[error("quiz not found: {0}")]
    QuizNotFound(uuid::Uuid),

    /// Optimistic write lost against a concurrent writer; the caller must
    /// re-read and retry.
    #[error("stale version for {0}; retry the operation")]
    VersionConflict(String),

    /// Participant already has a ledger entry for this round.
    #[error("answer already submitted for round {round}")]
    AlreadySubmitted {
        /// 1-based round number of the rejected resubmission.
        round: u32,
    },

    /// Generic conflict (already started, already applied).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not the room owner.
    #[error("caller is not the room owner")]
    NotOwner,

    /// Caller is blacklisted from the room.
    #[error("caller is blacklisted from this room")]
    Blacklisted,

    /// Private room password mismatch.
    #[error("wrong room password")]
    WrongPassword,

    /// Caller is not a member of the room.
    #[error("caller is not a member of this room")]
    NotMember,

    /// Room is at capacity.
    #[error("room is full")]
    RoomFull,

    /// Not every non-owner player is ready.
    #[error("not all players are ready")]
    NotAllReady,

    /// A player left between readiness check and game start.
    #[error("player left during start")]
    PlayerLeftDuringStart,

    /// Submission targets a round that is not currently active.
    #[error("round not active: {0}")]
    RoundNotActive(String),

    /// Generic invalid-state failure.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Shared-store failure; fatal to the triggering command only.
    #[error("store error: {0}")]
    Store(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::RoomNotFound(_) => 2001,
            Self::QuizNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Store(_) => 3001,
            Self::VersionConflict(_) => 4001,
            Self::AlreadySubmitted { .. } => 4002,
            Self::Conflict(_) => 4003,
            Self::NotOwner => 5001,
            Self::Blacklisted => 5002,
            Self::WrongPassword => 5003,
            Self::NotMember => 5004,
            Self::InvalidState(_) => 6000,
            Self::RoomFull => 6001,
            Self::NotAllReady => 6002,
            Self::PlayerLeftDuringStart => 6003,
            Self::RoundNotActive(_) => 6004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RoomNotFound(_) | Self::QuizNotFound(_) => StatusCode::NOT_FOUND,
            Self::VersionConflict(_) | Self::AlreadySubmitted { .. } | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::NotOwner | Self::Blacklisted | Self::WrongPassword | Self::NotMember => {
                StatusCode::FORBIDDEN
            }
            Self::InvalidState(_)
            | Self::RoomFull
            | Self::NotAllReady
            | Self::PlayerLeftDuringStart
            | Self::RoundNotActive(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionMismatch { key } => Self::VersionConflict(key),
            StoreError::WrongKind { key, .. } => Self::Store(format!("wrong value kind at {key}")),
            StoreError::Serde(msg) => Self::Store(msg),
            StoreError::Backend(msg) => Self::Store(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
