// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service error taxonomy and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::signing::SigningError;
use crate::blockchain::{RpcError, TxBuildError};
use crate::crypto::EnvelopeError;
use crate::storage::StoreError;

/// Errors returned by the wallet services.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Malformed address, amount or encoding.
    #[error("{0}")]
    Validation(String),

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("wallet not found")]
    WalletNotFound,

    #[error("rate limit exceeded")]
    RateLimited,

    /// Stored envelope did not authenticate under the master key.
    #[error("key envelope authentication failed")]
    Authentication,

    #[error("no held key matches required signer {0}")]
    MissingSigner(String),

    /// RPC node unreachable or returned an error. Retryable.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WalletError {
    pub fn error_code(&self) -> &'static str {
        match self {
            WalletError::Validation(_) => "validation_error",
            WalletError::MalformedTransaction(_) => "malformed_transaction",
            WalletError::WalletNotFound => "wallet_not_found",
            WalletError::RateLimited => "rate_limited",
            WalletError::Authentication => "authentication_error",
            WalletError::MissingSigner(_) => "missing_signer",
            WalletError::Upstream(_) => "upstream_unavailable",
            WalletError::Storage(_) => "storage_error",
            WalletError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            WalletError::Validation(_) | WalletError::MalformedTransaction(_) => {
                StatusCode::BAD_REQUEST
            }
            WalletError::WalletNotFound => StatusCode::NOT_FOUND,
            WalletError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            WalletError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            WalletError::Authentication
            | WalletError::MissingSigner(_)
            | WalletError::Storage(_)
            | WalletError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::Upstream(_) | WalletError::RateLimited)
    }
}

impl From<EnvelopeError> for WalletError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Authentication => WalletError::Authentication,
            other => WalletError::Internal(other.to_string()),
        }
    }
}

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        WalletError::Upstream(err.to_string())
    }
}

impl From<SigningError> for WalletError {
    fn from(err: SigningError) -> Self {
        WalletError::Internal(err.to_string())
    }
}

impl From<TxBuildError> for WalletError {
    fn from(err: TxBuildError) -> Self {
        match err {
            TxBuildError::InvalidAmount(msg) => WalletError::Validation(msg),
            TxBuildError::MissingSigner(key) => WalletError::MissingSigner(key.to_string()),
            other => WalletError::Internal(other.to_string()),
        }
    }
}

// =============================================================================
// HTTP rendering
// =============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

/// Error response body.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", message)
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        let status = err.status_code();
        let code = err.error_code();

        // Server-side failures get a generic message; details stay in the logs.
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %err, error_code = code, "Request failed");
            "internal server error".to_string()
        } else {
            err.to_string()
        };

        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
