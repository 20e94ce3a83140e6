//  Copyright (c) 2026 Metaform Systems, Inc
//
//  This program and the accompanying materials are made available under the
//  terms of the Apache License, Version 2.0 which is available at
//  https://www.apache.org/licenses/LICENSE-2.0
//
//  SPDX-License-Identifier: Apache-2.0
//
//  Contributors:
//       Metaform Systems, Inc. - initial API and implementation
//

use crate::response::WopiResponse;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;
use wopi_common::token::TokenError;
use wopi_core::files::FileError;

/// Handler-level failures, each owning its protocol status.
///
/// Client responses never carry failure detail beyond the status and the
/// distinguished conflict/locked markers; the detail strings are for the
/// log only.
#[derive(Debug, Error)]
pub enum WopiError {
    /// Unknown token, token/file mismatch, missing write permission.
    #[error("Not permitted: {0}")]
    Authorization(String),

    /// Token past its expiry; clients re-authenticate rather than retry.
    #[error("Token expired")]
    Expired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Another application holds the file lock.
    #[error("File {0} is owner-locked")]
    OwnerLocked(i64),

    /// The storage layer kept reporting a transient lock through every
    /// allowed attempt.
    #[error("Operation failed after multiple retries")]
    RetriesExhausted,

    /// Storage refused the write because the file is locked.
    #[error("File locked")]
    FileLocked,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WopiError {
    pub fn authorization(message: impl Into<String>) -> Self {
        WopiError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        WopiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        WopiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        WopiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WopiError::Authorization(_) => StatusCode::FORBIDDEN,
            WopiError::Expired => StatusCode::UNAUTHORIZED,
            WopiError::NotFound(_) => StatusCode::NOT_FOUND,
            WopiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WopiError::OwnerLocked(_) => StatusCode::LOCKED,
            WopiError::RetriesExhausted | WopiError::FileLocked | WopiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn into_response(self) -> WopiResponse {
        match self {
            WopiError::FileLocked => WopiResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: crate::response::WopiBody::Json(json!({ "message": "File locked" })),
            },
            other => WopiResponse::status_only(other.status()),
        }
    }
}

impl From<TokenError> for WopiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::UnknownToken | TokenError::DuplicateToken => {
                WopiError::Authorization("unknown token".to_string())
            }
            TokenError::ExpiredToken { .. } => WopiError::Expired,
            TokenError::DatabaseError(message) => WopiError::Internal(message),
        }
    }
}

impl From<FileError> for WopiError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::NotFound(id) => WopiError::NotFound(format!("file {id}")),
            FileError::PathNotFound(path) => WopiError::NotFound(path),
            FileError::PermissionDenied(id) => {
                WopiError::Authorization(format!("no access to file {id}"))
            }
            FileError::TransientLock(_) => WopiError::FileLocked,
            FileError::StoreError(message) => WopiError::Internal(message),
        }
    }
}
