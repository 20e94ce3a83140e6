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

pub mod manager;
pub mod mem;
pub mod postgres;
pub mod reaper;

#[cfg(test)]
mod tests;

pub use manager::{IssueRequest, TokenManager};
pub use mem::MemoryTokenStore;
pub use postgres::PostgresTokenStore;
pub use reaper::TokenReaper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Length of generated token values.
pub const TOKEN_LENGTH: usize = 32;

/// The kind of session a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// A logged-in local user.
    User,
    /// An unauthenticated editor identified only by a display name.
    Guest,
    /// The local shadow of a logged-in user on a federated instance.
    RemoteUser,
    /// The local shadow of a guest on a federated instance.
    RemoteGuest,
    /// A handshake credential exchanged for file details by a remote
    /// instance; carries no file binding of its own.
    Initiator,
}

impl TokenType {
    pub fn as_i16(self) -> i16 {
        match self {
            TokenType::User => 0,
            TokenType::Guest => 1,
            TokenType::RemoteUser => 2,
            TokenType::RemoteGuest => 3,
            TokenType::Initiator => 4,
        }
    }

    pub fn from_i16(value: i16) -> Result<Self, TokenError> {
        match value {
            0 => Ok(TokenType::User),
            1 => Ok(TokenType::Guest),
            2 => Ok(TokenType::RemoteUser),
            3 => Ok(TokenType::RemoteGuest),
            4 => Ok(TokenType::Initiator),
            other => Err(TokenError::database_error(format!(
                "invalid token type discriminant: {other}"
            ))),
        }
    }
}

/// An issued access token.
///
/// Rows are immutable after issuance except for the two transitions exposed
/// on [`TokenStore`]: clearing the template linkage after the first save,
/// and upgrading the federation fields once a remote identity resolves.
/// Expiry is never extended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub id: i64,
    pub token: String,
    pub expiry: DateTime<Utc>,
    pub file_id: i64,
    pub owner_id: Option<String>,
    pub editor_id: Option<String>,
    pub version: String,
    pub can_write: bool,
    pub hide_download: bool,
    pub server_host: String,
    pub guest_display_name: Option<String>,
    pub share_token: Option<String>,
    pub template_id: i64,
    pub template_destination: i64,
    pub token_type: TokenType,
    pub remote_server: String,
    pub remote_server_token: String,
    pub direct: bool,
}

impl AccessToken {
    /// The session has no authenticated editor (public link or guest).
    pub fn is_public(&self) -> bool {
        self.editor_id.is_none()
    }

    /// Token serves a template that is being copied to a new file.
    pub fn is_template_token(&self) -> bool {
        self.template_destination != 0
    }

    /// Token belongs to a file that was created from a template and has not
    /// been saved yet.
    pub fn has_template_id(&self) -> bool {
        self.template_id != 0
    }

    pub fn is_remote_token(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::RemoteUser | TokenType::RemoteGuest
        )
    }

    /// The identity file-store operations run as.
    ///
    /// Public-link and share sessions fall back to the share owner so that
    /// storage ACLs resolve without a logged-in session.
    pub fn user_for_file_access(&self) -> Option<&str> {
        if self.share_token.is_some() || self.editor_id.is_none() {
            self.owner_id.as_deref()
        } else {
            self.editor_id.as_deref()
        }
    }
}

/// Fields of a token row prior to insertion; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
    pub file_id: i64,
    pub owner_id: Option<String>,
    pub editor_id: Option<String>,
    pub version: String,
    pub can_write: bool,
    pub hide_download: bool,
    pub server_host: String,
    pub guest_display_name: Option<String>,
    pub share_token: Option<String>,
    pub template_id: i64,
    pub template_destination: i64,
    pub token_type: TokenType,
    pub remote_server: String,
    pub remote_server_token: String,
    pub direct: bool,
}

/// The second permitted post-issue mutation: rewriting a token's federation
/// fields once the remote party's identity and capabilities are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationUpgrade {
    pub token_type: TokenType,
    pub remote_server: String,
    pub remote_server_token: String,
    /// Replaces the guest display when the remote reports one.
    pub guest_display_name: Option<String>,
    /// Narrows (never widens) the write capability when set.
    pub can_write: Option<bool>,
    pub share_token: Option<String>,
}

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No row matches the presented value. Callers answer "forbidden" and
    /// must not leak whether the token ever existed.
    #[error("Unknown token")]
    UnknownToken,

    /// The row exists but its expiry has passed. Distinct from unknown so
    /// clients can tell "log in again" from "not permitted".
    #[error("Token {token_id} is expired")]
    ExpiredToken { token_id: i64 },

    /// Generated token value collided with an existing row.
    #[error("Token value already in use")]
    DuplicateToken,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl TokenError {
    pub fn expired(token_id: i64) -> Self {
        TokenError::ExpiredToken { token_id }
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        TokenError::DatabaseError(message.into())
    }
}

/// Persists issued access tokens.
///
/// `resolve` enforces the expiry contract for every caller: a token is
/// valid while `now <= expiry` and rejected once `expiry < now`. There is
/// deliberately no general update operation; the two named transitions are
/// the only writes after insertion.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Inserts a new row.
    ///
    /// # Errors
    /// Returns `TokenError::DuplicateToken` when the value collides with an
    /// existing row; callers regenerate and retry.
    async fn insert(&self, token: NewToken) -> Result<AccessToken, TokenError>;

    /// Looks up a token by value and checks its expiry.
    ///
    /// # Errors
    /// `UnknownToken` when absent, `ExpiredToken` when `expiry < now`.
    async fn resolve(&self, token_value: &str) -> Result<AccessToken, TokenError>;

    /// Clears the template linkage after the backing file's first save.
    async fn clear_template(&self, token_id: i64) -> Result<(), TokenError>;

    /// Applies a federation upgrade. Idempotent: re-applying the same
    /// upgrade leaves the row unchanged.
    async fn upgrade_federation(
        &self,
        token_id: i64,
        upgrade: FederationUpgrade,
    ) -> Result<(), TokenError>;

    /// Deletes up to `limit` rows whose expiry (plus grace) is in the past.
    /// Returns how many rows went away.
    async fn delete_expired(&self, grace: Duration, limit: usize) -> Result<usize, TokenError>;
}

/// Generates a random alphanumeric credential value.
pub fn random_value(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
