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

#[cfg(test)]
mod tests;

use crate::token::{AccessToken, TokenError, TokenStore};
use bon::Builder;
use ipnet::IpNet;
use log::{error, info};
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use wopi_core::fileid::{parse_file_id, FileId};

/// Validates an inbound WOPI call before any handler runs.
///
/// Three checks, in order: the caller's address against the configured
/// allow-list, the access token against the store, and the path-derived
/// file id against the token's bound file. Tokens are single-file-scoped;
/// a mismatch is an authorization failure, never a lookup miss.
#[derive(Clone, Builder)]
pub struct RequestGuard {
    token_store: Arc<dyn TokenStore>,

    /// CIDR ranges and addresses allowed to call the WOPI surface. An
    /// empty list means unrestricted; this fail-open default is a
    /// deliberate operator choice.
    #[builder(default = Vec::new())]
    allowlist: Vec<IpNet>,
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Request address {0:?} is not in the WOPI allow-list")]
    IpNotAllowed(Option<IpAddr>),

    #[error("Malformed file id in request path: {0}")]
    MalformedFileId(String),

    #[error("Unknown token")]
    UnknownToken,

    #[error("Token {token_id} is expired")]
    ExpiredToken { token_id: i64 },

    #[error("File id {requested} does not match token {token_id}")]
    FileMismatch { requested: i64, token_id: i64 },

    #[error("Token store failure: {0}")]
    StoreFailure(String),
}

impl GuardError {
    /// Only expiry maps to "log in again"; every other rejection is a plain
    /// authorization failure.
    pub fn is_expiry(&self) -> bool {
        matches!(self, GuardError::ExpiredToken { .. })
    }
}

impl From<TokenError> for GuardError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::UnknownToken => GuardError::UnknownToken,
            TokenError::ExpiredToken { token_id } => GuardError::ExpiredToken { token_id },
            other => GuardError::StoreFailure(other.to_string()),
        }
    }
}

impl RequestGuard {
    /// Authorizes a request for a composite file id.
    ///
    /// # Errors
    /// Any [`GuardError`]; callers map expiry to 401 and everything else to
    /// 403 without leaking which check failed.
    pub async fn authorize(
        &self,
        raw_file_id: &str,
        token_value: &str,
        peer: Option<IpAddr>,
    ) -> Result<(AccessToken, FileId), GuardError> {
        if !self.ip_allowed(peer) {
            info!(
                "WOPI request denied from {:?}: not within the configured ranges",
                peer
            );
            return Err(GuardError::IpNotAllowed(peer));
        }

        let file_id = parse_file_id(raw_file_id)
            .map_err(|_| GuardError::MalformedFileId(raw_file_id.to_string()))?;

        let token = self.token_store.resolve(token_value).await.map_err(|e| {
            let guard_error = GuardError::from(e);
            if let GuardError::StoreFailure(ref message) = guard_error {
                error!("Failed to validate WOPI access: {message}");
            }
            guard_error
        })?;

        if file_id.id != token.file_id && file_id.id != token.template_id {
            info!(
                "Token {} presented for file {} but is bound to file {}",
                token.id, file_id.id, token.file_id
            );
            return Err(GuardError::FileMismatch {
                requested: file_id.id,
                token_id: token.id,
            });
        }

        Ok((token, file_id))
    }

    fn ip_allowed(&self, peer: Option<IpAddr>) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }
        match peer {
            Some(address) => self.allowlist.iter().any(|net| net.contains(&address)),
            // A configured allow-list with no resolvable peer fails closed.
            None => false,
        }
    }
}

/// Parses operator-supplied allow-list entries: CIDR ranges or bare
/// addresses (which become host-length networks).
pub fn parse_allowlist(entries: &[String]) -> Result<Vec<IpNet>, String> {
    entries
        .iter()
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|_| format!("invalid allow-list entry: {entry}"))
        })
        .collect()
}
