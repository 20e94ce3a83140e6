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

use crate::direct::DirectRecord;
use crate::federation::RemoteFileDetails;
use crate::token::{
    random_value, AccessToken, FederationUpgrade, NewToken, TokenError, TokenStore, TokenType,
    TOKEN_LENGTH,
};
use bon::Builder;
use chrono::TimeDelta;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use wopi_core::util::clock::{default_clock, Clock};

const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(36_000);
const GENERATION_ATTEMPTS: u32 = 5;

/// Issues and upgrades access tokens for editor sessions.
///
/// One manager serves a single engine instance; the store behind it may be
/// shared across instances.
#[derive(Clone, Builder)]
pub struct TokenManager {
    store: Arc<dyn TokenStore>,

    /// Origin of this host as seen by the editor server, e.g.
    /// `https://cloud.example.com`.
    #[builder(into)]
    base_url: String,

    /// Storage instance id embedded in composite file identifiers.
    #[builder(into, default = String::new())]
    instance_id: String,

    /// How long issued tokens stay valid.
    #[builder(default = DEFAULT_TOKEN_TTL)]
    token_ttl: Duration,

    #[builder(default = default_clock())]
    clock: Arc<dyn Clock>,
}

/// Parameters for issuing a session token.
#[derive(Debug, Clone, Builder)]
pub struct IssueRequest {
    pub file_id: i64,
    #[builder(into)]
    pub owner_id: Option<String>,
    #[builder(into)]
    pub editor_id: Option<String>,
    #[builder(into, default = "0".to_string())]
    pub version: String,
    #[builder(default = false)]
    pub can_write: bool,
    #[builder(into)]
    pub server_host: String,
    #[builder(into)]
    pub guest_display_name: Option<String>,
    #[builder(default = 0)]
    pub template_destination: i64,
    #[builder(default = false)]
    pub hide_download: bool,
    #[builder(default = false)]
    pub direct: bool,
    #[builder(default = 0)]
    pub template_id: i64,
    #[builder(into)]
    pub share_token: Option<String>,
}

impl TokenManager {
    /// Issues a session token for a file.
    ///
    /// The token type is derived from the request: a guest display name
    /// marks the session as a guest, otherwise it is a local user session.
    /// Generation retries on a value collision; uniqueness is enforced by
    /// the store, not assumed from the randomness.
    pub async fn issue(&self, request: IssueRequest) -> Result<AccessToken, TokenError> {
        let expiry = self.new_token_expiry();
        let token_type = if request.guest_display_name.is_some() {
            TokenType::Guest
        } else {
            TokenType::User
        };

        let mut attempt = 0;
        loop {
            let row = NewToken {
                token: random_value(TOKEN_LENGTH),
                expiry,
                file_id: request.file_id,
                owner_id: request.owner_id.clone(),
                editor_id: request.editor_id.clone(),
                version: request.version.clone(),
                can_write: request.can_write,
                hide_download: request.hide_download,
                server_host: request.server_host.clone(),
                guest_display_name: request.guest_display_name.clone(),
                share_token: request.share_token.clone(),
                template_id: request.template_id,
                template_destination: request.template_destination,
                token_type,
                remote_server: String::new(),
                remote_server_token: String::new(),
                direct: request.direct,
            };

            match self.store.insert(row).await {
                Ok(token) => {
                    debug!(
                        "Issued token {} for file {} (type {:?})",
                        token.id, token.file_id, token.token_type
                    );
                    return Ok(token);
                }
                Err(TokenError::DuplicateToken) if attempt < GENERATION_ATTEMPTS => {
                    attempt += 1;
                    warn!("Token value collision on insert, regenerating (attempt {attempt})");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Mints a federation handshake credential.
    ///
    /// Initiator tokens carry no file binding; a remote instance presents
    /// one back to this host to obtain the initiating user's details.
    pub async fn issue_initiator(
        &self,
        local_uid: Option<&str>,
        remote_server: &str,
    ) -> Result<AccessToken, TokenError> {
        let mut attempt = 0;
        loop {
            let row = NewToken {
                token: random_value(TOKEN_LENGTH),
                expiry: self.new_token_expiry(),
                file_id: 0,
                owner_id: None,
                editor_id: local_uid.map(str::to_string),
                version: "0".to_string(),
                can_write: false,
                hide_download: false,
                server_host: String::new(),
                guest_display_name: None,
                share_token: None,
                template_id: 0,
                template_destination: 0,
                token_type: TokenType::Initiator,
                remote_server: remote_server.to_string(),
                remote_server_token: String::new(),
                direct: false,
            };

            match self.store.insert(row).await {
                Ok(token) => return Ok(token),
                Err(TokenError::DuplicateToken) if attempt < GENERATION_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Rewrites a token's federation fields once the remote party's
    /// identity and capabilities are known.
    ///
    /// Safe to re-apply when a handshake is retried: the same inputs produce
    /// the same row.
    pub async fn upgrade_to_remote(
        &self,
        token: &AccessToken,
        remote: &RemoteFileDetails,
        share_token: Option<&str>,
        remote_server: &str,
        remote_server_token: &str,
    ) -> Result<(), TokenError> {
        let token_type = if remote.editor_id.is_some() {
            TokenType::RemoteUser
        } else {
            TokenType::RemoteGuest
        };

        let upgrade = FederationUpgrade {
            token_type,
            remote_server: remote_server.to_string(),
            remote_server_token: remote_server_token.to_string(),
            guest_display_name: remote.guest_display_name.clone(),
            // The session may only write when both sides allow it.
            can_write: Some(token.can_write && remote.can_write),
            share_token: share_token.map(str::to_string),
        };

        self.store.upgrade_federation(token.id, upgrade).await
    }

    /// Merges a pending direct-open record's initiator metadata into a
    /// freshly issued token, so the remote chain stays traceable when the
    /// initiating user originates on a third instance.
    pub async fn upgrade_from_direct_initiator(
        &self,
        direct: &DirectRecord,
        token: &AccessToken,
    ) -> Result<(), TokenError> {
        let upgrade = FederationUpgrade {
            token_type: TokenType::RemoteGuest,
            remote_server: direct.initiator_host.clone().unwrap_or_default(),
            remote_server_token: direct.initiator_token.clone().unwrap_or_default(),
            guest_display_name: None,
            can_write: None,
            share_token: None,
        };
        self.store.upgrade_federation(token.id, upgrade).await
    }

    /// Scopes an initiator token to the share it originated from and, when
    /// the open request was itself brokered across federation, records
    /// where the initiating user actually originates so the remote can
    /// chase the chain. The token stays an initiator credential.
    pub async fn extend_initiator(
        &self,
        token: &AccessToken,
        initiator_host: Option<&str>,
        initiator_token: Option<&str>,
        share_token: Option<&str>,
    ) -> Result<(), TokenError> {
        let upgrade = FederationUpgrade {
            token_type: TokenType::Initiator,
            remote_server: initiator_host.unwrap_or(&token.remote_server).to_string(),
            remote_server_token: initiator_token.unwrap_or_default().to_string(),
            guest_display_name: None,
            can_write: None,
            share_token: share_token.map(str::to_string),
        };
        self.store.upgrade_federation(token.id, upgrade).await
    }

    /// Origin of this host as seen by editor servers and federated peers.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The editor-server callback URL for a token.
    pub fn launch_url(&self, token: &AccessToken) -> String {
        let base = self.base_url.trim_end_matches('/');
        let composite = if self.instance_id.is_empty() {
            token.file_id.to_string()
        } else {
            format!("{}_{}", token.file_id, self.instance_id)
        };
        format!("{base}/wopi/files/{composite}?access_token={}", token.token)
    }

    /// Normalizes a guest display name to carry exactly one guest marker.
    pub fn prepare_guest_name(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let cleaned = trimmed
            .strip_suffix("(Guest)")
            .map(str::trim_end)
            .unwrap_or(trimmed);
        format!("{cleaned} (Guest)")
    }

    fn new_token_expiry(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
            + TimeDelta::from_std(self.token_ttl).unwrap_or_else(|_| TimeDelta::seconds(0))
    }
}
