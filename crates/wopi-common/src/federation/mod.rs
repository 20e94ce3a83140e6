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

use crate::direct::DirectRecord;
use crate::token::{TokenError, TokenManager};
use bon::Builder;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;
use wopi_core::cache::Cache;
use wopi_core::files::FileStore;

const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_NEGATIVE_DISCOVERY_TTL: Duration = Duration::from_secs(300);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A remote instance's view of one of its tokens, as returned by the
/// cross-instance federation exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileDetails {
    pub token: String,
    #[serde(default)]
    pub guest_display_name: Option<String>,
    #[serde(default)]
    pub editor_id: Option<String>,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub template_id: i64,
}

impl RemoteFileDetails {
    pub fn has_template_id(&self) -> bool {
        self.template_id != 0
    }
}

/// Federation failures that callers must not conflate.
///
/// Untrusted and unreachable are separate channels: an untrusted remote is
/// a refusal (no network traffic happens), while an unreachable or
/// unparsable remote surfaces as an absent value on the advisory paths and
/// as `EndpointUnresolved` where federation was the entire point.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error("Remote {0} is not a trusted server")]
    UntrustedRemote(String),

    #[error("Unable to determine the remote host from '{0}'")]
    InvalidRemote(String),

    #[error("No editor endpoint could be resolved for remote {0}")]
    EndpointUnresolved(String),

    #[error("Store failure during federation resolution: {0}")]
    StoreFailure(String),

    #[error("Token failure during federation resolution: {0}")]
    TokenFailure(#[from] TokenError),
}

/// Resolves trust, discovers remote editor endpoints and exchanges token
/// details across host-store instances.
///
/// The client is state-free apart from the injected cache; any instance may
/// refresh or invalidate a cached entry.
#[derive(Clone, Builder)]
pub struct FederationClient {
    #[builder(default = Client::new())]
    http_client: Client,

    cache: Arc<dyn Cache>,

    file_store: Arc<dyn FileStore>,

    token_manager: TokenManager,

    /// This engine's own host, always implicitly trusted.
    #[builder(into)]
    own_host: String,

    /// Exact host[:port] entries from the operator's trusted-server
    /// registry. Only consulted when `use_trusted_domains` is set.
    #[builder(default = Vec::new())]
    trusted_servers: Vec<String>,

    /// `*`-wildcard host patterns that are trusted regardless of the
    /// registry.
    #[builder(default = Vec::new())]
    wildcard_patterns: Vec<String>,

    #[builder(default = false)]
    use_trusted_domains: bool,

    #[builder(default = DEFAULT_DISCOVERY_TTL)]
    discovery_ttl: Duration,

    #[builder(default = DEFAULT_NEGATIVE_DISCOVERY_TTL)]
    negative_discovery_ttl: Duration,

    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    request_timeout: Duration,
}

#[derive(Serialize)]
struct DetailsRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct DiscoveryResponse {
    wopi_url: String,
}

impl FederationClient {
    /// Whether the host is allowed to take part in federation with this
    /// instance.
    pub fn is_trusted_remote(&self, remote: &str) -> bool {
        let Some((host, host_with_port)) = normalize_host(remote) else {
            return false;
        };

        if self.use_trusted_domains
            && self
                .trusted_servers
                .iter()
                .any(|server| *server == host || *server == host_with_port)
        {
            return true;
        }

        self.wildcard_patterns
            .iter()
            .chain(std::iter::once(&self.own_host))
            .filter_map(|pattern| compile_wildcard(pattern))
            .any(|regex| regex.is_match(&host) || regex.is_match(&host_with_port))
    }

    /// Resolves the remote instance's advertised editor-server base URL.
    ///
    /// Positive results are cached for an hour, failures for five minutes.
    /// `Ok(None)` means the remote was reachable in principle but no
    /// endpoint could be determined right now.
    ///
    /// # Errors
    /// `UntrustedRemote` before any network traffic when the host is not
    /// trusted.
    pub async fn remote_editor_endpoint(
        &self,
        remote: &str,
    ) -> Result<Option<String>, FederationError> {
        let remote = normalize_remote(remote)
            .ok_or_else(|| FederationError::InvalidRemote(remote.to_string()))?;

        if !self.is_trusted_remote(&remote) {
            return Err(FederationError::UntrustedRemote(remote));
        }

        let cache_key = format!("federation/endpoint/{remote}");
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(match cached.as_str() {
                Some("") | None => None,
                Some(endpoint) => Some(endpoint.to_string()),
            });
        }

        match self.fetch_editor_endpoint(&remote).await {
            Some(endpoint) => {
                self.cache
                    .put(
                        &cache_key,
                        serde_json::Value::String(endpoint.clone()),
                        Some(self.discovery_ttl),
                    )
                    .await;
                Ok(Some(endpoint))
            }
            None => {
                info!("Unable to determine the editor endpoint of remote server {remote}");
                self.cache
                    .put(
                        &cache_key,
                        serde_json::Value::String(String::new()),
                        Some(self.negative_discovery_ttl),
                    )
                    .await;
                Ok(None)
            }
        }
    }

    /// Exchanges a remote initiator-class token for the remote's view of
    /// the file and its capabilities.
    ///
    /// Advisory: returns `None` on any failure, including an untrusted
    /// remote. Entries are cached without a TTL because the remote token is
    /// single-purpose; only explicit invalidation clears them.
    pub async fn remote_file_details(
        &self,
        remote: &str,
        remote_token: &str,
    ) -> Option<RemoteFileDetails> {
        let remote = normalize_remote(remote)?;

        let cache_key = details_cache_key(&remote, remote_token);
        if let Some(cached) = self.cache.get(&cache_key).await {
            return serde_json::from_value(cached).ok();
        }

        if !self.is_trusted_remote(&remote) {
            info!(
                "Not fetching remote file details from {remote}: remote is not a trusted server"
            );
            return None;
        }

        debug!("Fetching remote file details from {remote}");
        let details = self.fetch_remote_details(&remote, remote_token).await?;

        if let Ok(value) = serde_json::to_value(&details) {
            self.cache.put(&cache_key, value, None).await;
        }
        Some(details)
    }

    /// Drops a cached remote-details entry, for when the remote token has
    /// been replaced.
    pub async fn invalidate_remote_details(&self, remote: &str, remote_token: &str) {
        if let Some(remote) = normalize_remote(remote) {
            self.cache
                .invalidate(&details_cache_key(&remote, remote_token))
                .await;
        }
    }

    /// Builds the URL that sends a local open request back to the instance
    /// actually hosting the file.
    ///
    /// Returns `Ok(None)` when the file is not backed by a federated share
    /// mount — redirecting is simply not applicable. A mount whose remote
    /// cannot resolve an editor endpoint is the broken case and surfaces as
    /// `EndpointUnresolved`.
    pub async fn remote_redirect_url(
        &self,
        file_id: i64,
        direct: Option<&DirectRecord>,
        share_token: Option<&str>,
    ) -> Result<Option<String>, FederationError> {
        let mount = self
            .file_store
            .remote_mount(file_id)
            .await
            .map_err(|e| FederationError::StoreFailure(e.to_string()))?;
        let Some(mount) = mount else {
            return Ok(None);
        };

        let endpoint = self.remote_editor_endpoint(&mount.remote_host).await?;
        if endpoint.is_none() {
            warn!("Failed to connect to the remote editor instance for file {file_id}");
            return Err(FederationError::EndpointUnresolved(mount.remote_host));
        }

        let initiator = self
            .token_manager
            .issue_initiator(
                direct.and_then(|d| d.uid.as_deref()),
                &mount.remote_host,
            )
            .await?;

        // When the open request came in through a direct token minted by yet
        // another instance, record that chain on the initiator credential so
        // the remote can fetch the real initiating user's details; a share
        // origin is recorded alongside it.
        let chain_host = direct
            .and_then(|d| d.initiator_host.as_deref())
            .filter(|host| !host.is_empty());
        let chain_token = direct
            .and_then(|d| d.initiator_token.as_deref())
            .filter(|token| !token.is_empty());
        if chain_host.is_some() || share_token.is_some() {
            self.token_manager
                .extend_initiator(&initiator, chain_host, chain_token, share_token)
                .await?;
        }

        let base = normalize_remote(&mount.remote_host)
            .ok_or_else(|| FederationError::InvalidRemote(mount.remote_host.clone()))?;
        let mut url = Url::parse(&format!("{base}/wopi/remote"))
            .map_err(|_| FederationError::InvalidRemote(mount.remote_host.clone()))?;
        url.query_pairs_mut()
            .append_pair("shareToken", &mount.share_token)
            .append_pair("remoteServer", self.token_manager.base_url())
            .append_pair("remoteServerToken", &initiator.token);
        if !mount.internal_path.is_empty() {
            url.query_pairs_mut()
                .append_pair("filePath", &mount.internal_path);
        }

        Ok(Some(url.to_string()))
    }

    async fn fetch_editor_endpoint(&self, remote: &str) -> Option<String> {
        let response = self
            .http_client
            .get(format!("{remote}/wopi/federation"))
            .timeout(self.request_timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let discovery: DiscoveryResponse = response.json().await.ok()?;
        let endpoint = discovery.wopi_url.trim_end_matches('/').to_string();

        // Only well-formed http(s) URLs are advertised onwards.
        let parsed = Url::parse(&endpoint).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return None;
        }
        Some(endpoint)
    }

    async fn fetch_remote_details(
        &self,
        remote: &str,
        remote_token: &str,
    ) -> Option<RemoteFileDetails> {
        let response = self
            .http_client
            .post(format!("{remote}/wopi/federation"))
            .timeout(self.request_timeout)
            .json(&DetailsRequest { token: remote_token })
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(
                    "Remote {remote} answered the federation exchange with status {}",
                    response.status()
                );
                return None;
            }
            Err(e) => {
                warn!("Unable to fetch remote file details from {remote}: {e}");
                return None;
            }
        };

        match response.json::<RemoteFileDetails>().await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!("Unparsable federation response from {remote}: {e}");
                None
            }
        }
    }
}

fn details_cache_key(remote: &str, remote_token: &str) -> String {
    let mut hasher = DefaultHasher::new();
    remote.hash(&mut hasher);
    remote_token.hash(&mut hasher);
    format!("federation/details/{:016x}", hasher.finish())
}

/// Normalizes a remote reference to `scheme://host[:port]`, defaulting the
/// scheme to https. Returns `None` for anything without a usable host or
/// with a fragment.
fn normalize_remote(remote: &str) -> Option<String> {
    let trimmed = remote.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if parsed.fragment().is_some() {
        return None;
    }
    let host = parsed.host_str()?;

    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// Extracts `host` and `host[:port]` from a remote reference.
fn normalize_host(remote: &str) -> Option<(String, String)> {
    let normalized = normalize_remote(remote)?;
    let parsed = Url::parse(&normalized).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host_with_port = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };
    Some((host, host_with_port))
}

/// Compiles a `*`-wildcard pattern into an anchored, case-insensitive
/// regex; `*` admits host-name characters only.
fn compile_wildcard(pattern: &str) -> Option<Regex> {
    let pattern = pattern
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if pattern.is_empty() {
        return None;
    }
    let escaped = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[-.a-zA-Z0-9]*");
    Regex::new(&format!("(?i)^{escaped}$")).ok()
}
