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

use crate::federation::FederationClient;
use crate::guard::RequestGuard;
use crate::token::{TokenManager, TokenReaper, TokenStore};
use bon::Builder;
use ipnet::IpNet;
use std::sync::Arc;
use std::time::Duration;
use wopi_core::cache::Cache;
use wopi_core::files::FileStore;

/// Policy values for one engine instance.
///
/// Everything here is operator-tunable; the defaults mirror the behavior
/// the protocol was written against (ten-hour session tokens, five write
/// retries half a second apart, hour-long discovery caching). The struct
/// doubles as the composition root: the `*_for` constructors wire the
/// engine components with these values so policy lives in exactly one
/// place.
#[derive(Clone, Builder)]
pub struct EngineConfig {
    /// Origin of this host as seen by editor servers and federated peers.
    #[builder(into)]
    pub base_url: String,

    /// Storage instance id embedded in composite file identifiers.
    #[builder(into, default = String::new())]
    pub instance_id: String,

    /// Application name used as the owner of advisory file locks.
    #[builder(into, default = "wopi-host".to_string())]
    pub app_name: String,

    /// Set when the storage layer's per-user encryption makes
    /// impersonation impossible; writes then run incognito.
    #[builder(default = false)]
    pub encrypted_storage: bool,

    /// How long issued tokens stay valid.
    #[builder(default = Duration::from_secs(36_000))]
    pub token_ttl: Duration,

    /// Bounded retry for writes that hit transient lock contention.
    #[builder(default = 5)]
    pub retry_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    pub retry_delay: Duration,

    /// Expired-token maintenance pass.
    #[builder(default = Duration::from_secs(3600))]
    pub reaper_interval: Duration,
    #[builder(default = Duration::from_secs(60))]
    pub reaper_grace: Duration,
    #[builder(default = 1000)]
    pub reaper_batch_limit: usize,

    /// Caller addresses allowed on the WOPI surface; empty means
    /// unrestricted.
    #[builder(default = Vec::new())]
    pub allowlist: Vec<IpNet>,

    /// Federation trust settings.
    #[builder(default = Vec::new())]
    pub trusted_servers: Vec<String>,
    #[builder(default = Vec::new())]
    pub wildcard_patterns: Vec<String>,
    #[builder(default = false)]
    pub use_trusted_domains: bool,
    #[builder(default = Duration::from_secs(3600))]
    pub discovery_ttl: Duration,
    #[builder(default = Duration::from_secs(300))]
    pub negative_discovery_ttl: Duration,
}

impl EngineConfig {
    pub fn token_manager(&self, store: Arc<dyn TokenStore>) -> TokenManager {
        TokenManager::builder()
            .store(store)
            .base_url(self.base_url.clone())
            .instance_id(self.instance_id.clone())
            .token_ttl(self.token_ttl)
            .build()
    }

    pub fn request_guard(&self, store: Arc<dyn TokenStore>) -> RequestGuard {
        RequestGuard::builder()
            .token_store(store)
            .allowlist(self.allowlist.clone())
            .build()
    }

    pub fn token_reaper(&self, store: Arc<dyn TokenStore>) -> TokenReaper {
        TokenReaper::builder()
            .store(store)
            .interval(self.reaper_interval)
            .grace(self.reaper_grace)
            .batch_limit(self.reaper_batch_limit)
            .build()
    }

    pub fn federation_client(
        &self,
        cache: Arc<dyn Cache>,
        file_store: Arc<dyn FileStore>,
        token_manager: TokenManager,
    ) -> FederationClient {
        FederationClient::builder()
            .cache(cache)
            .file_store(file_store)
            .token_manager(token_manager)
            .own_host(self.base_url.clone())
            .trusted_servers(self.trusted_servers.clone())
            .wildcard_patterns(self.wildcard_patterns.clone())
            .use_trusted_domains(self.use_trusted_domains)
            .discovery_ttl(self.discovery_ttl)
            .negative_discovery_ttl(self.negative_discovery_ttl)
            .build()
    }
}
