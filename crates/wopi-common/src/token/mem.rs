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

use crate::token::{AccessToken, FederationUpgrade, NewToken, TokenError, TokenStore};
use async_trait::async_trait;
use chrono::TimeDelta;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use wopi_core::util::clock::{default_clock, Clock};

struct MemoryTokenStoreState {
    by_id: HashMap<i64, AccessToken>,
    value_index: HashMap<String, i64>,
    next_id: i64,
}

/// In-memory token store for testing and development.
///
/// Not suitable for production: rows vanish on restart and nothing shares
/// them across instances.
pub struct MemoryTokenStore {
    state: RwLock<MemoryTokenStoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::with_clock(default_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryTokenStoreState {
                by_id: HashMap::new(),
                value_index: HashMap::new(),
                next_id: 1,
            }),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.by_id.len()
    }

    /// Fetches a row by id without the expiry check, for test assertions.
    pub async fn get_by_id(&self, token_id: i64) -> Option<AccessToken> {
        self.state.read().await.by_id.get(&token_id).cloned()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, token: NewToken) -> Result<AccessToken, TokenError> {
        let mut state = self.state.write().await;
        if state.value_index.contains_key(&token.token) {
            return Err(TokenError::DuplicateToken);
        }
        let id = state.next_id;
        state.next_id += 1;
        let row = AccessToken {
            id,
            token: token.token,
            expiry: token.expiry,
            file_id: token.file_id,
            owner_id: token.owner_id,
            editor_id: token.editor_id,
            version: token.version,
            can_write: token.can_write,
            hide_download: token.hide_download,
            server_host: token.server_host,
            guest_display_name: token.guest_display_name,
            share_token: token.share_token,
            template_id: token.template_id,
            template_destination: token.template_destination,
            token_type: token.token_type,
            remote_server: token.remote_server,
            remote_server_token: token.remote_server_token,
            direct: token.direct,
        };
        state.value_index.insert(row.token.clone(), id);
        state.by_id.insert(id, row.clone());
        Ok(row)
    }

    async fn resolve(&self, token_value: &str) -> Result<AccessToken, TokenError> {
        let state = self.state.read().await;
        let id = state
            .value_index
            .get(token_value)
            .ok_or(TokenError::UnknownToken)?;
        let row = state.by_id.get(id).ok_or(TokenError::UnknownToken)?;

        if row.expiry < self.clock.now() {
            return Err(TokenError::expired(row.id));
        }

        Ok(row.clone())
    }

    async fn clear_template(&self, token_id: i64) -> Result<(), TokenError> {
        let mut state = self.state.write().await;
        let row = state
            .by_id
            .get_mut(&token_id)
            .ok_or(TokenError::UnknownToken)?;
        row.template_id = 0;
        Ok(())
    }

    async fn upgrade_federation(
        &self,
        token_id: i64,
        upgrade: FederationUpgrade,
    ) -> Result<(), TokenError> {
        let mut state = self.state.write().await;
        let row = state
            .by_id
            .get_mut(&token_id)
            .ok_or(TokenError::UnknownToken)?;
        row.token_type = upgrade.token_type;
        row.remote_server = upgrade.remote_server;
        row.remote_server_token = upgrade.remote_server_token;
        if let Some(name) = upgrade.guest_display_name {
            row.guest_display_name = Some(name);
        }
        if let Some(can_write) = upgrade.can_write {
            row.can_write = can_write;
        }
        if let Some(share_token) = upgrade.share_token {
            row.share_token = Some(share_token);
        }
        Ok(())
    }

    async fn delete_expired(&self, grace: Duration, limit: usize) -> Result<usize, TokenError> {
        let cutoff = self.clock.now() - TimeDelta::from_std(grace).unwrap_or(TimeDelta::zero());
        let mut state = self.state.write().await;

        let mut doomed: Vec<i64> = state
            .by_id
            .values()
            .filter(|row| row.expiry < cutoff)
            .map(|row| row.id)
            .collect();
        doomed.sort_unstable();
        doomed.truncate(limit);

        for id in &doomed {
            if let Some(row) = state.by_id.remove(id) {
                state.value_index.remove(&row.token);
            }
        }
        Ok(doomed.len())
    }
}
