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

use crate::direct::{DirectRecord, DirectStore, NewDirect};
use crate::token::TokenError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use wopi_core::util::clock::{default_clock, Clock};

struct MemoryDirectStoreState {
    by_token: HashMap<String, DirectRecord>,
    next_id: i64,
}

/// In-memory direct-open record store for testing and development.
pub struct MemoryDirectStore {
    state: Mutex<MemoryDirectStoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryDirectStore {
    pub fn new() -> Self {
        Self::with_clock(default_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MemoryDirectStoreState {
                by_token: HashMap::new(),
                next_id: 1,
            }),
            clock,
        }
    }
}

impl Default for MemoryDirectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectStore for MemoryDirectStore {
    async fn insert(&self, record: NewDirect) -> Result<DirectRecord, TokenError> {
        let mut state = self.state.lock().await;
        if state.by_token.contains_key(&record.token) {
            return Err(TokenError::DuplicateToken);
        }
        let id = state.next_id;
        state.next_id += 1;
        let row = DirectRecord {
            id,
            token: record.token,
            uid: record.uid,
            file_id: record.file_id,
            share_token: record.share_token,
            template_destination: record.template_destination,
            initiator_host: record.initiator_host,
            initiator_token: record.initiator_token,
            created_at: self.clock.now(),
        };
        state.by_token.insert(row.token.clone(), row.clone());
        Ok(row)
    }

    async fn consume(&self, token_value: &str) -> Result<DirectRecord, TokenError> {
        // Lookup and delete under one lock so a concurrent consumer of the
        // same value cannot win as well.
        let mut state = self.state.lock().await;
        state
            .by_token
            .remove(token_value)
            .ok_or(TokenError::UnknownToken)
    }
}
