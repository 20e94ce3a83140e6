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

use crate::cache::Cache;
use crate::util::clock::{default_clock, Clock};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct CacheEntry {
    value: Value,
    deadline: Option<DateTime<Utc>>,
}

/// In-memory cache for testing and single-instance deployments.
///
/// Expired entries behave as absent and are dropped lazily on access; there
/// is no background sweeper.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(default_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) => {
                    if entry.deadline.map_or(true, |deadline| now < deadline) {
                        return Some(entry.value.clone());
                    }
                }
            }
        }

        // The entry exists but is stale; take the write lock to drop it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.deadline.is_some_and(|deadline| deadline <= now) {
                entries.remove(key);
            }
        }
        None
    }

    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>) {
        // A TTL too large to represent behaves like no TTL at all.
        let deadline = ttl
            .and_then(|ttl| TimeDelta::from_std(ttl).ok())
            .and_then(|delta| self.clock.now().checked_add_signed(delta));
        self.entries
            .write()
            .await
            .insert(key.to_string(), CacheEntry { value, deadline });
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
