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

pub mod mem;

#[cfg(test)]
mod tests;

pub use mem::MemoryCache;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Shared lookup cache with per-entry TTLs and explicit invalidation.
///
/// Callers receive a cache handle rather than reaching for a process-wide
/// singleton, so tests can substitute an in-memory fake and deployments can
/// back it with a distributed store. Entries are read-mostly and replaceable
/// by any caller; no caller may assume exclusive ownership of a key.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the cached value for the key, or `None` when absent or past
    /// its TTL.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value under the key. `ttl = None` means the entry only goes
    /// away through explicit invalidation.
    async fn put(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Drops the entry for the key, if any.
    async fn invalidate(&self, key: &str);
}
