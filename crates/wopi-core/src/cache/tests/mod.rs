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

use crate::cache::{Cache, MemoryCache};
use crate::util::clock::MockClock;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_get_missing_key_returns_none() {
    let cache = MemoryCache::new();
    assert!(cache.get("missing").await.is_none());
}

#[tokio::test]
async fn test_put_and_get_without_ttl() {
    let cache = MemoryCache::new();
    cache.put("endpoint", json!("https://editor.example.com"), None).await;

    assert_eq!(
        cache.get("endpoint").await,
        Some(json!("https://editor.example.com"))
    );
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let cache = MemoryCache::with_clock(clock.clone());

    cache
        .put("endpoint", json!("https://editor.example.com"), Some(Duration::from_secs(3600)))
        .await;

    clock.advance_secs(3599);
    assert!(cache.get("endpoint").await.is_some());

    clock.advance_secs(1);
    assert!(cache.get("endpoint").await.is_none());
    // The stale entry was dropped, not just hidden
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_entry_without_ttl_survives_clock_advance() {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let cache = MemoryCache::with_clock(clock.clone());

    cache.put("details", json!({"token": "abc"}), None).await;
    clock.advance_secs(1_000_000);

    assert_eq!(cache.get("details").await, Some(json!({"token": "abc"})));
}

#[tokio::test]
async fn test_invalidate_removes_entry() {
    let cache = MemoryCache::new();
    cache.put("key", json!(1), None).await;
    cache.invalidate("key").await;

    assert!(cache.get("key").await.is_none());
}

#[tokio::test]
async fn test_put_replaces_existing_value_and_ttl() {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let cache = MemoryCache::with_clock(clock.clone());

    cache.put("key", json!("stale"), Some(Duration::from_secs(10))).await;
    cache.put("key", json!("fresh"), None).await;

    clock.advance_secs(60);
    assert_eq!(cache.get("key").await, Some(json!("fresh")));
}
