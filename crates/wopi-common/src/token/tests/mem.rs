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

use crate::token::{
    FederationUpgrade, MemoryTokenStore, NewToken, TokenError, TokenStore, TokenType,
};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use wopi_core::util::clock::{Clock, MockClock};

fn new_token(value: &str, expiry: chrono::DateTime<chrono::Utc>) -> NewToken {
    NewToken {
        token: value.to_string(),
        expiry,
        file_id: 42,
        owner_id: Some("alice".to_string()),
        editor_id: Some("alice".to_string()),
        version: "0".to_string(),
        can_write: true,
        hide_download: false,
        server_host: "https://editor.example.com".to_string(),
        guest_display_name: None,
        share_token: None,
        template_id: 0,
        template_destination: 0,
        token_type: TokenType::User,
        remote_server: String::new(),
        remote_server_token: String::new(),
        direct: false,
    }
}

#[tokio::test]
async fn test_insert_assigns_ids_and_resolve_round_trips() {
    let store = MemoryTokenStore::new();
    let expiry = Utc::now() + TimeDelta::seconds(600);

    let first = store.insert(new_token("tokenA", expiry)).await.unwrap();
    let second = store.insert(new_token("tokenB", expiry)).await.unwrap();
    assert_ne!(first.id, second.id);

    let resolved = store.resolve("tokenA").await.unwrap();
    assert_eq!(resolved.id, first.id);
    assert_eq!(resolved.file_id, 42);
    assert_eq!(resolved.owner_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_duplicate_value_is_rejected() {
    let store = MemoryTokenStore::new();
    let expiry = Utc::now() + TimeDelta::seconds(600);

    store.insert(new_token("tokenA", expiry)).await.unwrap();
    let result = store.insert(new_token("tokenA", expiry)).await;
    assert!(matches!(result, Err(TokenError::DuplicateToken)));
}

#[tokio::test]
async fn test_resolve_unknown_token_fails() {
    let store = MemoryTokenStore::new();
    let result = store.resolve("never-issued").await;
    assert!(matches!(result, Err(TokenError::UnknownToken)));
}

#[tokio::test]
async fn test_expiry_boundary_is_inclusive_of_validity() {
    let initial = Utc::now();
    let clock = Arc::new(MockClock::new(initial));
    let store = MemoryTokenStore::with_clock(clock.clone());
    let expiry = initial + TimeDelta::seconds(10);
    store.insert(new_token("tokenA", expiry)).await.unwrap();

    // Strictly before expiry: valid
    clock.advance_secs(9);
    assert!(store.resolve("tokenA").await.is_ok());

    // Exactly at expiry: still valid (the contract is `expiry < now`)
    clock.set(expiry);
    assert_eq!(clock.now(), expiry);
    assert!(store.resolve("tokenA").await.is_ok());

    // One tick past expiry: rejected, with the expiry-specific error
    clock.advance(TimeDelta::milliseconds(1));
    let result = store.resolve("tokenA").await;
    assert!(matches!(result, Err(TokenError::ExpiredToken { .. })));
}

#[tokio::test]
async fn test_expired_is_never_unknown() {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let store = MemoryTokenStore::with_clock(clock.clone());
    let inserted = store
        .insert(new_token("tokenA", clock.now() + TimeDelta::seconds(1)))
        .await
        .unwrap();

    clock.advance_secs(2);
    match store.resolve("tokenA").await {
        Err(TokenError::ExpiredToken { token_id }) => assert_eq!(token_id, inserted.id),
        other => panic!("expected ExpiredToken, got {other:?}"),
    }
}

#[tokio::test]
async fn test_clear_template_is_the_only_way_to_drop_linkage() {
    let store = MemoryTokenStore::new();
    let mut row = new_token("tokenA", Utc::now() + TimeDelta::seconds(600));
    row.template_id = 7;
    let inserted = store.insert(row).await.unwrap();
    assert!(inserted.has_template_id());

    store.clear_template(inserted.id).await.unwrap();
    let resolved = store.resolve("tokenA").await.unwrap();
    assert!(!resolved.has_template_id());
    // Expiry was not touched
    assert_eq!(resolved.expiry, inserted.expiry);
}

#[tokio::test]
async fn test_upgrade_federation_is_idempotent() {
    let store = MemoryTokenStore::new();
    let inserted = store
        .insert(new_token("tokenA", Utc::now() + TimeDelta::seconds(600)))
        .await
        .unwrap();

    let upgrade = FederationUpgrade {
        token_type: TokenType::RemoteUser,
        remote_server: "https://other.example.com".to_string(),
        remote_server_token: "remotetok".to_string(),
        guest_display_name: Some("bob@other".to_string()),
        can_write: Some(false),
        share_token: None,
    };

    store
        .upgrade_federation(inserted.id, upgrade.clone())
        .await
        .unwrap();
    let first = store.resolve("tokenA").await.unwrap();

    store.upgrade_federation(inserted.id, upgrade).await.unwrap();
    let second = store.resolve("tokenA").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.token_type, TokenType::RemoteUser);
    assert_eq!(second.remote_server, "https://other.example.com");
    assert!(!second.can_write);
    assert!(second.is_remote_token());
}

#[tokio::test]
async fn test_delete_expired_respects_grace_and_limit() {
    let initial = Utc::now();
    let clock = Arc::new(MockClock::new(initial));
    let store = MemoryTokenStore::with_clock(clock.clone());

    for n in 0..5 {
        store
            .insert(new_token(
                &format!("stale{n}"),
                initial + TimeDelta::seconds(10),
            ))
            .await
            .unwrap();
    }
    store
        .insert(new_token("fresh", initial + TimeDelta::seconds(10_000)))
        .await
        .unwrap();

    // Rows are expired but still inside the grace window: nothing goes away
    clock.advance_secs(30);
    let removed = store
        .delete_expired(Duration::from_secs(60), 100)
        .await
        .unwrap();
    assert_eq!(removed, 0);

    // Past the grace window, deletion is bounded by the batch limit
    clock.advance_secs(60);
    let removed = store
        .delete_expired(Duration::from_secs(60), 3)
        .await
        .unwrap();
    assert_eq!(removed, 3);

    let removed = store
        .delete_expired(Duration::from_secs(60), 100)
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.len().await, 1);
    assert!(store.resolve("fresh").await.is_ok());
}

#[tokio::test]
async fn test_user_for_file_access_prefers_editor_unless_shared() {
    let store = MemoryTokenStore::new();
    let expiry = Utc::now() + TimeDelta::seconds(600);

    let mut row = new_token("a", expiry);
    row.editor_id = Some("bob".to_string());
    let token = store.insert(row).await.unwrap();
    assert_eq!(token.user_for_file_access(), Some("bob"));

    let mut row = new_token("b", expiry);
    row.share_token = Some("sharetok".to_string());
    let token = store.insert(row).await.unwrap();
    assert_eq!(token.user_for_file_access(), Some("alice"));

    let mut row = new_token("c", expiry);
    row.editor_id = None;
    let token = store.insert(row).await.unwrap();
    assert_eq!(token.user_for_file_access(), Some("alice"));
    assert!(token.is_public());
}
