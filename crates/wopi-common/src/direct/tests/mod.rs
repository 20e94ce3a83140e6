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

use crate::direct::{DirectStore, MemoryDirectStore, NewDirect};
use crate::token::{random_value, TokenError};

fn new_record(token: &str) -> NewDirect {
    NewDirect {
        token: token.to_string(),
        uid: Some("alice".to_string()),
        file_id: 42,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_insert_and_consume() {
    let store = MemoryDirectStore::new();
    let inserted = store.insert(new_record("direct1")).await.unwrap();
    assert_eq!(inserted.file_id, 42);
    assert_eq!(inserted.uid.as_deref(), Some("alice"));

    let consumed = store.consume("direct1").await.unwrap();
    assert_eq!(consumed.id, inserted.id);
}

#[tokio::test]
async fn test_consume_is_strictly_single_use() {
    let store = MemoryDirectStore::new();
    store.insert(new_record("direct1")).await.unwrap();

    store.consume("direct1").await.unwrap();
    let second = store.consume("direct1").await;
    assert!(matches!(second, Err(TokenError::UnknownToken)));
}

#[tokio::test]
async fn test_consume_unknown_token_fails() {
    let store = MemoryDirectStore::new();
    let result = store.consume("never-issued").await;
    assert!(matches!(result, Err(TokenError::UnknownToken)));
}

#[tokio::test]
async fn test_duplicate_token_value_rejected() {
    let store = MemoryDirectStore::new();
    store.insert(new_record("direct1")).await.unwrap();
    let result = store.insert(new_record("direct1")).await;
    assert!(matches!(result, Err(TokenError::DuplicateToken)));
}

#[tokio::test]
async fn test_initiator_chain_round_trips() {
    let store = MemoryDirectStore::new();
    let token = random_value(64);
    store
        .insert(NewDirect {
            token: token.clone(),
            uid: None,
            file_id: 7,
            share_token: Some("share".to_string()),
            template_destination: 0,
            initiator_host: Some("https://origin.example.com".to_string()),
            initiator_token: Some("inittok".to_string()),
        })
        .await
        .unwrap();

    let consumed = store.consume(&token).await.unwrap();
    assert_eq!(
        consumed.initiator_host.as_deref(),
        Some("https://origin.example.com")
    );
    assert_eq!(consumed.initiator_token.as_deref(), Some("inittok"));
}
