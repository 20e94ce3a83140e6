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

use crate::guard::{parse_allowlist, GuardError, RequestGuard};
use crate::token::{IssueRequest, MemoryTokenStore, TokenManager};
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use wopi_core::util::clock::MockClock;

async fn issue_token(store: Arc<MemoryTokenStore>, file_id: i64) -> String {
    let manager = TokenManager::builder()
        .store(store)
        .base_url("https://cloud.example.com")
        .build();
    manager
        .issue(
            IssueRequest::builder()
                .file_id(file_id)
                .owner_id("alice".to_string())
                .editor_id("alice".to_string())
                .server_host("https://editor.example.com")
                .can_write(true)
                .build(),
        )
        .await
        .unwrap()
        .token
}

#[tokio::test]
async fn test_matching_file_id_is_authorized() {
    let store = Arc::new(MemoryTokenStore::new());
    let token = issue_token(store.clone(), 42).await;

    let guard = RequestGuard::builder().token_store(store).build();
    let (resolved, file_id) = guard.authorize("42", &token, None).await.unwrap();

    assert_eq!(resolved.file_id, 42);
    assert_eq!(file_id.id, 42);
    assert!(file_id.is_current_version());
}

#[tokio::test]
async fn test_mismatched_file_id_is_rejected_even_when_both_exist() {
    let store = Arc::new(MemoryTokenStore::new());
    let token_for_42 = issue_token(store.clone(), 42).await;
    let _token_for_43 = issue_token(store.clone(), 43).await;

    let guard = RequestGuard::builder().token_store(store).build();
    let result = guard.authorize("43", &token_for_42, None).await;

    assert!(matches!(
        result,
        Err(GuardError::FileMismatch { requested: 43, .. })
    ));
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let store = Arc::new(MemoryTokenStore::new());
    let guard = RequestGuard::builder().token_store(store).build();

    let result = guard.authorize("42", "nosuchtoken", None).await;
    assert!(matches!(result, Err(GuardError::UnknownToken)));
}

#[tokio::test]
async fn test_expired_token_is_distinct_from_unknown() {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let store = Arc::new(MemoryTokenStore::with_clock(clock.clone()));
    let manager = TokenManager::builder()
        .store(store.clone())
        .base_url("https://cloud.example.com")
        .token_ttl(Duration::from_secs(10))
        .clock(clock.clone())
        .build();
    let token = manager
        .issue(
            IssueRequest::builder()
                .file_id(42)
                .server_host("https://editor.example.com")
                .build(),
        )
        .await
        .unwrap();

    clock.advance_secs(11);

    let guard = RequestGuard::builder().token_store(store).build();
    let result = guard.authorize("42", &token.token, None).await;

    assert!(matches!(result, Err(ref e @ GuardError::ExpiredToken { .. }) if e.is_expiry()));
}

#[tokio::test]
async fn test_malformed_file_id_is_rejected() {
    let store = Arc::new(MemoryTokenStore::new());
    let token = issue_token(store.clone(), 42).await;

    let guard = RequestGuard::builder().token_store(store).build();
    let result = guard.authorize("../../etc/passwd", &token, None).await;
    assert!(matches!(result, Err(GuardError::MalformedFileId(_))));
}

#[tokio::test]
async fn test_empty_allowlist_is_unrestricted() {
    let store = Arc::new(MemoryTokenStore::new());
    let token = issue_token(store.clone(), 42).await;

    let guard = RequestGuard::builder().token_store(store).build();
    let peer: IpAddr = "203.0.113.9".parse().unwrap();
    assert!(guard.authorize("42", &token, Some(peer)).await.is_ok());
    assert!(guard.authorize("42", &token, None).await.is_ok());
}

#[tokio::test]
async fn test_allowlist_admits_listed_range_only() {
    let store = Arc::new(MemoryTokenStore::new());
    let token = issue_token(store.clone(), 42).await;

    let allowlist =
        parse_allowlist(&["10.0.0.0/8".to_string(), "192.0.2.7".to_string()]).unwrap();
    let guard = RequestGuard::builder()
        .token_store(store)
        .allowlist(allowlist)
        .build();

    let inside: IpAddr = "10.1.2.3".parse().unwrap();
    let pinned: IpAddr = "192.0.2.7".parse().unwrap();
    let outside: IpAddr = "203.0.113.9".parse().unwrap();

    assert!(guard.authorize("42", &token, Some(inside)).await.is_ok());
    assert!(guard.authorize("42", &token, Some(pinned)).await.is_ok());
    assert!(matches!(
        guard.authorize("42", &token, Some(outside)).await,
        Err(GuardError::IpNotAllowed(_))
    ));
    // With a non-empty list, an unresolvable peer fails closed
    assert!(matches!(
        guard.authorize("42", &token, None).await,
        Err(GuardError::IpNotAllowed(None))
    ));
}

#[tokio::test]
async fn test_template_token_authorizes_template_id() {
    let store = Arc::new(MemoryTokenStore::new());
    let manager = TokenManager::builder()
        .store(store.clone())
        .base_url("https://cloud.example.com")
        .build();
    let token = manager
        .issue(
            IssueRequest::builder()
                .file_id(42)
                .template_id(7)
                .server_host("https://editor.example.com")
                .build(),
        )
        .await
        .unwrap();

    let guard = RequestGuard::builder().token_store(store).build();
    assert!(guard.authorize("7", &token.token, None).await.is_ok());
    assert!(guard.authorize("42", &token.token, None).await.is_ok());
    assert!(guard.authorize("8", &token.token, None).await.is_err());
}

#[test]
fn test_parse_allowlist_rejects_garbage() {
    assert!(parse_allowlist(&["not-an-address".to_string()]).is_err());
    assert!(parse_allowlist(&[]).unwrap().is_empty());
}

mod store_failures {
    use super::*;
    use crate::token::{
        AccessToken, FederationUpgrade, NewToken, TokenError, TokenStore,
    };
    use mockall::mock;

    mock! {
        pub Store {}

        #[async_trait::async_trait]
        impl TokenStore for Store {
            async fn insert(&self, token: NewToken) -> Result<AccessToken, TokenError>;
            async fn resolve(&self, token_value: &str) -> Result<AccessToken, TokenError>;
            async fn clear_template(&self, token_id: i64) -> Result<(), TokenError>;
            async fn upgrade_federation(
                &self,
                token_id: i64,
                upgrade: FederationUpgrade,
            ) -> Result<(), TokenError>;
            async fn delete_expired(
                &self,
                grace: std::time::Duration,
                limit: usize,
            ) -> Result<usize, TokenError>;
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed_and_is_not_expiry() {
        let mut store = MockStore::new();
        store
            .expect_resolve()
            .returning(|_| Err(TokenError::database_error("connection refused")));

        let guard = RequestGuard::builder().token_store(Arc::new(store)).build();
        let result = guard.authorize("42", "sometoken", None).await;

        match result {
            Err(e @ GuardError::StoreFailure(_)) => assert!(!e.is_expiry()),
            other => panic!("expected StoreFailure, got {other:?}"),
        }
    }
}
