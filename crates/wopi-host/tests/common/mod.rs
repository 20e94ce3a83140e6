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

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use wopi_common::federation::FederationClient;
use wopi_common::guard::RequestGuard;
use wopi_common::token::{AccessToken, IssueRequest, MemoryTokenStore, TokenManager};
use wopi_core::cache::MemoryCache;
use wopi_core::files::MemoryFileStore;
use wopi_core::lock::MemoryLockProvider;
use wopi_core::templates::MemoryTemplateProvider;
use wopi_core::users::MemoryUserDirectory;
use wopi_core::util::clock::MockClock;
use wopi_host::{WopiEngine, WopiHeaders, WopiOperation, WopiRequest};

pub const BASE_URL: &str = "https://cloud.example.com";
pub const EDITOR_HOST: &str = "https://editor.example.com";
pub const APP_NAME: &str = "wopi-host";

pub struct TestHost {
    pub engine: WopiEngine,
    pub clock: Arc<MockClock>,
    pub token_store: Arc<MemoryTokenStore>,
    pub token_manager: TokenManager,
    pub file_store: Arc<MemoryFileStore>,
    pub lock_provider: Arc<MemoryLockProvider>,
    pub users: Arc<MemoryUserDirectory>,
    pub templates: Arc<MemoryTemplateProvider>,
}

pub struct HostOptions {
    pub lock_provider: Arc<MemoryLockProvider>,
    pub encrypted_storage: bool,
    /// `Some(wildcard patterns)` wires up a federation client trusting
    /// those hosts.
    pub federation_trusted: Option<Vec<String>>,
    pub retry_attempts: u32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            lock_provider: Arc::new(MemoryLockProvider::new()),
            encrypted_storage: false,
            federation_trusted: None,
            retry_attempts: 5,
        }
    }
}

pub fn trusting(patterns: &[&str]) -> Option<Vec<String>> {
    Some(patterns.iter().map(|p| p.to_string()).collect())
}

pub fn test_host() -> TestHost {
    test_host_with(HostOptions::default())
}

pub fn test_host_with(options: HostOptions) -> TestHost {
    let clock = Arc::new(MockClock::new(Utc::now()));
    let token_store = Arc::new(MemoryTokenStore::with_clock(clock.clone()));
    let file_store = Arc::new(MemoryFileStore::with_clock(clock.clone()));
    let users = Arc::new(MemoryUserDirectory::new());
    let templates = Arc::new(MemoryTemplateProvider::new());

    let token_manager = TokenManager::builder()
        .store(token_store.clone())
        .base_url(BASE_URL)
        .clock(clock.clone())
        .build();

    let guard = RequestGuard::builder().token_store(token_store.clone()).build();

    let federation = options.federation_trusted.map(|patterns| {
        FederationClient::builder()
            .cache(Arc::new(MemoryCache::new()))
            .file_store(file_store.clone())
            .token_manager(token_manager.clone())
            .own_host("cloud.example.com")
            .wildcard_patterns(patterns)
            .build()
    });

    let engine = WopiEngine::builder()
        .guard(guard)
        .token_manager(token_manager.clone())
        .token_store(token_store.clone())
        .file_store(file_store.clone())
        .lock_provider(options.lock_provider.clone())
        .users(users.clone())
        .templates(templates.clone())
        .maybe_federation(federation)
        .app_name(APP_NAME)
        .encrypted_storage(options.encrypted_storage)
        .retry_attempts(options.retry_attempts)
        // Keep retried tests fast
        .retry_delay(Duration::from_millis(1))
        .build();

    TestHost {
        engine,
        clock,
        token_store,
        token_manager,
        file_store,
        lock_provider: options.lock_provider,
        users,
        templates,
    }
}

impl TestHost {
    pub async fn issue_user_token(&self, file_id: i64, uid: &str, can_write: bool) -> AccessToken {
        self.token_manager
            .issue(
                IssueRequest::builder()
                    .file_id(file_id)
                    .owner_id(uid.to_string())
                    .editor_id(uid.to_string())
                    .can_write(can_write)
                    .server_host(EDITOR_HOST)
                    .build(),
            )
            .await
            .unwrap()
    }

    pub async fn issue_guest_token(
        &self,
        file_id: i64,
        owner: &str,
        guest_name: &str,
    ) -> AccessToken {
        self.token_manager
            .issue(
                IssueRequest::builder()
                    .file_id(file_id)
                    .owner_id(owner.to_string())
                    .guest_display_name(guest_name.to_string())
                    .server_host(EDITOR_HOST)
                    .build(),
            )
            .await
            .unwrap()
    }
}

pub fn request(operation: WopiOperation, file_id: &str, token: &str) -> WopiRequest {
    WopiRequest::builder()
        .operation(operation)
        .file_id(file_id)
        .access_token(token)
        .build()
}

pub fn post_request(
    file_id: &str,
    token: &str,
    override_action: &str,
    headers: WopiHeaders,
    body: &[u8],
) -> WopiRequest {
    let mut headers = headers;
    headers.override_action = Some(override_action.to_string());
    WopiRequest::builder()
        .operation(WopiOperation::PostFile)
        .file_id(file_id)
        .access_token(token)
        .headers(headers)
        .body(bytes::Bytes::copy_from_slice(body))
        .build()
}

pub fn put_request(file_id: &str, token: &str, timestamp: Option<&str>, body: &[u8]) -> WopiRequest {
    let mut headers = WopiHeaders::default();
    headers.timestamp = timestamp.map(String::from);
    WopiRequest::builder()
        .operation(WopiOperation::PutFile)
        .file_id(file_id)
        .access_token(token)
        .headers(headers)
        .body(bytes::Bytes::copy_from_slice(body))
        .build()
}
