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

use crate::direct::DirectRecord;
use crate::federation::{FederationClient, FederationError, RemoteFileDetails};
use crate::token::{MemoryTokenStore, TokenManager};
use chrono::Utc;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wopi_core::cache::MemoryCache;
use wopi_core::files::{MemoryFileStore, RemoteMount};

struct Fixture {
    client: FederationClient,
    file_store: Arc<MemoryFileStore>,
    token_store: Arc<MemoryTokenStore>,
}

fn fixture(trusted_patterns: Vec<&str>) -> Fixture {
    let token_store = Arc::new(MemoryTokenStore::new());
    let file_store = Arc::new(MemoryFileStore::new());
    let token_manager = TokenManager::builder()
        .store(token_store.clone())
        .base_url("https://cloud.example.com")
        .build();

    let client = FederationClient::builder()
        .cache(Arc::new(MemoryCache::new()))
        .file_store(file_store.clone())
        .token_manager(token_manager)
        .own_host("cloud.example.com")
        .wildcard_patterns(trusted_patterns.into_iter().map(String::from).collect())
        .build();

    Fixture {
        client,
        file_store,
        token_store,
    }
}

#[tokio::test]
async fn test_own_host_is_always_trusted() {
    let fixture = fixture(vec![]);
    assert!(fixture.client.is_trusted_remote("https://cloud.example.com"));
    assert!(fixture.client.is_trusted_remote("cloud.example.com/"));
    assert!(!fixture.client.is_trusted_remote("https://evil.example.org"));
}

#[tokio::test]
async fn test_wildcard_patterns_admit_subdomains() {
    let fixture = fixture(vec!["*.example.com"]);
    assert!(fixture.client.is_trusted_remote("https://a.example.com"));
    assert!(fixture.client.is_trusted_remote("https://b.example.com:8443"));
    assert!(!fixture.client.is_trusted_remote("https://examplexcom.org"));
}

#[tokio::test]
async fn test_trusted_server_registry_requires_flag() {
    let token_store = Arc::new(MemoryTokenStore::new());
    let token_manager = TokenManager::builder()
        .store(token_store)
        .base_url("https://cloud.example.com")
        .build();

    let build = |use_trusted_domains: bool| {
        FederationClient::builder()
            .cache(Arc::new(MemoryCache::new()))
            .file_store(Arc::new(MemoryFileStore::new()))
            .token_manager(token_manager.clone())
            .own_host("cloud.example.com")
            .trusted_servers(vec!["partner.example.org".to_string()])
            .use_trusted_domains(use_trusted_domains)
            .build()
    };

    assert!(build(true).is_trusted_remote("https://partner.example.org"));
    assert!(!build(false).is_trusted_remote("https://partner.example.org"));
}

#[tokio::test]
async fn test_untrusted_remote_short_circuits_without_network_call() {
    let mock_server = MockServer::start().await;
    // Any request reaching the server fails the test
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec![]);
    let result = fixture.client.remote_editor_endpoint(&mock_server.uri()).await;

    assert!(matches!(result, Err(FederationError::UntrustedRemote(_))));
    mock_server.verify().await;
}

#[tokio::test]
async fn test_remote_editor_endpoint_is_discovered_and_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "wopi_url": "https://editor.other.example.com/"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);

    let first = fixture
        .client
        .remote_editor_endpoint(&mock_server.uri())
        .await
        .unwrap();
    assert_eq!(first.as_deref(), Some("https://editor.other.example.com"));

    // Served from the cache; the expect(1) above verifies no second hit
    let second = fixture
        .client
        .remote_editor_endpoint(&mock_server.uri())
        .await
        .unwrap();
    assert_eq!(second, first);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_discovery_failure_is_negative_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);

    assert!(fixture
        .client
        .remote_editor_endpoint(&mock_server.uri())
        .await
        .unwrap()
        .is_none());
    // Second call is answered by the negative cache
    assert!(fixture
        .client
        .remote_editor_endpoint(&mock_server.uri())
        .await
        .unwrap()
        .is_none());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_remote_file_details_exchange() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wopi/federation"))
        .and(body_json(serde_json::json!({"token": "remotetok"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "sessiontok",
            "guestDisplayName": "bob@other.example.com",
            "editorId": "bob",
            "canWrite": true,
            "templateId": 0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);

    let details = fixture
        .client
        .remote_file_details(&mock_server.uri(), "remotetok")
        .await
        .unwrap();
    assert_eq!(details.token, "sessiontok");
    assert_eq!(details.editor_id.as_deref(), Some("bob"));
    assert!(details.can_write);

    // Cached by (remote, token); expect(1) verifies no second exchange
    let cached = fixture
        .client
        .remote_file_details(&mock_server.uri(), "remotetok")
        .await
        .unwrap();
    assert_eq!(cached, details);
    mock_server.verify().await;
}

#[tokio::test]
async fn test_remote_file_details_returns_none_on_garbage() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);
    let details = fixture
        .client
        .remote_file_details(&mock_server.uri(), "remotetok")
        .await;
    assert!(details.is_none());
}

#[tokio::test]
async fn test_remote_file_details_untrusted_is_none_without_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec![]);
    assert!(fixture
        .client
        .remote_file_details(&mock_server.uri(), "remotetok")
        .await
        .is_none());
    mock_server.verify().await;
}

#[tokio::test]
async fn test_redirect_url_for_local_file_is_not_applicable() {
    let fixture = fixture(vec!["127.0.0.1"]);
    let local = fixture.file_store.add_file("/docs/report.odt", "x").await;

    let url = fixture
        .client
        .remote_redirect_url(local, None, None)
        .await
        .unwrap();
    assert!(url.is_none());
}

#[tokio::test]
async fn test_redirect_url_for_mounted_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "wopi_url": "https://editor.other.example.com"
        })))
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);
    let mounted = fixture.file_store.add_file("/remote/report.odt", "x").await;
    fixture
        .file_store
        .add_remote_mount(
            mounted,
            RemoteMount {
                remote_host: mock_server.uri(),
                share_token: "mountshare".to_string(),
                internal_path: "/report.odt".to_string(),
            },
        )
        .await;

    let url = fixture
        .client
        .remote_redirect_url(mounted, None, None)
        .await
        .unwrap()
        .expect("mounted file must redirect");

    assert!(url.starts_with(&format!("{}/wopi/remote?", mock_server.uri())));
    assert!(url.contains("shareToken=mountshare"));
    assert!(url.contains("remoteServer=https%3A%2F%2Fcloud.example.com"));
    assert!(url.contains("remoteServerToken="));
    assert!(url.contains("filePath=%2Freport.odt"));
}

#[tokio::test]
async fn test_redirect_url_with_direct_chain_extends_initiator() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "wopi_url": "https://editor.other.example.com"
        })))
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);
    let mounted = fixture.file_store.add_file("/remote/report.odt", "x").await;
    fixture
        .file_store
        .add_remote_mount(
            mounted,
            RemoteMount {
                remote_host: mock_server.uri(),
                share_token: "mountshare".to_string(),
                internal_path: String::new(),
            },
        )
        .await;

    let direct = DirectRecord {
        id: 1,
        token: "direkt".to_string(),
        uid: Some("carol".to_string()),
        file_id: mounted,
        share_token: None,
        template_destination: 0,
        initiator_host: Some("https://origin.example.com".to_string()),
        initiator_token: Some("chaintok".to_string()),
        created_at: Utc::now(),
    };

    let url = fixture
        .client
        .remote_redirect_url(mounted, Some(&direct), None)
        .await
        .unwrap()
        .expect("mounted file must redirect");
    assert!(!url.contains("filePath="));

    // The minted initiator carries the chain back to the origin instance
    let minted = fixture.token_store.get_by_id(1).await.unwrap();
    assert_eq!(minted.remote_server, "https://origin.example.com");
    assert_eq!(minted.remote_server_token, "chaintok");
    assert_eq!(minted.editor_id.as_deref(), Some("carol"));
}

#[tokio::test]
async fn test_redirect_with_unresolvable_endpoint_is_an_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wopi/federation"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let fixture = fixture(vec!["127.0.0.1"]);
    let mounted = fixture.file_store.add_file("/remote/report.odt", "x").await;
    fixture
        .file_store
        .add_remote_mount(
            mounted,
            RemoteMount {
                remote_host: mock_server.uri(),
                share_token: "mountshare".to_string(),
                internal_path: String::new(),
            },
        )
        .await;

    let result = fixture.client.remote_redirect_url(mounted, None, None).await;
    assert!(matches!(result, Err(FederationError::EndpointUnresolved(_))));
}

#[tokio::test]
async fn test_details_round_trip_through_wire_format() {
    let details = RemoteFileDetails {
        token: "t".to_string(),
        guest_display_name: None,
        editor_id: None,
        can_write: false,
        template_id: 7,
    };
    let value = serde_json::to_value(&details).unwrap();
    assert_eq!(value["templateId"], 7);
    let back: RemoteFileDetails = serde_json::from_value(value).unwrap();
    assert_eq!(back, details);
}
