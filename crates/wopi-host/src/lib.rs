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

mod checkfileinfo;
mod content;
pub mod error;
pub mod request;
pub mod response;
mod retry;
mod router;
mod write;

pub use checkfileinfo::{CheckFileInfo, UserExtraInfo};
pub use error::WopiError;
pub use request::{WopiHeaders, WopiOperation, WopiOverride, WopiRequest};
pub use response::{WopiBody, WopiResponse};

use bon::Builder;
use std::sync::Arc;
use std::time::Duration;
use wopi_common::federation::FederationClient;
use wopi_common::guard::RequestGuard;
use wopi_common::token::{AccessToken, TokenManager, TokenStore};
use wopi_core::files::{Actor, FileStore};
use wopi_core::lock::LockProvider;
use wopi_core::templates::TemplateProvider;
use wopi_core::users::UserDirectory;

/// The WOPI host protocol engine.
///
/// One engine serves one host-store instance. Every inbound editor-server
/// call goes through [`WopiEngine::handle`], which runs the request guard
/// and dispatches to the operation handlers. The engine holds no per-file
/// state; concurrent calls for the same file are only serialized by the
/// external lock taken around writes.
#[derive(Clone, Builder)]
pub struct WopiEngine {
    guard: RequestGuard,
    token_manager: TokenManager,
    token_store: Arc<dyn TokenStore>,
    file_store: Arc<dyn FileStore>,
    lock_provider: Arc<dyn LockProvider>,
    users: Arc<dyn UserDirectory>,
    templates: Arc<dyn TemplateProvider>,

    /// Absent when the deployment does not federate; remote-token requests
    /// then degrade to local guest identities.
    federation: Option<FederationClient>,

    /// Owner name recorded on advisory file locks.
    #[builder(into, default = "wopi-host".to_string())]
    app_name: String,

    /// Set when per-user encryption makes impersonation impossible; writes
    /// then run incognito instead of as the token's editor.
    #[builder(default = false)]
    encrypted_storage: bool,

    #[builder(default = 5)]
    retry_attempts: u32,

    #[builder(default = Duration::from_millis(500))]
    retry_delay: Duration,
}

impl WopiEngine {
    /// The identity file reads run as for this token.
    fn read_actor(&self, token: &AccessToken) -> Actor {
        match token.user_for_file_access() {
            Some(uid) => Actor::user(uid),
            None => Actor::Incognito,
        }
    }

    /// The identity writes are attributed to.
    ///
    /// Editors are impersonated so who-changed-what is correct even for
    /// anonymous flows; incognito is only for encrypted storage where
    /// impersonation cannot work.
    fn write_actor(&self, token: &AccessToken) -> Actor {
        if self.encrypted_storage {
            return Actor::Incognito;
        }
        match token.user_for_file_access() {
            Some(uid) => Actor::user(uid),
            None => Actor::Incognito,
        }
    }
}
