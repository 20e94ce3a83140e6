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

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Read-only view of the host's user accounts.
///
/// Lookups must never fail a request: an unknown uid returns `None`/`false`
/// and the caller degrades to a guest display. This keeps CheckFileInfo
/// total even when a token's editor has been deleted since issuance.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, uid: &str) -> Option<String>;

    async fn is_admin(&self, uid: &str) -> bool;

    /// Whether the host has administratively barred the user from using
    /// the editor integration.
    async fn is_feature_locked(&self, uid: &str) -> bool;
}

#[derive(Clone, Default)]
struct UserRecord {
    display_name: String,
    admin: bool,
    feature_locked: bool,
    email: Option<String>,
}

/// In-memory user directory for testing and development.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, uid: &str, display_name: &str) {
        self.users.lock().unwrap().insert(
            uid.to_string(),
            UserRecord {
                display_name: display_name.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn add_admin(&self, uid: &str, display_name: &str) {
        self.users.lock().unwrap().insert(
            uid.to_string(),
            UserRecord {
                display_name: display_name.to_string(),
                admin: true,
                ..Default::default()
            },
        );
    }

    pub fn set_feature_locked(&self, uid: &str, locked: bool) {
        if let Some(record) = self.users.lock().unwrap().get_mut(uid) {
            record.feature_locked = locked;
        }
    }

    pub fn set_email(&self, uid: &str, email: &str) {
        if let Some(record) = self.users.lock().unwrap().get_mut(uid) {
            record.email = Some(email.to_string());
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn display_name(&self, uid: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .get(uid)
            .map(|record| record.display_name.clone())
    }

    async fn is_admin(&self, uid: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(uid)
            .map(|record| record.admin)
            .unwrap_or(false)
    }

    async fn is_feature_locked(&self, uid: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(uid)
            .map(|record| record.feature_locked)
            .unwrap_or(false)
    }
}
