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

use crate::lock::{LockClass, LockError, LockInfo, LockProvider, LockScope};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory lock provider for testing and single-instance deployments.
///
/// Keeps at most one lock per (file, class). The `unavailable()`
/// constructor builds a handle that reports no provider, for exercising the
/// engine's degraded mode.
pub struct MemoryLockProvider {
    locks: Mutex<HashMap<(i64, u8), LockInfo>>,
    available: bool,
}

fn class_key(class: LockClass) -> u8 {
    match class {
        LockClass::App => 0,
        LockClass::User => 1,
        LockClass::Token => 2,
    }
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            available: true,
        }
    }

    /// A handle that behaves as if no lock provider were configured.
    pub fn unavailable() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            available: false,
        }
    }
}

impl Default for MemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    async fn lock(&self, scope: &LockScope) -> Result<(), LockError> {
        if !self.available {
            return Err(LockError::NoProvider);
        }
        let mut locks = self.locks.lock().unwrap();
        let key = (scope.file_id, class_key(scope.class));
        if let Some(existing) = locks.get(&key) {
            if existing.owner != scope.owner {
                return Err(LockError::owner_locked(scope.file_id, &existing.owner));
            }
            return Ok(());
        }
        locks.insert(
            key,
            LockInfo {
                file_id: scope.file_id,
                class: scope.class,
                owner: scope.owner.clone(),
            },
        );
        Ok(())
    }

    async fn unlock(&self, scope: &LockScope) -> Result<(), LockError> {
        if !self.available {
            return Err(LockError::NoProvider);
        }
        let mut locks = self.locks.lock().unwrap();
        let key = (scope.file_id, class_key(scope.class));
        if let Some(existing) = locks.get(&key) {
            if existing.owner != scope.owner {
                return Err(LockError::owner_locked(scope.file_id, &existing.owner));
            }
            locks.remove(&key);
        }
        Ok(())
    }

    async fn get_locks(&self, file_id: i64) -> Result<Vec<LockInfo>, LockError> {
        if !self.available {
            return Err(LockError::NoProvider);
        }
        let locks = self.locks.lock().unwrap();
        Ok(locks
            .values()
            .filter(|info| info.file_id == file_id)
            .cloned()
            .collect())
    }

    fn available(&self) -> bool {
        self.available
    }
}
