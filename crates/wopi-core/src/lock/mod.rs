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

pub use mem::MemoryLockProvider;

use async_trait::async_trait;
use thiserror::Error;

/// Classes of advisory locks known to the lock provider.
///
/// The engine only ever takes application locks; other classes exist so
/// `get_locks` can report what else is holding a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockClass {
    App,
    User,
    Token,
}

/// The scope a lock operation applies to: one file, one class, one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockScope {
    pub file_id: i64,
    pub class: LockClass,
    pub owner: String,
}

impl LockScope {
    pub fn app(file_id: i64, owner: impl Into<String>) -> Self {
        Self {
            file_id,
            class: LockClass::App,
            owner: owner.into(),
        }
    }
}

/// A lock as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub file_id: i64,
    pub class: LockClass,
    pub owner: String,
}

/// Errors reported by the lock provider.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("No lock provider is configured")]
    NoProvider,

    #[error("File {file_id} is locked by '{owner}'")]
    OwnerLocked { file_id: i64, owner: String },

    #[error("Lock provider error: {0}")]
    ProviderError(String),
}

impl LockError {
    pub fn owner_locked(file_id: i64, owner: impl Into<String>) -> Self {
        LockError::OwnerLocked {
            file_id,
            owner: owner.into(),
        }
    }

    pub fn provider_error(message: impl Into<String>) -> Self {
        LockError::ProviderError(message.into())
    }
}

/// Narrow interface to the external lock provider.
///
/// Locking is a best-effort enhancement for the engine: a provider that is
/// not configured reports `NoProvider` (or `available() == false`) and
/// callers degrade to unlocked operation rather than failing the request.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Acquires or refreshes the lock for the scope.
    ///
    /// Re-locking a scope already held by the same owner succeeds (this is
    /// what makes REFRESH_LOCK idempotent). A different owner holding the
    /// file surfaces as `LockError::OwnerLocked`.
    async fn lock(&self, scope: &LockScope) -> Result<(), LockError>;

    /// Releases the lock for the scope. Releasing an unheld scope is not an
    /// error.
    async fn unlock(&self, scope: &LockScope) -> Result<(), LockError>;

    /// All locks currently recorded for the file.
    async fn get_locks(&self, file_id: i64) -> Result<Vec<LockInfo>, LockError>;

    /// Whether a real provider is backing this handle.
    fn available(&self) -> bool;
}
