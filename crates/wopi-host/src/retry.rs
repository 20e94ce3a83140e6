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

use crate::error::WopiError;
use crate::WopiEngine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error};
use wopi_core::files::{Actor, FileError};
use wopi_core::lock::{LockError, LockScope};

impl WopiEngine {
    /// Writes file contents under the advisory application lock, retrying
    /// transient lock contention a bounded number of times.
    ///
    /// Locking is best-effort: a missing lock provider degrades to an
    /// unlocked retry loop rather than failing the request. Retries block
    /// the calling request for the configured delay; there is no
    /// background retry queue.
    pub(crate) async fn write_guarded(
        &self,
        actor: &Actor,
        file_id: i64,
        content: Bytes,
    ) -> Result<DateTime<Utc>, WopiError> {
        let scope = LockScope::app(file_id, self.app_name.clone());

        let holding_lock = match self.lock_provider.lock(&scope).await {
            Ok(()) => true,
            Err(LockError::NoProvider) => {
                debug!("No lock provider available, writing file {file_id} unlocked");
                false
            }
            Err(LockError::OwnerLocked { owner, .. }) => {
                error!("File {file_id} is locked by '{owner}', rejecting write");
                return Err(WopiError::FileLocked);
            }
            Err(LockError::ProviderError(message)) => {
                error!("Lock provider failure for file {file_id}: {message}");
                return Err(WopiError::FileLocked);
            }
        };

        let result = self.retry_write(actor, file_id, content).await;

        if holding_lock {
            if let Err(e) = self.lock_provider.unlock(&scope).await {
                error!("Failed to release write lock for file {file_id}: {e}");
            }
        }

        result
    }

    async fn retry_write(
        &self,
        actor: &Actor,
        file_id: i64,
        content: Bytes,
    ) -> Result<DateTime<Utc>, WopiError> {
        let attempts = self.retry_attempts.max(1);
        for attempt in 1..=attempts {
            match self.file_store.write(actor, file_id, content.clone()).await {
                Ok(mtime) => return Ok(mtime),
                Err(FileError::TransientLock(_)) if attempt < attempts => {
                    debug!(
                        "File {file_id} transiently locked, retrying write (attempt {attempt} of {attempts})"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(FileError::TransientLock(_)) => {
                    error!("Write to file {file_id} failed after {attempts} attempts");
                    return Err(WopiError::RetriesExhausted);
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(WopiError::RetriesExhausted)
    }
}
