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

use crate::token::TokenStore;
use bon::Builder;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_GRACE: Duration = Duration::from_secs(60);
const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Best-effort garbage collector for expired token rows.
///
/// Runs off the request hot path: a periodic maintenance pass deletes a
/// bounded batch of rows whose expiry (plus a short grace period) has
/// passed. Failures are logged and retried at the next tick; the loop never
/// dies on its own.
#[derive(Clone, Builder)]
pub struct TokenReaper {
    store: Arc<dyn TokenStore>,

    #[builder(default = DEFAULT_INTERVAL)]
    interval: Duration,

    /// Rows stay resolvable-as-expired for this long before deletion, so
    /// in-flight requests see `ExpiredToken` rather than `UnknownToken`.
    #[builder(default = DEFAULT_GRACE)]
    grace: Duration,

    #[builder(default = DEFAULT_BATCH_LIMIT)]
    batch_limit: usize,
}

/// Handle to a running reaper loop.
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl TokenReaper {
    /// Runs one maintenance pass, returning how many rows were deleted.
    pub async fn run_once(&self) -> usize {
        match self.store.delete_expired(self.grace, self.batch_limit).await {
            Ok(0) => 0,
            Ok(count) => {
                debug!("Reaped {count} expired token rows");
                count
            }
            Err(e) => {
                warn!("Expired-token cleanup failed, will retry at next interval: {e}");
                0
            }
        }
    }

    /// Starts the periodic loop in a background task.
    pub fn start(self) -> ReaperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        self.run_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        ReaperHandle { shutdown_tx, task }
    }
}
