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
pub mod postgres;

#[cfg(test)]
mod tests;

pub use mem::MemoryDirectStore;
pub use postgres::PostgresDirectStore;

use crate::token::TokenError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single-use direct-open credential.
///
/// Direct records resolve one redirect into a full session token and are
/// deleted on first use; they are not session credentials themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRecord {
    pub id: i64,
    pub token: String,
    pub uid: Option<String>,
    pub file_id: i64,
    pub share_token: Option<String>,
    pub template_destination: i64,
    /// Host of the instance the initiating user originates on, when the
    /// open request was itself brokered across federation.
    pub initiator_host: Option<String>,
    pub initiator_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a direct record prior to insertion; the store assigns the id
/// and creation time.
#[derive(Debug, Clone, Default)]
pub struct NewDirect {
    pub token: String,
    pub uid: Option<String>,
    pub file_id: i64,
    pub share_token: Option<String>,
    pub template_destination: i64,
    pub initiator_host: Option<String>,
    pub initiator_token: Option<String>,
}

/// Persists direct-open records.
#[async_trait]
pub trait DirectStore: Send + Sync {
    async fn insert(&self, record: NewDirect) -> Result<DirectRecord, TokenError>;

    /// Looks up a record by token value and deletes it in the same step.
    ///
    /// Strict single use: a second consume of the same value fails with
    /// `UnknownToken` no matter how quickly it follows the first.
    async fn consume(&self, token_value: &str) -> Result<DirectRecord, TokenError>;
}
