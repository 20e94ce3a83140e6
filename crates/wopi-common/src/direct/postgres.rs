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

use crate::direct::{DirectRecord, DirectStore, NewDirect};
use crate::token::TokenError;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use wopi_core::util::clock::{default_clock, Clock};

/// Postgres-backed direct-open record store.
///
/// `consume` deletes the row in the same statement that reads it, so the
/// single-use guarantee holds across engine instances sharing the table.
#[derive(Builder)]
pub struct PostgresDirectStore {
    pool: PgPool,

    #[builder(default = default_clock())]
    clock: Arc<dyn Clock>,
}

impl PostgresDirectStore {
    /// Creates the `wopi_direct` table if it doesn't already exist.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn initialize(&self) -> Result<(), TokenError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wopi_direct (
                id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                token VARCHAR(128) NOT NULL UNIQUE,
                uid VARCHAR(255),
                file_id BIGINT NOT NULL,
                share_token VARCHAR(255),
                template_destination BIGINT NOT NULL,
                initiator_host VARCHAR(2048),
                initiator_token VARCHAR(64),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::database_error(format!("Failed to create direct table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl DirectStore for PostgresDirectStore {
    async fn insert(&self, record: NewDirect) -> Result<DirectRecord, TokenError> {
        let row: DirectRow = sqlx::query_as(
            "INSERT INTO wopi_direct (
                token, uid, file_id, share_token, template_destination,
                initiator_host, initiator_token, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(&record.token)
        .bind(&record.uid)
        .bind(record.file_id)
        .bind(&record.share_token)
        .bind(record.template_destination)
        .bind(&record.initiator_host)
        .bind(&record.initiator_token)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => TokenError::DuplicateToken,
            _ => TokenError::database_error(format!("Failed to insert direct record: {}", e)),
        })?;

        Ok(row.into())
    }

    async fn consume(&self, token_value: &str) -> Result<DirectRecord, TokenError> {
        let row: Option<DirectRow> =
            sqlx::query_as("DELETE FROM wopi_direct WHERE token = $1 RETURNING *")
                .bind(token_value)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    TokenError::database_error(format!("Failed to consume direct record: {}", e))
                })?;

        row.map(DirectRecord::from).ok_or(TokenError::UnknownToken)
    }
}

#[derive(sqlx::FromRow)]
struct DirectRow {
    id: i64,
    token: String,
    uid: Option<String>,
    file_id: i64,
    share_token: Option<String>,
    template_destination: i64,
    initiator_host: Option<String>,
    initiator_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DirectRow> for DirectRecord {
    fn from(row: DirectRow) -> Self {
        DirectRecord {
            id: row.id,
            token: row.token,
            uid: row.uid,
            file_id: row.file_id,
            share_token: row.share_token,
            template_destination: row.template_destination,
            initiator_host: row.initiator_host,
            initiator_token: row.initiator_token,
            created_at: row.created_at,
        }
    }
}
