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

use crate::token::{
    AccessToken, FederationUpgrade, NewToken, TokenError, TokenStore, TokenType,
};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use wopi_core::util::clock::{default_clock, Clock};

/// Postgres-backed token store using SQLx connection pooling.
///
/// Persists issued tokens so multiple engine instances can resolve the same
/// session credentials. Uniqueness of the token value is a table
/// constraint, not an assumption: collisions on insert surface as
/// [`TokenError::DuplicateToken`] and the caller regenerates.
#[derive(Builder)]
pub struct PostgresTokenStore {
    pool: PgPool,

    #[builder(default = default_clock())]
    clock: Arc<dyn Clock>,
}

impl PostgresTokenStore {
    /// Creates the `wopi_tokens` table and indexes if they don't already
    /// exist.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn initialize(&self) -> Result<(), TokenError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wopi_tokens (
                id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                token VARCHAR(64) NOT NULL UNIQUE,
                expiry TIMESTAMP WITH TIME ZONE NOT NULL,
                file_id BIGINT NOT NULL,
                owner_id VARCHAR(255),
                editor_id VARCHAR(255),
                version VARCHAR(64) NOT NULL,
                can_write BOOLEAN NOT NULL,
                hide_download BOOLEAN NOT NULL,
                server_host VARCHAR(2048) NOT NULL,
                guest_display_name VARCHAR(255),
                share_token VARCHAR(255),
                template_id BIGINT NOT NULL,
                template_destination BIGINT NOT NULL,
                token_type SMALLINT NOT NULL,
                remote_server VARCHAR(2048) NOT NULL,
                remote_server_token VARCHAR(64) NOT NULL,
                direct BOOLEAN NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::database_error(format!("Failed to create tokens table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_wopi_tokens_expiry ON wopi_tokens(expiry)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                TokenError::database_error(format!("Failed to create expiry index: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for PostgresTokenStore {
    async fn insert(&self, token: NewToken) -> Result<AccessToken, TokenError> {
        let record: TokenRecord = sqlx::query_as(
            "INSERT INTO wopi_tokens (
                token, expiry, file_id, owner_id, editor_id, version,
                can_write, hide_download, server_host, guest_display_name,
                share_token, template_id, template_destination, token_type,
                remote_server, remote_server_token, direct
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING *",
        )
        .bind(&token.token)
        .bind(token.expiry)
        .bind(token.file_id)
        .bind(&token.owner_id)
        .bind(&token.editor_id)
        .bind(&token.version)
        .bind(token.can_write)
        .bind(token.hide_download)
        .bind(&token.server_host)
        .bind(&token.guest_display_name)
        .bind(&token.share_token)
        .bind(token.template_id)
        .bind(token.template_destination)
        .bind(token.token_type.as_i16())
        .bind(&token.remote_server)
        .bind(&token.remote_server_token)
        .bind(token.direct)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => TokenError::DuplicateToken,
            _ => TokenError::database_error(format!("Failed to insert token: {}", e)),
        })?;

        record.try_into()
    }

    async fn resolve(&self, token_value: &str) -> Result<AccessToken, TokenError> {
        let record: TokenRecord = sqlx::query_as("SELECT * FROM wopi_tokens WHERE token = $1")
            .bind(token_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TokenError::database_error(format!("Failed to fetch token: {}", e)))?
            .ok_or(TokenError::UnknownToken)?;

        let row: AccessToken = record.try_into()?;

        if row.expiry < self.clock.now() {
            return Err(TokenError::expired(row.id));
        }

        Ok(row)
    }

    async fn clear_template(&self, token_id: i64) -> Result<(), TokenError> {
        let rows_affected = sqlx::query("UPDATE wopi_tokens SET template_id = 0 WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(|e| TokenError::database_error(format!("Failed to clear template: {}", e)))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(TokenError::UnknownToken);
        }
        Ok(())
    }

    async fn upgrade_federation(
        &self,
        token_id: i64,
        upgrade: FederationUpgrade,
    ) -> Result<(), TokenError> {
        let rows_affected = sqlx::query(
            "UPDATE wopi_tokens SET
                token_type = $2,
                remote_server = $3,
                remote_server_token = $4,
                guest_display_name = COALESCE($5, guest_display_name),
                can_write = COALESCE($6, can_write),
                share_token = COALESCE($7, share_token)
             WHERE id = $1",
        )
        .bind(token_id)
        .bind(upgrade.token_type.as_i16())
        .bind(&upgrade.remote_server)
        .bind(&upgrade.remote_server_token)
        .bind(&upgrade.guest_display_name)
        .bind(upgrade.can_write)
        .bind(&upgrade.share_token)
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::database_error(format!("Failed to upgrade token: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(TokenError::UnknownToken);
        }
        Ok(())
    }

    async fn delete_expired(&self, grace: Duration, limit: usize) -> Result<usize, TokenError> {
        let cutoff =
            self.clock.now() - TimeDelta::from_std(grace).unwrap_or_else(|_| TimeDelta::zero());

        let rows_affected = sqlx::query(
            "DELETE FROM wopi_tokens WHERE id IN (
                SELECT id FROM wopi_tokens WHERE expiry < $1 ORDER BY expiry LIMIT $2
             )",
        )
        .bind(cutoff)
        .bind(limit as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| TokenError::database_error(format!("Failed to delete expired rows: {}", e)))?
        .rows_affected();

        Ok(rows_affected as usize)
    }
}

#[derive(sqlx::FromRow)]
struct TokenRecord {
    id: i64,
    token: String,
    expiry: DateTime<Utc>,
    file_id: i64,
    owner_id: Option<String>,
    editor_id: Option<String>,
    version: String,
    can_write: bool,
    hide_download: bool,
    server_host: String,
    guest_display_name: Option<String>,
    share_token: Option<String>,
    template_id: i64,
    template_destination: i64,
    token_type: i16,
    remote_server: String,
    remote_server_token: String,
    direct: bool,
}

impl TryFrom<TokenRecord> for AccessToken {
    type Error = TokenError;

    fn try_from(record: TokenRecord) -> Result<Self, TokenError> {
        Ok(AccessToken {
            id: record.id,
            token: record.token,
            expiry: record.expiry,
            file_id: record.file_id,
            owner_id: record.owner_id,
            editor_id: record.editor_id,
            version: record.version,
            can_write: record.can_write,
            hide_download: record.hide_download,
            server_host: record.server_host,
            guest_display_name: record.guest_display_name,
            share_token: record.share_token,
            template_id: record.template_id,
            template_destination: record.template_destination,
            token_type: TokenType::from_i16(record.token_type)?,
            remote_server: record.remote_server,
            remote_server_token: record.remote_server_token,
            direct: record.direct,
        })
    }
}
