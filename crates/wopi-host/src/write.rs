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
use crate::request::{WopiHeaders, WopiOverride};
use crate::response::{to_iso8601, WopiResponse};
use crate::WopiEngine;
use bytes::Bytes;
use http::StatusCode;
use log::{debug, info};
use serde_json::json;
use wopi_common::token::{AccessToken, IssueRequest};
use wopi_core::fileid::FileId;
use wopi_core::files::{Actor, FileInfo};
use wopi_core::lock::{LockError, LockScope};

const EPUB_MIME: &str = "application/epub+zip";

impl WopiEngine {
    /// Replaces the bound file's contents with the request body (the PUT
    /// verb). A `PUT_RELATIVE` override on this verb creates a sibling
    /// instead.
    pub(crate) async fn put_file(
        &self,
        token: &AccessToken,
        _file_id: &FileId,
        headers: &WopiHeaders,
        body: Bytes,
    ) -> Result<WopiResponse, WopiError> {
        if headers.override_action.as_deref() == Some("PUT_RELATIVE") {
            return self.put_relative(token, headers, body).await;
        }

        if !token.can_write {
            return Err(WopiError::authorization("token does not permit writing"));
        }

        let file = self.file_for_token(token).await?;

        // Optimistic-concurrency check, not a lock: a stale prior-known
        // timestamp means the document changed externally and the editor
        // must resolve the divergence.
        if let Some(header_time) = headers.timestamp.as_deref().filter(|t| !t.is_empty()) {
            let storage_time = to_iso8601(file.mtime);
            if header_time != storage_time {
                debug!(
                    "Document timestamp mismatch! Editor client says mtime {header_time} but storage says {storage_time}"
                );
                return Ok(WopiResponse::conflict_document_changed());
            }
        }

        let actor = self.write_actor(token);
        let mtime = self.write_guarded(&actor, file.id, body).await?;

        // First save of a file created from a template drops the linkage.
        if token.has_template_id() {
            self.token_store.clear_template(token.id).await?;
        }

        Ok(WopiResponse::json(
            json!({ "LastModifiedTime": to_iso8601(mtime) }),
        ))
    }

    /// The POST verb: the override header selects the lock family, a
    /// rename, or (by default) PUT_RELATIVE.
    pub(crate) async fn post_file(
        &self,
        token: &AccessToken,
        _file_id: &FileId,
        headers: &WopiHeaders,
        body: Bytes,
    ) -> Result<WopiResponse, WopiError> {
        match WopiOverride::parse(headers.override_action.as_deref()) {
            WopiOverride::Lock | WopiOverride::RefreshLock => self.lock_file(token).await,
            WopiOverride::Unlock => self.unlock_file(token).await,
            WopiOverride::GetLock => self.get_lock(token).await,
            WopiOverride::RenameFile => self.rename_file(token, headers, body).await,
            WopiOverride::PutRelative => self.post_default(token, headers, body).await,
        }
    }

    /// The POST default: materialize a template destination or create a
    /// sibling file.
    async fn post_default(
        &self,
        token: &AccessToken,
        headers: &WopiHeaders,
        body: Bytes,
    ) -> Result<WopiResponse, WopiError> {
        if !token.can_write {
            return Err(WopiError::authorization("token does not permit writing"));
        }

        if token.is_template_token() {
            // The destination was created when the open began; this is its
            // first real save.
            let actor = self.editor_actor(token);
            self.write_guarded(&actor, token.template_destination, body)
                .await?;
            let file = self
                .file_store
                .stat(&actor, token.template_destination)
                .await?;
            return self.saved_file_response(token, &file).await;
        }

        self.put_relative(token, headers, body).await
    }

    /// Creates a new file next to the bound one, named from the suggested
    /// target, and mints a session token for it.
    async fn put_relative(
        &self,
        token: &AccessToken,
        headers: &WopiHeaders,
        body: Bytes,
    ) -> Result<WopiResponse, WopiError> {
        if !token.can_write {
            return Err(WopiError::authorization("token does not permit writing"));
        }

        let source = self.file_for_token(token).await?;
        let suggested = headers.suggested_target.clone().unwrap_or_default();

        let Some(path) = derive_target_path(&suggested, &source.path) else {
            return Ok(cannot_create_response("Cannot create the file"));
        };

        let actor = self.editor_actor(token);
        let path = self.file_store.unique_name(&actor, &path).await?;
        let file = self.file_store.create(&actor, &path, Bytes::new()).await?;
        self.write_guarded(&actor, file.id, body).await?;

        info!(
            "Created '{}' (file {}) next to file {}",
            file.name, file.id, source.id
        );
        self.saved_file_response(token, &file).await
    }

    /// Moves the bound file to the requested name, keeping its extension.
    async fn rename_file(
        &self,
        token: &AccessToken,
        headers: &WopiHeaders,
        body: Bytes,
    ) -> Result<WopiResponse, WopiError> {
        if !token.can_write {
            return Err(WopiError::authorization("token does not permit writing"));
        }

        let file = self.file_for_token(token).await?;
        let requested = headers.requested_name.clone().unwrap_or_default();
        let suggested = match file.extension() {
            "" => requested,
            extension => format!("{requested}.{extension}"),
        };

        let Some(path) = derive_target_path(&suggested, &file.path) else {
            return Ok(cannot_create_response("Cannot rename the file"));
        };

        let actor = self.editor_actor(token);
        let path = self.file_store.unique_name(&actor, &path).await?;
        let renamed = self.file_store.rename(&actor, file.id, &path).await?;

        // Renames arrive without a body; only write one through when the
        // editor actually sent content.
        if !body.is_empty() {
            self.write_guarded(&actor, renamed.id, body).await?;
        }

        info!("Renamed file {} to '{}'", renamed.id, renamed.name);
        self.saved_file_response(token, &renamed).await
    }

    /// The shared tail of every saving branch: epub files get no fresh
    /// token (the editor never re-opens the format), everything else gets
    /// a callback URL for the resulting file.
    async fn saved_file_response(
        &self,
        token: &AccessToken,
        file: &FileInfo,
    ) -> Result<WopiResponse, WopiError> {
        if file.mime == EPUB_MIME {
            return Ok(WopiResponse::json(json!({ "Name": file.name })));
        }

        let fresh = self
            .token_manager
            .issue(
                IssueRequest::builder()
                    .file_id(file.id)
                    .maybe_owner_id(token.editor_id.clone().or_else(|| token.owner_id.clone()))
                    .maybe_editor_id(token.editor_id.clone())
                    .can_write(true)
                    .server_host(token.server_host.clone())
                    .direct(token.direct)
                    .build(),
            )
            .await?;

        Ok(WopiResponse::json(json!({
            "Name": file.name,
            "Url": self.token_manager.launch_url(&fresh),
        })))
    }

    async fn lock_file(&self, token: &AccessToken) -> Result<WopiResponse, WopiError> {
        let scope = LockScope::app(token.file_id, self.app_name.clone());
        match self.lock_provider.lock(&scope).await {
            Ok(()) => Ok(WopiResponse::ok()),
            Err(LockError::NoProvider) => {
                Err(WopiError::bad_request("no lock provider configured"))
            }
            Err(LockError::OwnerLocked { file_id, owner }) => {
                info!("File {file_id} is owner-locked by '{owner}'");
                Err(WopiError::OwnerLocked(file_id))
            }
            Err(LockError::ProviderError(message)) => Err(WopiError::internal(message)),
        }
    }

    async fn unlock_file(&self, token: &AccessToken) -> Result<WopiResponse, WopiError> {
        let scope = LockScope::app(token.file_id, self.app_name.clone());
        match self.lock_provider.unlock(&scope).await {
            Ok(()) => Ok(WopiResponse::ok()),
            Err(LockError::NoProvider) => {
                Err(WopiError::bad_request("no lock provider configured"))
            }
            Err(LockError::OwnerLocked { .. }) | Err(LockError::ProviderError(_)) => {
                Err(WopiError::internal("unlock failed"))
            }
        }
    }

    async fn get_lock(&self, token: &AccessToken) -> Result<WopiResponse, WopiError> {
        match self.lock_provider.get_locks(token.file_id).await {
            Ok(locks) => {
                let value = locks
                    .first()
                    .map(|lock| lock.owner.clone())
                    .unwrap_or_default();
                Ok(WopiResponse::json(json!({ "Lock": value })))
            }
            Err(LockError::NoProvider) => {
                Err(WopiError::bad_request("no lock provider configured"))
            }
            Err(other) => Err(WopiError::internal(other.to_string())),
        }
    }

    /// New files land in the editor's space; reads and plain saves use the
    /// token's file-access identity instead.
    fn editor_actor(&self, token: &AccessToken) -> Actor {
        if self.encrypted_storage {
            return Actor::Incognito;
        }
        match token.editor_id.as_deref().or(token.owner_id.as_deref()) {
            Some(uid) => Actor::user(uid),
            None => Actor::Incognito,
        }
    }
}

/// Derives the storage path for a suggested target name.
///
/// A dot-prefixed suggestion is only an extension and becomes
/// `New File<suffix>` next to the source; a relative name lands next to
/// the source; an absolute path is taken as user-root-relative. An empty
/// suggestion has no usable target.
fn derive_target_path(suggested: &str, source_path: &str) -> Option<String> {
    if suggested.is_empty() {
        return None;
    }
    let parent = match source_path.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    };
    if suggested.starts_with('.') {
        Some(format!("{parent}/New File{suggested}"))
    } else if !suggested.starts_with('/') {
        Some(format!("{parent}/{suggested}"))
    } else {
        Some(suggested.to_string())
    }
}

fn cannot_create_response(message: &str) -> WopiResponse {
    WopiResponse {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: crate::response::WopiBody::Json(json!({
            "status": "error",
            "message": message,
        })),
    }
}
