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
use crate::response::WopiResponse;
use crate::WopiEngine;
use log::{debug, error};
use wopi_common::token::AccessToken;
use wopi_core::fileid::FileId;
use wopi_core::files::{FileError, FileInfo};

impl WopiEngine {
    /// Streams file contents for the token's bound file, at the requested
    /// version.
    pub(crate) async fn get_file(
        &self,
        token: &AccessToken,
        file_id: &FileId,
    ) -> Result<WopiResponse, WopiError> {
        // Templates have no version logic; the asset is streamed as-is.
        if token.is_template_token() {
            let owner = token.owner_id.clone().unwrap_or_default();
            let content = self
                .templates
                .read(&owner, token.file_id)
                .await
                .map_err(|e| WopiError::authorization(e.to_string()))?;
            return Ok(WopiResponse::content(content));
        }

        let actor = self.read_actor(token);
        let file = self
            .file_for_token(token)
            .await
            .map_err(|e| WopiError::authorization(e.to_string()))?;

        if !file_id.is_current_version() {
            let content = self
                .file_store
                .read_version(&actor, file.id, &file_id.version)
                .await
                .map_err(|e| {
                    error!(
                        "Version {} of file {} could not be read: {e}",
                        file_id.version, file.id
                    );
                    WopiError::bad_request("version not available")
                })?;
            return Ok(WopiResponse::content(content));
        }

        // Zero-length files answer with an empty success body instead of a
        // stream.
        if file.size == 0 {
            return Ok(WopiResponse::ok());
        }

        let content = self
            .file_store
            .read(&actor, file.id)
            .await
            .map_err(|e| WopiError::authorization(e.to_string()))?;
        debug!("Streaming {} bytes of file {}", content.len(), file.id);
        Ok(WopiResponse::content(content))
    }

    /// Streams the template asset an editor needs to materialize a new
    /// document.
    pub(crate) async fn get_template(
        &self,
        token: &AccessToken,
        file_id: &FileId,
    ) -> Result<WopiResponse, WopiError> {
        if file_id.id != token.template_id {
            return Err(WopiError::authorization(
                "token is not bound to this template",
            ));
        }

        let owner = token.owner_id.clone().unwrap_or_default();
        let content = self
            .templates
            .read(&owner, token.template_id)
            .await
            .map_err(|e| {
                error!("Template {} could not be read: {e}", token.template_id);
                WopiError::internal("template not readable")
            })?;
        Ok(WopiResponse::content(content))
    }

    /// Resolves the file a token grants access to, impersonating the
    /// token's effective identity.
    pub(crate) async fn file_for_token(
        &self,
        token: &AccessToken,
    ) -> Result<FileInfo, FileError> {
        let actor = self.read_actor(token);

        if let Some(share) = &token.share_token {
            let shared_id = self.file_store.resolve_share(share).await?;
            // A folder share resolves to its root; the token's file id
            // names the document inside it.
            let target = if shared_id == token.file_id {
                shared_id
            } else {
                token.file_id
            };
            return self.file_store.stat(&actor, target).await;
        }

        self.file_store.stat(&actor, token.file_id).await
    }
}
