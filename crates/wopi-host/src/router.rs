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

use crate::request::{WopiOperation, WopiRequest};
use crate::response::WopiResponse;
use crate::WopiEngine;
use http::StatusCode;
use log::{debug, warn};

impl WopiEngine {
    /// Handles one inbound WOPI call end to end: guard, dispatch, status
    /// mapping. This is the engine's single entry point; it never panics
    /// and never leaks failure detail to the caller.
    pub async fn handle(&self, request: WopiRequest) -> WopiResponse {
        let (token, file_id) = match self
            .guard
            .authorize(&request.file_id, &request.access_token, request.peer)
            .await
        {
            Ok(authorized) => authorized,
            Err(e) => {
                debug!("WOPI request rejected by guard: {e}");
                let status = if e.is_expiry() {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::FORBIDDEN
                };
                return WopiResponse::status_only(status);
            }
        };

        let result = match request.operation {
            WopiOperation::CheckFileInfo => self.check_file_info(&token, &file_id).await,
            WopiOperation::GetFile => self.get_file(&token, &file_id).await,
            WopiOperation::PutFile => {
                self.put_file(&token, &file_id, &request.headers, request.body)
                    .await
            }
            WopiOperation::PostFile => {
                self.post_file(&token, &file_id, &request.headers, request.body)
                    .await
            }
            WopiOperation::GetTemplate => self.get_template(&token, &file_id).await,
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                // Token row id only; the raw token value never reaches a log
                // line or a response body.
                warn!(
                    "{:?} for file {} via token {} failed: {e}",
                    request.operation, token.file_id, token.id
                );
                e.into_response()
            }
        }
    }
}
