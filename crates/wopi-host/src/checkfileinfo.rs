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
use crate::response::{to_iso8601, WopiResponse};
use crate::WopiEngine;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;
use wopi_common::token::{random_value, AccessToken, TokenType};
use wopi_core::fileid::FileId;
use wopi_core::files::FileInfo;

const GUEST_ID_LENGTH: usize = 8;
const AVATAR_SIZE: &str = "64";

/// The capability document CheckFileInfo returns.
///
/// This is the negotiation step: the editor server trusts these fields to
/// decide which UI affordances to show, so every field is computed
/// defensively and none is ever null where a type is promised.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckFileInfo {
    pub base_file_name: String,
    pub size: u64,
    pub version: String,
    pub user_id: String,
    pub owner_id: String,
    pub user_friendly_name: String,
    pub user_extra_info: UserExtraInfo,
    pub user_private_info: Map<String, Value>,
    pub user_can_write: bool,
    pub user_can_not_write_relative: bool,
    pub post_message_origin: String,
    pub last_modified_time: String,
    pub supports_rename: bool,
    pub user_can_rename: bool,
    pub enable_insert_remote_image: bool,
    pub enable_share: bool,
    pub hide_user_list: String,
    pub disable_print: bool,
    pub disable_export: bool,
    pub disable_copy: bool,
    pub hide_export_option: bool,
    pub hide_print_option: bool,
    pub download_as_post_message: bool,
    pub supports_locks: bool,
    pub is_user_locked: bool,
    pub enable_remote_link_picker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_save_as: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserExtraInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_guest: Option<bool>,
}

impl WopiEngine {
    /// Returns general info about a file and what the presenting session
    /// may do with it.
    pub(crate) async fn check_file_info(
        &self,
        token: &AccessToken,
        file_id: &FileId,
    ) -> Result<WopiResponse, WopiError> {
        let file = if token.is_template_token() {
            let owner = token.owner_id.clone().unwrap_or_default();
            self.templates
                .stat(&owner, token.file_id)
                .await
                .map_err(|e| WopiError::authorization(e.to_string()))?
        } else {
            // A missing file on the info path is an authorization failure,
            // not a lookup miss; existence must not leak.
            self.file_for_token(token)
                .await
                .map_err(|e| WopiError::authorization(e.to_string()))?
        };

        let mut info = self.build_file_info(token, file_id, &file).await;

        if token.is_remote_token() {
            self.apply_federation_identity(token, &mut info).await;
        }

        debug!(
            "CheckFileInfo served for file {} via token {}",
            token.file_id, token.id
        );
        let value = serde_json::to_value(&info)
            .map_err(|e| WopiError::internal(format!("serializing file info: {e}")))?;
        Ok(WopiResponse::json(value))
    }

    async fn build_file_info(
        &self,
        token: &AccessToken,
        file_id: &FileId,
        file: &FileInfo,
    ) -> CheckFileInfo {
        let is_public = token.is_public();
        let is_version = !file_id.is_current_version();
        let guest_user_id = format!("Guest-{}", random_value(GUEST_ID_LENGTH));

        let editor_uid = token.editor_id.clone().unwrap_or_default();
        let editor_display = match &token.editor_id {
            Some(uid) => self.users.display_name(uid).await,
            None => None,
        };

        let user_friendly_name = if is_public || editor_display.is_none() {
            token.guest_display_name.clone().unwrap_or_default()
        } else {
            editor_display.clone().unwrap_or_default()
        };

        let mut extra = UserExtraInfo::default();
        if editor_display.is_some() {
            extra.avatar = self.avatar_url(&["avatar", &editor_uid, AVATAR_SIZE]);
            if self.users.is_admin(&editor_uid).await {
                extra.is_admin = Some(true);
            }
        } else {
            let guest_name = token.guest_display_name.clone().unwrap_or_default();
            extra.avatar = self.avatar_url(&["avatar", "guest", &guest_name, AVATAR_SIZE]);
        }
        if is_public {
            extra.is_guest = Some(true);
        }

        let template_source = if token.has_template_id() {
            Some(format!(
                "{}/wopi/template/{}?access_token={}",
                self.token_manager.base_url().trim_end_matches('/'),
                token.template_id,
                token.token
            ))
        } else {
            None
        };

        let template_save_as = if token.is_template_token() {
            let actor = self.read_actor(token);
            match self
                .file_store
                .stat(&actor, token.template_destination)
                .await
            {
                Ok(destination) => Some(destination.name),
                Err(_) => None,
            }
        } else {
            None
        };

        let is_user_locked = match &token.editor_id {
            Some(uid) => self.users.is_feature_locked(uid).await,
            None => false,
        };

        CheckFileInfo {
            base_file_name: file.name.clone(),
            size: file.size,
            version: file_id.version.clone(),
            user_id: if is_public {
                guest_user_id
            } else {
                editor_uid.clone()
            },
            owner_id: token.owner_id.clone().unwrap_or_default(),
            user_friendly_name,
            user_extra_info: extra,
            user_private_info: Map::new(),
            user_can_write: token.can_write,
            user_can_not_write_relative: is_public
                || self.encrypted_storage
                || token.hide_download,
            post_message_origin: token.server_host.clone(),
            last_modified_time: to_iso8601(file.mtime),
            supports_rename: !is_version,
            user_can_rename: !is_public && !is_version,
            enable_insert_remote_image: !is_public,
            enable_share: file.shareable && !is_version && !is_public,
            hide_user_list: String::new(),
            disable_print: token.hide_download,
            disable_export: token.hide_download,
            disable_copy: token.hide_download,
            hide_export_option: token.hide_download,
            hide_print_option: token.hide_download,
            download_as_post_message: token.direct,
            supports_locks: self.lock_provider.available(),
            is_user_locked,
            enable_remote_link_picker: token.can_write && !is_public && !token.direct,
            template_source,
            template_save_as,
        }
    }

    /// Rewrites the identity fields from the remote party's details.
    ///
    /// Federation is advisory here: an unreachable or unparsable remote
    /// leaves the local guest identity in place.
    async fn apply_federation_identity(&self, token: &AccessToken, info: &mut CheckFileInfo) {
        info.user_id = format!("Guest-{}", random_value(GUEST_ID_LENGTH));

        if token.token_type == TokenType::RemoteUser {
            // The local shadow's guest display carries the federated cloud
            // id of the remote user.
            let remote_user_id = token.guest_display_name.clone().unwrap_or_default();
            info.user_id = remote_user_id.clone();
            info.user_friendly_name = remote_user_id.clone();
            if let Some(local_part) = remote_user_id.split('@').next() {
                info.user_extra_info.avatar = avatar_on_host(
                    &token.remote_server,
                    &["avatar", local_part, AVATAR_SIZE],
                );
            }
        }

        let Some(federation) = &self.federation else {
            return;
        };
        let Some(initiator) = federation
            .remote_file_details(&token.remote_server, &token.remote_server_token)
            .await
        else {
            return;
        };

        if let Some(guest_name) = &initiator.guest_display_name {
            info.user_friendly_name = self.token_manager.prepare_guest_name(guest_name);
        }
        if initiator.has_template_id() {
            info.template_source = Some(format!(
                "{}/wopi/template/{}?access_token={}",
                token.remote_server.trim_end_matches('/'),
                initiator.template_id,
                initiator.token
            ));
        }
        if token.token_type == TokenType::RemoteUser
            || (token.token_type == TokenType::RemoteGuest && initiator.editor_id.is_some())
        {
            if let Some(editor) = &initiator.editor_id {
                info.user_extra_info.avatar =
                    avatar_on_host(&token.remote_server, &["avatar", editor, AVATAR_SIZE]);
            }
        }
    }

    fn avatar_url(&self, segments: &[&str]) -> Option<String> {
        avatar_on_host(self.token_manager.base_url(), segments)
    }
}

fn avatar_on_host(base: &str, segments: &[&str]) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.extend(segments);
    Some(url.to_string())
}
