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

use bon::Builder;
use bytes::Bytes;
use std::net::IpAddr;

/// The WOPI endpoints this engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WopiOperation {
    CheckFileInfo,
    GetFile,
    PutFile,
    PostFile,
    GetTemplate,
}

/// Values of the `X-WOPI-Override` header on POST calls. Anything absent
/// or unrecognized is treated as PUT_RELATIVE, which is the protocol's
/// default action for the verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WopiOverride {
    Lock,
    Unlock,
    RefreshLock,
    GetLock,
    RenameFile,
    PutRelative,
}

impl WopiOverride {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("LOCK") => WopiOverride::Lock,
            Some("UNLOCK") => WopiOverride::Unlock,
            Some("REFRESH_LOCK") => WopiOverride::RefreshLock,
            Some("GET_LOCK") => WopiOverride::GetLock,
            Some("RENAME_FILE") => WopiOverride::RenameFile,
            _ => WopiOverride::PutRelative,
        }
    }
}

/// Protocol headers the handlers consume.
#[derive(Debug, Clone, Default, Builder)]
pub struct WopiHeaders {
    /// `X-WOPI-Override`
    #[builder(into)]
    pub override_action: Option<String>,

    /// `X-WOPI-Lock`
    #[builder(into)]
    pub lock: Option<String>,

    /// `X-WOPI-SuggestedTarget`
    #[builder(into)]
    pub suggested_target: Option<String>,

    /// `X-WOPI-RequestedName`
    #[builder(into)]
    pub requested_name: Option<String>,

    /// `X-LOOL-WOPI-Timestamp`: the modification time the editor last saw,
    /// for the optimistic-concurrency check on saves.
    #[builder(into)]
    pub timestamp: Option<String>,
}

/// One inbound editor-server call.
#[derive(Debug, Clone, Builder)]
pub struct WopiRequest {
    pub operation: WopiOperation,

    /// Raw composite file identifier from the URL path.
    #[builder(into)]
    pub file_id: String,

    #[builder(into)]
    pub access_token: String,

    /// Caller address for the allow-list check, when the transport knows
    /// it.
    pub peer: Option<IpAddr>,

    #[builder(default)]
    pub headers: WopiHeaders,

    #[builder(default = Bytes::new())]
    pub body: Bytes,
}
