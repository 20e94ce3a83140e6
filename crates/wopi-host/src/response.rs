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

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use http::StatusCode;
use serde_json::{json, Value};

/// Status code field the editor server inspects on a 409 reply to tell an
/// external modification from other conflicts.
pub const STATUS_DOC_CHANGED: i64 = 1010;

/// A WOPI reply: protocol status plus an optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WopiResponse {
    pub status: StatusCode,
    pub body: WopiBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WopiBody {
    Empty,
    Json(Value),
    Content(Bytes),
}

impl WopiResponse {
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            body: WopiBody::Empty,
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: WopiBody::Json(value),
        }
    }

    pub fn content(bytes: Bytes) -> Self {
        Self {
            status: StatusCode::OK,
            body: WopiBody::Content(bytes),
        }
    }

    pub fn status_only(status: StatusCode) -> Self {
        Self {
            status,
            body: WopiBody::Empty,
        }
    }

    /// 409 with the distinguished document-changed marker: the editor is
    /// expected to offer the user a merge/overwrite choice.
    pub fn conflict_document_changed() -> Self {
        Self {
            status: StatusCode::CONFLICT,
            body: WopiBody::Json(json!({ "LOOLStatusCode": STATUS_DOC_CHANGED })),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The JSON body, when there is one.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            WopiBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The raw content body, empty for JSON and bodiless replies.
    pub fn content_body(&self) -> Bytes {
        match &self.body {
            WopiBody::Content(bytes) => bytes.clone(),
            _ => Bytes::new(),
        }
    }
}

/// Formats a modification time the way the protocol compares timestamps:
/// microsecond-precision ISO-8601 in UTC.
pub fn to_iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}
