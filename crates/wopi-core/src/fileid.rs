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

use thiserror::Error;

/// Version marker meaning "the current document contents".
pub const CURRENT_VERSION: &str = "0";

/// A parsed composite file identifier.
///
/// Editor servers echo back the identifier the host handed out, in the form
/// `<id>[_<instance>][.<version>]`: a numeric file id, an optional storage
/// instance id, and an optional historical version suffix. A missing version
/// means the current contents (`"0"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileId {
    pub id: i64,
    pub instance: String,
    pub version: String,
}

impl FileId {
    pub fn current(id: i64) -> Self {
        Self {
            id,
            instance: String::new(),
            version: CURRENT_VERSION.to_string(),
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == CURRENT_VERSION
    }

    /// Formats the identifier the way launch URLs embed it. The version
    /// suffix is intentionally not included; versions only appear on inbound
    /// identifiers.
    pub fn composite(&self) -> String {
        if self.instance.is_empty() {
            self.id.to_string()
        } else {
            format!("{}_{}", self.id, self.instance)
        }
    }
}

#[derive(Debug, Error)]
pub enum FileIdError {
    #[error("Malformed composite file id: {0}")]
    Malformed(String),
}

/// Parses a composite file identifier from a request path.
///
/// # Errors
/// Returns `FileIdError::Malformed` when the leading component is not a
/// number.
pub fn parse_file_id(raw: &str) -> Result<FileId, FileIdError> {
    let (head, version) = match raw.split_once('.') {
        Some((head, version)) if !version.is_empty() => (head, version.to_string()),
        Some((head, _)) => (head, CURRENT_VERSION.to_string()),
        None => (raw, CURRENT_VERSION.to_string()),
    };

    let (id, instance) = match head.split_once('_') {
        Some((id, instance)) => (id, instance.to_string()),
        None => (head, String::new()),
    };

    let id = id
        .parse::<i64>()
        .map_err(|_| FileIdError::Malformed(raw.to_string()))?;

    Ok(FileId { id, instance, version })
}
