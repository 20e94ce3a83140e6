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

use crate::files::{mime_from_name, FileError, FileInfo};
use crate::util::clock::{default_clock, Clock};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Read access to document templates.
///
/// Template management (uploading, listing, per-user template folders) is
/// the hosting application's concern; the engine only needs to stream a
/// template asset when an editor opens a document that is being created
/// from one.
#[async_trait]
pub trait TemplateProvider: Send + Sync {
    async fn stat(&self, owner: &str, template_id: i64) -> Result<FileInfo, FileError>;

    async fn read(&self, owner: &str, template_id: i64) -> Result<Bytes, FileError>;
}

struct TemplateRecord {
    name: String,
    content: Bytes,
}

/// In-memory template provider for testing and development.
pub struct MemoryTemplateProvider {
    templates: Mutex<HashMap<i64, TemplateRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryTemplateProvider {
    pub fn new() -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
            clock: default_clock(),
        }
    }

    pub fn add_template(&self, template_id: i64, name: &str, content: impl Into<Bytes>) {
        self.templates.lock().unwrap().insert(
            template_id,
            TemplateRecord {
                name: name.to_string(),
                content: content.into(),
            },
        );
    }
}

impl Default for MemoryTemplateProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateProvider for MemoryTemplateProvider {
    async fn stat(&self, _owner: &str, template_id: i64) -> Result<FileInfo, FileError> {
        let templates = self.templates.lock().unwrap();
        let record = templates
            .get(&template_id)
            .ok_or(FileError::NotFound(template_id))?;
        Ok(FileInfo {
            id: template_id,
            name: record.name.clone(),
            path: format!("/templates/{}", record.name),
            size: record.content.len() as u64,
            mtime: self.clock.now(),
            mime: mime_from_name(&record.name).to_string(),
            shareable: false,
            updatable: false,
        })
    }

    async fn read(&self, _owner: &str, template_id: i64) -> Result<Bytes, FileError> {
        let templates = self.templates.lock().unwrap();
        templates
            .get(&template_id)
            .map(|record| record.content.clone())
            .ok_or(FileError::NotFound(template_id))
    }
}
