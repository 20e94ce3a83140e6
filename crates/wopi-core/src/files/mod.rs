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

pub mod mem;

#[cfg(test)]
mod tests;

pub use mem::MemoryFileStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// The identity a storage operation runs as.
///
/// WOPI calls are not authenticated sessions; the engine impersonates the
/// identity bound to the access token so storage-level ACL checks and
/// change attribution see the right actor. `Incognito` is the fallback for
/// deployments where per-user encryption makes impersonation impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    Incognito,
}

impl Actor {
    pub fn user(uid: impl Into<String>) -> Self {
        Actor::User(uid.into())
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            Actor::User(uid) => Some(uid),
            Actor::Incognito => None,
        }
    }
}

/// Metadata snapshot of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    pub mime: String,
    pub shareable: bool,
    pub updatable: bool,
}

impl FileInfo {
    /// Extension without the leading dot, empty when the name has none.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext,
            _ => "",
        }
    }
}

/// Where a federated share mount points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMount {
    pub remote_host: String,
    pub share_token: String,
    pub internal_path: String,
}

/// Errors reported by the host store.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(i64),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Permission denied for file {0}")]
    PermissionDenied(i64),

    #[error("File {0} is transiently locked by another writer")]
    TransientLock(i64),

    #[error("Store error: {0}")]
    StoreError(String),
}

impl FileError {
    pub fn store_error(message: impl Into<String>) -> Self {
        FileError::StoreError(message.into())
    }

    /// Transient lock contention is the only storage failure worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, FileError::TransientLock(_))
    }
}

/// Narrow interface to the external host store.
///
/// The engine never touches storage internals; everything it needs from the
/// file system behind the WOPI surface goes through this trait. All
/// operations take the impersonated [`Actor`] so attribution is correct even
/// for anonymous and public-link sessions.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Metadata for a file id.
    async fn stat(&self, actor: &Actor, file_id: i64) -> Result<FileInfo, FileError>;

    /// Current file contents.
    async fn read(&self, actor: &Actor, file_id: i64) -> Result<Bytes, FileError>;

    /// Contents of a historical version, served by the store's versioning
    /// collaborator.
    async fn read_version(
        &self,
        actor: &Actor,
        file_id: i64,
        version: &str,
    ) -> Result<Bytes, FileError>;

    /// Replaces the file contents and returns the new modification time.
    ///
    /// # Errors
    /// Returns `FileError::TransientLock` when another writer holds the
    /// file; callers decide whether to retry.
    async fn write(
        &self,
        actor: &Actor,
        file_id: i64,
        content: Bytes,
    ) -> Result<DateTime<Utc>, FileError>;

    /// Creates a new file at the path, creating intermediate folders as
    /// needed. Fails when the path is already taken; see [`unique_name`]
    /// for collision-free targets.
    ///
    /// [`unique_name`]: FileStore::unique_name
    async fn create(
        &self,
        actor: &Actor,
        path: &str,
        content: Bytes,
    ) -> Result<FileInfo, FileError>;

    /// Moves the file to the path, creating intermediate folders as needed.
    async fn rename(&self, actor: &Actor, file_id: i64, path: &str)
        -> Result<FileInfo, FileError>;

    /// Returns a free variant of the path within its folder, suffixing the
    /// stem when the name is already taken.
    async fn unique_name(&self, actor: &Actor, path: &str) -> Result<String, FileError>;

    /// Resolves a public share token to the shared file id.
    async fn resolve_share(&self, share_token: &str) -> Result<i64, FileError>;

    /// Reports whether the file is backed by a federated share mount, and
    /// where that mount points.
    async fn remote_mount(&self, file_id: i64) -> Result<Option<RemoteMount>, FileError>;
}

/// Guesses a MIME type from a file name, defaulting to octet-stream.
pub fn mime_from_name(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension.to_ascii_lowercase().as_str() {
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "epub" => "application/epub+zip",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
