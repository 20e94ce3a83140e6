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

use crate::files::{mime_from_name, Actor, FileError, FileInfo, FileStore, RemoteMount};
use crate::util::clock::{default_clock, Clock};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

struct FileNode {
    path: String,
    content: Bytes,
    mtime: DateTime<Utc>,
    shareable: bool,
    updatable: bool,
    last_writer: Option<Actor>,
}

#[derive(Default)]
struct MemoryFileStoreState {
    nodes: HashMap<i64, FileNode>,
    by_path: HashMap<String, i64>,
    folders: HashSet<String>,
    shares: HashMap<String, i64>,
    remote_mounts: HashMap<i64, RemoteMount>,
    versions: HashMap<(i64, String), Bytes>,
    pending_lock_failures: u32,
    next_id: i64,
}

/// In-memory host store for testing and development.
///
/// Models just enough of a real file store to exercise the WOPI surface:
/// a path tree with folder auto-creation, unique-name suffixing, share
/// tokens, federated mount records and historical versions. Writes record
/// the acting identity so tests can assert attribution.
pub struct MemoryFileStore {
    state: RwLock<MemoryFileStoreState>,
    clock: Arc<dyn Clock>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::with_clock(default_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(MemoryFileStoreState {
                next_id: 1,
                ..Default::default()
            }),
            clock,
        }
    }

    /// Seeds a file and returns its id.
    pub async fn add_file(&self, path: &str, content: impl Into<Bytes>) -> i64 {
        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;
        let node = FileNode {
            path: path.to_string(),
            content: content.into(),
            mtime: self.clock.now(),
            shareable: true,
            updatable: true,
            last_writer: None,
        };
        Self::register_folders(&mut state, path);
        state.by_path.insert(path.to_string(), id);
        state.nodes.insert(id, node);
        id
    }

    pub async fn add_share(&self, share_token: &str, file_id: i64) {
        self.state
            .write()
            .await
            .shares
            .insert(share_token.to_string(), file_id);
    }

    pub async fn add_remote_mount(&self, file_id: i64, mount: RemoteMount) {
        self.state.write().await.remote_mounts.insert(file_id, mount);
    }

    pub async fn seed_version(&self, file_id: i64, version: &str, content: impl Into<Bytes>) {
        self.state
            .write()
            .await
            .versions
            .insert((file_id, version.to_string()), content.into());
    }

    /// Makes the next `count` writes fail with transient lock contention.
    pub async fn fail_writes_with_lock(&self, count: u32) {
        self.state.write().await.pending_lock_failures = count;
    }

    /// How many injected lock failures have not been consumed yet; each
    /// write attempt consumes one.
    pub async fn remaining_lock_failures(&self) -> u32 {
        self.state.read().await.pending_lock_failures
    }

    /// The identity that performed the most recent write to the file.
    pub async fn last_writer(&self, file_id: i64) -> Option<Actor> {
        self.state
            .read()
            .await
            .nodes
            .get(&file_id)
            .and_then(|node| node.last_writer.clone())
    }

    /// Raw contents, bypassing actor plumbing, for test assertions.
    pub async fn contents(&self, file_id: i64) -> Option<Bytes> {
        self.state
            .read()
            .await
            .nodes
            .get(&file_id)
            .map(|node| node.content.clone())
    }

    fn register_folders(state: &mut MemoryFileStoreState, path: &str) {
        let mut folder = parent_of(path);
        while !folder.is_empty() && folder != "/" {
            if !state.folders.insert(folder.to_string()) {
                break;
            }
            folder = parent_of(&folder);
        }
    }

    fn info(node: &FileNode, id: i64) -> FileInfo {
        let name = node
            .path
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(node.path.as_str())
            .to_string();
        FileInfo {
            id,
            mime: mime_from_name(&name).to_string(),
            name,
            path: node.path.clone(),
            size: node.content.len() as u64,
            mtime: node.mtime,
            shareable: node.shareable,
            updatable: node.updatable,
        }
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

fn split_extension(path: &str) -> (String, String) {
    let (folder, name) = match path.rsplit_once('/') {
        Some((folder, name)) => (format!("{folder}/"), name),
        None => (String::new(), path),
    };
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            (format!("{folder}{stem}"), format!(".{ext}"))
        }
        _ => (format!("{folder}{name}"), String::new()),
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn stat(&self, _actor: &Actor, file_id: i64) -> Result<FileInfo, FileError> {
        let state = self.state.read().await;
        let node = state.nodes.get(&file_id).ok_or(FileError::NotFound(file_id))?;
        Ok(Self::info(node, file_id))
    }

    async fn read(&self, _actor: &Actor, file_id: i64) -> Result<Bytes, FileError> {
        let state = self.state.read().await;
        let node = state.nodes.get(&file_id).ok_or(FileError::NotFound(file_id))?;
        Ok(node.content.clone())
    }

    async fn read_version(
        &self,
        _actor: &Actor,
        file_id: i64,
        version: &str,
    ) -> Result<Bytes, FileError> {
        let state = self.state.read().await;
        if !state.nodes.contains_key(&file_id) {
            return Err(FileError::NotFound(file_id));
        }
        state
            .versions
            .get(&(file_id, version.to_string()))
            .cloned()
            .ok_or_else(|| FileError::store_error(format!("no version {version} for file {file_id}")))
    }

    async fn write(
        &self,
        actor: &Actor,
        file_id: i64,
        content: Bytes,
    ) -> Result<DateTime<Utc>, FileError> {
        let mut state = self.state.write().await;
        if state.pending_lock_failures > 0 {
            state.pending_lock_failures -= 1;
            return Err(FileError::TransientLock(file_id));
        }
        let now = self.clock.now();
        let node = state.nodes.get_mut(&file_id).ok_or(FileError::NotFound(file_id))?;
        if !node.updatable {
            return Err(FileError::PermissionDenied(file_id));
        }
        node.content = content;
        node.mtime = now;
        node.last_writer = Some(actor.clone());
        Ok(now)
    }

    async fn create(
        &self,
        actor: &Actor,
        path: &str,
        content: Bytes,
    ) -> Result<FileInfo, FileError> {
        let mut state = self.state.write().await;
        if state.by_path.contains_key(path) {
            return Err(FileError::store_error(format!("path already exists: {path}")));
        }
        let id = state.next_id;
        state.next_id += 1;
        let node = FileNode {
            path: path.to_string(),
            content,
            mtime: self.clock.now(),
            shareable: true,
            updatable: true,
            last_writer: Some(actor.clone()),
        };
        Self::register_folders(&mut state, path);
        state.by_path.insert(path.to_string(), id);
        let info = Self::info(&node, id);
        state.nodes.insert(id, node);
        Ok(info)
    }

    async fn rename(
        &self,
        _actor: &Actor,
        file_id: i64,
        path: &str,
    ) -> Result<FileInfo, FileError> {
        let mut state = self.state.write().await;
        if state.by_path.contains_key(path) {
            return Err(FileError::store_error(format!("path already exists: {path}")));
        }
        if !state.nodes.contains_key(&file_id) {
            return Err(FileError::NotFound(file_id));
        }
        Self::register_folders(&mut state, path);
        let node = state.nodes.get_mut(&file_id).ok_or(FileError::NotFound(file_id))?;
        let old_path = std::mem::replace(&mut node.path, path.to_string());
        let info = Self::info(node, file_id);
        state.by_path.remove(&old_path);
        state.by_path.insert(path.to_string(), file_id);
        Ok(info)
    }

    async fn unique_name(&self, _actor: &Actor, path: &str) -> Result<String, FileError> {
        let state = self.state.read().await;
        if !state.by_path.contains_key(path) {
            return Ok(path.to_string());
        }
        let (stem, extension) = split_extension(path);
        for n in 2.. {
            let candidate = format!("{stem} ({n}){extension}");
            if !state.by_path.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        unreachable!("candidate space is unbounded")
    }

    async fn resolve_share(&self, share_token: &str) -> Result<i64, FileError> {
        self.state
            .read()
            .await
            .shares
            .get(share_token)
            .copied()
            .ok_or_else(|| FileError::store_error("unknown share token"))
    }

    async fn remote_mount(&self, file_id: i64) -> Result<Option<RemoteMount>, FileError> {
        Ok(self.state.read().await.remote_mounts.get(&file_id).cloned())
    }
}
