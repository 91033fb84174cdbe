/*
 * SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

// src/store.rs
// SchemaStore owns the active server and client schema sets plus the
// protos version, and knows how to (re)load them from descriptor files.
//
// Both sets and the version live in one immutable StoreState behind an
// ArcSwap. Readers load the whole state with a single atomic load, and
// writers build a new state and swap it in, so no reader ever sees a
// half-applied reload or a version that does not match the sets.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use arc_swap::ArcSwap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::ProtoRegistryError;
use crate::schema::{Direction, MessageSchema, SchemaSet};

#[derive(Clone, Debug, Default)]
struct StoreState {
    server: Option<Arc<SchemaSet>>,
    client: Option<Arc<SchemaSet>>,
    // version is the newest descriptor file modification time, in
    // milliseconds since the Unix epoch, across successful loads.
    version: u64,
}

impl StoreState {
    fn get(&self, direction: Direction) -> Option<&Arc<SchemaSet>> {
        match direction {
            Direction::Server => self.server.as_ref(),
            Direction::Client => self.client.as_ref(),
        }
    }

    fn with_set(&self, direction: Direction, set: Arc<SchemaSet>, modified: u64) -> Self {
        let mut next = self.clone();
        match direction {
            Direction::Server => next.server = Some(set),
            Direction::Client => next.client = Some(set),
        }
        next.version = next.version.max(modified);
        next
    }
}

// ProtosSnapshot is a point-in-time view of the raw descriptors and
// the version, for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProtosSnapshot {
    pub server: Option<Value>,
    pub client: Option<Value>,
    pub version: u64,
}

// LoadOutcome describes what happened to one direction during
// initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadOutcome {
    // Loaded means the descriptor was parsed and installed.
    Loaded,
    // Missing means there was no file at the configured path.
    Missing,
    // Failed means the file exists but could not be read or parsed.
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub server: LoadOutcome,
    pub client: LoadOutcome,
    pub version: u64,
}

impl LoadReport {
    pub fn outcome(&self, direction: Direction) -> LoadOutcome {
        match direction {
            Direction::Server => self.server,
            Direction::Client => self.client,
        }
    }
}

// PreparedReload is a fully parsed descriptor that has not been
// installed yet. Splitting reload into prepare and commit lets a caller
// drop the result instead of installing it, e.g. after shutdown.
#[derive(Debug)]
pub struct PreparedReload {
    direction: Direction,
    path: PathBuf,
    set: SchemaSet,
    modified: u64,
}

impl PreparedReload {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn modified(&self) -> u64 {
        self.modified
    }

    pub fn route_count(&self) -> usize {
        self.set.len()
    }
}

pub struct SchemaStore {
    state: ArcSwap<StoreState>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.load();
        f.debug_struct("SchemaStore")
            .field("server", &state.server.as_ref().map(|s| s.len()))
            .field("client", &state.client.as_ref().map(|s| s.len()))
            .field("version", &state.version)
            .finish()
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaStore {
    // new creates an empty store with neither direction loaded and a
    // version of zero.
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(StoreState::default()),
        }
    }

    // initialize synchronously attempts both directions. A missing or
    // broken file leaves that direction unset without affecting the
    // other one.
    pub fn initialize(&self, server_path: &Path, client_path: &Path) -> LoadReport {
        let server = self.load(Direction::Server, server_path);
        let client = self.load(Direction::Client, client_path);
        LoadReport {
            server,
            client,
            version: self.version(),
        }
    }

    // load synchronously reads one descriptor file and installs it.
    pub fn load(&self, direction: Direction, path: &Path) -> LoadOutcome {
        if !path.is_file() {
            info!(
                %direction,
                path = %path.display(),
                "No protos file found, {} protos are unavailable",
                direction
            );
            return LoadOutcome::Missing;
        }

        match read_descriptor(path) {
            Ok((set, modified)) => {
                let routes = set.len();
                let version = self.commit(PreparedReload {
                    direction,
                    path: path.to_path_buf(),
                    set,
                    modified,
                });
                info!(%direction, path = %path.display(), routes, version, "Loaded protos");
                LoadOutcome::Loaded
            }
            Err(e) => {
                warn!(
                    %direction,
                    path = %path.display(),
                    "Failed to load protos, {} protos are unavailable: {}",
                    direction,
                    e
                );
                LoadOutcome::Failed
            }
        }
    }

    // prepare reads and parses a descriptor file without touching the
    // active state. The file read is the only suspension point.
    pub async fn prepare(
        &self,
        direction: Direction,
        path: &Path,
    ) -> Result<PreparedReload, ProtoRegistryError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProtoRegistryError::schema_load_error(path, e))?;
        let set = SchemaSet::from_json_str(&text)?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ProtoRegistryError::schema_load_error(path, e))?;

        Ok(PreparedReload {
            direction,
            path: path.to_path_buf(),
            set,
            modified: modified_millis(&metadata),
        })
    }

    // commit installs a prepared set and returns the resulting version.
    // The version only moves forward.
    pub fn commit(&self, prepared: PreparedReload) -> u64 {
        let PreparedReload {
            direction,
            set,
            modified,
            ..
        } = prepared;
        let set = Arc::new(set);
        let previous = self
            .state
            .rcu(|current| current.with_set(direction, set.clone(), modified));
        let version = previous.version.max(modified);
        debug!(%direction, version, "Installed new schema set");
        version
    }

    // reload re-reads a descriptor file and installs it. On failure the
    // previous set and version stay active and the error is returned to
    // the caller.
    pub async fn reload(
        &self,
        direction: Direction,
        path: &Path,
    ) -> Result<u64, ProtoRegistryError> {
        let prepared = self.prepare(direction, path).await?;
        Ok(self.commit(prepared))
    }

    // lookup resolves a route against the active set for a direction.
    pub fn lookup(&self, direction: Direction, route: &str) -> Option<MessageSchema> {
        self.state.load().get(direction)?.lookup(route)
    }

    pub fn schema_set(&self, direction: Direction) -> Option<Arc<SchemaSet>> {
        self.state.load().get(direction).cloned()
    }

    pub fn is_available(&self, direction: Direction) -> bool {
        self.state.load().get(direction).is_some()
    }

    pub fn version(&self) -> u64 {
        self.state.load().version
    }

    // snapshot returns the raw descriptors and version from a single
    // load of the state.
    pub fn snapshot(&self) -> ProtosSnapshot {
        let state = self.state.load_full();
        ProtosSnapshot {
            server: state.server.as_ref().map(|s| s.raw().clone()),
            client: state.client.as_ref().map(|s| s.raw().clone()),
            version: state.version,
        }
    }
}

fn read_descriptor(path: &Path) -> Result<(SchemaSet, u64), ProtoRegistryError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ProtoRegistryError::schema_load_error(path, e))?;
    let set = SchemaSet::from_json_str(&text)?;
    let metadata =
        std::fs::metadata(path).map_err(|e| ProtoRegistryError::schema_load_error(path, e))?;
    Ok((set, modified_millis(&metadata)))
}

fn modified_millis(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
