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

// src/watcher/reload.rs
// ReloadWatcher implementation for turning file change events into
// schema reloads.
//
// Each watched direction gets one WatchHandle, which owns the event
// source subscription and a dispatch task. The dispatch task handles
// events one at a time, so reloads for a direction never overlap.
// Every Changed event triggers a full reparse; events are not
// debounced or coalesced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::source::{CloseHandler, FileEvent, FileEventKind, FileEventSource, Subscription};
use crate::errors::ProtoRegistryError;
use crate::schema::Direction;
use crate::store::SchemaStore;

// WatchHandle is a live subscription on one path for one direction.
// Closing it, explicitly or by dropping it, ends the subscription
// exactly once.
pub struct WatchHandle {
    direction: Direction,
    path: PathBuf,
    close: Option<CloseHandler>,
    // Dropping shutdown_tx tells the dispatch task to stop.
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("direction", &self.direction)
            .field("path", &self.path)
            .field("closed", &self.close.is_none())
            .finish()
    }
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    // close_and_wait closes the handle and waits for the dispatch task
    // to finish, including any reload it was in the middle of.
    pub async fn close_and_wait(mut self) {
        self.shutdown();
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(e) = join_handle.await {
                error!(direction = %self.direction, "Protos watch task failed: {e}");
            }
        }
    }

    fn shutdown(&mut self) {
        self.shutdown_tx.take();
        if let Some(close) = self.close.take() {
            close();
            debug!(
                direction = %self.direction,
                path = %self.path.display(),
                "Closed protos watch"
            );
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ReloadWatcher keeps at most one WatchHandle per direction and feeds
// change events for the watched files into the SchemaStore.
pub struct ReloadWatcher {
    store: Arc<SchemaStore>,
    source: Arc<dyn FileEventSource>,
    handles: Mutex<HashMap<Direction, WatchHandle>>,
}

impl std::fmt::Debug for ReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadWatcher")
            .field("watched", &self.watched())
            .finish()
    }
}

impl ReloadWatcher {
    pub fn new(store: Arc<SchemaStore>, source: Arc<dyn FileEventSource>) -> Self {
        Self {
            store,
            source,
            handles: Mutex::new(HashMap::new()),
        }
    }

    // attach starts watching `path` for `direction`. An existing watch
    // for the direction is closed before the new one is opened. Fails
    // with WatchError outside of a tokio runtime.
    pub fn attach(
        &self,
        direction: Direction,
        path: impl Into<PathBuf>,
    ) -> Result<(), ProtoRegistryError> {
        let path = path.into();
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProtoRegistryError::watch_error(&path, e.to_string()))?;
        let mut handles = self.lock_handles();

        if let Some(previous) = handles.remove(&direction) {
            debug!(
                %direction,
                path = %previous.path().display(),
                "Replacing existing protos watch"
            );
            previous.close();
        }

        let Subscription { events, close } = self.source.subscribe(&path)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = runtime.spawn(dispatch(
            self.store.clone(),
            direction,
            path.clone(),
            events,
            shutdown_rx,
        ));

        info!(%direction, path = %path.display(), "Watching protos for changes");
        handles.insert(
            direction,
            WatchHandle {
                direction,
                path,
                close: Some(close),
                shutdown_tx: Some(shutdown_tx),
                join_handle: Some(join_handle),
            },
        );
        Ok(())
    }

    // detach closes the watch for one direction. Returns false if the
    // direction was not being watched.
    pub fn detach(&self, direction: Direction) -> bool {
        let handle = self.lock_handles().remove(&direction);
        match handle {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }

    // detach_all closes every watch and returns how many were open.
    // Safe to call any number of times.
    pub fn detach_all(&self) -> usize {
        let drained: Vec<WatchHandle> = self.lock_handles().drain().map(|(_, h)| h).collect();
        let count = drained.len();
        for handle in drained {
            handle.close();
        }
        if count > 0 {
            info!("Closed {} protos watches", count);
        }
        count
    }

    // detach_all_and_wait closes every watch like detach_all, then waits
    // for their dispatch tasks to finish. A reload that was in flight
    // is discarded rather than installed.
    pub async fn detach_all_and_wait(&self) -> usize {
        let drained: Vec<WatchHandle> = self.lock_handles().drain().map(|(_, h)| h).collect();
        let count = drained.len();
        for handle in drained {
            handle.close_and_wait().await;
        }
        if count > 0 {
            info!("Closed {} protos watches", count);
        }
        count
    }

    pub fn is_watching(&self, direction: Direction) -> bool {
        self.lock_handles().contains_key(&direction)
    }

    // watched returns the watched paths, server first.
    pub fn watched(&self) -> Vec<(Direction, PathBuf)> {
        let handles = self.lock_handles();
        Direction::ALL
            .iter()
            .filter_map(|d| handles.get(d).map(|h| (*d, h.path.clone())))
            .collect()
    }

    fn lock_handles(&self) -> MutexGuard<'_, HashMap<Direction, WatchHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// dispatch processes events for one watched file until the handle is
// closed or the event source goes away.
async fn dispatch(
    store: Arc<SchemaStore>,
    direction: Direction,
    path: PathBuf,
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = &mut shutdown_rx => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if event.kind != FileEventKind::Changed {
            debug!(
                %direction,
                path = %event.path.display(),
                kind = ?event.kind,
                "Ignoring protos file event"
            );
            continue;
        }

        match store.prepare(direction, &path).await {
            Ok(prepared) => {
                if is_shut_down(&mut shutdown_rx) {
                    debug!(%direction, "Watch closed during reload, discarding result");
                    break;
                }
                let routes = prepared.route_count();
                let version = store.commit(prepared);
                info!(%direction, path = %path.display(), routes, version, "Reloaded protos");
            }
            Err(e) => {
                warn!(
                    %direction,
                    path = %path.display(),
                    "Failed to reload protos, keeping previous schema: {e}"
                );
            }
        }
    }

    debug!(%direction, path = %path.display(), "Protos watch dispatch stopped");
}

fn is_shut_down(shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        shutdown_rx.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}
