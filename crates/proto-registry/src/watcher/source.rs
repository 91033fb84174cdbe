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

// src/watcher/source.rs
// The file event source abstraction.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::errors::ProtoRegistryError;

// FileEventKind is the kind of change reported for a watched path.
// Only Changed triggers a reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileEventKind {
    // Changed means the file contents were modified in place.
    Changed,
    // Renamed means the file appeared at the path, or was moved.
    Renamed,
    // Removed means the file no longer exists at the path.
    Removed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEvent {
    pub kind: FileEventKind,
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

// CloseHandler ends a subscription. It is called at most once.
pub type CloseHandler = Box<dyn FnOnce() + Send>;

// Subscription is a live stream of events for one path, plus the
// handler that ends it.
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<FileEvent>,
    pub close: CloseHandler,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("events", &self.events)
            .field("close", &"<function>")
            .finish()
    }
}

// FileEventSource produces change events for file paths. Implement
// this to plug in a different notification mechanism; the registry
// ships with PollingEventSource.
pub trait FileEventSource: Send + Sync {
    // subscribe starts watching a path. Must be called from within a
    // tokio runtime.
    fn subscribe(&self, path: &Path) -> Result<Subscription, ProtoRegistryError>;
}
