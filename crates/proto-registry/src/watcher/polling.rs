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

// src/watcher/polling.rs
// PollingEventSource watches files by polling their metadata.
//
// Each subscription runs a background task that checks the file's
// modification time and length on a fixed interval and reports the
// difference from the previous check:
//
// - present before and after, but different: Changed
// - absent before, present now: Renamed
// - present before, absent now: Removed

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::source::{FileEvent, FileEventKind, FileEventSource, Subscription};
use crate::errors::ProtoRegistryError;

#[derive(Clone, Debug)]
pub struct PollingEventSource {
    interval: Duration,
}

impl PollingEventSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileSignature {
    modified: Option<SystemTime>,
    len: u64,
}

impl From<&std::fs::Metadata> for FileSignature {
    fn from(metadata: &std::fs::Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

impl FileEventSource for PollingEventSource {
    fn subscribe(&self, path: &Path) -> Result<Subscription, ProtoRegistryError> {
        if self.interval.is_zero() {
            return Err(ProtoRegistryError::watch_error(
                path,
                "poll interval must be greater than zero",
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProtoRegistryError::watch_error(path, e.to_string()))?;

        // Take the baseline now, so a write that lands right after
        // subscribing is still reported.
        let initial = std::fs::metadata(path).ok().map(|m| FileSignature::from(&m));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        runtime.spawn(poll(
            path.to_path_buf(),
            self.interval,
            initial,
            events_tx,
            stop_rx,
        ));

        Ok(Subscription {
            events: events_rx,
            close: Box::new(move || drop(stop_tx)),
        })
    }
}

async fn poll(
    path: PathBuf,
    interval: Duration,
    mut last: Option<FileSignature>,
    events: mpsc::UnboundedSender<FileEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
        }

        let current = match tokio::fs::metadata(&path).await {
            Ok(metadata) => Some(FileSignature::from(&metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), "Failed to poll file metadata: {e}");
                continue;
            }
        };

        let kind = match (last, current) {
            (Some(before), Some(after)) if before != after => Some(FileEventKind::Changed),
            (None, Some(_)) => Some(FileEventKind::Renamed),
            (Some(_), None) => Some(FileEventKind::Removed),
            _ => None,
        };
        last = current;

        if let Some(kind) = kind {
            debug!(path = %path.display(), ?kind, "Detected file change");
            if events.send(FileEvent::new(kind, path.clone())).is_err() {
                break;
            }
        }
    }

    debug!(path = %path.display(), "Stopped polling");
}
