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

// src/component.rs
// ProtobufComponent ties the store, codec and watcher together behind
// the start/stop lifecycle a host application expects.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::codec::RouteCodec;
use crate::config::RegistryConfig;
use crate::errors::ProtoRegistryError;
use crate::schema::{Direction, MessageSchema};
use crate::store::{LoadOutcome, LoadReport, ProtosSnapshot, SchemaStore};
use crate::watcher::{FileEventSource, PollingEventSource, ReloadWatcher};

// COMPONENT_NAME is the name hosts register the component under.
pub const COMPONENT_NAME: &str = "__decodeIO__protobuf__";

#[derive(Debug)]
pub struct ProtobufComponent {
    config: RegistryConfig,
    store: Arc<SchemaStore>,
    codec: RouteCodec,
    watcher: ReloadWatcher,
}

impl ProtobufComponent {
    // new creates a component that polls descriptor files for changes
    // at the configured interval.
    pub fn new(config: RegistryConfig) -> Self {
        let source = Arc::new(PollingEventSource::new(config.poll_interval));
        Self::with_event_source(config, source)
    }

    pub fn with_event_source(config: RegistryConfig, source: Arc<dyn FileEventSource>) -> Self {
        let store = Arc::new(SchemaStore::new());
        let codec = RouteCodec::with_options(store.clone(), config.codec);
        let watcher = ReloadWatcher::new(store.clone(), source);
        Self {
            config,
            store,
            codec,
            watcher,
        }
    }

    pub fn name(&self) -> &'static str {
        COMPONENT_NAME
    }

    // start loads both descriptors and begins watching every descriptor
    // file that existed. It returns once both directions have been
    // attempted. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<LoadReport, ProtoRegistryError> {
        let report = self.store.initialize(
            &self.config.server_protos_path(),
            &self.config.client_protos_path(),
        );

        for direction in Direction::ALL {
            // A broken file is still watched so fixing it takes effect.
            if report.outcome(direction) != LoadOutcome::Missing {
                self.watcher
                    .attach(direction, self.config.protos_path(direction))?;
            }
        }

        info!(
            server = ?report.server,
            client = ?report.client,
            version = report.version,
            "Started {}",
            COMPONENT_NAME
        );
        Ok(report)
    }

    // stop closes every watch. Loaded schemas stay usable. `force` is
    // accepted for hosts that distinguish forced shutdown; closing is
    // immediate either way.
    pub fn stop(&self, force: bool) {
        let closed = self.watcher.detach_all();
        info!(force, closed, "Stopped {}", COMPONENT_NAME);
    }

    // stop_and_wait closes every watch and also waits for the watch
    // tasks to exit, so no reload lands after it returns.
    pub async fn stop_and_wait(&self) {
        let closed = self.watcher.detach_all_and_wait().await;
        info!(closed, "Stopped {}", COMPONENT_NAME);
    }

    pub fn encode(&self, route: &str, message: &Value) -> Result<Vec<u8>, ProtoRegistryError> {
        self.codec.encode(route, message)
    }

    pub fn decode(&self, route: &str, bytes: &[u8]) -> Result<Value, ProtoRegistryError> {
        self.codec.decode(route, bytes)
    }

    pub fn check(&self, direction: Direction, route: &str) -> Option<MessageSchema> {
        self.codec.check(direction, route)
    }

    pub fn protos(&self) -> ProtosSnapshot {
        self.store.snapshot()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SchemaStore> {
        &self.store
    }

    pub fn codec(&self) -> &RouteCodec {
        &self.codec
    }

    pub fn watcher(&self) -> &ReloadWatcher {
        &self.watcher
    }
}

impl Drop for ProtobufComponent {
    fn drop(&mut self) {
        self.watcher.detach_all();
    }
}
