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

// src/lib.rs
// Main exports for the proto-registry library: a live-reloadable
// registry of protobuf message schemas keyed by route name, with
// separate server and client descriptor sets.

pub mod codec;
pub mod component;
pub mod config;
pub mod errors;
pub mod schema;
pub mod store;
pub mod watcher;

// Export some things for convenience.
pub use codec::{CodecOptions, RouteCodec};
pub use component::{COMPONENT_NAME, ProtobufComponent};
pub use config::{ConfigError, RegistryConfig};
pub use errors::ProtoRegistryError;
pub use schema::{Direction, MessageSchema, SchemaSet, normalize_route};
pub use store::{LoadReport, ProtosSnapshot, SchemaStore};
pub use watcher::{
    FileEvent, FileEventKind, FileEventSource, PollingEventSource, ReloadWatcher, Subscription,
};
