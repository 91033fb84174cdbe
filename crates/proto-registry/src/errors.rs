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

// src/errors.rs
// Error types for schema loading, route resolution, and the
// encode/decode paths.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::schema::Direction;

#[derive(Error, Debug)]
pub enum ProtoRegistryError {
    // SchemaParseError is returned when a descriptor document is not
    // valid JSON, or is JSON that does not describe a valid message
    // definition tree.
    #[error("Schema parse error: {0}")]
    SchemaParseError(String),

    // SchemaLoadError is returned when a descriptor file could not
    // be read from disk.
    #[error("Could not read descriptor file at {path}: {error}")]
    SchemaLoadError {
        path: PathBuf,
        error: std::io::Error,
    },

    // RouteNotFound covers both an unresolvable route and a direction
    // that has no schema set loaded. Callers that need to tell these
    // apart can ask SchemaStore::is_available.
    #[error("No such route '{route}' in {direction} protos")]
    RouteNotFound { direction: Direction, route: String },

    // MessageValidationError is returned by encode when a message does
    // not satisfy the schema resolved for its route.
    #[error("Invalid message for route '{route}': {reason}")]
    MessageValidationError { route: String, reason: String },

    // DecodeError is returned by decode when the payload cannot be
    // parsed against the schema resolved for its route.
    #[error("Failed to decode message for route '{route}': {reason}")]
    DecodeError { route: String, reason: String },

    // WatchError is returned when a file event source fails to
    // subscribe to a path.
    #[error("Failed to watch {path}: {reason}")]
    WatchError { path: PathBuf, reason: String },
}

impl From<serde_json::Error> for ProtoRegistryError {
    fn from(error: serde_json::Error) -> Self {
        Self::SchemaParseError(format!("invalid JSON: {error}"))
    }
}

impl From<prost_reflect::DescriptorError> for ProtoRegistryError {
    fn from(error: prost_reflect::DescriptorError) -> Self {
        Self::SchemaParseError(format!("invalid descriptor: {error}"))
    }
}

impl ProtoRegistryError {
    pub fn schema_parse_error(msg: impl Into<String>) -> Self {
        Self::SchemaParseError(msg.into())
    }

    pub fn schema_load_error(path: &Path, error: std::io::Error) -> Self {
        Self::SchemaLoadError {
            path: path.to_path_buf(),
            error,
        }
    }

    pub fn route_not_found(direction: Direction, route: impl Into<String>) -> Self {
        Self::RouteNotFound {
            direction,
            route: route.into(),
        }
    }

    pub fn validation_error(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MessageValidationError {
            route: route.into(),
            reason: reason.into(),
        }
    }

    pub fn decode_error(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DecodeError {
            route: route.into(),
            reason: reason.into(),
        }
    }

    pub fn watch_error(path: &Path, reason: impl Into<String>) -> Self {
        Self::WatchError {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    // is_schema_error is true for failures to load or parse a
    // descriptor. These only ever come out of load/reload paths.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::SchemaParseError(_) | Self::SchemaLoadError { .. }
        )
    }

    pub fn is_route_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound { .. })
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::MessageValidationError { .. })
    }

    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::DecodeError { .. })
    }

    // is_caller_error is true for errors caused by the route or payload
    // a caller handed to encode/decode, as opposed to a system fault.
    pub fn is_caller_error(&self) -> bool {
        self.is_route_not_found() || self.is_validation_error() || self.is_decode_error()
    }
}
