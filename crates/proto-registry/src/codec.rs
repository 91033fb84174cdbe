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

// src/codec.rs
// RouteCodec converts between structured messages and protobuf bytes,
// resolving each route against whichever schema set is active at call
// time.
//
// Outgoing messages are encoded with the server protos, and incoming
// messages are decoded with the client protos. Encode and decode are
// synchronous, take no locks, and are safe to call from any number of
// threads while reloads are happening.

use std::sync::Arc;

use prost::Message;
use prost_reflect::{DeserializeOptions, SerializeOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::ProtoRegistryError;
use crate::schema::{Direction, MessageSchema};
use crate::store::SchemaStore;

// CodecOptions controls how structured messages map to and from
// protobuf messages. The defaults match protobuf.js verify/create and
// toObject: unknown keys are ignored on the way in, and unset fields
// are left out, enums are numbers and 64-bit integers are plain numbers
// on the way out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    // deny_unknown_fields rejects structured messages that carry keys
    // not defined by the schema.
    #[serde(default)]
    pub deny_unknown_fields: bool,
    // emit_default_fields includes fields holding their default value
    // in decoded messages.
    #[serde(default)]
    pub emit_default_fields: bool,
    // stringify_64_bit_integers renders 64-bit integers as strings in
    // decoded messages.
    #[serde(default)]
    pub stringify_64_bit_integers: bool,
    // use_enum_names renders enum values by name instead of number in
    // decoded messages.
    #[serde(default)]
    pub use_enum_names: bool,
}

impl CodecOptions {
    pub(crate) fn deserialize_options(&self) -> DeserializeOptions {
        DeserializeOptions::new().deny_unknown_fields(self.deny_unknown_fields)
    }

    pub(crate) fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions::new()
            .use_proto_field_name(true)
            .skip_default_fields(!self.emit_default_fields)
            .stringify_64_bit_integers(self.stringify_64_bit_integers)
            .use_enum_numbers(!self.use_enum_names)
    }
}

#[derive(Clone, Debug)]
pub struct RouteCodec {
    store: Arc<SchemaStore>,
    options: CodecOptions,
}

impl RouteCodec {
    pub fn new(store: Arc<SchemaStore>) -> Self {
        Self::with_options(store, CodecOptions::default())
    }

    pub fn with_options(store: Arc<SchemaStore>, options: CodecOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<SchemaStore> {
        &self.store
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    // check returns the schema a route resolves to for a direction, or
    // None if the direction is not loaded or the route is unknown.
    pub fn check(&self, direction: Direction, route: &str) -> Option<MessageSchema> {
        self.store.lookup(direction, route)
    }

    // encode serializes an outgoing message using the server protos.
    pub fn encode(&self, route: &str, message: &Value) -> Result<Vec<u8>, ProtoRegistryError> {
        self.encode_for(Direction::Server, route, message)
    }

    // decode parses an incoming message using the client protos.
    pub fn decode(&self, route: &str, bytes: &[u8]) -> Result<Value, ProtoRegistryError> {
        self.decode_for(Direction::Client, route, bytes)
    }

    // encode_for serializes a message with the protos of an explicit
    // direction. Useful for peers and tests that speak the other side.
    pub fn encode_for(
        &self,
        direction: Direction,
        route: &str,
        message: &Value,
    ) -> Result<Vec<u8>, ProtoRegistryError> {
        let schema = self.resolve(direction, route)?;
        let message = schema
            .create(message, &self.options)
            .map_err(|reason| ProtoRegistryError::validation_error(route, reason))?;
        Ok(message.encode_to_vec())
    }

    // decode_for parses bytes with the protos of an explicit direction.
    pub fn decode_for(
        &self,
        direction: Direction,
        route: &str,
        bytes: &[u8],
    ) -> Result<Value, ProtoRegistryError> {
        let schema = self.resolve(direction, route)?;
        let message = schema
            .decode(bytes)
            .map_err(|reason| ProtoRegistryError::decode_error(route, reason))?;
        schema
            .to_object(&message, &self.options)
            .map_err(|reason| ProtoRegistryError::decode_error(route, reason))
    }

    fn resolve(&self, direction: Direction, route: &str) -> Result<MessageSchema, ProtoRegistryError> {
        self.store.lookup(direction, route).ok_or_else(|| {
            debug!("Route '{}' did not resolve in {} protos", route, direction);
            ProtoRegistryError::route_not_found(direction, route)
        })
    }
}
