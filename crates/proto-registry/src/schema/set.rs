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

// src/schema/set.rs
// SchemaSet and MessageSchema implementations.
//
// A SchemaSet is built once from one descriptor document and never
// changes afterwards; reloading a descriptor builds a brand new set.
// Route lookups return MessageSchema handles, which keep the compiled
// descriptor pool alive on their own, so a schema handed out before a
// reload stays usable after it.

use std::collections::HashMap;

use prost_reflect::{
    Cardinality, DescriptorPool, DynamicMessage, Kind, MessageDescriptor, ReflectMessage,
    Value as ReflectValue,
};
use serde_json::Value;
use tracing::debug;

use super::descriptor::Descriptor;
use super::types::normalize_route;
use crate::codec::CodecOptions;
use crate::errors::ProtoRegistryError;

// SchemaSet is an immutable collection of message schemas, keyed by
// normalized route name.
pub struct SchemaSet {
    // raw is the descriptor document the set was built from, kept for
    // diagnostics snapshots.
    raw: Value,
    // routes maps message names to their compiled descriptors.
    routes: HashMap<String, MessageDescriptor>,
    // route_names keeps routes in descriptor declaration order.
    route_names: Vec<String>,
}

impl std::fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSet")
            .field("routes", &self.route_names)
            .finish()
    }
}

impl SchemaSet {
    // build validates and compiles a descriptor document. Fails with
    // SchemaParseError if the document is not a valid definition tree.
    pub fn build(raw: Value) -> Result<Self, ProtoRegistryError> {
        let descriptor = Descriptor::from_json(&raw)?;
        let pool = DescriptorPool::from_file_descriptor_set(descriptor.to_file_descriptor_set()?)?;

        let mut routes = HashMap::new();
        let mut route_names = Vec::new();
        for (name, full_name) in descriptor.message_routes() {
            let message = pool.get_message_by_name(&full_name).ok_or_else(|| {
                ProtoRegistryError::schema_parse_error(format!(
                    "message '{full_name}' is missing from the compiled descriptor"
                ))
            })?;
            route_names.push(name.clone());
            routes.insert(name, message);
        }

        debug!("Built schema set with {} routes", route_names.len());
        Ok(Self {
            raw,
            routes,
            route_names,
        })
    }

    // from_json_str parses descriptor text and builds a set from it.
    pub fn from_json_str(text: &str) -> Result<Self, ProtoRegistryError> {
        let raw: Value = serde_json::from_str(text)?;
        Self::build(raw)
    }

    // lookup resolves a route to a message schema. Dots in the route
    // are stripped first, so "a.b.c" and "abc" are the same route.
    pub fn lookup(&self, route: &str) -> Option<MessageSchema> {
        let name = normalize_route(route);
        self.routes.get(&name).cloned().map(MessageSchema::new)
    }

    // route_names returns every resolvable route, in declaration order.
    pub fn route_names(&self) -> &[String] {
        &self.route_names
    }

    pub fn len(&self) -> usize {
        self.route_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.route_names.is_empty()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

// MessageSchema is a read-only handle on one message type.
#[derive(Clone, Debug)]
pub struct MessageSchema {
    descriptor: MessageDescriptor,
}

impl MessageSchema {
    pub fn new(descriptor: MessageDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn full_name(&self) -> &str {
        self.descriptor.full_name()
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    // field_names returns field names in descriptor order.
    pub fn field_names(&self) -> Vec<String> {
        self.descriptor
            .fields()
            .map(|f| f.name().to_string())
            .collect()
    }

    // verify checks that a structured message is an object carrying
    // every required field, recursing through nested messages, lists
    // and map values. Field type checking happens in create.
    pub fn verify(&self, message: &Value) -> Result<(), String> {
        verify_required(&self.descriptor, message, "")
    }

    // create verifies a structured message and converts it into its
    // canonical protobuf representation.
    pub fn create(
        &self,
        message: &Value,
        options: &CodecOptions,
    ) -> Result<DynamicMessage, String> {
        self.verify(message)?;
        DynamicMessage::deserialize_with_options(
            self.descriptor.clone(),
            message,
            &options.deserialize_options(),
        )
        .map_err(|e| e.to_string())
    }

    // decode parses wire bytes into a message, rejecting payloads that
    // are malformed or that leave a required field unset.
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicMessage, String> {
        let message =
            DynamicMessage::decode(self.descriptor.clone(), bytes).map_err(|e| e.to_string())?;
        if let Some(field) = missing_required(&message, "") {
            return Err(format!("missing required field '{field}'"));
        }
        Ok(message)
    }

    // to_object converts a decoded message into a structured message.
    pub fn to_object(
        &self,
        message: &DynamicMessage,
        options: &CodecOptions,
    ) -> Result<Value, String> {
        message
            .serialize_with_options(serde_json::value::Serializer, &options.serialize_options())
            .map_err(|e| e.to_string())
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn verify_required(
    descriptor: &MessageDescriptor,
    value: &Value,
    path: &str,
) -> Result<(), String> {
    let obj = value.as_object().ok_or_else(|| {
        if path.is_empty() {
            "message must be an object".to_string()
        } else {
            format!("field '{path}' must be an object")
        }
    })?;

    for field in descriptor.fields() {
        let field_path = join_path(path, field.name());
        let present = obj
            .get(field.name())
            .or_else(|| obj.get(field.json_name()))
            .filter(|v| !v.is_null());
        let Some(present) = present else {
            if field.cardinality() == Cardinality::Required {
                return Err(format!("missing required field '{field_path}'"));
            }
            continue;
        };

        let Kind::Message(child) = field.kind() else {
            continue;
        };
        if field.is_map() {
            let Kind::Message(value_descriptor) = child.map_entry_value_field().kind() else {
                continue;
            };
            if let Some(entries) = present.as_object() {
                for (key, entry) in entries {
                    verify_required(&value_descriptor, entry, &format!("{field_path}[{key}]"))?;
                }
            }
        } else if field.is_list() {
            if let Some(items) = present.as_array() {
                for (i, item) in items.iter().enumerate() {
                    verify_required(&child, item, &format!("{field_path}[{i}]"))?;
                }
            }
        } else {
            verify_required(&child, present, &field_path)?;
        }
    }
    Ok(())
}

fn missing_required(message: &DynamicMessage, path: &str) -> Option<String> {
    for field in message.descriptor().fields() {
        let field_path = join_path(path, field.name());
        if !message.has_field(&field) {
            if field.cardinality() == Cardinality::Required {
                return Some(field_path);
            }
            continue;
        }
        if !matches!(field.kind(), Kind::Message(_)) {
            continue;
        }

        let missing = match &*message.get_field(&field) {
            ReflectValue::Message(child) => missing_required(child, &field_path),
            ReflectValue::List(items) => items.iter().enumerate().find_map(|(i, item)| match item {
                ReflectValue::Message(child) => {
                    missing_required(child, &format!("{field_path}[{i}]"))
                }
                _ => None,
            }),
            ReflectValue::Map(entries) => entries.iter().find_map(|(key, item)| match item {
                ReflectValue::Message(child) => {
                    missing_required(child, &format!("{field_path}[{key:?}]"))
                }
                _ => None,
            }),
            _ => None,
        };
        if missing.is_some() {
            return missing;
        }
    }
    None
}
