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

// src/schema/descriptor.rs
// Typed model of a JSON protos descriptor, and its compilation into a
// protobuf FileDescriptorSet.
//
// A descriptor document is a tree of named definitions in the layout
// used by protobuf.js JSON descriptors:
//
// {
//   "nested": {
//     "chatHandlerSend": {
//       "fields": {
//         "content": { "type": "string", "id": 1 },
//         "target":  { "type": "string", "id": 2, "rule": "required" },
//         "tags":    { "type": "string", "id": 3, "rule": "repeated" },
//         "scores":  { "keyType": "string", "type": "int32", "id": 4 }
//       },
//       "oneofs": { "payload": { "oneof": ["text", "blob"] } },
//       "nested": { ... }
//     },
//     "Color": { "values": { "RED": 0, "GREEN": 1 } },
//     "area": { "nested": { ... } }
//   }
// }
//
// Objects with "fields" are messages, objects with "values" are enums,
// and anything else is a namespace. Services and extension fields are
// skipped. Messages are compiled into a single proto2 file with no
// package; namespaces become empty container messages, so every
// message keeps the same fully-qualified name it has in the tree.
// Protobuf scopes enum values beside their enum, which JSON descriptors
// do not, so each enum is emitted into a file of its own under a
// synthetic package where its values cannot collide with anything.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumOptions, EnumValueDescriptorProto,
    FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileDescriptorSet, MessageOptions,
    OneofDescriptorProto,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::ProtoRegistryError;

const FILE_NAME: &str = "protos.proto";
const ENUM_PACKAGE: &str = "__protos_enums";

const MAX_FIELD_NUMBER: i64 = 536_870_911;
const RESERVED_FIELD_NUMBERS: RangeInclusive<i64> = 19_000..=19_999;

// Descriptor is the validated form of a JSON protos document.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    pub nested: Vec<Definition>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    Namespace(NamespaceDef),
    Message(MessageDef),
    Enum(EnumDef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamespaceDef {
    pub name: String,
    pub nested: Vec<Definition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub oneofs: Vec<OneofDef>,
    pub nested: Vec<Definition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub id: i32,
    // type_name is either a scalar type name ("int32", "string", ...)
    // or a reference to a message or enum, resolved with protobuf
    // scoping rules relative to the enclosing message.
    pub type_name: String,
    pub rule: FieldRule,
    // key_type is set for map fields, in which case type_name is the
    // map value type.
    pub key_type: Option<String>,
    pub packed: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRule {
    Optional,
    Required,
    Repeated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OneofDef {
    pub name: String,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<(String, i32)>,
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Namespace(ns) => &ns.name,
            Definition::Message(message) => &message.name,
            Definition::Enum(e) => &e.name,
        }
    }

    // children returns the nested definitions for namespaces and
    // messages. Enums have no children.
    pub fn children(&self) -> Option<&[Definition]> {
        match self {
            Definition::Namespace(ns) => Some(&ns.nested),
            Definition::Message(message) => Some(&message.nested),
            Definition::Enum(_) => None,
        }
    }
}

impl MessageDef {
    // has_member is true if a field or oneof of this message is called
    // `name`. Members shadow nested types of the same name during
    // route lookup.
    fn has_member(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name) || self.oneofs.iter().any(|o| o.name == name)
    }

    fn oneof_index(&self, field_name: &str) -> Option<usize> {
        self.oneofs
            .iter()
            .position(|o| o.fields.iter().any(|f| f == field_name))
    }
}

impl Descriptor {
    // from_json validates a JSON document into a Descriptor. This is
    // the only place loosely-typed descriptor JSON is inspected.
    pub fn from_json(value: &Value) -> Result<Self, ProtoRegistryError> {
        let root = value.as_object().ok_or_else(|| {
            ProtoRegistryError::schema_parse_error("descriptor root must be a JSON object")
        })?;
        if root.contains_key("fields") || root.contains_key("values") {
            return Err(ProtoRegistryError::schema_parse_error(
                "descriptor root must be a namespace, not a message or enum",
            ));
        }
        Ok(Self {
            nested: parse_nested(root, "")?,
        })
    }

    // to_file_descriptor_set compiles the tree into proto2 files,
    // resolving every type reference to its fully-qualified name. The
    // first file holds the messages; one file per enum follows it.
    pub fn to_file_descriptor_set(&self) -> Result<FileDescriptorSet, ProtoRegistryError> {
        let index = TypeIndex::new(self);
        let mut file = FileDescriptorProto {
            name: Some(FILE_NAME.to_string()),
            syntax: Some("proto2".to_string()),
            ..Default::default()
        };
        let mut enum_files = Vec::new();
        build_nested(
            &self.nested,
            "",
            &index,
            &mut file.message_type,
            &mut enum_files,
        )?;
        file.dependency = enum_files.iter().filter_map(|f| f.name.clone()).collect();

        let mut files = vec![file];
        files.extend(enum_files);
        Ok(FileDescriptorSet { file: files })
    }

    // message_routes returns (name, full_name) for every message that a
    // route can resolve to, in declaration order. When several messages
    // share a simple name, the one reached first by a breadth-then-depth
    // search from the root wins, and members of an enclosing message
    // shadow nested types of the same name.
    pub fn message_routes(&self) -> Vec<(String, String)> {
        let mut names = Vec::new();
        collect_message_names(&self.nested, &mut names);

        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .filter_map(|name| {
                let full_name = find_message(&self.nested, "", &name)?;
                Some((name, full_name))
            })
            .collect()
    }
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn parent_scope(scope: &str) -> Option<&str> {
    if scope.is_empty() {
        None
    } else {
        Some(scope.rsplit_once('.').map_or("", |(parent, _)| parent))
    }
}

fn display_scope(scope: &str) -> &str {
    if scope.is_empty() { "<root>" } else { scope }
}

fn parse_error(msg: String) -> ProtoRegistryError {
    ProtoRegistryError::SchemaParseError(msg)
}

fn check_identifier(name: &str, full_name: &str) -> Result<(), ProtoRegistryError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(parse_error(format!("'{full_name}' is not a valid identifier")))
    }
}

fn parse_nested(
    obj: &Map<String, Value>,
    scope: &str,
) -> Result<Vec<Definition>, ProtoRegistryError> {
    let Some(nested) = obj.get("nested") else {
        return Ok(Vec::new());
    };
    let nested = nested.as_object().ok_or_else(|| {
        parse_error(format!(
            "'nested' of '{}' must be an object",
            display_scope(scope)
        ))
    })?;

    let mut definitions = Vec::with_capacity(nested.len());
    for (name, value) in nested {
        if let Some(definition) = parse_definition(name, value, scope)? {
            definitions.push(definition);
        }
    }
    Ok(definitions)
}

fn parse_definition(
    name: &str,
    value: &Value,
    scope: &str,
) -> Result<Option<Definition>, ProtoRegistryError> {
    let full_name = join(scope, name);
    check_identifier(name, &full_name)?;
    let obj = value
        .as_object()
        .ok_or_else(|| parse_error(format!("definition '{full_name}' must be an object")))?;

    if obj.contains_key("fields") {
        Ok(Some(Definition::Message(parse_message(
            name, obj, &full_name,
        )?)))
    } else if obj.contains_key("values") {
        Ok(Some(Definition::Enum(parse_enum(name, obj, &full_name)?)))
    } else if obj.contains_key("methods") {
        debug!("Skipping service definition '{}'", full_name);
        Ok(None)
    } else if obj.contains_key("id") {
        debug!("Skipping extension field '{}'", full_name);
        Ok(None)
    } else {
        Ok(Some(Definition::Namespace(NamespaceDef {
            name: name.to_string(),
            nested: parse_nested(obj, &full_name)?,
        })))
    }
}

fn parse_message(
    name: &str,
    obj: &Map<String, Value>,
    full_name: &str,
) -> Result<MessageDef, ProtoRegistryError> {
    let fields_obj = obj
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| parse_error(format!("'fields' of '{full_name}' must be an object")))?;

    let mut fields = Vec::with_capacity(fields_obj.len());
    let mut ids: HashMap<i32, String> = HashMap::new();
    for (field_name, value) in fields_obj {
        let field = parse_field(field_name, value, full_name)?;
        if let Some(other) = ids.insert(field.id, field.name.clone()) {
            return Err(parse_error(format!(
                "fields '{other}' and '{}' of '{full_name}' share id {}",
                field.name, field.id
            )));
        }
        fields.push(field);
    }

    let oneofs = parse_oneofs(obj, full_name, &fields)?;
    let nested = parse_nested(obj, full_name)?;

    Ok(MessageDef {
        name: name.to_string(),
        fields,
        oneofs,
        nested,
    })
}

fn parse_field(name: &str, value: &Value, scope: &str) -> Result<FieldDef, ProtoRegistryError> {
    let path = join(scope, name);
    check_identifier(name, &path)?;
    let obj = value
        .as_object()
        .ok_or_else(|| parse_error(format!("field '{path}' must be an object")))?;

    let id = obj
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| parse_error(format!("field '{path}' needs an integer 'id'")))?;
    if !(1..=MAX_FIELD_NUMBER).contains(&id) || RESERVED_FIELD_NUMBERS.contains(&id) {
        return Err(parse_error(format!(
            "field '{path}' has invalid id {id}"
        )));
    }

    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| parse_error(format!("field '{path}' needs a string 'type'")))?;

    let rule = match obj.get("rule") {
        None => FieldRule::Optional,
        Some(Value::String(rule)) => match rule.as_str() {
            "optional" => FieldRule::Optional,
            "required" => FieldRule::Required,
            "repeated" => FieldRule::Repeated,
            other => {
                return Err(parse_error(format!(
                    "field '{path}' has unknown rule '{other}'"
                )));
            }
        },
        Some(_) => {
            return Err(parse_error(format!(
                "'rule' of field '{path}' must be a string"
            )));
        }
    };

    let key_type = match obj.get("keyType") {
        None => None,
        Some(Value::String(key_type)) => Some(key_type.clone()),
        Some(_) => {
            return Err(parse_error(format!(
                "'keyType' of field '{path}' must be a string"
            )));
        }
    };
    if key_type.is_some() && rule != FieldRule::Optional {
        return Err(parse_error(format!(
            "map field '{path}' cannot be repeated or required"
        )));
    }

    let packed = match obj.get("options") {
        None => None,
        Some(Value::Object(options)) => options.get("packed").and_then(Value::as_bool),
        Some(_) => {
            return Err(parse_error(format!(
                "'options' of field '{path}' must be an object"
            )));
        }
    };

    Ok(FieldDef {
        name: name.to_string(),
        // Range checked above.
        id: id as i32,
        type_name: type_name.to_string(),
        rule,
        key_type,
        packed,
    })
}

fn parse_oneofs(
    obj: &Map<String, Value>,
    full_name: &str,
    fields: &[FieldDef],
) -> Result<Vec<OneofDef>, ProtoRegistryError> {
    let Some(value) = obj.get("oneofs") else {
        return Ok(Vec::new());
    };
    let oneofs = value
        .as_object()
        .ok_or_else(|| parse_error(format!("'oneofs' of '{full_name}' must be an object")))?;

    let mut claimed: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(oneofs.len());
    for (name, def) in oneofs {
        let path = join(full_name, name);
        check_identifier(name, &path)?;
        let members = def
            .get("oneof")
            .and_then(Value::as_array)
            .ok_or_else(|| parse_error(format!("oneof '{path}' needs a 'oneof' array")))?;

        let mut names = Vec::with_capacity(members.len());
        for member in members {
            let member = member.as_str().ok_or_else(|| {
                parse_error(format!("members of oneof '{path}' must be field names"))
            })?;
            let field = fields.iter().find(|f| f.name == member).ok_or_else(|| {
                parse_error(format!("oneof '{path}' references unknown field '{member}'"))
            })?;
            if field.rule != FieldRule::Optional || field.key_type.is_some() {
                return Err(parse_error(format!(
                    "field '{member}' of oneof '{path}' cannot be repeated, required or a map"
                )));
            }
            if !claimed.insert(member.to_string()) {
                return Err(parse_error(format!(
                    "field '{member}' of '{full_name}' belongs to more than one oneof"
                )));
            }
            names.push(member.to_string());
        }
        if names.is_empty() {
            return Err(parse_error(format!("oneof '{path}' has no fields")));
        }

        result.push(OneofDef {
            name: name.clone(),
            fields: names,
        });
    }
    Ok(result)
}

fn parse_enum(
    name: &str,
    obj: &Map<String, Value>,
    full_name: &str,
) -> Result<EnumDef, ProtoRegistryError> {
    let values_obj = obj
        .get("values")
        .and_then(Value::as_object)
        .ok_or_else(|| parse_error(format!("'values' of enum '{full_name}' must be an object")))?;
    if values_obj.is_empty() {
        return Err(parse_error(format!("enum '{full_name}' has no values")));
    }

    let mut values = Vec::with_capacity(values_obj.len());
    for (value_name, number) in values_obj {
        check_identifier(value_name, &join(full_name, value_name))?;
        let number = number
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| {
                parse_error(format!(
                    "value '{value_name}' of enum '{full_name}' must be a 32-bit integer"
                ))
            })?;
        values.push((value_name.clone(), number));
    }

    Ok(EnumDef {
        name: name.to_string(),
        values,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DefKind {
    Namespace,
    Message,
    Enum,
}

// TypeIndex maps every fully-qualified definition name in a descriptor
// to its kind, for resolving field type references.
struct TypeIndex {
    kinds: HashMap<String, DefKind>,
    // order keeps declaration order for the suffix fallback in resolve.
    order: Vec<String>,
    // enum_packages maps an enum's name in the tree to the synthetic
    // package it is emitted under.
    enum_packages: HashMap<String, String>,
}

impl TypeIndex {
    fn new(descriptor: &Descriptor) -> Self {
        let mut index = Self {
            kinds: HashMap::new(),
            order: Vec::new(),
            enum_packages: HashMap::new(),
        };
        index.collect(&descriptor.nested, "");
        index
    }

    fn collect(&mut self, definitions: &[Definition], scope: &str) {
        for definition in definitions {
            let full_name = join(scope, definition.name());
            let kind = match definition {
                Definition::Namespace(_) => DefKind::Namespace,
                Definition::Message(_) => DefKind::Message,
                Definition::Enum(_) => {
                    let package = format!("{ENUM_PACKAGE}.e{}", self.enum_packages.len());
                    self.enum_packages.insert(full_name.clone(), package);
                    DefKind::Enum
                }
            };
            self.kinds.insert(full_name.clone(), kind);
            self.order.push(full_name.clone());
            if let Some(children) = definition.children() {
                self.collect(children, &full_name);
            }
        }
    }

    fn enum_package(&self, full_name: &str) -> Option<&str> {
        self.enum_packages.get(full_name).map(String::as_str)
    }

    // emitted_name is the fully-qualified name a resolved definition
    // has in the compiled descriptor set.
    fn emitted_name(&self, full_name: &str, kind: DefKind) -> String {
        match (kind, self.enum_package(full_name)) {
            (DefKind::Enum, Some(package)) => {
                let simple = full_name.rsplit('.').next().unwrap_or(full_name);
                format!("{package}.{simple}")
            }
            _ => full_name.to_string(),
        }
    }

    fn typed(&self, full_name: &str) -> Option<(String, DefKind)> {
        self.kinds
            .get(full_name)
            .copied()
            .filter(|kind| *kind != DefKind::Namespace)
            .map(|kind| (full_name.to_string(), kind))
    }

    // resolve finds the message or enum a field type refers to. A
    // leading '.' makes the reference absolute; otherwise the enclosing
    // scopes are searched innermost first, as protoc does. References
    // that still do not resolve fall back to the first definition whose
    // name ends with the reference.
    fn resolve(&self, reference: &str, scope: &str) -> Option<(String, DefKind)> {
        if let Some(absolute) = reference.strip_prefix('.') {
            return self.typed(absolute);
        }

        let first = reference.split('.').next().unwrap_or(reference);
        let mut current = Some(scope);
        while let Some(s) = current {
            if self.kinds.contains_key(&join(s, first)) {
                if let Some(found) = self.typed(&join(s, reference)) {
                    return Some(found);
                }
            }
            current = parent_scope(s);
        }

        let suffix = format!(".{reference}");
        self.order
            .iter()
            .filter(|name| *name == reference || name.ends_with(&suffix))
            .find_map(|name| self.typed(name))
    }
}

fn scalar_type(name: &str) -> Option<Type> {
    let ty = match name {
        "double" => Type::Double,
        "float" => Type::Float,
        "int32" => Type::Int32,
        "int64" => Type::Int64,
        "uint32" => Type::Uint32,
        "uint64" => Type::Uint64,
        "sint32" => Type::Sint32,
        "sint64" => Type::Sint64,
        "fixed32" => Type::Fixed32,
        "fixed64" => Type::Fixed64,
        "sfixed32" => Type::Sfixed32,
        "sfixed64" => Type::Sfixed64,
        "bool" => Type::Bool,
        "string" => Type::String,
        "bytes" => Type::Bytes,
        _ => return None,
    };
    Some(ty)
}

fn is_packable(ty: Type) -> bool {
    !matches!(
        ty,
        Type::String | Type::Bytes | Type::Message | Type::Group
    )
}

fn is_map_key(ty: Type) -> bool {
    !matches!(
        ty,
        Type::Double | Type::Float | Type::Bytes | Type::Message | Type::Enum | Type::Group
    )
}

// map_entry_name follows protoc's naming for synthesized map entry
// messages: "my_field" becomes "MyFieldEntry".
fn map_entry_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len() + 5);
    let mut upper_next = true;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

fn build_nested(
    definitions: &[Definition],
    scope: &str,
    index: &TypeIndex,
    messages: &mut Vec<DescriptorProto>,
    enum_files: &mut Vec<FileDescriptorProto>,
) -> Result<(), ProtoRegistryError> {
    for definition in definitions {
        match definition {
            Definition::Namespace(ns) => {
                let mut container = DescriptorProto {
                    name: Some(ns.name.clone()),
                    ..Default::default()
                };
                build_nested(
                    &ns.nested,
                    &join(scope, &ns.name),
                    index,
                    &mut container.nested_type,
                    enum_files,
                )?;
                messages.push(container);
            }
            Definition::Message(message) => {
                messages.push(build_message(
                    message,
                    &join(scope, &message.name),
                    index,
                    enum_files,
                )?);
            }
            Definition::Enum(e) => {
                let full_name = join(scope, &e.name);
                let package = index.enum_package(&full_name).ok_or_else(|| {
                    parse_error(format!("enum '{full_name}' is missing from the type index"))
                })?;
                enum_files.push(build_enum_file(e, package));
            }
        }
    }
    Ok(())
}

fn build_message(
    message: &MessageDef,
    full_name: &str,
    index: &TypeIndex,
    enum_files: &mut Vec<FileDescriptorProto>,
) -> Result<DescriptorProto, ProtoRegistryError> {
    let mut proto = DescriptorProto {
        name: Some(message.name.clone()),
        oneof_decl: message
            .oneofs
            .iter()
            .map(|o| OneofDescriptorProto {
                name: Some(o.name.clone()),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    build_nested(
        &message.nested,
        full_name,
        index,
        &mut proto.nested_type,
        enum_files,
    )?;

    // Members of a oneof have to be declared consecutively, so each
    // oneof is emitted as a group at the position of its first member.
    let mut emitted_oneofs = HashSet::new();
    for field in &message.fields {
        match message.oneof_index(&field.name) {
            None => {
                let built = build_field(field, full_name, index, None, &mut proto.nested_type)?;
                proto.field.push(built);
            }
            Some(oneof) if emitted_oneofs.insert(oneof) => {
                for member in &message.oneofs[oneof].fields {
                    let Some(member) = message.fields.iter().find(|f| &f.name == member) else {
                        continue;
                    };
                    let built = build_field(
                        member,
                        full_name,
                        index,
                        Some(oneof as i32),
                        &mut proto.nested_type,
                    )?;
                    proto.field.push(built);
                }
            }
            Some(_) => {}
        }
    }

    Ok(proto)
}

fn build_field(
    field: &FieldDef,
    scope: &str,
    index: &TypeIndex,
    oneof_index: Option<i32>,
    nested_types: &mut Vec<DescriptorProto>,
) -> Result<FieldDescriptorProto, ProtoRegistryError> {
    let path = join(scope, &field.name);
    // JSON names are the field names verbatim, so fields that only
    // differ in case or underscores can live side by side.
    let mut proto = FieldDescriptorProto {
        name: Some(field.name.clone()),
        json_name: Some(field.name.clone()),
        number: Some(field.id),
        oneof_index,
        ..Default::default()
    };

    if let Some(key_type) = &field.key_type {
        let key = scalar_type(key_type)
            .filter(|ty| is_map_key(*ty))
            .ok_or_else(|| {
                parse_error(format!(
                    "map field '{path}' has invalid key type '{key_type}'"
                ))
            })?;

        let mut value = FieldDescriptorProto {
            name: Some("value".to_string()),
            json_name: Some("value".to_string()),
            number: Some(2),
            label: Some(Label::Optional as i32),
            ..Default::default()
        };
        set_field_type(&mut value, &field.type_name, scope, index, &path)?;
        let key = FieldDescriptorProto {
            name: Some("key".to_string()),
            json_name: Some("key".to_string()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(key as i32),
            ..Default::default()
        };

        let entry_name = map_entry_name(&field.name);
        proto.label = Some(Label::Repeated as i32);
        proto.r#type = Some(Type::Message as i32);
        proto.type_name = Some(format!(".{}", join(scope, &entry_name)));
        nested_types.push(DescriptorProto {
            name: Some(entry_name),
            field: vec![key, value],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        });
        return Ok(proto);
    }

    let ty = set_field_type(&mut proto, &field.type_name, scope, index, &path)?;
    let label = match field.rule {
        FieldRule::Optional => Label::Optional,
        FieldRule::Required => Label::Required,
        FieldRule::Repeated => Label::Repeated,
    };
    proto.label = Some(label as i32);

    // Repeated scalars are packed unless the descriptor says otherwise,
    // which is what protobuf.js peers expect on the wire.
    if field.rule == FieldRule::Repeated && is_packable(ty) {
        proto.options = Some(FieldOptions {
            packed: Some(field.packed.unwrap_or(true)),
            ..Default::default()
        });
    }

    Ok(proto)
}

fn set_field_type(
    proto: &mut FieldDescriptorProto,
    type_name: &str,
    scope: &str,
    index: &TypeIndex,
    path: &str,
) -> Result<Type, ProtoRegistryError> {
    if let Some(ty) = scalar_type(type_name) {
        proto.r#type = Some(ty as i32);
        return Ok(ty);
    }

    let (full_name, kind) = index.resolve(type_name, scope).ok_or_else(|| {
        parse_error(format!(
            "field '{path}' references unknown type '{type_name}'"
        ))
    })?;
    let ty = if kind == DefKind::Enum {
        Type::Enum
    } else {
        Type::Message
    };
    proto.r#type = Some(ty as i32);
    proto.type_name = Some(format!(".{}", index.emitted_name(&full_name, kind)));
    Ok(ty)
}

fn build_enum_file(e: &EnumDef, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(format!("{}.proto", package.replace('.', "/"))),
        package: Some(package.to_string()),
        syntax: Some("proto2".to_string()),
        enum_type: vec![build_enum(e)],
        ..Default::default()
    }
}

fn build_enum(e: &EnumDef) -> EnumDescriptorProto {
    let mut numbers = HashSet::new();
    let has_aliases = !e.values.iter().all(|(_, number)| numbers.insert(*number));

    EnumDescriptorProto {
        name: Some(e.name.clone()),
        value: e
            .values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.clone()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        options: has_aliases.then(|| EnumOptions {
            allow_alias: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn collect_message_names(definitions: &[Definition], out: &mut Vec<String>) {
    for definition in definitions {
        if let Definition::Message(message) = definition {
            out.push(message.name.clone());
        }
        if let Some(children) = definition.children() {
            collect_message_names(children, out);
        }
    }
}

// find_message looks a single-segment name up the way protobuf.js does
// from the root: direct children first, then each nested namespace or
// message in declaration order. A direct child that is not a message
// ends the search in that subtree.
fn find_message(definitions: &[Definition], scope: &str, name: &str) -> Option<String> {
    if let Some(definition) = definitions.iter().find(|d| d.name() == name) {
        return matches!(definition, Definition::Message(_)).then(|| join(scope, name));
    }

    definitions.iter().find_map(|definition| {
        if let Definition::Message(message) = definition {
            if message.has_member(name) {
                return None;
            }
        }
        let children = definition.children()?;
        find_message(children, &join(scope, definition.name()), name)
    })
}
