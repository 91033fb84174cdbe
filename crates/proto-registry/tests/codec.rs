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
// tests/codec.rs
// Tests for RouteCodec: encoding with server protos, decoding with client
// protos, wire compatibility, validation failures, and codec options.

use std::io::Write;
use std::sync::Arc;

use proto_registry::errors::ProtoRegistryError;
use proto_registry::{CodecOptions, Direction, RouteCodec, SchemaStore};
use serde_json::{Value, json};
use tempfile::NamedTempFile;

fn game_descriptor() -> Value {
    json!({
        "nested": {
            "chatsend": {
                "fields": {
                    "content": { "type": "string", "id": 1 },
                    "target": { "type": "string", "id": 2 }
                }
            },
            "loginRequest": {
                "fields": {
                    "uid": { "type": "uint32", "id": 1, "rule": "required" },
                    "token": { "type": "string", "id": 2, "rule": "required" }
                }
            },
            "roomstate": {
                "fields": {
                    "id": { "type": "int64", "id": 1 },
                    "phase": { "type": "Phase", "id": 2 },
                    "seats": { "type": "uint32", "id": 3, "rule": "repeated" },
                    "players": { "type": "Player", "id": 4, "rule": "repeated" },
                    "scores": { "keyType": "string", "type": "int32", "id": 5 },
                    "text": { "type": "string", "id": 6 },
                    "blob": { "type": "bytes", "id": 7 }
                },
                "oneofs": { "extra": { "oneof": ["text", "blob"] } },
                "nested": {
                    "Player": {
                        "fields": {
                            "name": { "type": "string", "id": 1 },
                            "ready": { "type": "bool", "id": 2 }
                        }
                    },
                    "Phase": { "values": { "WAITING": 0, "PLAYING": 1, "DONE": 2 } }
                }
            }
        }
    })
}

fn write_descriptor(value: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(value.to_string().as_bytes())
        .expect("write descriptor");
    file
}

// Helper function to create a codec whose server and client protos are
// both loaded from the same descriptor.
fn create_test_codec(options: CodecOptions) -> RouteCodec {
    let descriptor = write_descriptor(&game_descriptor());
    let store = Arc::new(SchemaStore::new());
    let report = store.initialize(descriptor.path(), descriptor.path());
    assert_eq!(report.version, store.version());
    assert!(store.is_available(Direction::Server));
    assert!(store.is_available(Direction::Client));
    RouteCodec::with_options(store, options)
}

// Tests for wire compatibility
#[test]
fn test_encode_produces_expected_bytes() {
    let codec = create_test_codec(CodecOptions::default());

    let bytes = codec.encode("chat.send", &json!({ "content": "hi" })).unwrap();
    assert_eq!(bytes, vec![0x0a, 0x02, 0x68, 0x69]);
}

#[test]
fn test_decode_known_bytes() {
    let codec = create_test_codec(CodecOptions::default());

    let message = codec.decode("chat.send", &[0x0a, 0x02, 0x68, 0x69]).unwrap();
    assert_eq!(message, json!({ "content": "hi" }));
}

#[test]
fn test_repeated_scalars_are_packed() {
    let codec = create_test_codec(CodecOptions::default());

    let bytes = codec
        .encode("room.state", &json!({ "seats": [1, 2, 3] }))
        .unwrap();
    // Field 3, wire type 2, three one-byte varints.
    assert_eq!(bytes, vec![0x1a, 0x03, 0x01, 0x02, 0x03]);
}

// Tests for round trips
#[test]
fn test_round_trip_simple_message() {
    let codec = create_test_codec(CodecOptions::default());
    let message = json!({ "content": "hello", "target": "everyone" });

    let bytes = codec.encode("chat.send", &message).unwrap();
    let decoded = codec.decode("chat.send", &bytes).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_round_trip_nested_repeated_and_map_fields() {
    let codec = create_test_codec(CodecOptions::default());
    let message = json!({
        "id": 42,
        "phase": 1,
        "seats": [1, 5, 9],
        "players": [
            { "name": "ann", "ready": true },
            { "name": "bob" }
        ],
        "scores": { "ann": 10, "bob": -3 },
        "text": "go"
    });

    let bytes = codec.encode("room.state", &message).unwrap();
    let decoded = codec.decode("room.state", &bytes).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_round_trip_empty_message() {
    let codec = create_test_codec(CodecOptions::default());

    let bytes = codec.encode("chat.send", &json!({})).unwrap();
    assert!(bytes.is_empty());
    assert_eq!(codec.decode("chat.send", &bytes).unwrap(), json!({}));
}

#[test]
fn test_oneof_keeps_one_member() {
    let codec = create_test_codec(CodecOptions::default());

    let bytes = codec.encode("room.state", &json!({ "blob": "AQI=" })).unwrap();
    let decoded = codec.decode("room.state", &bytes).unwrap();
    assert_eq!(decoded, json!({ "blob": "AQI=" }));
}

#[test]
fn test_encode_accepts_enum_names() {
    let codec = create_test_codec(CodecOptions::default());

    let by_name = codec
        .encode("room.state", &json!({ "phase": "DONE" }))
        .unwrap();
    let by_number = codec.encode("room.state", &json!({ "phase": 2 })).unwrap();
    assert_eq!(by_name, by_number);
}

// Tests for codec options
#[test]
fn test_use_enum_names_option() {
    let codec = create_test_codec(CodecOptions {
        use_enum_names: true,
        ..CodecOptions::default()
    });

    let bytes = codec.encode("room.state", &json!({ "phase": 1 })).unwrap();
    let decoded = codec.decode("room.state", &bytes).unwrap();
    assert_eq!(decoded, json!({ "phase": "PLAYING" }));
}

#[test]
fn test_stringify_64_bit_integers_option() {
    let codec = create_test_codec(CodecOptions {
        stringify_64_bit_integers: true,
        ..CodecOptions::default()
    });

    let bytes = codec.encode("room.state", &json!({ "id": 7 })).unwrap();
    let decoded = codec.decode("room.state", &bytes).unwrap();
    assert_eq!(decoded, json!({ "id": "7" }));
}

#[test]
fn test_deny_unknown_fields_option() {
    let lenient = create_test_codec(CodecOptions::default());
    let strict = create_test_codec(CodecOptions {
        deny_unknown_fields: true,
        ..CodecOptions::default()
    });
    let message = json!({ "content": "hi", "color": "red" });

    assert_eq!(
        lenient.encode("chat.send", &message).unwrap(),
        vec![0x0a, 0x02, 0x68, 0x69]
    );
    let err = strict.encode("chat.send", &message).unwrap_err();
    assert!(err.is_validation_error());
}

// Tests for validation and decode failures
#[test]
fn test_encode_missing_required_field() {
    let codec = create_test_codec(CodecOptions::default());

    let err = codec
        .encode("login.Request", &json!({ "uid": 7 }))
        .unwrap_err();
    match &err {
        ProtoRegistryError::MessageValidationError { route, reason } => {
            assert_eq!(route, "login.Request");
            assert!(reason.contains("token"), "got: {reason}");
        }
        other => panic!("Should be MessageValidationError, got {other:?}"),
    }
    assert!(err.is_caller_error());
}

#[test]
fn test_encode_wrong_field_type() {
    let codec = create_test_codec(CodecOptions::default());

    let err = codec
        .encode("chat.send", &json!({ "content": 12 }))
        .unwrap_err();
    assert!(err.is_validation_error(), "got {err:?}");
}

#[test]
fn test_encode_non_object_message() {
    let codec = create_test_codec(CodecOptions::default());

    let err = codec.encode("chat.send", &json!("hi")).unwrap_err();
    assert!(err.is_validation_error());
}

#[test]
fn test_decode_truncated_bytes() {
    let codec = create_test_codec(CodecOptions::default());

    let err = codec.decode("chat.send", &[0x0a, 0x05, 0x68]).unwrap_err();
    match err {
        ProtoRegistryError::DecodeError { route, .. } => assert_eq!(route, "chat.send"),
        other => panic!("Should be DecodeError, got {other:?}"),
    }
}

#[test]
fn test_decode_missing_required_field() {
    let codec = create_test_codec(CodecOptions::default());

    // Only uid (field 1) is present.
    let err = codec.decode("login.Request", &[0x08, 0x07]).unwrap_err();
    assert!(err.is_decode_error());
    assert!(err.to_string().contains("token"), "got: {err}");
}

#[test]
fn test_unknown_route() {
    let codec = create_test_codec(CodecOptions::default());

    let err = codec.encode("chat.shout", &json!({})).unwrap_err();
    match err {
        ProtoRegistryError::RouteNotFound { direction, route } => {
            assert_eq!(direction, Direction::Server);
            assert_eq!(route, "chat.shout");
        }
        other => panic!("Should be RouteNotFound, got {other:?}"),
    }

    let err = codec.decode("chat.shout", &[]).unwrap_err();
    assert!(matches!(
        err,
        ProtoRegistryError::RouteNotFound {
            direction: Direction::Client,
            ..
        }
    ));
}

// Tests for direction handling
#[test]
fn test_directions_use_their_own_protos() {
    let server = write_descriptor(&json!({
        "nested": { "push": { "fields": { "msg": { "type": "string", "id": 1 } } } }
    }));
    let client = write_descriptor(&json!({
        "nested": { "request": { "fields": { "seq": { "type": "uint32", "id": 1 } } } }
    }));
    let store = Arc::new(SchemaStore::new());
    store.initialize(server.path(), client.path());
    let codec = RouteCodec::new(store);

    assert!(codec.encode("push", &json!({ "msg": "x" })).is_ok());
    assert!(codec.encode("request", &json!({ "seq": 1 })).unwrap_err().is_route_not_found());
    assert_eq!(codec.decode("request", &[0x08, 0x01]).unwrap(), json!({ "seq": 1 }));
    assert!(codec.decode("push", &[]).unwrap_err().is_route_not_found());

    // The explicit-direction variants reach the other side.
    let bytes = codec
        .encode_for(Direction::Client, "request", &json!({ "seq": 3 }))
        .unwrap();
    assert_eq!(bytes, vec![0x08, 0x03]);
    assert_eq!(
        codec.decode_for(Direction::Server, "push", &[0x0a, 0x01, 0x78]).unwrap(),
        json!({ "msg": "x" })
    );
}

#[test]
fn test_unset_direction_is_route_not_found() {
    let store = Arc::new(SchemaStore::new());
    let codec = RouteCodec::new(store.clone());

    let err = codec.encode("chat.send", &json!({})).unwrap_err();
    assert!(err.is_route_not_found());
    assert!(!store.is_available(Direction::Server));
    let err = codec.decode("chat.send", &[]).unwrap_err();
    assert!(err.is_route_not_found());
}

#[test]
fn test_check() {
    let codec = create_test_codec(CodecOptions::default());

    let schema = codec.check(Direction::Server, "room.state").unwrap();
    assert_eq!(schema.full_name(), "roomstate");
    assert!(codec.check(Direction::Client, "nope").is_none());
}

#[test]
fn test_codec_options_default() {
    let codec = create_test_codec(CodecOptions::default());
    assert_eq!(codec.options(), &CodecOptions::default());
    assert!(!codec.options().deny_unknown_fields);
}
