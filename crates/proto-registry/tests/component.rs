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
// tests/component.rs
// Tests for ProtobufComponent: startup against a base directory, which
// files get watched, encode/decode through the facade, and shutdown.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use proto_registry::store::LoadOutcome;
use proto_registry::{
    COMPONENT_NAME, CodecOptions, Direction, PollingEventSource, ProtobufComponent,
    RegistryConfig,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const BASE_MILLIS: u64 = 1_700_000_000_000;

fn server_descriptor() -> Value {
    json!({
        "nested": {
            "onChat": {
                "fields": {
                    "msg": { "type": "string", "id": 1 },
                    "from": { "type": "string", "id": 2 }
                }
            }
        }
    })
}

fn client_descriptor() -> Value {
    json!({
        "nested": {
            "chatHandlersend": {
                "fields": { "content": { "type": "string", "id": 1, "rule": "required" } }
            }
        }
    })
}

fn write_at(path: &Path, contents: &str, millis: u64) {
    let staged = path.with_extension("staged");
    std::fs::write(&staged, contents).expect("write descriptor");
    File::options()
        .write(true)
        .open(&staged)
        .expect("open descriptor")
        .set_modified(UNIX_EPOCH + Duration::from_millis(millis))
        .expect("set mtime");
    std::fs::rename(&staged, path).expect("move descriptor into place");
}

// Helper function to lay out a base directory with the default
// config/serverProtos.json and config/clientProtos.json files.
fn create_base_dir(server: Option<&Value>, client: Option<&Value>) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    if let Some(server) = server {
        write_at(
            &dir.path().join("config/serverProtos.json"),
            &server.to_string(),
            BASE_MILLIS,
        );
    }
    if let Some(client) = client {
        write_at(
            &dir.path().join("config/clientProtos.json"),
            &client.to_string(),
            BASE_MILLIS + 10,
        );
    }
    dir
}

fn create_component(dir: &TempDir) -> ProtobufComponent {
    let config = RegistryConfig {
        poll_interval: Duration::from_millis(20),
        ..RegistryConfig::with_base_dir(dir.path())
    };
    ProtobufComponent::new(config)
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_component_name() {
    let dir = create_base_dir(None, None);
    let component = create_component(&dir);
    assert_eq!(component.name(), "__decodeIO__protobuf__");
    assert_eq!(component.name(), COMPONENT_NAME);
}

#[tokio::test]
async fn test_start_loads_both_directions() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);

    let report = component.start().unwrap();
    assert_eq!(report.server, LoadOutcome::Loaded);
    assert_eq!(report.client, LoadOutcome::Loaded);
    assert_eq!(report.version, BASE_MILLIS + 10);
    assert_eq!(component.version(), BASE_MILLIS + 10);

    assert!(component.check(Direction::Server, "on.Chat").is_some());
    assert!(component.check(Direction::Client, "chatHandler.send").is_some());
    assert!(component.check(Direction::Server, "chatHandler.send").is_none());

    assert!(component.watcher().is_watching(Direction::Server));
    assert!(component.watcher().is_watching(Direction::Client));
    component.stop(false);
}

#[tokio::test]
async fn test_encode_and_decode_through_component() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();

    let bytes = component
        .encode("onChat", &json!({ "msg": "hi", "from": "ann" }))
        .unwrap();
    assert_eq!(
        bytes,
        vec![0x0a, 0x02, b'h', b'i', 0x12, 0x03, b'a', b'n', b'n']
    );

    let decoded = component
        .decode("chatHandler.send", &[0x0a, 0x02, b'h', b'i'])
        .unwrap();
    assert_eq!(decoded, json!({ "content": "hi" }));

    let err = component
        .encode("chatHandler.send", &json!({ "content": "hi" }))
        .unwrap_err();
    assert!(err.is_route_not_found());
    component.stop(true);
}

#[tokio::test]
async fn test_missing_files_are_not_watched() {
    let dir = create_base_dir(Some(&server_descriptor()), None);
    let component = create_component(&dir);

    let report = component.start().unwrap();
    assert_eq!(report.server, LoadOutcome::Loaded);
    assert_eq!(report.client, LoadOutcome::Missing);
    assert!(component.watcher().is_watching(Direction::Server));
    assert!(!component.watcher().is_watching(Direction::Client));

    let err = component.decode("chatHandler.send", &[]).unwrap_err();
    assert!(err.is_route_not_found());

    // Creating the client file later does not load it.
    write_at(
        &dir.path().join("config/clientProtos.json"),
        &client_descriptor().to_string(),
        BASE_MILLIS + 1_000,
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(component.check(Direction::Client, "chatHandler.send").is_none());
    assert_eq!(component.version(), BASE_MILLIS);
    component.stop(false);
}

#[tokio::test]
async fn test_broken_file_is_watched_and_recovers() {
    let dir = create_base_dir(Some(&server_descriptor()), None);
    let client_path = dir.path().join("config/clientProtos.json");
    write_at(&client_path, "{ not json", BASE_MILLIS);
    let component = create_component(&dir);

    let report = component.start().unwrap();
    assert_eq!(report.client, LoadOutcome::Failed);
    assert!(component.watcher().is_watching(Direction::Client));

    write_at(
        &client_path,
        &client_descriptor().to_string(),
        BASE_MILLIS + 1_000,
    );
    assert!(wait_for(|| component.check(Direction::Client, "chatHandler.send").is_some()).await);
    assert_eq!(component.version(), BASE_MILLIS + 1_000);
    component.stop(false);
}

#[tokio::test]
async fn test_file_change_reloads_and_bumps_version() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();

    let updated = json!({
        "nested": {
            "onChat": {
                "fields": {
                    "msg": { "type": "string", "id": 1 },
                    "from": { "type": "string", "id": 2 },
                    "channel": { "type": "uint32", "id": 3 }
                }
            }
        }
    });
    write_at(
        &dir.path().join("config/serverProtos.json"),
        &updated.to_string(),
        BASE_MILLIS + 5_000,
    );

    assert!(wait_for(|| component.version() == BASE_MILLIS + 5_000).await);
    let bytes = component
        .encode("onChat", &json!({ "channel": 2 }))
        .unwrap();
    assert_eq!(bytes, vec![0x18, 0x02]);
    assert_eq!(component.protos().server, Some(updated));
    component.stop(false);
}

#[tokio::test]
async fn test_malformed_change_keeps_serving() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();

    write_at(
        &dir.path().join("config/serverProtos.json"),
        "{ \"nested\": ",
        BASE_MILLIS + 5_000,
    );
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(component.version(), BASE_MILLIS + 10);
    assert!(component.encode("onChat", &json!({ "msg": "still here" })).is_ok());
    assert_eq!(component.protos().server, Some(server_descriptor()));
    component.stop(false);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();

    component.stop(false);
    assert!(component.watcher().watched().is_empty());
    component.stop(true);
    assert!(component.watcher().watched().is_empty());

    // Loaded protos stay usable after stop.
    assert!(component.encode("onChat", &json!({ "msg": "bye" })).is_ok());
}

#[tokio::test]
async fn test_stopped_component_ignores_changes() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();
    component.stop(false);

    write_at(
        &dir.path().join("config/serverProtos.json"),
        &client_descriptor().to_string(),
        BASE_MILLIS + 5_000,
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(component.version(), BASE_MILLIS + 10);
    assert!(component.check(Direction::Server, "onChat").is_some());
}

#[tokio::test]
async fn test_protos_snapshot() {
    let dir = create_base_dir(Some(&server_descriptor()), None);
    let component = create_component(&dir);
    component.start().unwrap();

    let snapshot = component.protos();
    assert_eq!(snapshot.server, Some(server_descriptor()));
    assert_eq!(snapshot.client, None);
    assert_eq!(snapshot.version, BASE_MILLIS);
    component.stop(false);
}

#[tokio::test]
async fn test_codec_options_come_from_config() {
    let dir = create_base_dir(Some(&server_descriptor()), None);
    let config = RegistryConfig {
        codec: CodecOptions {
            deny_unknown_fields: true,
            ..CodecOptions::default()
        },
        ..RegistryConfig::with_base_dir(dir.path())
    };
    let component = ProtobufComponent::with_event_source(
        config,
        Arc::new(PollingEventSource::new(Duration::from_millis(20))),
    );
    component.start().unwrap();

    let err = component
        .encode("onChat", &json!({ "msg": "hi", "mood": "happy" }))
        .unwrap_err();
    assert!(err.is_validation_error());
    component.stop(false);
}

#[tokio::test]
async fn test_stop_and_wait() {
    let dir = create_base_dir(Some(&server_descriptor()), Some(&client_descriptor()));
    let component = create_component(&dir);
    component.start().unwrap();

    component.stop_and_wait().await;
    assert!(component.watcher().watched().is_empty());

    write_at(
        &dir.path().join("config/serverProtos.json"),
        &client_descriptor().to_string(),
        BASE_MILLIS + 5_000,
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(component.version(), BASE_MILLIS + 10);
}
