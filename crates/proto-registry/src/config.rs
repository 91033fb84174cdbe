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

use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize, Serializer};

use crate::codec::CodecOptions;
use crate::schema::Direction;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
/// Configuration for the protos registry. Fields are documented as comments in the output of
/// [`RegistryConfig::into_annotated_config_file`].
pub struct RegistryConfig {
    #[serde(default = "Defaults::base_dir")]
    pub base_dir: PathBuf,
    #[serde(default = "Defaults::server_protos")]
    pub server_protos: PathBuf,
    #[serde(default = "Defaults::client_protos")]
    pub client_protos: PathBuf,
    #[serde(
        default = "Defaults::poll_interval",
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,
    #[serde(default)]
    pub codec: CodecOptions,
}

impl RegistryConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let cfg = std::fs::read_to_string(path).map_err(|error| ConfigError::CouldNotRead {
            path: path.to_string_lossy().to_string(),
            error,
        })?;
        toml::from_str::<Self>(&cfg).map_err(|error| ConfigError::InvalidToml {
            path: path.to_string_lossy().to_string(),
            error,
        })
    }

    // with_base_dir returns the default configuration rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn server_protos_path(&self) -> PathBuf {
        self.base_dir.join(&self.server_protos)
    }

    pub fn client_protos_path(&self) -> PathBuf {
        self.base_dir.join(&self.client_protos)
    }

    // protos_path resolves the descriptor path for a direction. Absolute
    // descriptor paths ignore base_dir.
    pub fn protos_path(&self, direction: Direction) -> PathBuf {
        match direction {
            Direction::Server => self.server_protos_path(),
            Direction::Client => self.client_protos_path(),
        }
    }

    pub fn into_annotated_config_file(self) -> String {
        let Self {
            base_dir,
            server_protos,
            client_protos,
            poll_interval,
            codec,
        } = self;
        let poll_interval = format_duration(&poll_interval);
        let CodecOptions {
            deny_unknown_fields,
            emit_default_fields,
            stringify_64_bit_integers,
            use_enum_names,
        } = codec;

        format!(
            r#"
#####
## This is a default config file for proto-registry. Everything in this file is optional: Any
## non-comment line in this file simply represents default values.
#####

## Directory that relative descriptor paths are resolved against.
base_dir = {base_dir:?}

## Descriptor used to encode outgoing messages. If the file does not exist at startup, server
## protos stay unavailable and the file is not watched.
server_protos = {server_protos:?}

## Descriptor used to decode incoming messages. Same startup rules as server_protos.
client_protos = {client_protos:?}

## How often descriptor files are checked for changes.
poll_interval = {poll_interval:?}

## Controls how structured messages map to and from protobuf messages.
[codec]
## Reject messages carrying keys that are not defined by the schema.
deny_unknown_fields = {deny_unknown_fields}

## Include fields holding their default value in decoded messages.
emit_default_fields = {emit_default_fields}

## Render 64-bit integers as strings in decoded messages.
stringify_64_bit_integers = {stringify_64_bit_integers}

## Render enum values by name instead of by number in decoded messages.
use_enum_names = {use_enum_names}
"#
        )
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_dir: Defaults::base_dir(),
            server_protos: Defaults::server_protos(),
            client_protos: Defaults::client_protos(),
            poll_interval: Defaults::poll_interval(),
            codec: CodecOptions::default(),
        }
    }
}

pub struct Defaults;

impl Defaults {
    pub fn base_dir() -> PathBuf {
        ".".into()
    }

    pub fn server_protos() -> PathBuf {
        "config/serverProtos.json".into()
    }

    pub fn client_protos() -> PathBuf {
        "config/clientProtos.json".into()
    }

    pub fn poll_interval() -> Duration {
        Duration::from_secs(1)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file at {path}: {error}")]
    CouldNotRead { path: String, error: std::io::Error },
    #[error("TOML error reading config file at {path}: {error}")]
    InvalidToml {
        path: String,
        error: toml::de::Error,
    },
}

// Sub-second intervals are written in milliseconds so they survive a
// round trip.
fn format_duration(d: &Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

fn serialize_duration<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(d))
}
