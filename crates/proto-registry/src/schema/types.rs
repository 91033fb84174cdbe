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

// src/schema/types.rs
// Common types used throughout the schema system: message
// direction and route name normalization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Direction says which descriptor set a route is resolved against.
// Server protos describe messages the server sends (encode), and
// client protos describe messages the client sends (decode).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Server,
    Client,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Server, Direction::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Server => "server",
            Direction::Client => "client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "server" => Ok(Direction::Server),
            "client" => Ok(Direction::Client),
            other => Err(format!("unknown protos direction: {other}")),
        }
    }
}

// normalize_route strips every '.' from a route, so "a.b.c" and
// "abc" resolve to the same message. Descriptor authors are expected
// to name messages after the concatenated route.
pub fn normalize_route(route: &str) -> String {
    route.split('.').collect()
}
