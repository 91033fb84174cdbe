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

// src/schema/mod.rs
// Schema module coordination and re-exports: the typed descriptor
// model, compiled schema sets, and route normalization.

pub mod descriptor;
mod set;
pub mod types;

pub use descriptor::Descriptor;
pub use set::{MessageSchema, SchemaSet};
pub use types::{Direction, normalize_route};
