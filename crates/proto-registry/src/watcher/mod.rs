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

// src/watcher/mod.rs
// Watcher module exports: the file event source abstraction, the
// polling implementation of it, and the ReloadWatcher that turns file
// change events into schema reloads.

mod polling;
mod reload;
mod source;

pub use polling::PollingEventSource;
pub use reload::ReloadWatcher;
pub use source::{CloseHandler, FileEvent, FileEventKind, FileEventSource, Subscription};
