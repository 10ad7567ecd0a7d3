/*
 * SPDX-FileCopyrightText: Copyright (c) 2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: Apache-2.0
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//!
//! The Anvil cloud reconciliation library.
//!
//! Anvil owns the declarative intent for a fleet of resources that live at
//! remote Sites. Site agents push inventory snapshots of what actually
//! exists; the reconcile activities in this crate merge those snapshots back
//! into the cloud database and push cloud-originated intent out through the
//! durable-workflow runtime.
//!

pub mod activity;
pub mod cfg;
pub mod dispatch;
mod errors;
pub mod logging;
pub mod metrics;
pub mod reconcile;
pub mod run;
pub mod site_client;

// Save typing
pub use errors::{ActivityError, ActivityResult};
