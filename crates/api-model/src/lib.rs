/*
 * SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! Describes the Anvil cloud controller internal data model
//!
//! The model described here is used in both internal decision logic and might
//! be stored in database fields.
//! Data inside this module therefore needs to be backward compatible with
//! previous versions of Anvil that are deployed.
//!
//! The module should only contain data definitions and associated helper
//! functions, but no actual business logic.

pub mod association;
pub mod expected_machine;
pub mod ib_partition;
pub mod instance;
pub mod instance_type;
pub mod inventory;
pub mod lifecycle;
pub mod machine;
pub mod metadata;
pub mod network_security_group;
pub mod nvl_logical_partition;
pub mod os_image;
pub mod site;
pub mod ssh_key_group;
pub mod status;
pub mod status_detail;

/// Status-detail messages that are written by multiple call sites.
///
/// The journal suppresses duplicate `(status, message)` pairs, so call sites
/// that can race each other must agree on the exact message text.
pub mod messages {
    pub const MISSING_ON_SITE: &str = "missing on Site";
    pub const READY_TO_USE: &str = "ready to use";
    pub const STILL_SYNCING: &str = "still syncing";
    pub const UPDATES_APPLIED: &str = "updates have been applied";
    pub const ROLLUP_SITE_SYNC_FAILED: &str = "Failed to sync to one or more Sites.";

    /// Fragment of the Postgres unique-violation message that the Site agent
    /// reports back when an object already exists on its side.
    pub const DUPLICATE_KEY_MARKER: &str = "duplicate key value violates unique constraint";
}
