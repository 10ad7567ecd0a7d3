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

//! The per-resource reconciliation activities.
//!
//! The workflow runtime invokes one activity per `(Site, inventory page)`.
//! Activities are idempotent against duplicate delivery; all racing against
//! user writes is arbitrated by the freshness window.

pub mod engine;
pub mod expected_machine;
pub mod freshness;
pub mod ib_partition;
pub mod instance;
pub mod instance_type;
pub mod network_security_group;
pub mod nvl_logical_partition;
pub mod os_image;
pub mod pages;
pub mod rollup;
pub mod ssh_key_group;

pub use expected_machine::update_expected_machines_in_db;
pub use ib_partition::update_ib_partitions_in_db;
pub use instance::update_instances_in_db;
pub use instance_type::update_instance_types_in_db;
pub use network_security_group::update_network_security_groups_in_db;
pub use nvl_logical_partition::update_nvl_logical_partitions_in_db;
pub use os_image::update_os_images_in_db;
pub use ssh_key_group::update_ssh_key_groups_in_db;
