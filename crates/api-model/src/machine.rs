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

use anvil_uuid::{MachineId, SiteId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A physical host at a Site.
///
/// Machines are shared between instances over time; assignment transfer is
/// guarded by an advisory lock keyed by the machine id.
#[derive(Debug, Clone, FromRow)]
pub struct Machine {
    pub id: MachineId,
    pub site_id: SiteId,
    pub is_assigned: bool,
    /// The Site's native identifier for the machine.
    pub controller_machine_id: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
