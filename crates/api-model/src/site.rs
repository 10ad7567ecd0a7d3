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

use anvil_uuid::SiteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};

/// Whether the cloud can currently reach the Site's agent.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SiteReachability {
    Reachable,
    Unreachable,
    Unknown,
}

/// A remote Site that hosts managed resources and pushes inventories.
///
/// Sites are created out-of-band; deleting one cascades to its associations.
#[derive(Debug, Clone, FromRow)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub reachability: SiteReachability,
    /// Base URL of the Site agent's workflow gateway.
    pub agent_endpoint: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl TryFrom<String> for SiteReachability {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
