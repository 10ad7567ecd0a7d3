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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One entry of the append-only per-entity status history.
///
/// Entries are never mutated or deleted. Queries return them ordered by
/// `created` descending, so the earliest entry for a status is the *last*
/// match when walking forward.
///
/// The status is stored as its string form because the journal spans entity
/// kinds with different status enums.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusDetail {
    pub id: i64,
    pub object_id: Uuid,
    pub status: String,
    pub message: String,
    pub created: DateTime<Utc>,
}

impl StatusDetail {
    /// Whether appending `(status, message)` after this entry would be a
    /// duplicate. Callers consult this before every append to keep the
    /// journal compact and re-delivery idempotent.
    pub fn is_duplicate_of(&self, status: &str, message: &str) -> bool {
        self.status == status && self.message == message
    }
}
