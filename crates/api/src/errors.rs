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

use crate::site_client::SiteClientError;

/// Errors surfaced from a reconcile activity to the workflow runtime.
///
/// Anything that reaches the runtime is retried under the activity's retry
/// policy, except input errors that would fail deterministically again.
#[derive(thiserror::Error, Debug)]
pub enum ActivityError {
    /// Nil inventory, malformed UUID in a required position, or a missing
    /// required field. Deterministic; retrying does not help.
    #[error("Invalid activity input: {0}")]
    InvalidInput(String),

    /// The inventory names a Site the cloud does not know. The outer retry
    /// policy drives re-attempts; a deleted Site eventually stops sending.
    #[error("Site not found: {0}")]
    SiteNotFound(SiteId),

    #[error(transparent)]
    Database(#[from] db::DatabaseError),

    #[error("Site client error: {0}")]
    SiteClient(#[from] SiteClientError),

    /// Outbound delete requires the Site's controller ID, which the next
    /// inventory will populate.
    #[error("Controller ID not yet known for {kind} {id}")]
    ControllerIdUnknown { kind: &'static str, id: String },

    /// The runtime cancelled the activity; in-flight work was rolled back.
    #[error("Activity cancelled")]
    Cancelled,
}

pub type ActivityResult<T> = Result<T, ActivityError>;
