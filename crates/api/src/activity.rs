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

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::reconcile::freshness::FreshnessWindow;
use crate::site_client::SiteClientPool;
use crate::{ActivityError, ActivityResult};

/// Shared dependencies handed to every reconcile activity invocation.
///
/// The runtime may run any number of activities concurrently for different
/// Sites; everything in here is safe to share.
#[derive(Clone)]
pub struct ActivityContext {
    pub pool: PgPool,
    pub clients: Arc<SiteClientPool>,
    pub freshness: FreshnessWindow,
    /// Task queue that outbound Site workflows are submitted on.
    pub task_queue: String,
    /// Cancellation signal propagated from the runtime. A cancelled context
    /// aborts in-flight DB work and rolls the open transaction back;
    /// progress up to the last committed transaction is preserved.
    pub cancellation: CancellationToken,
}

impl ActivityContext {
    pub fn new(
        pool: PgPool,
        clients: Arc<SiteClientPool>,
        freshness: FreshnessWindow,
        task_queue: String,
    ) -> Self {
        Self {
            pool,
            clients,
            freshness,
            task_queue,
            cancellation: CancellationToken::new(),
        }
    }

    /// Checked at suspension points (entry loops, before transactions).
    pub fn check_cancelled(&self) -> ActivityResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(ActivityError::Cancelled);
        }
        Ok(())
    }
}
