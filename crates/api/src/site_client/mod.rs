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

//! Workflow-submission clients for Site agents.
//!
//! The pool maps Site id → client. Clients are created lazily from shared
//! TLS material and cached; on loss (e.g. cert rotation) a client can be
//! evicted and the next `get_or_init` rebuilds it.

mod http;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anvil_tls::SiteClientTls;
use anvil_uuid::SiteId;
pub use http::HttpWorkflowClient;
use model::site::Site;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum SiteClientError {
    #[error("No client for Site {0}")]
    NotFound(SiteId),
    #[error("Invalid Site agent endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("Workflow submission to {endpoint} failed: {reason}")]
    Submission { endpoint: String, reason: String },
    #[error("Site agent rejected workflow {workflow_id}: {reason}")]
    Rejected { workflow_id: String, reason: String },
}

/// How the runtime treats a workflow id that was used before.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowIdReusePolicy {
    /// Retries with the same id are coalesced by the runtime.
    AllowDuplicate,
    RejectDuplicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOptions {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub id_reuse_policy: WorkflowIdReusePolicy,
}

/// The seam to the durable-workflow runtime on the Site side.
///
/// The runtime itself is opaque to this crate: submissions are at-least-once
/// and idempotent by workflow-id policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn execute_workflow(
        &self,
        options: WorkflowOptions,
        input: serde_json::Value,
    ) -> Result<(), SiteClientError>;
}

type ClientFactory =
    Box<dyn Fn(&Site) -> Result<Arc<dyn WorkflowClient>, SiteClientError> + Send + Sync>;

/// Maps Site id → workflow-submission client. Shared across activities;
/// concurrent `get` is safe.
pub struct SiteClientPool {
    clients: RwLock<HashMap<SiteId, Arc<dyn WorkflowClient>>>,
    factory: ClientFactory,
}

impl SiteClientPool {
    /// Production pool: clients speak mTLS HTTP to each Site agent's
    /// workflow gateway, all from one set of TLS material.
    pub fn new(tls: SiteClientTls) -> Self {
        Self::with_factory(Box::new(move |site| {
            HttpWorkflowClient::new(&tls, &site.agent_endpoint)
                .map(|client| Arc::new(client) as Arc<dyn WorkflowClient>)
        }))
    }

    /// Pool with a custom client factory; tests inject mocks through this.
    pub fn with_factory(factory: ClientFactory) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            factory,
        }
    }

    pub fn get(&self, site_id: SiteId) -> Result<Arc<dyn WorkflowClient>, SiteClientError> {
        self.clients
            .read()
            .expect("site client pool lock poisoned")
            .get(&site_id)
            .cloned()
            .ok_or(SiteClientError::NotFound(site_id))
    }

    /// Returns the cached client for the Site, creating it on first use.
    pub fn get_or_init(&self, site: &Site) -> Result<Arc<dyn WorkflowClient>, SiteClientError> {
        if let Ok(client) = self.get(site.id) {
            return Ok(client);
        }

        let client = (self.factory)(site)?;
        let mut clients = self
            .clients
            .write()
            .expect("site client pool lock poisoned");
        // A racing init may have beaten us; keep the first one.
        Ok(clients.entry(site.id).or_insert(client).clone())
    }

    /// Drops the cached client so the next `get_or_init` rebuilds it.
    pub fn evict(&self, site_id: SiteId) {
        self.clients
            .write()
            .expect("site client pool lock poisoned")
            .remove(&site_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use model::site::SiteReachability;

    use super::*;

    fn test_site() -> Site {
        Site {
            id: SiteId::new_v4(),
            name: "lab-east".to_string(),
            reachability: SiteReachability::Reachable,
            agent_endpoint: "https://lab-east.example:7233".to_string(),
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn counting_pool() -> (Arc<AtomicUsize>, SiteClientPool) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let pool = SiteClientPool::with_factory(Box::new(move |_site| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MockWorkflowClient::new()) as Arc<dyn WorkflowClient>)
        }));
        (builds, pool)
    }

    #[test]
    fn get_before_init_is_not_found() {
        let (_, pool) = counting_pool();
        let site = test_site();
        assert!(matches!(
            pool.get(site.id),
            Err(SiteClientError::NotFound(id)) if id == site.id
        ));
    }

    #[test]
    fn client_is_created_lazily_and_cached() {
        let (builds, pool) = counting_pool();
        let site = test_site();

        pool.get_or_init(&site).unwrap();
        pool.get_or_init(&site).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(pool.get(site.id).is_ok());
    }

    #[test]
    fn evicted_client_is_rebuilt() {
        let (builds, pool) = counting_pool();
        let site = test_site();

        pool.get_or_init(&site).unwrap();
        pool.evict(site.id);
        assert!(pool.get(site.id).is_err());
        pool.get_or_init(&site).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
