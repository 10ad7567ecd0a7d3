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

use anvil_tls::SiteClientTls;
use serde::Serialize;
use url::Url;

use super::{SiteClientError, WorkflowClient, WorkflowOptions};

/// Submits workflows to a Site agent's workflow gateway over mTLS HTTP.
pub struct HttpWorkflowClient {
    http: reqwest::Client,
    endpoint: Url,
}

#[derive(Serialize)]
struct SubmitWorkflowBody<'a> {
    #[serde(flatten)]
    options: &'a WorkflowOptions,
    input: &'a serde_json::Value,
}

impl HttpWorkflowClient {
    pub fn new(tls: &SiteClientTls, agent_endpoint: &str) -> Result<Self, SiteClientError> {
        let endpoint =
            Url::parse(agent_endpoint).map_err(|err| SiteClientError::InvalidEndpoint {
                endpoint: agent_endpoint.to_string(),
                reason: err.to_string(),
            })?;

        let identity = reqwest::Identity::from_pem(&tls.identity_pem)
            .map_err(|err| SiteClientError::ClientBuild(err.to_string()))?;
        let root_ca = reqwest::Certificate::from_pem_bundle(&tls.root_ca_pem)
            .map_err(|err| SiteClientError::ClientBuild(err.to_string()))?;

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(std::time::Duration::from_secs(10));
        for cert in root_ca {
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|err| SiteClientError::ClientBuild(err.to_string()))?;

        Ok(Self { http, endpoint })
    }

    fn submit_url(&self) -> Result<Url, SiteClientError> {
        self.endpoint
            .join("api/v1/workflows")
            .map_err(|err| SiteClientError::InvalidEndpoint {
                endpoint: self.endpoint.to_string(),
                reason: err.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn execute_workflow(
        &self,
        options: WorkflowOptions,
        input: serde_json::Value,
    ) -> Result<(), SiteClientError> {
        let url = self.submit_url()?;
        let workflow_id = options.workflow_id.clone();

        let response = self
            .http
            .post(url.clone())
            .json(&SubmitWorkflowBody {
                options: &options,
                input: &input,
            })
            .send()
            .await
            .map_err(|err| SiteClientError::Submission {
                endpoint: url.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        // With allow-duplicate id reuse, a CONFLICT means the runtime
        // coalesced this submission with an identical in-flight one.
        if status.is_success() || status == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }

        let reason = response
            .text()
            .await
            .unwrap_or_else(|_| format!("HTTP {status}"));
        Err(SiteClientError::Rejected {
            workflow_id,
            reason,
        })
    }
}
