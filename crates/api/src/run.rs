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

use std::net::SocketAddr;
use std::sync::Arc;

use anvil_tls::{SiteClientTls, TlsMaterialPaths};
use eyre::WrapErr;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, Registry, TextEncoder};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::activity::ActivityContext;
use crate::cfg::{Config, Options};
use crate::metrics::LifecycleMetricsRecorder;
use crate::logging;
use crate::site_client::SiteClientPool;

/// Everything the embedding workflow worker needs to host the activities in
/// [`reconcile`] and [`crate::metrics`].
pub struct Worker {
    pub ctx: ActivityContext,
    pub recorder: Arc<LifecycleMetricsRecorder>,
    pub registry: Registry,
}

/// Wires up the worker: config, logging, database pool, Site client pool,
/// metrics. The durable-workflow runtime that invokes the activities is
/// external; this process hosts them and serves the metrics endpoint.
pub async fn run(options: Options) -> eyre::Result<()> {
    logging::setup_logging(options.debug)?;

    let config = Config::load(options.config.as_deref()).wrap_err("failed to load config")?;

    let worker = build_worker(&config).await?;
    tracing::info!(
        task_queue = %config.task_queue,
        "anvil-api worker ready, serving metrics on {}",
        config.metrics_listen_address
    );

    let shutdown = worker.ctx.cancellation.clone();
    let metrics = tokio::spawn(serve_metrics(
        config.metrics_listen_address,
        worker.registry.clone(),
        shutdown.clone(),
    ));

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested, cancelling in-flight activities");
    shutdown.cancel();

    metrics.await??;
    Ok(())
}

pub async fn build_worker(config: &Config) -> eyre::Result<Worker> {
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await
        .wrap_err("failed to connect to database")?;

    let tls_paths = TlsMaterialPaths::resolve(
        config.client_cert_path.clone(),
        config.client_key_path.clone(),
        config.site_root_ca_path.clone(),
    )?;
    let tls = SiteClientTls::load(&tls_paths)?;
    let clients = Arc::new(SiteClientPool::new(tls));

    let ctx = ActivityContext::new(
        pool.clone(),
        clients,
        config.freshness(),
        config.task_queue.clone(),
    );

    let registry = Registry::new();
    let recorder = Arc::new(LifecycleMetricsRecorder::new(&registry, pool)?);

    Ok(Worker {
        ctx,
        recorder,
        registry,
    })
}

async fn serve_metrics(
    addr: SocketAddr,
    registry: Registry,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind metrics listener on {addr}"))?;

    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };

        let registry = registry.clone();
        tokio::spawn(async move {
            let service = service_fn(move |_req| {
                let registry = registry.clone();
                async move {
                    let mut buffer = Vec::new();
                    let encoder = TextEncoder::new();
                    encoder
                        .encode(&registry.gather(), &mut buffer)
                        .unwrap_or_else(|err| tracing::warn!(%err, "failed to encode metrics"));
                    Ok::<_, std::convert::Infallible>(hyper::Response::new(Full::new(
                        Bytes::from(buffer),
                    )))
                }
            });

            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!(%err, "metrics connection error");
            }
        });
    }
}
