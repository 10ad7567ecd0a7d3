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

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

/// Quiets chatty dependencies; overridable through `RUST_LOG`.
pub fn dep_log_filter(env_filter: EnvFilter) -> EnvFilter {
    [
        "sqlx::query=warn",
        "hyper=error",
        "reqwest=warn",
        "rustls=warn",
        "h2=warn",
    ]
    .iter()
    .fold(env_filter, |filter, directive| {
        filter.add_directive(
            directive
                .parse()
                .unwrap_or_else(|err| panic!("{directive} must be parsed; error: {err}")),
        )
    })
}

pub fn setup_logging(debug: u8) -> eyre::Result<()> {
    let log_level = match debug {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env()?;
    let env_filter = dep_log_filter(env_filter);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().compact())
        .with(env_filter)
        .try_init()
        .map_err(|err| eyre::eyre!("failed to initialize logging: {err}"))?;

    Ok(())
}
