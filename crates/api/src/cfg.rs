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
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::reconcile::freshness::{DEFAULT_INVENTORY_RECEIPT_INTERVAL, FreshnessWindow};

/// Command line options for the anvil-api worker binary.
#[derive(Debug, clap::Parser)]
#[command(name = "anvil-api")]
pub struct Options {
    /// Path to the TOML config file
    #[arg(long, env = "ANVIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub debug: u8,
}

/// Worker configuration, merged from the TOML file and the environment
/// (`ANVIL_*`, plus the bare names that operators already export).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// How often Sites push inventories; governs the freshness window.
    #[serde(with = "humantime_serde", default = "default_receipt_interval")]
    pub inventory_receipt_interval: Duration,

    pub database_url: String,

    /// Task queue that outbound Site workflows are submitted on.
    #[serde(default = "default_task_queue")]
    pub task_queue: String,

    #[serde(default = "default_metrics_listen_address")]
    pub metrics_listen_address: SocketAddr,

    #[serde(default)]
    pub client_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub client_key_path: Option<PathBuf>,
    #[serde(default)]
    pub site_root_ca_path: Option<PathBuf>,
}

fn default_receipt_interval() -> Duration {
    DEFAULT_INVENTORY_RECEIPT_INTERVAL
}

fn default_task_queue() -> String {
    "site-operations".to_string()
}

fn default_metrics_listen_address() -> SocketAddr {
    "0.0.0.0:9464".parse().expect("valid default listen address")
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let file = path.unwrap_or_else(|| Path::new("anvil.toml"));
        Figment::new()
            .merge(Toml::file(file))
            .merge(Env::prefixed("ANVIL_"))
            .merge(Env::raw().only(&[
                "INVENTORY_RECEIPT_INTERVAL",
                "DATABASE_URL",
                "TASK_QUEUE",
            ]))
            .extract()
    }

    pub fn freshness(&self) -> FreshnessWindow {
        FreshnessWindow::new(self.inventory_receipt_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://anvil@db/anvil");
            jail.set_env("INVENTORY_RECEIPT_INTERVAL", "5m");
            jail.set_env("ANVIL_TASK_QUEUE", "site-ops-test");

            let config = Config::load(None).expect("config should load");
            assert_eq!(config.database_url, "postgres://anvil@db/anvil");
            assert_eq!(
                config.inventory_receipt_interval,
                Duration::from_secs(5 * 60)
            );
            assert_eq!(config.task_queue, "site-ops-test");
            Ok(())
        });
    }

    #[test]
    fn defaults_apply_without_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DATABASE_URL", "postgres://anvil@db/anvil");

            let config = Config::load(None).expect("config should load");
            assert_eq!(
                config.inventory_receipt_interval,
                DEFAULT_INVENTORY_RECEIPT_INTERVAL
            );
            assert_eq!(config.task_queue, "site-operations");
            Ok(())
        });
    }
}
