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

//! TLS material discovery and loading for Anvil's outbound Site clients.
//!
//! All cloud → Site traffic is mutually authenticated. This crate resolves
//! where the client certificate, key and root CA live (explicit config, env,
//! or the conventional pod mount), and loads them as PEM bundles that the
//! client pool hands to its HTTP stack.

pub mod client_config;

pub use client_config::{ClientTlsError, SiteClientTls, TlsMaterialPaths};

/// Conventional locations used when nothing is configured explicitly.
pub mod default {
    pub const CLIENT_CERT: &str = "/etc/anvil/certs/client.crt";
    pub const CLIENT_KEY: &str = "/etc/anvil/certs/client.key";
    pub const ROOT_CA: &str = "/etc/anvil/certs/ca.crt";
}
