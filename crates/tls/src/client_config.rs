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
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use crate::default as tls_default;

#[derive(thiserror::Error, Debug)]
pub enum ClientTlsError {
    #[error("Unable to read {kind} from {path}: {source}")]
    ReadError {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} does not contain a valid PEM {kind}")]
    InvalidPem { kind: &'static str, path: PathBuf },
    #[error(
        "No client TLS material found. Set cert/key/CA paths in the config file, \
         via CLIENT_CERT_PATH / CLIENT_KEY_PATH / SITE_ROOT_CA_PATH, or place \
         them at the conventional locations"
    )]
    MaterialNotFound,
}

/// Resolved locations of the client certificate, key and root CA.
#[derive(Clone, Debug, Deserialize)]
pub struct TlsMaterialPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub root_ca_path: PathBuf,
}

impl TlsMaterialPaths {
    /// Resolves TLS material paths, in order of precedence:
    ///
    /// 1. explicitly configured paths
    /// 2. environment variables
    /// 3. the conventional pod mount under /var/run/secrets/spiffe.io
    /// 4. the packaged default locations
    pub fn resolve(
        cert_path: Option<PathBuf>,
        key_path: Option<PathBuf>,
        root_ca_path: Option<PathBuf>,
    ) -> Result<Self, ClientTlsError> {
        if let (Some(cert_path), Some(key_path), Some(root_ca_path)) =
            (cert_path, key_path, root_ca_path)
        {
            return Ok(Self {
                cert_path,
                key_path,
                root_ca_path,
            });
        }

        if let (Ok(cert), Ok(key), Ok(ca)) = (
            env::var("CLIENT_CERT_PATH"),
            env::var("CLIENT_KEY_PATH"),
            env::var("SITE_ROOT_CA_PATH"),
        ) {
            return Ok(Self {
                cert_path: cert.into(),
                key_path: key.into(),
                root_ca_path: ca.into(),
            });
        }

        // this is the location for most k8s pods
        let spiffe = Self {
            cert_path: "/var/run/secrets/spiffe.io/tls.crt".into(),
            key_path: "/var/run/secrets/spiffe.io/tls.key".into(),
            root_ca_path: "/var/run/secrets/spiffe.io/ca.crt".into(),
        };
        if spiffe.all_present() {
            return Ok(spiffe);
        }

        let packaged = Self {
            cert_path: tls_default::CLIENT_CERT.into(),
            key_path: tls_default::CLIENT_KEY.into(),
            root_ca_path: tls_default::ROOT_CA.into(),
        };
        if packaged.all_present() {
            return Ok(packaged);
        }

        Err(ClientTlsError::MaterialNotFound)
    }

    fn all_present(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists() && self.root_ca_path.exists()
    }
}

/// Loaded PEM bundles, shared by every per-Site client the pool creates.
#[derive(Clone)]
pub struct SiteClientTls {
    /// Client certificate followed by its private key, concatenated PEM.
    pub identity_pem: Vec<u8>,
    /// The root CA bundle that Site agent server certificates chain to.
    pub root_ca_pem: Vec<u8>,
}

impl std::fmt::Debug for SiteClientTls {
    // Key material must not end up in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteClientTls").finish_non_exhaustive()
    }
}

impl SiteClientTls {
    pub fn load(paths: &TlsMaterialPaths) -> Result<Self, ClientTlsError> {
        let cert = read_pem(&paths.cert_path, "certificate")?;
        let key = read_pem(&paths.key_path, "private key")?;
        let root_ca = read_pem(&paths.root_ca_path, "root CA")?;

        validate_certs(&cert, &paths.cert_path, "certificate")?;
        validate_key(&key, &paths.key_path)?;
        validate_certs(&root_ca, &paths.root_ca_path, "root CA")?;

        let mut identity_pem = cert;
        identity_pem.extend_from_slice(&key);

        Ok(Self {
            identity_pem,
            root_ca_pem: root_ca,
        })
    }
}

fn read_pem(path: &Path, kind: &'static str) -> Result<Vec<u8>, ClientTlsError> {
    fs::read(path).map_err(|source| ClientTlsError::ReadError {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

fn validate_certs(pem: &[u8], path: &Path, kind: &'static str) -> Result<(), ClientTlsError> {
    let certs: Vec<_> = rustls_pemfile::certs(&mut Cursor::new(pem))
        .collect::<Result<_, _>>()
        .map_err(|_| ClientTlsError::InvalidPem {
            kind,
            path: path.to_path_buf(),
        })?;
    if certs.is_empty() {
        return Err(ClientTlsError::InvalidPem {
            kind,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn validate_key(pem: &[u8], path: &Path) -> Result<(), ClientTlsError> {
    rustls_pemfile::private_key(&mut Cursor::new(pem))
        .ok()
        .flatten()
        .map(|_| ())
        .ok_or_else(|| ClientTlsError::InvalidPem {
            kind: "private key",
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win() {
        let paths = TlsMaterialPaths::resolve(
            Some("/tmp/c.crt".into()),
            Some("/tmp/c.key".into()),
            Some("/tmp/ca.crt".into()),
        )
        .unwrap();
        assert_eq!(paths.cert_path, PathBuf::from("/tmp/c.crt"));
        assert_eq!(paths.root_ca_path, PathBuf::from("/tmp/ca.crt"));
    }

    #[test]
    fn invalid_pem_is_rejected() {
        let err = validate_certs(b"not a pem", Path::new("/x"), "certificate").unwrap_err();
        assert!(matches!(err, ClientTlsError::InvalidPem { .. }));
    }
}
