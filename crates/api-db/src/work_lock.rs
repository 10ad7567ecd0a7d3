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

//! Advisory locks keyed by stringified entity IDs.
//!
//! The key string is hashed into the 64-bit advisory-lock key space that all
//! lock users share. Locks are transaction-scoped
//! (`pg_advisory_xact_lock`), so they release on commit or rollback and must
//! only be taken inside an open transaction.

use sha2::{Digest, Sha256};
use sqlx::PgTransaction;

use crate::{DatabaseError, DatabaseResult};

/// Maps a stringified entity ID into the advisory-lock key space.
pub fn advisory_key(id: &str) -> i64 {
    let digest = Sha256::digest(id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Takes a transaction-scoped advisory lock for the given entity ID.
///
/// Blocks until the lock is granted; contention shows up as activity latency
/// and, past the activity timeout, as a retryable failure.
pub async fn acquire_xact_lock(txn: &mut PgTransaction<'_>, id: &str) -> DatabaseResult<()> {
    let sql = "SELECT pg_advisory_xact_lock($1)";
    sqlx::query(sql)
        .bind(advisory_key(id))
        .execute(&mut **txn)
        .await
        .map(|_| ())
        .map_err(|err| DatabaseError::query(sql, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let id = "0e3b9d64-6bdf-4a44-9c44-bdcbf2c897ab";
        assert_eq!(advisory_key(id), advisory_key(id));
    }

    #[test]
    fn distinct_ids_get_distinct_keys() {
        assert_ne!(
            advisory_key("0e3b9d64-6bdf-4a44-9c44-bdcbf2c897ab"),
            advisory_key("88a8f4d5-9a8c-4d2e-b626-6b758e88e6c9"),
        );
    }
}
