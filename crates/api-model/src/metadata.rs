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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// User-assigned name, description and labels on a resource.
///
/// Labels are an order-irrelevant string→string mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Computes the label value to write for an inventory-driven update.
///
/// Every updatable column distinguishes "unchanged" (`None`) from "clear to
/// empty" (explicit empty map). A Site that reports no labels for an entity
/// that has labels in the cloud means the labels were removed remotely, so
/// `None` from the Site must become an explicit empty map.
pub fn labels_update(
    reported: Option<&HashMap<String, String>>,
    current: &HashMap<String, String>,
) -> Option<HashMap<String, String>> {
    match reported {
        Some(reported) if reported != current => Some(reported.clone()),
        Some(_) => None,
        None if !current.is_empty() => Some(HashMap::new()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn reported_change_is_written() {
        let current = labels(&[("env", "prod")]);
        let reported = labels(&[("env", "dev")]);
        assert_eq!(labels_update(Some(&reported), &current), Some(reported));
    }

    #[test]
    fn identical_labels_are_no_change() {
        let current = labels(&[("env", "prod")]);
        assert_eq!(labels_update(Some(&current.clone()), &current), None);
    }

    #[test]
    fn nil_from_site_clears_nonempty_cloud_labels() {
        let current = labels(&[("env", "prod")]);
        assert_eq!(labels_update(None, &current), Some(HashMap::new()));
    }

    #[test]
    fn nil_from_site_with_empty_cloud_labels_is_no_change() {
        assert_eq!(labels_update(None, &HashMap::new()), None);
    }
}
