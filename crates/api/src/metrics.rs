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

//! Instance lifecycle latency metrics.
//!
//! Consumes the lifecycle events the instance reconciler returns and turns
//! the status-detail journal into create/delete latency gauges. Runs as its
//! own activity so Prometheus state stays out of the reconciliation path.

use std::collections::HashMap;
use std::sync::RwLock;

use anvil_uuid::SiteId;
use chrono::{DateTime, Utc};
use model::lifecycle::{LifecycleEvent, LifecycleEventKind};
use model::status::InstanceStatus;
use model::status_detail::StatusDetail;
use prometheus::{GaugeVec, Opts, Registry};
use sqlx::PgPool;

use crate::ActivityResult;

/// Create latency from a newest-first journal.
///
/// Gate: exactly one `ready` entry and at least one `pending`. A second
/// `ready` means the instance re-readied after an error, and the span from
/// first `pending` no longer measures creation.
pub fn create_latency(journal: &[StatusDetail]) -> Option<chrono::Duration> {
    let mut readies = journal
        .iter()
        .filter(|entry| entry.status == InstanceStatus::Ready.as_ref());
    let ready = readies.next()?;
    if readies.next().is_some() {
        return None;
    }

    // The journal is ordered descending, so the earliest entry for a status
    // is the last match walking forward.
    let earliest_pending = journal
        .iter()
        .filter(|entry| entry.status == InstanceStatus::Pending.as_ref())
        .last()?;

    let latency = ready.created.signed_duration_since(earliest_pending.created);
    (latency >= chrono::Duration::zero()).then_some(latency)
}

/// Delete latency: physical deletion time minus the earliest `terminating`
/// entry.
pub fn delete_latency(
    journal: &[StatusDetail],
    deleted_at: DateTime<Utc>,
) -> Option<chrono::Duration> {
    let earliest_terminating = journal
        .iter()
        .filter(|entry| entry.status == InstanceStatus::Terminating.as_ref())
        .last()?;

    let latency = deleted_at.signed_duration_since(earliest_terminating.created);
    (latency >= chrono::Duration::zero()).then_some(latency)
}

pub struct LifecycleMetricsRecorder {
    pool: PgPool,
    latency: GaugeVec,
    site_names: RwLock<HashMap<SiteId, String>>,
}

impl LifecycleMetricsRecorder {
    pub fn new(registry: &Registry, pool: PgPool) -> prometheus::Result<Self> {
        let latency = GaugeVec::new(
            Opts::new(
                "instance_operation_latency_seconds",
                "Observed latency of instance lifecycle operations per Site",
            ),
            &["site", "operation_type", "from_status", "to_status"],
        )?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            pool,
            latency,
            site_names: RwLock::new(HashMap::new()),
        })
    }

    /// The metrics activity: resolves the journal and Site name, then
    /// records the event.
    pub async fn record(&self, event: &LifecycleEvent) -> ActivityResult<()> {
        let journal = {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| db::DatabaseError::new("acquire connection", err))?;
            db::status_detail::history(&mut conn, event.instance_id.as_uuid()).await?
        };
        let site_name = self.site_name(event.site_id).await?;
        self.record_with(event, &journal, &site_name);
        Ok(())
    }

    /// Records one event against an already-loaded journal.
    pub fn record_with(&self, event: &LifecycleEvent, journal: &[StatusDetail], site_name: &str) {
        match event.kind {
            LifecycleEventKind::Created => {
                let Some(latency) = create_latency(journal) else {
                    tracing::debug!(instance = %event.instance_id, "create metric suppressed by journal gate");
                    return;
                };
                self.latency
                    .with_label_values(&[site_name, "create", "pending", "ready"])
                    .set(latency.num_milliseconds() as f64 / 1000.0);
            }
            LifecycleEventKind::Deleted => {
                let Some(latency) = delete_latency(journal, event.occurred_at) else {
                    tracing::debug!(instance = %event.instance_id, "delete metric suppressed, no terminating entry");
                    return;
                };
                self.latency
                    .with_label_values(&[site_name, "delete", "terminating", "terminated"])
                    .set(latency.num_milliseconds() as f64 / 1000.0);
            }
        }
    }

    /// Site-id → name, populated lazily from the DB, fetched once per miss.
    async fn site_name(&self, site_id: SiteId) -> ActivityResult<String> {
        if let Some(name) = self
            .site_names
            .read()
            .expect("site name cache lock poisoned")
            .get(&site_id)
        {
            return Ok(name.clone());
        }

        let name = {
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|err| db::DatabaseError::new("acquire connection", err))?;
            db::site::find_name_by_id(&mut conn, site_id).await?
        }
        .unwrap_or_else(|| site_id.to_string());

        self.site_names
            .write()
            .expect("site name cache lock poisoned")
            .insert(site_id, name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use anvil_uuid::InstanceId;
    use uuid::Uuid;

    use super::*;

    fn journal_newest_first(entries: &[(&str, DateTime<Utc>)]) -> Vec<StatusDetail> {
        let object_id = Uuid::new_v4();
        let mut journal: Vec<StatusDetail> = entries
            .iter()
            .enumerate()
            .map(|(index, (status, created))| StatusDetail {
                id: index as i64,
                object_id,
                status: status.to_string(),
                message: String::new(),
                created: *created,
            })
            .collect();
        journal.sort_by(|a, b| b.created.cmp(&a.created));
        journal
    }

    fn recorder() -> (Registry, LifecycleMetricsRecorder) {
        let registry = Registry::new();
        let pool = PgPool::connect_lazy("postgres://anvil@localhost/anvil").unwrap();
        let recorder = LifecycleMetricsRecorder::new(&registry, pool).unwrap();
        (registry, recorder)
    }

    fn gauge_value(registry: &Registry, labels: &[(&str, &str)]) -> Option<f64> {
        registry
            .gather()
            .iter()
            .find(|family| family.get_name() == "instance_operation_latency_seconds")?
            .get_metric()
            .iter()
            .find(|metric| {
                labels.iter().all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|label| label.get_name() == *key && label.get_value() == *value)
                })
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    #[tokio::test]
    async fn create_metric_from_pending_to_ready() {
        let t0 = Utc::now();
        let journal = journal_newest_first(&[
            ("pending", t0),
            ("provisioning", t0 + chrono::Duration::seconds(20)),
            ("ready", t0 + chrono::Duration::seconds(60)),
        ]);

        let (registry, recorder) = recorder();
        let event = LifecycleEvent {
            kind: LifecycleEventKind::Created,
            instance_id: InstanceId::new_v4(),
            site_id: SiteId::new_v4(),
            occurred_at: t0 + chrono::Duration::seconds(60),
        };
        recorder.record_with(&event, &journal, "lab-east");

        let value = gauge_value(
            &registry,
            &[
                ("site", "lab-east"),
                ("operation_type", "create"),
                ("from_status", "pending"),
                ("to_status", "ready"),
            ],
        );
        assert_eq!(value, Some(60.0));
    }

    #[tokio::test]
    async fn create_metric_suppressed_after_re_ready() {
        let t0 = Utc::now();
        let journal = journal_newest_first(&[
            ("pending", t0),
            ("ready", t0 + chrono::Duration::seconds(30)),
            ("error", t0 + chrono::Duration::seconds(60)),
            ("ready", t0 + chrono::Duration::seconds(90)),
        ]);
        assert_eq!(create_latency(&journal), None);

        let (registry, recorder) = recorder();
        let event = LifecycleEvent {
            kind: LifecycleEventKind::Created,
            instance_id: InstanceId::new_v4(),
            site_id: SiteId::new_v4(),
            occurred_at: t0 + chrono::Duration::seconds(90),
        };
        recorder.record_with(&event, &journal, "lab-east");
        assert_eq!(gauge_value(&registry, &[("operation_type", "create")]), None);
    }

    #[test]
    fn create_metric_needs_a_pending_entry() {
        let t0 = Utc::now();
        let journal = journal_newest_first(&[("ready", t0 + chrono::Duration::seconds(60))]);
        assert_eq!(create_latency(&journal), None);
    }

    #[test]
    fn delete_metric_from_earliest_terminating() {
        let t0 = Utc::now();
        let journal = journal_newest_first(&[
            ("terminating", t0),
            ("terminating", t0 + chrono::Duration::seconds(10)),
        ]);
        let latency = delete_latency(&journal, t0 + chrono::Duration::seconds(45)).unwrap();
        assert_eq!(latency.num_seconds(), 45);
    }

    #[test]
    fn delete_metric_needs_terminating() {
        let journal = journal_newest_first(&[("ready", Utc::now())]);
        assert_eq!(delete_latency(&journal, Utc::now()), None);
    }
}
