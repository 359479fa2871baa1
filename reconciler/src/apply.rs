// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Applying a change set to the remote inventory
//!
//! The steps are strictly ordered:
//!
//! 1. create every pending label, recording the real href that replaces each
//!    placeholder;
//! 2. rewrite every planned workload with real label hrefs;
//! 3. bulk-update changed workloads, then bulk-create new ones.
//!
//! Any failure stops the run.  Nothing already done is undone; in particular
//! labels created in step 1 remain if step 3 fails.

use crate::change_set::ChangeSet;
use crate::change_set::ReconciledRecord;
use crate::client::InventoryClient;
use crate::entity::BulkResult;
use crate::entity::Workload;
use crate::errors::ApplyError;
use crate::errors::BulkOp;
use crate::labels::PlaceholderId;
use slog::Logger;
use slog::debug;
use slog::info;
use std::collections::BTreeMap;

/// What [`apply_change_set`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub labels_created: usize,
    pub workloads_updated: usize,
    pub workloads_created: usize,
}

pub async fn apply_change_set(
    log: &Logger,
    client: &dyn InventoryClient,
    change_set: &ChangeSet,
) -> Result<ApplySummary, ApplyError> {
    let mut summary = ApplySummary::default();

    let mut remap: BTreeMap<PlaceholderId, String> = BTreeMap::new();
    for pending in &change_set.labels_to_create {
        let label = client
            .create_label(&pending.key, &pending.value)
            .await
            .map_err(|err| ApplyError::CreateLabel {
                key: pending.key.clone(),
                value: pending.value.clone(),
                err,
            })?;
        info!(
            log,
            "created label";
            "key" => &label.key,
            "value" => &label.value,
            "href" => &label.href,
        );
        remap.insert(pending.placeholder, label.href);
        summary.labels_created += 1;
    }

    let updates = resolve_labels(&change_set.to_update, &remap)?;
    let creates = resolve_labels(&change_set.to_create, &remap)?;

    if !updates.is_empty() {
        let result = client.bulk_update(&updates).await;
        check_bulk(log, BulkOp::Update, updates.len(), result)?;
        summary.workloads_updated = updates.len();
    }
    if !creates.is_empty() {
        let result = client.bulk_create(&creates).await;
        check_bulk(log, BulkOp::Create, creates.len(), result)?;
        summary.workloads_created = creates.len();
    }

    Ok(summary)
}

fn resolve_labels(
    records: &[ReconciledRecord],
    remap: &BTreeMap<PlaceholderId, String>,
) -> Result<Vec<Workload>, ApplyError> {
    records
        .iter()
        .map(|r| {
            r.to_workload(remap).map_err(ApplyError::UnresolvedPlaceholder)
        })
        .collect()
}

fn check_bulk(
    log: &Logger,
    op: BulkOp,
    count: usize,
    result: anyhow::Result<Vec<BulkResult>>,
) -> Result<(), ApplyError> {
    let results = result.map_err(|err| ApplyError::Bulk { op, count, err })?;
    for r in &results {
        debug!(
            log,
            "bulk {op} result";
            "href" => r.href.as_deref().unwrap_or(""),
            "status" => &r.status,
            "errors" => ?r.errors,
        );
    }

    let mut failures = results.iter().filter(|r| !r.is_success());
    if let Some(first) = failures.next() {
        return Err(ApplyError::BulkItems {
            op,
            count,
            failed: 1 + failures.count(),
            first: format!(
                "{}: {}",
                first.href.as_deref().unwrap_or("<new workload>"),
                if first.errors.is_empty() {
                    format!("status {:?}", first.status)
                } else {
                    first.errors.join("; ")
                }
            ),
        });
    }

    info!(log, "bulk {op} succeeded"; "workloads" => count);
    Ok(())
}
