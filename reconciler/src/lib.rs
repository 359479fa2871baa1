// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciles a table of workload descriptions against a remote inventory
//!
//! A run has two phases.  Planning ([`plan`]) reads the input table and the
//! remote's current workloads and labels and produces a [`ChangeSet`]; it
//! never mutates anything.  Applying ([`apply_change_set`]) creates the
//! labels the change set needs, then bulk-updates and bulk-creates workloads.
//! [`evaluate_gate`] sits between the two.  [`run_import`] drives a full run
//! against an [`InventoryClient`].

mod apply;
mod change_set;
mod client;
mod config;
mod entity;
mod errors;
mod fields;
mod gate;
mod header;
mod index;
mod labels;
mod matcher;
mod planner;
#[cfg(test)]
mod test_utils;

pub use apply::ApplySummary;
pub use apply::apply_change_set;
pub use change_set::ChangeSet;
pub use change_set::ChangeSetSummary;
pub use change_set::FieldChange;
pub use change_set::ReconciledRecord;
pub use change_set::RowCounts;
pub use client::InventoryClient;
pub use config::DEFAULT_LABEL_DIMENSIONS;
pub use config::DEFAULT_REMOVE_VALUE;
pub use config::EntityFilter;
pub use config::MatchStrategy;
pub use config::RunConfig;
pub use entity::AgentRef;
pub use entity::BulkResult;
pub use entity::EnforcementMode;
pub use entity::Interface;
pub use entity::Label;
pub use entity::LabelRef;
pub use entity::VisibilityLevel;
pub use entity::Workload;
pub use errors::ApplyError;
pub use errors::BulkOp;
pub use errors::ConfigError;
pub use errors::ImportError;
pub use errors::PlanError;
pub use fields::FieldReconciler;
pub use gate::ApplyMode;
pub use gate::Confirmation;
pub use gate::GateDecision;
pub use gate::evaluate_gate;
pub use header::Field;
pub use header::FieldMap;
pub use header::InputRow;
pub use header::resolve_headers;
pub use index::InventoryIndex;
pub use index::MatchKey;
pub use labels::LabelHref;
pub use labels::LabelRegistry;
pub use labels::PendingLabel;
pub use labels::PlaceholderId;
pub use matcher::MatchOutcome;
pub use matcher::RecordMatcher;
pub use matcher::SkipReason;
pub use planner::plan;

use slog::Logger;
use slog::info;
use slog::o;

/// How a run of [`run_import`] ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The remote already agrees with the input
    NothingToDo(ChangeSetSummary),
    /// Changes were planned but the gate did not allow them
    NotApplied { summary: ChangeSetSummary, decision: GateDecision },
    Applied { summary: ChangeSetSummary, applied: ApplySummary },
}

/// Runs a complete import of `rows` (header first) into `client`
pub async fn run_import(
    log: &Logger,
    config: &RunConfig,
    rows: &[InputRow],
    client: &dyn InventoryClient,
    confirmation: &mut dyn Confirmation,
) -> Result<ImportOutcome, ImportError> {
    config.validate()?;
    let target = client.target();
    let log = log.new(o!("target" => target.clone()));

    let workloads = client.list_workloads().await.map_err(|err| {
        ImportError::Load { what: "workloads", target: target.clone(), err }
    })?;
    let labels = client.list_labels().await.map_err(|err| {
        ImportError::Load { what: "labels", target: target.clone(), err }
    })?;
    info!(
        log,
        "loaded remote inventory";
        "workloads" => workloads.len(),
        "labels" => labels.len(),
    );

    let change_set = plan(&log, config, rows, workloads, labels)?;
    let summary = change_set.summary();
    info!(
        log,
        "import planned";
        "labels_to_create" => summary.labels_to_create,
        "to_update" => summary.to_update,
        "to_create" => summary.to_create,
        "unchanged" => summary.counts.unchanged,
        "blank_match" => summary.counts.blank_match,
        "unmatched" => summary.counts.unmatched,
        "updates_disabled" => summary.counts.updates_disabled,
    );
    if change_set.is_empty() {
        info!(log, "nothing to be done");
        return Ok(ImportOutcome::NothingToDo(summary));
    }

    let decision = evaluate_gate(
        &log,
        config.apply_mode,
        &summary,
        &target,
        confirmation,
    );
    if decision != GateDecision::Apply {
        return Ok(ImportOutcome::NotApplied { summary, decision });
    }

    let applied = apply_change_set(&log, client, &change_set).await?;
    info!(
        log,
        "import complete";
        "labels_created" => applied.labels_created,
        "workloads_updated" => applied.workloads_updated,
        "workloads_created" => applied.workloads_created,
    );
    Ok(ImportOutcome::Applied { summary, applied })
}
