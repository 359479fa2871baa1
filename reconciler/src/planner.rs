// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builds a [`ChangeSet`] from an input table and the current remote state
//!
//! Planning is pure: it reads the table and the fetched workloads and labels
//! and never talks to the remote.  Rows are processed in input order.

use crate::change_set::ChangeSet;
use crate::config::RunConfig;
use crate::entity::Label;
use crate::entity::Workload;
use crate::errors::ConfigError;
use crate::errors::PlanError;
use crate::fields::FieldReconciler;
use crate::header::InputRow;
use crate::header::resolve_headers;
use crate::index::InventoryIndex;
use crate::labels::LabelRegistry;
use crate::matcher::MatchOutcome;
use crate::matcher::RecordMatcher;
use crate::matcher::SkipReason;
use slog::Logger;
use slog::info;
use slog::warn;
use std::collections::BTreeSet;

/// Reconciles `rows` (header first) against `workloads` and `labels`
pub fn plan(
    log: &Logger,
    config: &RunConfig,
    rows: &[InputRow],
    workloads: Vec<Workload>,
    labels: Vec<Label>,
) -> Result<ChangeSet, PlanError> {
    config.validate()?;
    let Some((header, rows)) = rows.split_first() else {
        return Err(ConfigError::EmptyInput.into());
    };

    // A dimension the remote already has keeps the remote's spelling.
    let mut dimensions: BTreeSet<String> =
        labels.iter().map(|l| l.key.clone()).collect();
    for key in &config.label_dimensions {
        if !dimensions.iter().any(|d| d.eq_ignore_ascii_case(key)) {
            dimensions.insert(key.clone());
        }
    }
    let field_map =
        resolve_headers(log, header, config.match_strategy, &dimensions)?;

    let mut registry = LabelRegistry::new(log, labels);
    let workloads: Vec<Workload> = workloads
        .into_iter()
        .map(|mut w| {
            for l in w.labels.iter_mut().filter(|l| l.key.is_empty()) {
                if let Some(key) = registry.key_of(&l.href) {
                    l.key = key.to_string();
                }
            }
            w
        })
        .collect();

    let index = InventoryIndex::new(
        log,
        workloads,
        config.match_strategy,
        config.ignore_case,
        config.entity_filter,
    );
    info!(
        log,
        "indexed remote workloads";
        "strategy" => %config.match_strategy,
        "workloads" => index.len(),
        "ignore_case" => config.ignore_case,
    );

    let matcher =
        RecordMatcher::new(&index, &field_map, config.create_missing);
    let reconciler = FieldReconciler::new(log, config, &field_map);

    let mut change_set = ChangeSet::default();
    for row in rows {
        let (key, outcome) = matcher.match_row(row);
        match outcome {
            MatchOutcome::Skip(SkipReason::BlankMatch) => {
                warn!(
                    log,
                    "match column is blank; skipping row";
                    "line" => row.line,
                );
                change_set.counts.blank_match += 1;
            }
            MatchOutcome::Skip(SkipReason::Unmatched) => {
                info!(
                    log,
                    "no workload matches; nothing done \
                     (enable creation to create it)";
                    "line" => row.line,
                    "match_key" => %key,
                );
                change_set.counts.unmatched += 1;
            }
            MatchOutcome::Matched(existing) => {
                let record = reconciler.reconcile(
                    row,
                    key,
                    Some(existing),
                    &mut registry,
                )?;
                if !record.changed() {
                    change_set.counts.unchanged += 1;
                } else if !config.update_existing {
                    info!(
                        log,
                        "workload differs but updates are disabled";
                        "line" => row.line,
                        "match_key" => %record.match_key,
                    );
                    change_set.counts.updates_disabled += 1;
                } else {
                    change_set.to_update.push(record);
                }
            }
            MatchOutcome::Create => {
                let record =
                    reconciler.reconcile(row, key, None, &mut registry)?;
                info!(
                    log,
                    "workload to be created";
                    "line" => row.line,
                    "match_key" => %record.match_key,
                );
                change_set.to_create.push(record);
            }
        }
    }

    // Only create labels some emitted record still needs; rows that were
    // dropped may have asked for others.
    let needed: BTreeSet<_> = change_set
        .to_update
        .iter()
        .chain(&change_set.to_create)
        .flat_map(|r| r.placeholders())
        .collect();
    change_set.labels_to_create = registry
        .into_pending()
        .into_iter()
        .filter(|l| needed.contains(&l.placeholder))
        .collect();

    Ok(change_set)
}
