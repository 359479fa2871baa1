// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-field comparison of an input row against a workload
//!
//! Every managed field follows the same contract:
//!
//! * a cell equal to the remove value clears the field, but only when the
//!   workload exists and the field is currently set;
//! * any other non-empty cell that differs from the current value replaces
//!   it;
//! * an empty cell, or one equal to the current value, changes nothing.
//!
//! New workloads are compared against an empty workload, so the remove value
//! is inert on them.

use crate::change_set::FieldChange;
use crate::change_set::ReconciledRecord;
use crate::config::RunConfig;
use crate::entity::EnforcementMode;
use crate::entity::VisibilityLevel;
use crate::entity::Workload;
use crate::entity::display_interfaces;
use crate::entity::parse_interfaces;
use crate::errors::PlanError;
use crate::header::Field;
use crate::header::FieldMap;
use crate::header::InputRow;
use crate::index::MatchKey;
use crate::labels::LabelHref;
use crate::labels::LabelRegistry;
use slog::Logger;
use slog::info;
use slog::warn;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// What a cell asks for, relative to a field's current value
#[derive(Debug, PartialEq, Eq)]
enum CellIntent<'a> {
    Keep,
    Clear,
    Set(&'a str),
}

pub struct FieldReconciler<'a> {
    log: Logger,
    config: &'a RunConfig,
    field_map: &'a FieldMap,
}

impl<'a> FieldReconciler<'a> {
    pub fn new(
        log: &Logger,
        config: &'a RunConfig,
        field_map: &'a FieldMap,
    ) -> Self {
        FieldReconciler {
            log: log.new(slog::o!("component" => "FieldReconciler")),
            config,
            field_map,
        }
    }

    /// Classifies `cell` against `current` for a string-like field
    fn intent<'c>(
        &self,
        cell: &'c str,
        current: &str,
        is_create: bool,
    ) -> CellIntent<'c> {
        if self.config.is_remove(cell) {
            if !is_create && !current.is_empty() {
                CellIntent::Clear
            } else {
                CellIntent::Keep
            }
        } else if !cell.is_empty() && cell != current {
            CellIntent::Set(cell)
        } else {
            CellIntent::Keep
        }
    }

    /// Reconciles one row against `existing` (or against an empty workload
    /// when `existing` is `None`)
    ///
    /// Labels that don't exist remotely are resolved to placeholders through
    /// `registry`.
    pub fn reconcile(
        &self,
        row: &InputRow,
        match_key: MatchKey,
        existing: Option<&Workload>,
        registry: &mut LabelRegistry,
    ) -> Result<ReconciledRecord, PlanError> {
        let is_create = existing.is_none();
        let managed = existing.is_some_and(Workload::is_managed);
        let log = self.log.new(slog::o!(
            "line" => row.line,
            "match_key" => match_key.to_string(),
        ));

        let mut proposed = existing.cloned().unwrap_or_default();
        let mut changes = Vec::new();

        for field in self.field_map.fields() {
            let Some(cell) = self.field_map.cell(row, field) else {
                continue;
            };
            let change = match field {
                // Identity only: used for matching, never written.
                Field::Href => None,
                Field::Interfaces => self.reconcile_interfaces(
                    row.line,
                    cell,
                    &mut proposed,
                    is_create,
                )?,
                Field::EnforcementMode => self.reconcile_enforcement(
                    &log,
                    row.line,
                    cell,
                    &mut proposed,
                )?,
                Field::VisibilityLevel => self.reconcile_visibility(
                    &log,
                    row.line,
                    cell,
                    &mut proposed,
                )?,
                _ => self.reconcile_string(
                    row.line,
                    field,
                    cell,
                    &mut proposed,
                    is_create,
                )?,
            };
            let Some(change) = change else { continue };

            // The agent reports these on managed workloads; whatever we send
            // would be overwritten.
            if managed && matches!(field, Field::Hostname | Field::Interfaces)
            {
                warn!(
                    log,
                    "cannot change {} of a managed workload; ignoring", field;
                    "from" => &change.from,
                    "to" => &change.to,
                );
                if let Some(existing) = existing {
                    restore(field, existing, &mut proposed);
                }
                continue;
            }
            changes.push(change);
        }

        let labels = self.reconcile_labels(
            row,
            &proposed,
            is_create,
            registry,
            &mut changes,
        );

        if !is_create {
            for change in &changes {
                info!(
                    log,
                    "{} to be changed", change.field;
                    "from" => &change.from,
                    "to" => &change.to,
                    "href" => proposed.href.as_deref().unwrap_or(""),
                );
            }
        }

        Ok(ReconciledRecord {
            line: row.line,
            match_key,
            existing: existing.cloned(),
            proposed,
            labels,
            changes,
        })
    }

    fn reconcile_string(
        &self,
        line: u64,
        field: Field,
        cell: &str,
        proposed: &mut Workload,
        is_create: bool,
    ) -> Result<Option<FieldChange>, PlanError> {
        let Some(slot) = field.slot(proposed) else {
            return Ok(None);
        };
        let new = match self.intent(cell, slot.as_str(), is_create) {
            CellIntent::Keep => return Ok(None),
            CellIntent::Clear => String::new(),
            CellIntent::Set(value) => {
                if field == Field::PublicIp && value.parse::<IpAddr>().is_err()
                {
                    return Err(PlanError::InvalidPublicIp {
                        line,
                        value: value.to_string(),
                    });
                }
                value.to_string()
            }
        };
        let from = std::mem::replace(slot, new.clone());
        Ok(Some(FieldChange { field: field.to_string(), from, to: new }))
    }

    fn reconcile_interfaces(
        &self,
        line: u64,
        cell: &str,
        proposed: &mut Workload,
        is_create: bool,
    ) -> Result<Option<FieldChange>, PlanError> {
        let mut current = proposed.interfaces.clone();
        current.sort();
        let current_text = display_interfaces(&current);

        let new = if self.config.is_remove(cell) {
            if is_create || current.is_empty() {
                return Ok(None);
            }
            Vec::new()
        } else if cell.is_empty() {
            return Ok(None);
        } else {
            let parsed = parse_interfaces(cell).map_err(|reason| {
                PlanError::InvalidInterfaces {
                    line,
                    value: cell.to_string(),
                    reason,
                }
            })?;
            if parsed == current {
                return Ok(None);
            }
            parsed
        };

        let to = display_interfaces(&new);
        proposed.interfaces = new;
        Ok(Some(FieldChange {
            field: Field::Interfaces.to_string(),
            from: current_text,
            to,
        }))
    }

    fn reconcile_enforcement(
        &self,
        log: &Logger,
        line: u64,
        cell: &str,
        proposed: &mut Workload,
    ) -> Result<Option<FieldChange>, PlanError> {
        if self.config.is_remove(cell) {
            warn!(log, "enforcement mode cannot be removed; ignoring");
            return Ok(None);
        }
        if cell.is_empty() {
            return Ok(None);
        }
        let mode = cell.parse::<EnforcementMode>().map_err(|reason| {
            PlanError::InvalidEnforcementMode { line, reason }
        })?;
        let from = proposed.enforcement_mode.replace(mode);
        if from == Some(mode) {
            return Ok(None);
        }
        Ok(Some(FieldChange {
            field: Field::EnforcementMode.to_string(),
            from: from.map(|m| m.to_string()).unwrap_or_default(),
            to: mode.to_string(),
        }))
    }

    fn reconcile_visibility(
        &self,
        log: &Logger,
        line: u64,
        cell: &str,
        proposed: &mut Workload,
    ) -> Result<Option<FieldChange>, PlanError> {
        if self.config.is_remove(cell) {
            warn!(log, "visibility level cannot be removed; ignoring");
            return Ok(None);
        }
        if cell.is_empty() {
            return Ok(None);
        }
        let level = cell.parse::<VisibilityLevel>().map_err(|reason| {
            PlanError::InvalidVisibilityLevel { line, reason }
        })?;
        let from = proposed.visibility_level.replace(level);
        if from == Some(level) {
            return Ok(None);
        }
        Ok(Some(FieldChange {
            field: Field::VisibilityLevel.to_string(),
            from: from.map(|l| l.to_string()).unwrap_or_default(),
            to: level.to_string(),
        }))
    }

    /// Computes the label per dimension after applying the row's label cells
    ///
    /// Labels in dimensions the input doesn't manage are carried over as-is,
    /// including ones whose dimension is unknown.
    fn reconcile_labels(
        &self,
        row: &InputRow,
        proposed: &Workload,
        is_create: bool,
        registry: &mut LabelRegistry,
        changes: &mut Vec<FieldChange>,
    ) -> BTreeMap<String, LabelHref> {
        let mut labels: BTreeMap<String, LabelHref> = proposed
            .labels
            .iter()
            .map(|l| {
                let key = if l.key.is_empty() { &l.href } else { &l.key };
                (key.clone(), LabelHref::Resolved(l.href.clone()))
            })
            .collect();

        for (key, column) in self.field_map.labels() {
            let cell = row.cell(column);
            let current = proposed.label_href(key);
            let current_text = current
                .map(|href| registry.value_of(href).unwrap_or(href))
                .unwrap_or_default()
                .to_string();

            if self.config.is_remove(cell) {
                if !is_create && current.is_some() {
                    labels.retain(|k, _| !k.eq_ignore_ascii_case(key));
                    changes.push(FieldChange {
                        field: key.to_string(),
                        from: current_text,
                        to: String::new(),
                    });
                }
                continue;
            }
            if cell.is_empty() {
                continue;
            }

            let prefix = self
                .config
                .label_prefixes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, prefix)| prefix.as_str());
            let value = match prefix {
                Some(prefix) => format!("{prefix}{cell}"),
                None => cell.to_string(),
            };
            let href = registry.resolve(key, &value);
            if current.is_some_and(|current| href.is_href(current)) {
                continue;
            }
            labels.retain(|k, _| !k.eq_ignore_ascii_case(key));
            labels.insert(key.to_string(), href);
            changes.push(FieldChange {
                field: key.to_string(),
                from: current_text,
                to: value,
            });
        }
        labels
    }
}

/// Puts the current value of `field` back on `proposed`
fn restore(field: Field, existing: &Workload, proposed: &mut Workload) {
    match field {
        Field::Interfaces => proposed.interfaces = existing.interfaces.clone(),
        _ => {
            if let (Some(slot), Some(value)) =
                (field.slot(proposed), field.value(existing))
            {
                *slot = value.to_string();
            }
        }
    }
}
