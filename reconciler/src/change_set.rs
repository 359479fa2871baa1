// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accumulated result of reconciling an input table

use crate::entity::LabelRef;
use crate::entity::Workload;
use crate::index::MatchKey;
use crate::labels::LabelHref;
use crate::labels::PendingLabel;
use crate::labels::PlaceholderId;
use std::collections::BTreeMap;
use std::fmt;
use swrite::SWrite;
use swrite::swriteln;

/// One field that a row changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn blank(s: &str) -> &str {
            if s.is_empty() { "<empty>" } else { s }
        }
        write!(
            f,
            "{}: {:?} -> {:?}",
            self.field,
            blank(&self.from),
            blank(&self.to)
        )
    }
}

/// The outcome of reconciling one input row
///
/// `proposed` is a fresh value: for updates, a copy of `existing` with the
/// row's changes applied; for creations, a new workload built from the row.
/// Its `labels` field is stale until [`ReconciledRecord::to_workload`]
/// rebuilds it from `labels`, which may still hold placeholders.
#[derive(Clone, Debug)]
pub struct ReconciledRecord {
    pub line: u64,
    pub match_key: MatchKey,
    pub existing: Option<Workload>,
    pub proposed: Workload,
    /// Label per dimension, after this row's changes
    pub labels: BTreeMap<String, LabelHref>,
    pub changes: Vec<FieldChange>,
}

impl ReconciledRecord {
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_create(&self) -> bool {
        self.existing.is_none()
    }

    /// Placeholders this record still refers to
    pub fn placeholders(&self) -> impl Iterator<Item = PlaceholderId> + '_ {
        self.labels.values().filter_map(|l| match l {
            LabelHref::Placeholder(id) => Some(*id),
            LabelHref::Resolved(_) => None,
        })
    }

    /// Produces the workload to send, with every label as a real href
    ///
    /// `remap` supplies the href created for each placeholder.  A placeholder
    /// missing from `remap` is returned as the error.
    pub fn to_workload(
        &self,
        remap: &BTreeMap<PlaceholderId, String>,
    ) -> Result<Workload, PlaceholderId> {
        let labels = self
            .labels
            .iter()
            .map(|(key, href)| {
                let href = match href {
                    LabelHref::Resolved(href) => href.clone(),
                    LabelHref::Placeholder(id) => {
                        remap.get(id).cloned().ok_or(*id)?
                    }
                };
                Ok(LabelRef { key: key.clone(), href })
            })
            .collect::<Result<Vec<_>, PlaceholderId>>()?;
        Ok(Workload { labels, ..self.proposed.clone() })
    }
}

/// Rows that produced no change set entry, by reason
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowCounts {
    /// Matched a workload that already agrees with the row
    pub unchanged: usize,
    /// Match column was blank
    pub blank_match: usize,
    /// Matched nothing and creation is disabled
    pub unmatched: usize,
    /// Would change a workload, but updates are disabled
    pub updates_disabled: usize,
}

/// Changes to make to the remote inventory
///
/// Built once per run by the planner and consumed once by
/// [`crate::apply_change_set`].  All three lists keep input order.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    pub to_update: Vec<ReconciledRecord>,
    pub to_create: Vec<ReconciledRecord>,
    pub labels_to_create: Vec<PendingLabel>,
    pub counts: RowCounts,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_update.is_empty()
            && self.to_create.is_empty()
            && self.labels_to_create.is_empty()
    }

    pub fn summary(&self) -> ChangeSetSummary {
        ChangeSetSummary {
            labels_to_create: self.labels_to_create.len(),
            to_update: self.to_update.len(),
            to_create: self.to_create.len(),
            counts: self.counts,
        }
    }
}

/// Sizes of a [`ChangeSet`], for logging and the confirmation prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeSetSummary {
    pub labels_to_create: usize,
    pub to_update: usize,
    pub to_create: usize,
    pub counts: RowCounts,
}

impl fmt::Display for ChangeSetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        swriteln!(s, "labels to create:      {}", self.labels_to_create);
        swriteln!(s, "workloads to update:   {}", self.to_update);
        swriteln!(s, "workloads to create:   {}", self.to_create);
        swriteln!(s, "rows with no changes:  {}", self.counts.unchanged);
        swriteln!(
            s,
            "rows skipped:          {} (blank match: {}, unmatched: {}, \
             updates disabled: {})",
            self.counts.blank_match
                + self.counts.unmatched
                + self.counts.updates_disabled,
            self.counts.blank_match,
            self.counts.unmatched,
            self.counts.updates_disabled,
        );
        f.write_str(&s)
    }
}
