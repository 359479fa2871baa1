// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Correlating input rows with remote workloads

use crate::config::MatchStrategy;
use crate::entity::Workload;
use crate::header::FieldMap;
use crate::header::InputRow;
use crate::index::InventoryIndex;
use crate::index::MatchKey;

/// What to do with one input row
#[derive(Debug, PartialEq, Eq)]
pub enum MatchOutcome<'a> {
    /// The row describes this existing workload
    Matched(&'a Workload),
    /// The row matches nothing and should become a new workload
    Create,
    /// The row is dropped; the run continues
    Skip(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    BlankMatch,
    Unmatched,
}

pub struct RecordMatcher<'a> {
    index: &'a InventoryIndex,
    field_map: &'a FieldMap,
    create_missing: bool,
}

impl<'a> RecordMatcher<'a> {
    pub fn new(
        index: &'a InventoryIndex,
        field_map: &'a FieldMap,
        create_missing: bool,
    ) -> Self {
        RecordMatcher { index, field_map, create_missing }
    }

    /// Raw (unfolded) match value of `row`, built the same way the index
    /// builds keys for remote workloads
    pub fn raw_key(&self, row: &InputRow) -> String {
        self.index
            .strategy()
            .required_fields()
            .iter()
            .map(|f| self.field_map.cell(row, *f).unwrap_or(""))
            .collect()
    }

    pub fn match_row(&self, row: &InputRow) -> (MatchKey, MatchOutcome<'a>) {
        let key = self.index.key(&self.raw_key(row));
        if key.is_empty() {
            return (key, MatchOutcome::Skip(SkipReason::BlankMatch));
        }
        let outcome = match self.index.get(&key) {
            Some(workload) => MatchOutcome::Matched(workload),
            // `RunConfig::validate` rejects creation when matching on href,
            // but a row carrying an href can't describe a new workload
            // regardless.
            None if self.create_missing
                && self.index.strategy() != MatchStrategy::Href =>
            {
                MatchOutcome::Create
            }
            None => MatchOutcome::Skip(SkipReason::Unmatched),
        };
        (key, outcome)
    }
}
