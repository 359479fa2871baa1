// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration
//!
//! A [`RunConfig`] is built once (usually from command-line arguments) and
//! then shared read-only by every component of a run.

use crate::errors::ConfigError;
use crate::gate::ApplyMode;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

/// Default literal that means "clear this field"
pub const DEFAULT_REMOVE_VALUE: &str = "wkld-import-remove";

/// Label dimensions recognized even if the remote has no labels yet
pub const DEFAULT_LABEL_DIMENSIONS: &[&str] = &["role", "app", "env", "loc"];

/// Which attribute correlates an input row with a remote workload
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Href,
    Hostname,
    Name,
    /// External data set and external data reference, concatenated
    ExternalData,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStrategy::Href => "href",
            MatchStrategy::Hostname => "hostname",
            MatchStrategy::Name => "name",
            MatchStrategy::ExternalData => "external_data",
        })
    }
}

/// Restricts which remote workloads are eligible for matching
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityFilter {
    #[default]
    All,
    ManagedOnly,
    UnmanagedOnly,
}

impl EntityFilter {
    pub fn admits(self, managed: bool) -> bool {
        match self {
            EntityFilter::All => true,
            EntityFilter::ManagedOnly => managed,
            EntityFilter::UnmanagedOnly => !managed,
        }
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityFilter::All => "all",
            EntityFilter::ManagedOnly => "managed",
            EntityFilter::UnmanagedOnly => "unmanaged",
        })
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub match_strategy: MatchStrategy,
    /// Fold match keys to lower case on both sides of the lookup
    pub ignore_case: bool,
    /// Create workloads for rows that match nothing
    pub create_missing: bool,
    /// Emit updates for matched workloads that differ from their row
    pub update_existing: bool,
    pub entity_filter: EntityFilter,
    /// Cell value meaning "clear this field"
    pub remove_value: String,
    /// Label keys recognized as columns, in addition to every key the remote
    /// already has labels for.  Matched without regard to case; the remote's
    /// spelling wins.
    pub label_dimensions: BTreeSet<String>,
    /// Deprecated: text prepended to non-empty label cells, per dimension
    /// (matched without regard to case)
    pub label_prefixes: BTreeMap<String, String>,
    pub apply_mode: ApplyMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            match_strategy: MatchStrategy::Hostname,
            ignore_case: false,
            create_missing: false,
            update_existing: true,
            entity_filter: EntityFilter::All,
            remove_value: DEFAULT_REMOVE_VALUE.to_string(),
            label_dimensions: DEFAULT_LABEL_DIMENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            label_prefixes: BTreeMap::new(),
            apply_mode: ApplyMode::ReportOnly,
        }
    }
}

impl RunConfig {
    /// Rejects contradictory settings
    ///
    /// This runs before anything is loaded from the remote, so a bad
    /// invocation never costs a round trip.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.create_missing {
            if self.match_strategy == MatchStrategy::Href {
                return Err(ConfigError::HrefMatchWithCreate);
            }
            if self.entity_filter != EntityFilter::All {
                return Err(ConfigError::CreateWithFilter(self.entity_filter));
            }
        }
        if self.remove_value.is_empty() {
            return Err(ConfigError::EmptyRemoveValue);
        }
        Ok(())
    }

    pub(crate) fn is_remove(&self, cell: &str) -> bool {
        cell == self.remove_value
    }
}
