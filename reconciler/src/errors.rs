// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::EntityFilter;
use crate::config::MatchStrategy;
use crate::labels::PlaceholderId;
use slog_error_chain::SlogInlineError;
use thiserror::Error;

/// The run cannot proceed as configured
#[derive(Debug, Error, SlogInlineError)]
pub enum ConfigError {
    #[error(
        "input has no {header:?} column, required to match on {strategy}"
    )]
    MissingMatchColumn { strategy: MatchStrategy, header: &'static str },
    #[error("input has no header row")]
    EmptyInput,
    #[error("cannot match on hrefs and create new workloads")]
    HrefMatchWithCreate,
    #[error("cannot create new workloads while restricted to {0} workloads")]
    CreateWithFilter(EntityFilter),
    #[error("remove value must not be empty")]
    EmptyRemoveValue,
}

/// Reconciliation of the input table failed
///
/// Every variant other than `Config` names a cell whose value would corrupt
/// the remote workload if we accepted it.
#[derive(Debug, Error, SlogInlineError)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("csv line {line}: invalid public IP address {value:?}")]
    InvalidPublicIp { line: u64, value: String },
    #[error("csv line {line}: invalid interfaces {value:?}: {reason}")]
    InvalidInterfaces { line: u64, value: String, reason: String },
    #[error("csv line {line}: invalid enforcement mode: {reason}")]
    InvalidEnforcementMode { line: u64, reason: String },
    #[error("csv line {line}: invalid visibility level: {reason}")]
    InvalidVisibilityLevel { line: u64, reason: String },
}

/// Applying a change set to the remote inventory failed
///
/// Nothing is rolled back: labels created before the failure stay created.
#[derive(Debug, Error, SlogInlineError)]
pub enum ApplyError {
    #[error("creating label {key}:{value:?}")]
    CreateLabel {
        key: String,
        value: String,
        #[source]
        err: anyhow::Error,
    },
    #[error(
        "internal error: placeholder {0} has no created label to replace it"
    )]
    UnresolvedPlaceholder(PlaceholderId),
    #[error("bulk {op} of {count} workloads")]
    Bulk {
        op: BulkOp,
        count: usize,
        #[source]
        err: anyhow::Error,
    },
    #[error("bulk {op}: {failed} of {count} workloads failed (first: {first})")]
    BulkItems { op: BulkOp, count: usize, failed: usize, first: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkOp {
    Update,
    Create,
}

impl std::fmt::Display for BulkOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BulkOp::Update => "update",
            BulkOp::Create => "create",
        })
    }
}

/// A whole import run failed
#[derive(Debug, Error, SlogInlineError)]
pub enum ImportError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("loading {what} from {target}")]
    Load {
        what: &'static str,
        target: String,
        #[source]
        err: anyhow::Error,
    },
    #[error("planning import")]
    Plan(#[from] PlanError),
    #[error("applying import")]
    Apply(#[from] ApplyError),
}
