// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mapping input columns to workload fields

use crate::config::MatchStrategy;
use crate::entity::Workload;
use crate::errors::ConfigError;
use slog::Logger;
use slog::debug;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use strum::EnumIter;
use strum::IntoEnumIterator as _;

/// One row of the input table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRow {
    /// 1-based line in the source file
    pub line: u64,
    pub cells: Vec<String>,
}

impl InputRow {
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        InputRow { line, cells }
    }

    /// Returns the cell at `index`, or "" for short rows
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Workload fields an input table can manage
///
/// Labels are handled separately since their set of columns is only known
/// at run time.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter,
)]
pub enum Field {
    Href,
    Hostname,
    Name,
    Description,
    DistinguishedName,
    ServicePrincipalName,
    ExternalDataSet,
    ExternalDataReference,
    OsId,
    OsDetail,
    DataCenter,
    PublicIp,
    Interfaces,
    EnforcementMode,
    VisibilityLevel,
}

impl Field {
    /// Canonical header name, as written by the export side
    pub fn header(self) -> &'static str {
        self.headers()[0]
    }

    /// Every header name (lower case) recognized for this field
    fn headers(self) -> &'static [&'static str] {
        match self {
            Field::Href => &["href"],
            Field::Hostname => &["hostname"],
            Field::Name => &["name"],
            Field::Description => &["description"],
            Field::DistinguishedName => {
                &["machine_authentication_id", "distinguished_name"]
            }
            Field::ServicePrincipalName => &["spn", "service_principal_name"],
            Field::ExternalDataSet => &["external_data_set"],
            Field::ExternalDataReference => &["external_data_reference"],
            Field::OsId => &["os_id"],
            Field::OsDetail => &["os_detail"],
            Field::DataCenter => &["data_center", "datacenter"],
            Field::PublicIp => &["public_ip"],
            Field::Interfaces => &["interfaces"],
            Field::EnforcementMode => &["enforcement", "enforcement_mode"],
            Field::VisibilityLevel => &["visibility", "visibility_level"],
        }
    }

    pub fn from_header(header: &str) -> Option<Field> {
        let header = header.trim().to_ascii_lowercase();
        Field::iter().find(|f| f.headers().contains(&header.as_str()))
    }

    /// Current value of a plain string field on `workload`
    ///
    /// Returns `None` for fields that are not plain strings.
    pub fn value(self, workload: &Workload) -> Option<&str> {
        let v = match self {
            Field::Href => return workload.href.as_deref().or(Some("")),
            Field::Hostname => &workload.hostname,
            Field::Name => &workload.name,
            Field::Description => &workload.description,
            Field::DistinguishedName => &workload.distinguished_name,
            Field::ServicePrincipalName => &workload.service_principal_name,
            Field::ExternalDataSet => &workload.external_data_set,
            Field::ExternalDataReference => &workload.external_data_reference,
            Field::OsId => &workload.os_id,
            Field::OsDetail => &workload.os_detail,
            Field::DataCenter => &workload.data_center,
            Field::PublicIp => &workload.public_ip,
            Field::Interfaces
            | Field::EnforcementMode
            | Field::VisibilityLevel => return None,
        };
        Some(v.as_str())
    }

    /// Mutable slot for a plain string field the reconciler may write
    ///
    /// `Href` is an identity, never written from a row.
    pub(crate) fn slot(self, workload: &mut Workload) -> Option<&mut String> {
        let slot = match self {
            Field::Hostname => &mut workload.hostname,
            Field::Name => &mut workload.name,
            Field::Description => &mut workload.description,
            Field::DistinguishedName => &mut workload.distinguished_name,
            Field::ServicePrincipalName => {
                &mut workload.service_principal_name
            }
            Field::ExternalDataSet => &mut workload.external_data_set,
            Field::ExternalDataReference => {
                &mut workload.external_data_reference
            }
            Field::OsId => &mut workload.os_id,
            Field::OsDetail => &mut workload.os_detail,
            Field::DataCenter => &mut workload.data_center,
            Field::PublicIp => &mut workload.public_ip,
            Field::Href
            | Field::Interfaces
            | Field::EnforcementMode
            | Field::VisibilityLevel => return None,
        };
        Some(slot)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header())
    }
}

impl MatchStrategy {
    /// Columns that must be present to match with this strategy
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            MatchStrategy::Href => &[Field::Href],
            MatchStrategy::Hostname => &[Field::Hostname],
            MatchStrategy::Name => &[Field::Name],
            MatchStrategy::ExternalData => {
                &[Field::ExternalDataSet, Field::ExternalDataReference]
            }
        }
    }
}

/// Which column holds each managed field
///
/// A field with no column is not managed by this run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<Field, usize>,
    labels: BTreeMap<String, usize>,
}

impl FieldMap {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.fields.get(&field).copied()
    }

    /// The row's cell for `field`, if the field is managed
    pub fn cell<'a>(&self, row: &'a InputRow, field: Field) -> Option<&'a str> {
        self.column(field).map(|i| row.cell(i))
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.keys().copied()
    }

    /// Label dimensions with a column, with that column
    pub fn labels(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.labels.iter().map(|(k, i)| (k.as_str(), *i))
    }
}

/// Builds a [`FieldMap`] from the header row
///
/// Header names are compared case-insensitively.  Unrecognized headers are
/// ignored so that exports with extra columns can be fed straight back in.
/// When a header appears twice, the first column wins.
pub fn resolve_headers(
    log: &Logger,
    header: &InputRow,
    strategy: MatchStrategy,
    label_dimensions: &BTreeSet<String>,
) -> Result<FieldMap, ConfigError> {
    let label_dimensions: BTreeMap<String, &str> = label_dimensions
        .iter()
        .map(|k| (k.to_ascii_lowercase(), k.as_str()))
        .collect();

    let mut map = FieldMap::default();
    for (index, name) in header.cells.iter().enumerate() {
        if let Some(field) = Field::from_header(name) {
            map.fields.entry(field).or_insert(index);
        } else if let Some(key) =
            label_dimensions.get(&name.trim().to_ascii_lowercase())
        {
            map.labels.entry(key.to_string()).or_insert(index);
        } else {
            debug!(log, "ignoring unrecognized column"; "header" => name);
        }
    }

    for field in strategy.required_fields() {
        if map.column(*field).is_none() {
            return Err(ConfigError::MissingMatchColumn {
                strategy,
                header: field.header(),
            });
        }
    }

    Ok(map)
}
