// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loading the input table

use anyhow::Context;
use camino::Utf8Path;
use std::io;
use wkld_reconciler::InputRow;

/// Reads every record of the CSV file at `path`, header included
pub fn read_rows(path: &Utf8Path) -> anyhow::Result<Vec<InputRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {path}"))?;
    read_rows_from(file).with_context(|| format!("reading {path}"))
}

/// Reads CSV records from `reader`
///
/// Rows may have differing lengths.  Each row keeps the 1-based line it
/// started on, and a leading byte order mark is dropped.
pub fn read_rows_from<R: io::Read>(reader: R) -> anyhow::Result<Vec<InputRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line =
            record.position().map_or(rows.len() as u64 + 1, |p| p.line());
        let mut cells: Vec<String> =
            record.iter().map(|c| c.to_string()).collect();
        if rows.is_empty() {
            if let Some(first) = cells.first_mut() {
                if let Some(rest) = first.strip_prefix('\u{feff}') {
                    *first = rest.to_string();
                }
            }
        }
        rows.push(InputRow::new(line, cells));
    }
    Ok(rows)
}
