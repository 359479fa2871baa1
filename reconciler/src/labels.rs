// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of label values to hrefs, deferring creation of new labels
//!
//! Rows may name labels that do not exist remotely yet.  Planning never
//! creates them.  Each new `(key, value)` pair gets one [`PlaceholderId`],
//! shared by every row that names it, and the apply step swaps placeholders
//! for real hrefs once the labels exist.

use crate::entity::Label;
use slog::Logger;
use slog::debug;
use std::collections::BTreeMap;
use std::fmt;

/// Stand-in for the href of a label that will be created during apply
///
/// Never sent to the remote: [`crate::ReconciledRecord::to_workload`]
/// fails rather than emit one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlaceholderId(usize);

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wkld-import-temp-{}", self.0)
    }
}

/// A label reference as carried by a planned record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelHref {
    /// Refers to a label that exists remotely
    Resolved(String),
    /// Refers to a label queued for creation
    Placeholder(PlaceholderId),
}

impl LabelHref {
    /// Whether this refers to the existing remote label `href`
    pub fn is_href(&self, href: &str) -> bool {
        matches!(self, LabelHref::Resolved(h) if h == href)
    }
}

impl fmt::Display for LabelHref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelHref::Resolved(href) => f.write_str(href),
            LabelHref::Placeholder(id) => write!(f, "{id}"),
        }
    }
}

/// A label to be created before any workload change is applied
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLabel {
    pub key: String,
    pub value: String,
    pub placeholder: PlaceholderId,
}

/// Per-run registry of known labels and placeholders minted so far
#[derive(Debug)]
pub struct LabelRegistry {
    log: Logger,
    existing: BTreeMap<(String, String), String>,
    by_href: BTreeMap<String, (String, String)>,
    minted: BTreeMap<(String, String), PlaceholderId>,
    pending: Vec<PendingLabel>,
}

impl LabelRegistry {
    pub fn new(log: &Logger, labels: impl IntoIterator<Item = Label>) -> Self {
        let mut existing = BTreeMap::new();
        let mut by_href = BTreeMap::new();
        for l in labels {
            by_href.insert(l.href.clone(), (l.key.clone(), l.value.clone()));
            existing.insert((l.key, l.value), l.href);
        }
        LabelRegistry {
            log: log.new(slog::o!("component" => "LabelRegistry")),
            existing,
            by_href,
            minted: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Returns the href to use for label `key:value`
    ///
    /// Existing labels resolve immediately.  Otherwise the first request for
    /// a pair mints a placeholder and queues the label for creation; later
    /// requests for the same pair get the same placeholder.
    pub fn resolve(&mut self, key: &str, value: &str) -> LabelHref {
        let pair = (key.to_string(), value.to_string());
        if let Some(href) = self.existing.get(&pair) {
            return LabelHref::Resolved(href.clone());
        }
        if let Some(id) = self.minted.get(&pair) {
            return LabelHref::Placeholder(*id);
        }

        let id = PlaceholderId(self.pending.len());
        debug!(
            self.log,
            "label does not exist; queued for creation";
            "key" => key,
            "value" => value,
            "placeholder" => %id,
        );
        self.minted.insert(pair, id);
        self.pending.push(PendingLabel {
            key: key.to_string(),
            value: value.to_string(),
            placeholder: id,
        });
        LabelHref::Placeholder(id)
    }

    /// Dimension of the existing label `href`, if we know it
    pub fn key_of(&self, href: &str) -> Option<&str> {
        self.by_href.get(href).map(|(key, _)| key.as_str())
    }

    /// Value of the existing label `href`, if we know it
    pub fn value_of(&self, href: &str) -> Option<&str> {
        self.by_href.get(href).map(|(_, value)| value.as_str())
    }

    pub fn pending(&self) -> &[PendingLabel] {
        &self.pending
    }

    /// Consumes the registry, returning labels to create in the order they
    /// were first requested
    pub fn into_pending(self) -> Vec<PendingLabel> {
        self.pending
    }
}
