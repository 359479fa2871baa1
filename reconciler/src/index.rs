// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lookup of remote workloads by match key

use crate::config::EntityFilter;
use crate::config::MatchStrategy;
use crate::entity::Workload;
use slog::Logger;
use slog::debug;
use std::collections::BTreeMap;
use std::fmt;

/// Key correlating an input row with a remote workload
///
/// Outside this crate, keys come from [`InventoryIndex::key`] so that case
/// folding is applied identically on both sides of a lookup.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey(String);

impl MatchKey {
    pub(crate) fn new(raw: &str, ignore_case: bool) -> Self {
        if ignore_case {
            MatchKey(raw.to_lowercase())
        } else {
            MatchKey(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl MatchStrategy {
    /// Unfolded key of a remote workload under this strategy
    pub fn workload_key(self, workload: &Workload) -> String {
        match self {
            MatchStrategy::Href => workload.href.clone().unwrap_or_default(),
            MatchStrategy::Hostname => workload.hostname.clone(),
            MatchStrategy::Name => workload.name.clone(),
            MatchStrategy::ExternalData => format!(
                "{}{}",
                workload.external_data_set, workload.external_data_reference
            ),
        }
    }
}

/// Remote workloads keyed by one match strategy
///
/// Keys are unique.  If two workloads share a key, the one seen last is kept;
/// the collision is logged at debug level and otherwise ignored.
#[derive(Debug)]
pub struct InventoryIndex {
    strategy: MatchStrategy,
    ignore_case: bool,
    by_key: BTreeMap<MatchKey, Workload>,
}

impl InventoryIndex {
    pub fn new(
        log: &Logger,
        workloads: impl IntoIterator<Item = Workload>,
        strategy: MatchStrategy,
        ignore_case: bool,
        filter: EntityFilter,
    ) -> Self {
        let mut index =
            InventoryIndex { strategy, ignore_case, by_key: BTreeMap::new() };
        for workload in workloads {
            if !filter.admits(workload.is_managed()) {
                continue;
            }
            let key = index.key(&strategy.workload_key(&workload));
            if key.is_empty() {
                continue;
            }
            if let Some(previous) = index.by_key.insert(key.clone(), workload)
            {
                debug!(
                    log,
                    "match key collision; keeping the later workload";
                    "match_key" => %key,
                    "dropped_href" => previous.href.unwrap_or_default(),
                );
            }
        }
        index
    }

    /// Folds a raw key the way this index does
    pub fn key(&self, raw: &str) -> MatchKey {
        MatchKey::new(raw, self.ignore_case)
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn get(&self, key: &MatchKey) -> Option<&Workload> {
        self.by_key.get(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::AgentRef;
    use crate::test_utils::test_setup_log;
    use crate::test_utils::workload;

    #[test]
    fn test_later_workload_wins_on_collision() {
        let log = test_setup_log("test_later_workload_wins_on_collision");
        let index = InventoryIndex::new(
            &log,
            vec![workload("h1", "web1"), workload("h2", "web1")],
            MatchStrategy::Hostname,
            false,
            EntityFilter::All,
        );
        assert_eq!(index.len(), 1);
        let found = index.get(&index.key("web1")).unwrap();
        assert_eq!(found.href.as_deref(), Some("h2"));
    }

    #[test]
    fn test_ignore_case_folds_both_sides() {
        let log = test_setup_log("test_ignore_case_folds_both_sides");
        let workloads = vec![workload("h1", "Web1.Example.COM")];

        let index = InventoryIndex::new(
            &log,
            workloads.clone(),
            MatchStrategy::Hostname,
            true,
            EntityFilter::All,
        );
        let found = index.get(&index.key("WEB1.example.com")).unwrap();
        assert_eq!(found.href.as_deref(), Some("h1"));

        let index = InventoryIndex::new(
            &log,
            workloads,
            MatchStrategy::Hostname,
            false,
            EntityFilter::All,
        );
        assert!(index.get(&index.key("web1.example.com")).is_none());
        assert!(index.get(&index.key("Web1.Example.COM")).is_some());
    }

    #[test]
    fn test_strategies() {
        let log = test_setup_log("test_strategies");
        let mut w = workload("/orgs/1/workloads/7", "db1");
        w.name = "database one".to_string();
        w.external_data_set = "cmdb".to_string();
        w.external_data_reference = "ci-0042".to_string();

        for (strategy, raw) in [
            (MatchStrategy::Href, "/orgs/1/workloads/7"),
            (MatchStrategy::Hostname, "db1"),
            (MatchStrategy::Name, "database one"),
            (MatchStrategy::ExternalData, "cmdbci-0042"),
        ] {
            let index = InventoryIndex::new(
                &log,
                vec![w.clone()],
                strategy,
                false,
                EntityFilter::All,
            );
            assert!(
                index.get(&index.key(raw)).is_some(),
                "strategy {strategy} should find {raw:?}"
            );
        }
    }

    #[test]
    fn test_filter_and_empty_keys() {
        let log = test_setup_log("test_filter_and_empty_keys");
        let mut managed = workload("h1", "web1");
        managed.agent = Some(AgentRef { href: "a1".to_string() });
        let unmanaged = workload("h2", "web2");
        let nameless = workload("h3", "");

        let index = InventoryIndex::new(
            &log,
            vec![managed.clone(), unmanaged.clone(), nameless],
            MatchStrategy::Hostname,
            false,
            EntityFilter::UnmanagedOnly,
        );
        assert_eq!(index.len(), 1);
        assert!(index.get(&index.key("web2")).is_some());

        let index = InventoryIndex::new(
            &log,
            vec![managed, unmanaged],
            MatchStrategy::Hostname,
            false,
            EntityFilter::ManagedOnly,
        );
        assert_eq!(index.len(), 1);
        assert!(index.get(&index.key("web1")).is_some());
    }
}
