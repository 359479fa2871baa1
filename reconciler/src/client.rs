// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface to the remote inventory service

use crate::entity::BulkResult;
use crate::entity::Label;
use crate::entity::Workload;
use async_trait::async_trait;

/// Operations the reconciler needs from the remote inventory
///
/// Implementations own transport concerns (authentication, retries, paging,
/// splitting bulk requests).  Each call completes or fails before the
/// reconciler issues the next.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Human-readable name of the remote, used in prompts and logs
    fn target(&self) -> String;

    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>>;

    async fn list_labels(&self) -> anyhow::Result<Vec<Label>>;

    async fn create_label(
        &self,
        key: &str,
        value: &str,
    ) -> anyhow::Result<Label>;

    /// Updates existing workloads, returning one result per workload
    async fn bulk_update(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>>;

    /// Creates workloads, returning one result per workload
    async fn bulk_create(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>>;
}
