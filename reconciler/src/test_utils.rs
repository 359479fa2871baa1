// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by unit tests

use crate::client::InventoryClient;
use crate::entity::BulkResult;
use crate::entity::Label;
use crate::entity::Workload;
use crate::errors::BulkOp;
use crate::gate::Confirmation;
use crate::header::InputRow;
use anyhow::anyhow;
use anyhow::bail;
use async_trait::async_trait;
use slog::Drain;
use slog::Logger;
use slog::o;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn test_setup_log(test_name: &str) -> Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    Logger::root(drain, o!("test_name" => test_name.to_string()))
}

pub fn workload(href: &str, hostname: &str) -> Workload {
    Workload {
        href: Some(href.to_string()),
        hostname: hostname.to_string(),
        ..Default::default()
    }
}

pub fn label(href: &str, key: &str, value: &str) -> Label {
    Label {
        href: href.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

pub fn row(line: u64, cells: &[&str]) -> InputRow {
    InputRow::new(line, cells.iter().map(|c| c.to_string()).collect())
}

/// Answers prompts from a fixed script, recording each prompt shown
pub struct ScriptedConfirmation {
    answers: VecDeque<anyhow::Result<String>>,
    prompts: Vec<String>,
}

impl ScriptedConfirmation {
    pub fn new(answers: Vec<anyhow::Result<String>>) -> Self {
        ScriptedConfirmation { answers: answers.into(), prompts: Vec::new() }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Confirmation for ScriptedConfirmation {
    fn ask(&mut self, message: &str) -> anyhow::Result<String> {
        self.prompts.push(message.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("prompt script exhausted")))
    }
}

/// A mutating call made against a [`FakeInventory`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateLabel(String, String),
    BulkUpdate(usize),
    BulkCreate(usize),
}

#[derive(Default)]
struct FakeState {
    workloads: Vec<Workload>,
    labels: Vec<Label>,
    calls: Vec<Call>,
    next_href: usize,
    fail_create_label: bool,
    fail_bulk: Option<BulkOp>,
    fail_bulk_items: Option<BulkOp>,
    fail_bulk_status: Option<BulkOp>,
}

impl FakeState {
    fn mint(&mut self, kind: &str) -> String {
        self.next_href += 1;
        format!("/orgs/1/{kind}/{}", self.next_href)
    }
}

/// In-memory remote inventory
///
/// Bulk calls are applied to the fake's own state, so tests can check what
/// the remote would hold afterwards.
#[derive(Default)]
pub struct FakeInventory {
    state: Mutex<FakeState>,
}

impl FakeInventory {
    pub fn new(workloads: Vec<Workload>, labels: Vec<Label>) -> Self {
        FakeInventory {
            state: Mutex::new(FakeState {
                workloads,
                labels,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn label_href(&self, key: &str, value: &str) -> Option<String> {
        self.state()
            .labels
            .iter()
            .find(|l| l.key == key && l.value == value)
            .map(|l| l.href.clone())
    }

    pub fn workload(&self, hostname: &str) -> Option<Workload> {
        self.state().workloads.iter().find(|w| w.hostname == hostname).cloned()
    }

    pub fn fail_create_label(&self) {
        self.state().fail_create_label = true;
    }

    pub fn fail_bulk(&self, op: BulkOp) {
        self.state().fail_bulk = Some(op);
    }

    pub fn fail_bulk_items(&self, op: BulkOp) {
        self.state().fail_bulk_items = Some(op);
    }

    /// Makes every item of `op` report a failure status with no errors
    pub fn fail_bulk_status(&self, op: BulkOp) {
        self.state().fail_bulk_status = Some(op);
    }

    fn bulk(
        &self,
        op: BulkOp,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        let mut state = self.state();
        state.calls.push(match op {
            BulkOp::Update => Call::BulkUpdate(workloads.len()),
            BulkOp::Create => Call::BulkCreate(workloads.len()),
        });
        if state.fail_bulk == Some(op) {
            bail!("connection reset");
        }
        if state.fail_bulk_items == Some(op) {
            return Ok(workloads
                .iter()
                .map(|w| BulkResult {
                    href: w.href.clone(),
                    status: "validation_failure".to_string(),
                    errors: vec!["rejected by fake".to_string()],
                })
                .collect());
        }
        if state.fail_bulk_status == Some(op) {
            return Ok(workloads
                .iter()
                .map(|w| BulkResult {
                    href: w.href.clone(),
                    status: "failed".to_string(),
                    errors: Vec::new(),
                })
                .collect());
        }

        let mut results = Vec::new();
        for w in workloads {
            let href = match op {
                BulkOp::Update => {
                    let Some(slot) =
                        state.workloads.iter_mut().find(|e| e.href == w.href)
                    else {
                        bail!("bulk update of unknown workload {:?}", w.href);
                    };
                    *slot = Workload { agent: slot.agent.clone(), ..w.clone() };
                    w.href.clone()
                }
                BulkOp::Create => {
                    let href = state.mint("workloads");
                    state.workloads.push(Workload {
                        href: Some(href.clone()),
                        ..w.clone()
                    });
                    Some(href)
                }
            };
            results.push(BulkResult {
                href,
                status: match op {
                    BulkOp::Update => "updated".to_string(),
                    BulkOp::Create => "created".to_string(),
                },
                errors: Vec::new(),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    fn target(&self) -> String {
        "fake-pce".to_string()
    }

    async fn list_workloads(&self) -> anyhow::Result<Vec<Workload>> {
        Ok(self.state().workloads.clone())
    }

    async fn list_labels(&self) -> anyhow::Result<Vec<Label>> {
        Ok(self.state().labels.clone())
    }

    async fn create_label(
        &self,
        key: &str,
        value: &str,
    ) -> anyhow::Result<Label> {
        let mut state = self.state();
        state.calls.push(Call::CreateLabel(key.to_string(), value.to_string()));
        if state.fail_create_label {
            bail!("label service unavailable");
        }
        let created = label(&state.mint("labels"), key, value);
        state.labels.push(created.clone());
        Ok(created)
    }

    async fn bulk_update(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        self.bulk(BulkOp::Update, workloads)
    }

    async fn bulk_create(
        &self,
        workloads: &[Workload],
    ) -> anyhow::Result<Vec<BulkResult>> {
        self.bulk(BulkOp::Create, workloads)
    }
}
