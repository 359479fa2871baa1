// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single decision point between planning and mutating the remote

use crate::change_set::ChangeSetSummary;
use slog::Logger;
use slog::info;
use slog::warn;
use slog_error_chain::InlineErrorChain;

/// How a run treats a non-empty change set
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// Log what would change, then stop
    #[default]
    ReportOnly,
    /// Ask the operator, and apply only on "yes"
    Confirm,
    /// Apply without asking
    Unattended,
}

/// Source of the operator's answer for [`ApplyMode::Confirm`]
pub trait Confirmation {
    /// Shows `message` and returns the line the operator typed
    fn ask(&mut self, message: &str) -> anyhow::Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Apply,
    ReportOnly,
    Declined,
}

/// Decides whether to apply a change set summarized by `summary`
///
/// `target` names the remote inventory in the prompt.  This is evaluated once
/// per run, after planning is complete.
pub fn evaluate_gate(
    log: &Logger,
    mode: ApplyMode,
    summary: &ChangeSetSummary,
    target: &str,
    confirmation: &mut dyn Confirmation,
) -> GateDecision {
    match mode {
        ApplyMode::ReportOnly => {
            info!(
                log,
                "report only; the remote inventory was not changed"
            );
            GateDecision::ReportOnly
        }
        ApplyMode::Unattended => GateDecision::Apply,
        ApplyMode::Confirm => {
            let message = format!(
                "{summary}\nDo you want to run the import to {target} \
                 (yes/no)? "
            );
            match confirmation.ask(&message) {
                Ok(answer) if answer.trim().eq_ignore_ascii_case("yes") => {
                    GateDecision::Apply
                }
                Ok(answer) => {
                    info!(log, "prompt denied"; "answer" => answer);
                    GateDecision::Declined
                }
                Err(error) => {
                    warn!(
                        log,
                        "no answer to prompt; treating as denied";
                        "error" => InlineErrorChain::new(&*error),
                    );
                    GateDecision::Declined
                }
            }
        }
    }
}
