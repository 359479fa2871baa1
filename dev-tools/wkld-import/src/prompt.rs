// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::bail;
use reedline::DefaultPrompt;
use reedline::DefaultPromptSegment;
use reedline::Reedline;
use wkld_reconciler::Confirmation;

/// Asks the operator on the terminal
pub struct ConfirmationPrompt(Reedline);

impl ConfirmationPrompt {
    pub fn new() -> Self {
        Self(Reedline::create())
    }
}

impl Confirmation for ConfirmationPrompt {
    fn ask(&mut self, message: &str) -> anyhow::Result<String> {
        // Only the last line goes in the prompt itself.
        let message = message.trim_end();
        let (preamble, question) = match message.rsplit_once('\n') {
            Some((preamble, question)) => (Some(preamble), question),
            None => (None, message),
        };
        if let Some(preamble) = preamble {
            println!("{preamble}");
        }

        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(question.to_string()),
            DefaultPromptSegment::Empty,
        );
        if let Ok(reedline::Signal::Success(input)) = self.0.read_line(&prompt)
        {
            Ok(input)
        } else {
            bail!("operation aborted")
        }
    }
}
