// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Import workloads and their labels from a CSV file into a PCE

use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use clap::ValueEnum;
use inventory_client::PceClient;
use slog::Drain;
use slog::Logger;
use slog::info;
use slog::o;
use slog_term::FullFormat;
use slog_term::PlainDecorator;
use slog_term::TermDecorator;
use std::collections::BTreeMap;
use wkld_reconciler::ApplyMode;
use wkld_reconciler::DEFAULT_LABEL_DIMENSIONS;
use wkld_reconciler::DEFAULT_REMOVE_VALUE;
use wkld_reconciler::EntityFilter;
use wkld_reconciler::ImportOutcome;
use wkld_reconciler::MatchStrategy;
use wkld_reconciler::RunConfig;
use wkld_reconciler::run_import;

mod config;
mod csv_input;
mod prompt;

use config::Config;
use prompt::ConfirmationPrompt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = WkldImport::parse();

    if let Err(error) = args.exec().await {
        eprintln!("error: {:#}", error);
        std::process::exit(1);
    }

    Ok(())
}

/// Create and update workloads in a PCE from a CSV file
///
/// Without `--update-pce`, reports what would change and exits.
#[derive(Debug, Parser)]
#[command(version)]
struct WkldImport {
    /// CSV file with a header row; one workload per following row
    input: Utf8PathBuf,

    /// TOML file with PCE connection settings
    #[arg(long, short, default_value = "pce.toml")]
    config: Utf8PathBuf,

    /// PCE API key, instead of the one in the config file
    #[arg(long, env = "WKLD_IMPORT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Column used to match rows to existing workloads
    #[arg(long = "match", value_enum, default_value_t = MatchArg::Hostname)]
    match_strategy: MatchArg,

    /// Compare match values case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Create unmanaged workloads for rows that match nothing
    #[arg(long)]
    create: bool,

    /// Do not update workloads that already exist
    #[arg(long)]
    no_update: bool,

    /// Only consider managed workloads when matching
    #[arg(long, conflicts_with = "unmanaged_only")]
    managed_only: bool,

    /// Only consider unmanaged workloads when matching
    #[arg(long)]
    unmanaged_only: bool,

    /// Cell value that clears a field or removes a label
    #[arg(long)]
    remove_value: Option<String>,

    /// Additional label key to accept as a column (repeatable)
    #[arg(long = "label-dimension", value_name = "KEY")]
    label_dimensions: Vec<String>,

    #[arg(long, hide = true)]
    role_prefix: Option<String>,
    #[arg(long, hide = true)]
    app_prefix: Option<String>,
    #[arg(long, hide = true)]
    env_prefix: Option<String>,
    #[arg(long, hide = true)]
    loc_prefix: Option<String>,

    /// Make the changes in the PCE (otherwise, only report them)
    #[arg(long)]
    update_pce: bool,

    /// With --update-pce, do not ask for confirmation first
    #[arg(long, requires = "update_pce")]
    no_prompt: bool,

    /// log level filter
    #[arg(long, value_parser = parse_log_level, default_value = "info")]
    log_level: slog::Level,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<Utf8PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MatchArg {
    Href,
    Hostname,
    Name,
    ExternalData,
}

impl From<MatchArg> for MatchStrategy {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Href => MatchStrategy::Href,
            MatchArg::Hostname => MatchStrategy::Hostname,
            MatchArg::Name => MatchStrategy::Name,
            MatchArg::ExternalData => MatchStrategy::ExternalData,
        }
    }
}

fn parse_log_level(s: &str) -> Result<slog::Level, anyhow::Error> {
    s.parse().map_err(|()| anyhow!("unknown log level {s:?}"))
}

impl WkldImport {
    async fn exec(self) -> Result<(), anyhow::Error> {
        let log = build_logger(self.log_level, self.log_file.as_deref())?;

        let mut config = Config::from_file(&self.config)?;
        if let Some(api_key) = &self.api_key {
            config.pce.api_key = api_key.clone();
        }
        if config.pce.api_key.is_empty() {
            bail!(
                "no API key: set api_key in {} or WKLD_IMPORT_API_KEY",
                self.config
            );
        }

        let run_config = self.run_config(&config);
        run_config.validate()?;

        let rows = csv_input::read_rows(&self.input)?;
        info!(
            log,
            "read input";
            "path" => %self.input,
            "rows" => rows.len().saturating_sub(1),
        );

        let client = PceClient::new(&log, &config.pce)?;
        let mut prompt = ConfirmationPrompt::new();
        let outcome =
            run_import(&log, &run_config, &rows, &client, &mut prompt).await?;

        match outcome {
            ImportOutcome::NothingToDo(summary) => {
                println!("{summary}nothing to be done");
            }
            ImportOutcome::NotApplied { summary, decision } => {
                println!("{summary}not applied ({decision:?})");
            }
            ImportOutcome::Applied { summary, applied } => {
                println!(
                    "{summary}created {} labels, updated {} workloads, \
                     created {} workloads",
                    applied.labels_created,
                    applied.workloads_updated,
                    applied.workloads_created,
                );
            }
        }
        Ok(())
    }

    fn run_config(&self, config: &Config) -> RunConfig {
        let entity_filter = if self.managed_only {
            EntityFilter::ManagedOnly
        } else if self.unmanaged_only {
            EntityFilter::UnmanagedOnly
        } else {
            EntityFilter::All
        };
        let apply_mode = match (self.update_pce, self.no_prompt) {
            (false, _) => ApplyMode::ReportOnly,
            (true, false) => ApplyMode::Confirm,
            (true, true) => ApplyMode::Unattended,
        };
        let remove_value = self
            .remove_value
            .clone()
            .or_else(|| config.import.remove_value.clone())
            .unwrap_or_else(|| DEFAULT_REMOVE_VALUE.to_string());

        let mut label_dimensions: Vec<String> =
            match &config.import.label_dimensions {
                Some(dimensions) => dimensions.clone(),
                None => DEFAULT_LABEL_DIMENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            };
        label_dimensions.extend(self.label_dimensions.iter().cloned());

        let label_prefixes: BTreeMap<String, String> = [
            ("role", &self.role_prefix),
            ("app", &self.app_prefix),
            ("env", &self.env_prefix),
            ("loc", &self.loc_prefix),
        ]
        .into_iter()
        .filter_map(|(key, prefix)| {
            prefix.as_ref().map(|p| (key.to_string(), p.clone()))
        })
        .collect();

        RunConfig {
            match_strategy: self.match_strategy.into(),
            ignore_case: self.ignore_case,
            create_missing: self.create,
            update_existing: !self.no_update,
            entity_filter,
            remove_value,
            label_dimensions: label_dimensions.into_iter().collect(),
            label_prefixes,
            apply_mode,
        }
    }
}

fn build_logger(
    level: slog::Level,
    log_file: Option<&Utf8Path>,
) -> Result<Logger, anyhow::Error> {
    let decorator = TermDecorator::new().stderr().build();
    let term = FullFormat::new(decorator).build().fuse();

    let drain = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("error opening log file {path}"))?;
            let file =
                FullFormat::new(PlainDecorator::new(file)).build().fuse();
            slog_async::Async::new(slog::Duplicate::new(term, file).fuse())
                .build()
                .fuse()
        }
        None => slog_async::Async::new(term).build().fuse(),
    };
    let drain = slog::LevelFilter::new(drain, level).fuse();
    Ok(Logger::root(drain, o!("component" => "wkld-import")))
}
