//! CLI entry point and dispatch (spec §6 "External interfaces").
//!
//! Mirrors the teacher crate's `cli::run()` contract: this function
//! handles all output, including errors; `main.rs` only maps the
//! returned `ExitCode` to a process exit.

use clap::Parser;
use trialforge_config::Config;
use trialforge_utils::exit_codes::ExitCode;
use trialforge_utils::logging::init_logging;

use super::args::{Cli, Commands};
use crate::commands;

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "trialforge=debug,info" } else { "trialforge=info,warn" });

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return Err((&err).into());
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return Err(ExitCode::from(&trialforge_utils::error::EngineError::Io(err)));
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Extract { file, resume, job, out } => commands::extract::run(&config, &file, resume, job, out.as_deref()).await,
            Commands::Status { job, json } => commands::status::run(&config, &job, json).await,
            Commands::Resume { job, file, out } => commands::resume::run(&config, &job, &file, out.as_deref()).await,
            Commands::Soa { file, out } => commands::soa::run_detect(&config, &file, out.as_deref()).await,
            Commands::ConfirmPages { job, input } => commands::soa::run_confirm_pages(&config, &job, &input).await,
            Commands::ConfirmMerge { job } => commands::soa::run_confirm_merge(&config, &job).await,
            Commands::Eligibility { file, out } => commands::eligibility::run_detect(&config, &file, out.as_deref()).await,
            Commands::ConfirmSections { job, criterion } => commands::eligibility::run_confirm_sections(&config, &job, &criterion).await,
            Commands::Worker { phase, kind, job, protocol, file } => {
                commands::worker::run(&config, &phase, &kind, &job, &protocol, file.as_deref()).await
            }
        }
    });

    result.map_err(|err| {
        eprintln!("{err}");
        ExitCode::from(&err)
    })
}
