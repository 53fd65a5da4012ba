// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Composition root (C11). Wires the domain crate's Stage Registry and the
//! infra crate's concrete stores into a [`cp_whisperx::runner::PipelineRunner`],
//! installs the tracing subscriber and a Ctrl-C driven shutdown coordinator,
//! and runs whichever subcommand the CLI parsed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use cp_whisperx::runner::PipelineRunner;
use cp_whisperx::user_profile::UserProfileStore;
use cp_whisperx_bootstrap::cli::{Cli, Command};
use cp_whisperx_bootstrap::exit_code::result_to_exit_code;
use cp_whisperx_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
use cp_whisperx_bootstrap::shutdown::ShutdownCoordinator;
use cp_whisperx_domain::value_objects::workflow::Workflow;
use cp_whisperx_domain::PipelineError;

/// Root directory for per-user profiles, defaulting to `~/.cp-whisperx/users`
/// and overridable via `CP_WHISPERX_USERS_DIR` for tests and deployments
/// that don't want to touch the invoking user's home directory.
fn users_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CP_WHISPERX_USERS_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cp-whisperx").join("users")
}

/// Root directory for monthly cost logs, same override convention as
/// [`users_dir`].
fn cost_storage_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CP_WHISPERX_COST_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".cp-whisperx").join("costs")
}

/// Project root used to resolve job-level and global config layers. Jobs
/// are addressed by an absolute `--job-dir`, so this only matters for the
/// global config layer the resolver merges underneath it.
fn project_root() -> PathBuf {
    if let Ok(dir) = std::env::var("CP_WHISPERX_PROJECT_ROOT") {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = cp_whisperx::logging::init_subscriber("info") {
        eprintln!("warning: tracing subscriber already installed: {e}");
    }

    let cli = Cli::parse();
    let coordinator = ShutdownCoordinator::default();
    let token = coordinator.token();

    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("received Ctrl-C, initiating graceful shutdown");
            signal_coordinator.initiate_shutdown();
        }
    });

    let result = run(cli, &token).await;
    coordinator.complete_shutdown();
    result_to_exit_code(result)
}

async fn run(cli: Cli, token: &cp_whisperx_bootstrap::shutdown::CancellationToken) -> Result<(), PipelineError> {
    let logger = ConsoleLogger::with_prefix("cp-whisperx");
    match cli.command {
        Command::CreateUser { name, email } => {
            let store = UserProfileStore::new(users_dir());
            let user_id = store.create_new_user(name, email).await?;
            logger.info(&format!("created user {}", user_id.get()));
            println!("{}", user_id.get());
            Ok(())
        }
        Command::Run { job_dir, workflow } => {
            let workflow = Workflow::from_str(&workflow)?;
            logger.info(&format!("starting {workflow} run for job {}", job_dir.display()));
            let runner = PipelineRunner::new(project_root(), users_dir(), cost_storage_dir());
            runner.run(&job_dir, workflow, token).await?;
            logger.info("run completed");
            Ok(())
        }
    }
}
