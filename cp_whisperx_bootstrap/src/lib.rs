// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Crate (C11)
//!
//! Sits outside the domain/infra layering and owns everything a process
//! needs that isn't pipeline logic:
//!
//! - **CLI** — `clap`-derived argument parsing (`cli`)
//! - **Logging** — installs the `tracing-subscriber` (delegates to
//!   `cp_whisperx::logging`)
//! - **Shutdown** — a `CancellationToken`/`ShutdownCoordinator` pair,
//!   Ctrl-C driven (`shutdown`)
//! - **Exit codes** — maps a `Result<(), PipelineError>` to a process exit
//!   code (`exit_code`)
//!
//! `main.rs` is the composition root: it wires the domain's Stage Registry
//! and the infra crate's concrete stores together into a `PipelineRunner`
//! and drives the CLI's two subcommands.

pub mod cli;
pub mod exit_code;
pub mod logger;
pub mod shutdown;

pub use cli::{Cli, Command};
pub use exit_code::{map_error_to_exit_code, result_to_exit_code};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
