// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process Exit Codes
//!
//! Maps the outcome of a CLI run to a `std::process::ExitCode`. A clean run
//! exits `0`; a cancelled run (Ctrl-C during shutdown) exits `130` (standard
//! `128 + SIGINT`); everything else from [`cp_whisperx_domain::PipelineError`]
//! exits via its own `exit_code()`.

use cp_whisperx_domain::PipelineError;
use std::process::ExitCode;

/// Converts a run's `Result` into a process exit code, printing the error
/// to stderr first if the run failed.
pub fn result_to_exit_code(result: Result<(), PipelineError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            map_error_to_exit_code(&err)
        }
    }
}

/// Maps a [`PipelineError`] to its process exit code without consuming it.
pub fn map_error_to_exit_code(err: &PipelineError) -> ExitCode {
    ExitCode::from(err.exit_code() as u8)
}
