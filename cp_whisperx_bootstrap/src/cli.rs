// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Thin `clap`-derived CLI surface (C11). Parsing and validation only;
//! `main.rs` owns everything the parsed values get used for.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cp-whisperx", about = "Staged media transcription, translation, and subtitling pipeline", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a job directory through a workflow's stage sequence. The
    /// owning user id is read from the job directory's own job.json.
    Run {
        /// Job directory containing job.json and a source media file.
        #[arg(long, value_name = "PATH")]
        job_dir: PathBuf,

        /// Which workflow to run: transcribe, translate, or subtitle.
        #[arg(long)]
        workflow: String,
    },

    /// Provision a new user profile and print its assigned user id.
    CreateUser {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_subcommand_parses_required_flags() {
        let cli = Cli::parse_from(["cp-whisperx", "run", "--job-dir", "/tmp/job1", "--workflow", "transcribe"]);
        match cli.command {
            Command::Run { job_dir, workflow } => {
                assert_eq!(job_dir, PathBuf::from("/tmp/job1"));
                assert_eq!(workflow, "transcribe");
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn create_user_subcommand_parses_optional_flags() {
        let cli = Cli::parse_from(["cp-whisperx", "create-user", "--name", "Ada", "--email", "ada@example.com"]);
        match cli.command {
            Command::CreateUser { name, email } => {
                assert_eq!(name.as_deref(), Some("Ada"));
                assert_eq!(email.as_deref(), Some("ada@example.com"));
            }
            _ => panic!("expected CreateUser command"),
        }
    }

    #[test]
    fn create_user_subcommand_allows_omitted_flags() {
        let cli = Cli::parse_from(["cp-whisperx", "create-user"]);
        match cli.command {
            Command::CreateUser { name, email } => {
                assert!(name.is_none());
                assert!(email.is_none());
            }
            _ => panic!("expected CreateUser command"),
        }
    }
}
