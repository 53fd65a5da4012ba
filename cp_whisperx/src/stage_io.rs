// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stage I/O Substrate and Manifest & Hash Tracker (C1/C2).
//!
//! A [`StageIoHandle`] is the only way stage code touches the filesystem:
//! it resolves input/output paths within the job directory, tracks every
//! file it sees into an in-memory [`StageManifest`] builder, and persists
//! that manifest atomically on `finalize`. Modeled on the teacher's
//! transactional output-writer (`infrastructure/services/binary_format.rs`),
//! which stages a `.tmp` path and renames it into place on commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use cp_whisperx_domain::entities::stage_manifest::{FileRecord, IntermediateRecord, StageError, StageManifest, StageStatus};
use cp_whisperx_domain::services::stage_registry::StageRegistry;
use cp_whisperx_domain::value_objects::file_hash::FileHash;
use cp_whisperx_domain::PipelineError;
use tracing::instrument;

use crate::util::{hash_file, write_json_atomic};

/// An open, in-progress stage's filesystem handle. Exactly one `finalize`
/// call is expected per handle; an un-finalized handle logs an error on
/// drop instead of panicking.
pub struct StageIoHandle {
    job_id: String,
    job_dir: PathBuf,
    stage_name: String,
    stage_dir: PathBuf,
    enable_manifest: bool,
    start_time: chrono::DateTime<Utc>,
    config: BTreeMap<String, serde_json::Value>,
    inputs: Vec<FileRecord>,
    outputs: Vec<FileRecord>,
    intermediates: Vec<IntermediateRecord>,
    errors: Vec<StageError>,
    warnings: Vec<String>,
    finalized: bool,
}

impl StageIoHandle {
    /// Resolves `stageDir` via the Stage Registry ordinal, creates it if
    /// absent, and opens the per-stage log file at `stageDir/stage.log`.
    #[instrument(skip(job_dir))]
    pub async fn open(stage_name: &str, job_dir: &Path, job_id: &str, enable_manifest: bool) -> Result<Self, PipelineError> {
        let registry = StageRegistry::new();
        let dir_name = registry
            .dir_name(stage_name)
            .ok_or_else(|| PipelineError::invalid_config(format!("unknown stage: {stage_name}")))?;
        let stage_dir = job_dir.join(dir_name);
        tokio::fs::create_dir_all(&stage_dir).await?;

        // Touch the per-stage log file so `getStageLogger` has somewhere to append.
        let log_path = stage_dir.join("stage.log");
        if tokio::fs::metadata(&log_path).await.is_err() {
            tokio::fs::write(&log_path, b"").await?;
        }

        Ok(Self {
            job_id: job_id.to_string(),
            job_dir: job_dir.to_path_buf(),
            stage_name: stage_name.to_string(),
            stage_dir,
            enable_manifest,
            start_time: Utc::now(),
            config: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            intermediates: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            finalized: false,
        })
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Resolves an input path: `fromStage`'s directory if given, else one
    /// ordinal back; falls back to `jobDir/filename` on miss. Never raises
    /// on absence — callers check existence themselves.
    pub fn get_input_path(&self, filename: &str, from_stage: Option<&str>) -> PathBuf {
        let registry = StageRegistry::new();
        if let Some(from) = from_stage {
            if let Some(dir_name) = registry.dir_name(from) {
                return self.job_dir.join(dir_name).join(filename);
            }
        } else if let Some(my_ordinal) = registry.ordinal(&self.stage_name) {
            if my_ordinal > 1 {
                if let Some(prev_name) = registry.name_from_ordinal(my_ordinal - 1) {
                    if let Some(dir_name) = registry.dir_name(prev_name) {
                        return self.job_dir.join(dir_name).join(filename);
                    }
                }
            }
        }
        self.job_dir.join(filename)
    }

    /// Always resolves inside this stage's own directory.
    pub fn get_output_path(&self, filename: &str) -> PathBuf {
        self.stage_dir.join(filename)
    }

    async fn build_record(&self, path: &Path, kind: &str, format: Option<String>, attrs: BTreeMap<String, serde_json::Value>) -> FileRecord {
        let (hash, size) = match tokio::fs::metadata(path).await {
            Ok(meta) => (hash_file(path).await.unwrap_or_else(|_| FileHash::placeholder()), meta.len()),
            Err(_) => (FileHash::placeholder(), 0),
        };
        FileRecord {
            path: path.display().to_string(),
            kind: kind.to_string(),
            format,
            hash,
            size,
            attrs,
        }
    }

    pub async fn track_input(&mut self, path: &Path, kind: &str) {
        let record = self.build_record(path, kind, None, BTreeMap::new()).await;
        self.inputs.push(record);
    }

    pub async fn track_output(&mut self, path: &Path, kind: &str) {
        let record = self.build_record(path, kind, None, BTreeMap::new()).await;
        self.outputs.push(record);
    }

    pub async fn track_intermediate(&mut self, path: &Path, retained: bool, reason: impl Into<String>) {
        let record = self.build_record(path, "intermediate", None, BTreeMap::new()).await;
        self.intermediates.push(IntermediateRecord {
            record,
            retained,
            reason: reason.into(),
        });
    }

    pub fn add_error(&mut self, message: impl Into<String>, cause: Option<String>) {
        self.errors.push(StageError {
            message: message.into(),
            cause,
        });
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_config(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.config.insert(key.into(), value);
    }

    pub fn add_config(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.set_config(key, value);
    }

    /// Flushes the manifest atomically. A finalized handle must not be
    /// used again; callers are expected to drop it immediately after.
    pub async fn finalize(mut self, status: StageStatus) -> Result<StageManifest, PipelineError> {
        let manifest = StageManifest {
            stage: self.stage_name.clone(),
            job_id: self.job_id.clone(),
            start_time: self.start_time.to_rfc3339(),
            end_time: Some(Utc::now().to_rfc3339()),
            exit_code: if matches!(status, StageStatus::Failed) { 1 } else { 0 },
            status,
            config: std::mem::take(&mut self.config),
            inputs: std::mem::take(&mut self.inputs),
            outputs: std::mem::take(&mut self.outputs),
            intermediates: std::mem::take(&mut self.intermediates),
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        };

        if self.enable_manifest {
            let manifest_path = self.stage_dir.join("manifest.json");
            write_json_atomic(&manifest_path, &manifest).await?;
        }

        self.finalized = true;
        Ok(manifest)
    }

    /// Reads back a prior `manifest.json` for resume-skip checks; `None`
    /// if this stage has never run.
    pub async fn load_existing_manifest(stage_dir: &Path) -> Result<Option<StageManifest>, PipelineError> {
        crate::util::read_json_opt(&stage_dir.join("manifest.json")).await
    }

    /// Appends a line to the per-stage log file with `{jobId, stage}`
    /// fields, mirroring `getStageLogger`'s contract. Process-wide logging
    /// goes through `tracing` directly; this is the file sink half.
    pub async fn log_line(&self, level: &str, message: &str) -> Result<(), PipelineError> {
        use tokio::io::AsyncWriteExt;

        let line = format!(
            "{} [{}] job={} stage={} {}\n",
            Utc::now().to_rfc3339(),
            level,
            self.job_id,
            self.stage_name,
            message
        );
        let mut file = tokio::fs::OpenOptions::new().append(true).create(true).open(self.stage_dir.join("stage.log")).await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

impl Drop for StageIoHandle {
    fn drop(&mut self) {
        if !self.finalized {
            tracing::error!(job_id = %self.job_id, stage = %self.stage_name, "StageIoHandle dropped without finalize()");
            debug_assert!(self.finalized, "stage handle must be finalized before drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_numbered_stage_directory() {
        let job_dir = tempdir().unwrap();
        let handle = StageIoHandle::open("demux", job_dir.path(), "job-1", true).await.unwrap();
        assert!(handle.stage_dir().ends_with("01_demux"));
        assert!(tokio::fs::metadata(handle.stage_dir()).await.is_ok());
        handle.finalize(StageStatus::Success).await.unwrap();
    }

    #[tokio::test]
    async fn get_input_path_falls_back_one_ordinal() {
        let job_dir = tempdir().unwrap();
        let handle = StageIoHandle::open("tmdb", job_dir.path(), "job-1", true).await.unwrap();
        let input = handle.get_input_path("audio.wav", None);
        assert!(input.ends_with("01_demux/audio.wav"));
        handle.finalize(StageStatus::Success).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_writes_manifest_atomically() {
        let job_dir = tempdir().unwrap();
        let mut handle = StageIoHandle::open("demux", job_dir.path(), "job-1", true).await.unwrap();
        let out_path = handle.get_output_path("audio.wav");
        tokio::fs::write(&out_path, b"fake audio").await.unwrap();
        handle.track_output(&out_path, "audio").await;
        let manifest = handle.finalize(StageStatus::Success).await.unwrap();
        assert_eq!(manifest.outputs.len(), 1);

        let reloaded = StageIoHandle::load_existing_manifest(&job_dir.path().join("01_demux")).await.unwrap();
        assert!(reloaded.is_some());
    }

    #[tokio::test]
    async fn load_existing_manifest_is_none_for_unrun_stage() {
        let job_dir = tempdir().unwrap();
        let result = StageIoHandle::load_existing_manifest(&job_dir.path().join("01_demux")).await.unwrap();
        assert!(result.is_none());
    }
}
