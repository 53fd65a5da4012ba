// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `StageManifest` and `FileRecord` — the shape accumulated by the Manifest
//! & Hash Tracker (C2) and written to `stageDir/manifest.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value_objects::file_hash::FileHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Success,
    Failed,
    Skipped,
    SuccessWithWarnings,
    /// Extra, precise status recorded on a resume-skip so the job-level
    /// manifest can distinguish "not run" from "hash-matched, reused".
    SkippedIdempotent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub hash: FileHash,
    pub size: u64,
    #[serde(default)]
    pub attrs: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateRecord {
    #[serde(flatten)]
    pub record: FileRecord,
    pub retained: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageManifest {
    pub stage: String,
    pub job_id: String,
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub exit_code: i32,
    pub status: StageStatus,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub inputs: Vec<FileRecord>,
    #[serde(default)]
    pub outputs: Vec<FileRecord>,
    #[serde(default)]
    pub intermediates: Vec<IntermediateRecord>,
    #[serde(default)]
    pub errors: Vec<StageError>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl StageManifest {
    /// True iff every output path is lexically below `stage_dir` (stage
    /// containment invariant, §8 property 3). Paths are compared as given;
    /// callers are expected to pass canonicalized/relativized paths.
    pub fn outputs_contained_in(&self, stage_dir: &std::path::Path) -> bool {
        self.outputs.iter().all(|o| std::path::Path::new(&o.path).starts_with(stage_dir))
    }
}
