// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Pipeline Runner (C10) — drives a workflow's stage list through
//! C1/C3/C4/C5/C6, enforces the pre-run budget gate, persists a
//! job-level manifest, and honors cancellation. The actual ML/ffmpeg
//! stage bodies are injected as [`StageHandler`] implementations, kept
//! pluggable behind the trait the same way the domain crate's
//! collaborator ports keep external services out of this crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cp_whisperx_domain::entities::stage_manifest::StageStatus;
use cp_whisperx_domain::entities::user_profile::UserProfile;
use cp_whisperx_domain::services::stage_registry::StageRegistry;
use cp_whisperx_domain::value_objects::user_id::UserId;
use cp_whisperx_domain::value_objects::workflow::Workflow;
use cp_whisperx_domain::PipelineError;

use crate::config::{JobConfigResolver, ResolvedConfig};
use crate::cost::CostTracker;
use crate::stage_io::StageIoHandle;
use crate::user_profile::UserProfileStore;
use crate::util::write_json_atomic;

/// Abstracts over a cancellation signal without this crate depending on
/// any particular runtime's concrete token type. Implemented for the
/// bootstrap crate's `ShutdownCoordinator`-backed token at the seam
/// between infra and bootstrap.
#[async_trait]
pub trait Cancellable: Send + Sync {
    fn is_cancelled(&self) -> bool;
    async fn cancelled(&self);
}

/// A never-cancels token for callers that don't need cooperative
/// cancellation (tests, one-off CLI invocations without Ctrl-C wiring).
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

#[async_trait]
impl Cancellable for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }

    async fn cancelled(&self) {
        std::future::pending::<()>().await;
    }
}

/// The pluggable body of one pipeline stage. Orchestration (resume-skip,
/// manifest bookkeeping, budget gating, cancellation) lives in the
/// runner; everything ML/ffmpeg-specific lives behind this trait.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn execute(&self, io: &mut StageIoHandle, config: &ResolvedConfig, profile: &UserProfile) -> Result<StageStatus, PipelineError>;
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobManifestEntry {
    pub stage: String,
    pub status: StageStatus,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct JobManifest {
    pub job_id: String,
    pub user_id: u64,
    pub workflow: Workflow,
    pub start_time: String,
    pub end_time: Option<String>,
    pub total_cost_usd: f64,
    pub stages: Vec<JobManifestEntry>,
}

pub struct PipelineRunner {
    project_root: PathBuf,
    users_dir: PathBuf,
    cost_storage_dir: PathBuf,
    config_resolver: tokio::sync::Mutex<JobConfigResolver>,
    profile_store: UserProfileStore,
    stage_handlers: HashMap<&'static str, Arc<dyn StageHandler>>,
    enable_manifest: bool,
}

impl PipelineRunner {
    pub fn new(project_root: impl Into<PathBuf>, users_dir: impl Into<PathBuf>, cost_storage_dir: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let users_dir = users_dir.into();
        Self {
            config_resolver: tokio::sync::Mutex::new(JobConfigResolver::new(project_root.clone())),
            profile_store: UserProfileStore::new(users_dir.clone()),
            project_root,
            users_dir,
            cost_storage_dir: cost_storage_dir.into(),
            stage_handlers: HashMap::new(),
            enable_manifest: true,
        }
    }

    pub fn with_stage_handler(mut self, stage: &'static str, handler: Arc<dyn StageHandler>) -> Self {
        self.stage_handlers.insert(stage, handler);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn job_id_and_user_id(config: &ResolvedConfig, job_dir: &Path) -> Result<(String, UserId), PipelineError> {
        let job_id = config.get_string(
            "jobId",
            job_dir.file_name().and_then(|n| n.to_str()).unwrap_or("unknown-job"),
        );
        let user_id_raw = config.get_int("userId", 0);
        let user_id = UserId::new(user_id_raw.max(0) as u64).ok_or_else(|| PipelineError::invalid_config("job.json is missing a valid userId"))?;
        Ok((job_id, user_id))
    }

    /// Runs every stage `stagesForWorkflow(workflow)` names, honoring
    /// resume-skip, the budget pre-gate, and cancellation, then writes
    /// `jobDir/manifest.json`.
    pub async fn run(&self, job_dir: &Path, workflow: Workflow, cancel: &dyn Cancellable) -> Result<JobManifest, PipelineError> {
        let start_time = Utc::now();
        let config = self.config_resolver.lock().await.resolve(job_dir, false).await?;
        let (job_id, user_id) = Self::job_id_and_user_id(&config, job_dir)?;

        let profile = self.profile_store.load(user_id).await?;
        profile.validate_for_workflow(workflow)?;

        let cost_tracker = CostTracker::new(self.cost_storage_dir.clone(), self.users_dir.clone(), user_id, Some(job_dir.to_path_buf()));

        // Pre-gate: a user already over budget may not start a new job at all.
        if cost_tracker.is_over_budget(Some(user_id)).await? {
            return Err(PipelineError::budget_exceeded(cost_tracker.get_monthly_cost(Some(user_id)).await?, 0.0));
        }
        for alert in cost_tracker.check_budget_alerts(Some(user_id)).await? {
            tracing::warn!("{alert}");
        }

        let registry = StageRegistry::new();
        let stages = registry.stages_for_workflow(workflow);
        let mut entries = Vec::with_capacity(stages.len());

        for stage_name in stages {
            if cancel.is_cancelled() {
                return self.abort_cancelled(job_dir, &job_id, user_id.get(), workflow, start_time, entries, &cost_tracker).await;
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.abort_cancelled(job_dir, &job_id, user_id.get(), workflow, start_time, entries, &cost_tracker).await;
                }
                result = self.run_stage(stage_name, job_dir, &job_id, &config, &profile) => result?,
            };

            entries.push(JobManifestEntry {
                stage: stage_name.to_string(),
                status,
            });
        }

        let manifest = JobManifest {
            job_id: job_id.clone(),
            user_id: user_id.get(),
            workflow,
            start_time: start_time.to_rfc3339(),
            end_time: Some(Utc::now().to_rfc3339()),
            total_cost_usd: cost_tracker.get_job_cost(Some(job_id.as_str())).await?,
            stages: entries,
        };
        write_json_atomic(&job_dir.join("manifest.json"), &manifest).await?;
        Ok(manifest)
    }

    async fn run_stage(&self, stage_name: &str, job_dir: &Path, job_id: &str, config: &ResolvedConfig, profile: &UserProfile) -> Result<StageStatus, PipelineError> {
        let registry = StageRegistry::new();
        let dir_name = registry.dir_name(stage_name).ok_or_else(|| PipelineError::invalid_config(format!("unknown stage: {stage_name}")))?;
        let stage_dir = job_dir.join(&dir_name);

        if let Some(existing) = StageIoHandle::load_existing_manifest(&stage_dir).await? {
            if matches!(existing.status, StageStatus::Success | StageStatus::SuccessWithWarnings | StageStatus::SkippedIdempotent)
                && existing.outputs_contained_in(&stage_dir)
                && Self::outputs_still_match(&existing).await
            {
                tracing::info!(stage = stage_name, "resume: reusing prior successful output");
                return Ok(StageStatus::SkippedIdempotent);
            }
        }

        let handler = self
            .stage_handlers
            .get(stage_name)
            .ok_or_else(|| PipelineError::internal_consistency(format!("no stage handler registered for {stage_name}")))?
            .clone();

        let mut io = StageIoHandle::open(stage_name, job_dir, job_id, self.enable_manifest).await?;
        match handler.execute(&mut io, config, profile).await {
            Ok(status) => {
                io.finalize(status).await?;
                Ok(status)
            }
            Err(err) => {
                io.add_error(err.to_string(), None);
                io.finalize(StageStatus::Failed).await?;
                Err(err)
            }
        }
    }

    /// Verifies every tracked output's hash still matches what's on disk,
    /// guarding against a stage directory being tampered with between
    /// runs. Hashing happens lazily only when a resume is otherwise
    /// eligible, since it's skipped entirely on a cold run.
    async fn outputs_still_match(manifest: &cp_whisperx_domain::entities::stage_manifest::StageManifest) -> bool {
        for output in &manifest.outputs {
            let path = Path::new(&output.path);
            match crate::util::hash_file(path).await {
                Ok(hash) if hash == output.hash => continue,
                _ => return false,
            }
        }
        true
    }

    async fn abort_cancelled(
        &self,
        job_dir: &Path,
        job_id: &str,
        user_id: u64,
        workflow: Workflow,
        start_time: chrono::DateTime<Utc>,
        entries: Vec<JobManifestEntry>,
        cost_tracker: &CostTracker,
    ) -> Result<JobManifest, PipelineError> {
        tracing::warn!(job_id, "pipeline run cancelled");
        let manifest = JobManifest {
            job_id: job_id.to_string(),
            user_id,
            workflow,
            start_time: start_time.to_rfc3339(),
            end_time: Some(Utc::now().to_rfc3339()),
            total_cost_usd: cost_tracker.get_job_cost(Some(job_id)).await.unwrap_or(0.0),
            stages: entries,
        };
        let _ = write_json_atomic(&job_dir.join("manifest.json"), &manifest).await;
        Err(PipelineError::cancelled(format!("job {job_id} cancelled")))
    }
}
