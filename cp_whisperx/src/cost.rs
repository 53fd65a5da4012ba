// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cost Tracker (C6) — per-call cost computation, atomic monthly log
//! append, per-job/per-month aggregation, and budget threshold alerts.
//! `CostEntry`/`PricingTable` are pure domain data; this module owns
//! `~/.cp-whisperx/costs/{YYYY-MM}.json` and the profile lookups needed
//! for budget gating.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use cp_whisperx_domain::entities::cost_entry::{CostEntry, MonthlyCostLog, MonthlyCostLogMetadata, PricingTable};
use cp_whisperx_domain::value_objects::user_id::UserId;
use cp_whisperx_domain::PipelineError;

use crate::user_profile::UserProfileStore;
use crate::util::write_json_atomic;

pub struct CostTracker {
    storage_dir: PathBuf,
    pricing: PricingTable,
    user_id: UserId,
    job_dir: Option<PathBuf>,
    profile_store: UserProfileStore,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_calls: u64,
    pub unique_jobs: u64,
    pub avg_cost_per_job: f64,
    pub by_service: BTreeMap<String, f64>,
    pub by_model: BTreeMap<String, f64>,
}

/// `~/.cp-whisperx/costs`, falling back to `./.cp-whisperx/costs` if the
/// home directory can't be resolved (e.g. some sandboxed CI runners).
pub fn default_storage_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".cp-whisperx").join("costs"),
        None => PathBuf::from(".cp-whisperx").join("costs"),
    }
}

impl CostTracker {
    pub fn new(storage_dir: impl Into<PathBuf>, users_dir: impl Into<PathBuf>, user_id: UserId, job_dir: Option<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            pricing: PricingTable::default(),
            user_id,
            job_dir,
            profile_store: UserProfileStore::new(users_dir),
        }
    }

    pub fn with_pricing_table(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    fn month_file(&self, month: &str) -> PathBuf {
        self.storage_dir.join(format!("{month}.json"))
    }

    fn current_month() -> String {
        let now = Utc::now();
        format!("{:04}-{:02}", now.year(), now.month())
    }

    async fn load_month(&self, month: &str) -> Result<MonthlyCostLog, PipelineError> {
        Ok(crate::util::read_json_opt(&self.month_file(month)).await?.unwrap_or_default())
    }

    fn job_id_from_dir(&self) -> Option<String> {
        self.job_dir.as_ref().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().into_owned())
    }

    /// Computes cost, appends a `CostEntry` to the current UTC month's log
    /// (write-temp-then-rename), and surfaces any budget alert as a
    /// `tracing::warn!`/`tracing::error!`.
    pub async fn log_usage(
        &self,
        service: &str,
        model: &str,
        tokens_in: u64,
        tokens_out: u64,
        stage: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<f64, PipelineError> {
        let (cost, known) = self.pricing.cost(service, model, tokens_in, tokens_out);
        if !known {
            tracing::warn!(service, model, "no pricing entry for (service, model); logging cost as $0.00");
        }

        let entry = CostEntry {
            timestamp: Utc::now(),
            user_id: self.user_id.get(),
            job_id: self.job_id_from_dir(),
            service: service.to_string(),
            model: model.to_string(),
            tokens_input: tokens_in,
            tokens_output: tokens_out,
            tokens_total: tokens_in + tokens_out,
            cost_usd: cost,
            stage,
            metadata,
        };

        let month = Self::current_month();
        let mut log = self.load_month(&month).await?;
        log.entries.push(entry);
        log.metadata = Some(MonthlyCostLogMetadata { month: month.clone() });
        write_json_atomic(&self.month_file(&month), &log).await?;

        for alert in self.check_budget_alerts(None).await? {
            if alert.starts_with("CRITICAL") {
                tracing::error!("{alert}");
            } else {
                tracing::warn!("{alert}");
            }
        }

        Ok(cost)
    }

    /// Sums `costUsd` across every stored month for entries whose `jobId`
    /// matches (default: this tracker's bound `job_dir`'s directory name).
    pub async fn get_job_cost(&self, job_id: Option<&str>) -> Result<f64, PipelineError> {
        let target = job_id.map(str::to_string).or_else(|| self.job_id_from_dir());
        let Some(target) = target else {
            return Ok(0.0);
        };
        let mut total = 0.0;
        for log in self.all_months().await? {
            total += log.entries.iter().filter(|e| e.job_id.as_deref() == Some(target.as_str())).map(|e| e.cost_usd).sum::<f64>();
        }
        Ok(total)
    }

    /// Sums this UTC month's entries filtered by user (default: this
    /// tracker's bound `user_id`).
    pub async fn get_monthly_cost(&self, user_id: Option<UserId>) -> Result<f64, PipelineError> {
        let target = user_id.unwrap_or(self.user_id).get();
        let log = self.load_month(&Self::current_month()).await?;
        Ok(log.entries.iter().filter(|e| e.user_id == target).map(|e| e.cost_usd).sum())
    }

    pub async fn get_stage_costs(&self, job_id: Option<&str>) -> Result<BTreeMap<String, f64>, PipelineError> {
        let target = job_id.map(str::to_string).or_else(|| self.job_id_from_dir());
        let Some(target) = target else {
            return Ok(BTreeMap::new());
        };
        let mut out: BTreeMap<String, f64> = BTreeMap::new();
        for log in self.all_months().await? {
            for entry in log.entries.iter().filter(|e| e.job_id.as_deref() == Some(target.as_str())) {
                if let Some(stage) = &entry.stage {
                    *out.entry(stage.clone()).or_insert(0.0) += entry.cost_usd;
                }
            }
        }
        Ok(out)
    }

    pub async fn get_monthly_summary(&self, user_id: Option<UserId>) -> Result<MonthlySummary, PipelineError> {
        let target = user_id.unwrap_or(self.user_id).get();
        let month = Self::current_month();
        let log = self.load_month(&month).await?;

        let mut summary = MonthlySummary {
            month,
            ..Default::default()
        };
        let mut jobs = std::collections::BTreeSet::new();
        for entry in log.entries.iter().filter(|e| e.user_id == target) {
            summary.total_cost += entry.cost_usd;
            summary.total_tokens += entry.tokens_total;
            summary.total_calls += 1;
            if let Some(job_id) = &entry.job_id {
                jobs.insert(job_id.clone());
            }
            *summary.by_service.entry(entry.service.clone()).or_insert(0.0) += entry.cost_usd;
            *summary.by_model.entry(entry.model.clone()).or_insert(0.0) += entry.cost_usd;
        }
        summary.unique_jobs = jobs.len() as u64;
        summary.avg_cost_per_job = if summary.unique_jobs == 0 {
            0.0
        } else {
            summary.total_cost / summary.unique_jobs as f64
        };
        Ok(summary)
    }

    /// Loads `{monthlyLimitUsd, alertThresholdPercent}` from the user's
    /// profile, defaulting to `50.0`/`80.0` on any load failure. Emits
    /// exactly one message: `CRITICAL` at `>= 100%`, else `WARNING` at
    /// `>= threshold`, else none.
    pub async fn check_budget_alerts(&self, user_id: Option<UserId>) -> Result<Vec<String>, PipelineError> {
        let target = user_id.unwrap_or(self.user_id);
        let budget = self.load_budget(target).await;
        let spent = self.get_monthly_cost(Some(target)).await?;

        if budget.monthly_limit_usd <= 0.0 {
            return Ok(Vec::new());
        }
        let percent = spent / budget.monthly_limit_usd * 100.0;

        let message = if percent >= 100.0 {
            Some(format!(
                "CRITICAL: user {target} has spent ${spent:.2} of ${:.2} monthly budget ({percent:.0}%)",
                budget.monthly_limit_usd
            ))
        } else if percent >= budget.alert_threshold_percent {
            Some(format!(
                "WARNING: user {target} has spent ${spent:.2} of ${:.2} monthly budget ({percent:.0}%, threshold {:.0}%)",
                budget.monthly_limit_usd, budget.alert_threshold_percent
            ))
        } else {
            None
        };

        Ok(message.into_iter().collect())
    }

    pub async fn is_over_budget(&self, user_id: Option<UserId>) -> Result<bool, PipelineError> {
        let target = user_id.unwrap_or(self.user_id);
        let budget = self.load_budget(target).await;
        let spent = self.get_monthly_cost(Some(target)).await?;
        Ok(budget.monthly_limit_usd > 0.0 && spent >= budget.monthly_limit_usd)
    }

    /// Mean of input/output rates applied to the full token estimate.
    pub fn estimate_cost(&self, service: &str, model: &str, total_tokens: u64) -> f64 {
        self.pricing.estimate(service, model, total_tokens)
    }

    async fn load_budget(&self, user_id: UserId) -> cp_whisperx_domain::entities::user_profile::Budget {
        match self.profile_store.load(user_id).await {
            Ok(profile) => profile.budget,
            Err(_) => cp_whisperx_domain::entities::user_profile::Budget::default(),
        }
    }

    async fn all_months(&self) -> Result<Vec<MonthlyCostLog>, PipelineError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.storage_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(log) = crate::util::read_json_opt::<MonthlyCostLog>(&path).await? {
                    out.push(log);
                }
            }
        }
        Ok(out)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}
