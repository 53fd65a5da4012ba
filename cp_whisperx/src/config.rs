// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Job Configuration Resolver (C4).
//!
//! Merges two sources, later overriding: a process-level `.env`-style file
//! (default `config/.env.pipeline`) and `jobDir/job.json`. The env-file
//! format is flat `KEY=VALUE` with `#` comments, so it is hand-rolled here
//! rather than pulling in `dotenvy`/`config` for a format this system
//! doesn't otherwise need (recorded in DESIGN.md).
//!
//! A legacy secrets file (default `config/secrets.json`) is read only for
//! backward compatibility; new credential paths belong in the User
//! Profile Store (C5).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cp_whisperx_domain::PipelineError;
use regex::Regex;

const DEFAULT_ENV_FILE: &str = "config/.env.pipeline";
const DEFAULT_SECRETS_FILE: &str = "config/secrets.json";

/// A merged, typed view over the env file and `job.json` for one job
/// directory. Values are stored as raw strings; typed accessors parse on
/// read, returning the caller-supplied default on any failure rather than
/// raising — unknown keys never abort a run.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    values: BTreeMap<String, String>,
    /// The parsed `job.json` body, kept alongside the flattened string
    /// view for structured access (workflow, mediaProcessing, etc.).
    pub job_descriptor: Option<serde_json::Value>,
}

impl ResolvedConfig {
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.values.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(String::as_str) {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        static INT_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let re = INT_RE.get_or_init(|| Regex::new(r"^-?\d+$").expect("static regex is valid"));
        match self.values.get(key) {
            Some(raw) if re.is_match(raw) => raw.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        static FLOAT_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let re = FLOAT_RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static regex is valid"));
        match self.values.get(key) {
            Some(raw) if re.is_match(raw) => raw.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(raw) if !raw.is_empty() => raw.split(',').map(|s| s.trim().to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

pub struct JobConfigResolver {
    project_root: PathBuf,
    env_file: PathBuf,
    secrets_file: PathBuf,
    cache: BTreeMap<PathBuf, ResolvedConfig>,
}

impl JobConfigResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            env_file: project_root.join(DEFAULT_ENV_FILE),
            secrets_file: project_root.join(DEFAULT_SECRETS_FILE),
            project_root,
            cache: BTreeMap::new(),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolves config for `job_dir`, using the per-directory cache unless
    /// `force_reload` is set.
    pub async fn resolve(&mut self, job_dir: &Path, force_reload: bool) -> Result<ResolvedConfig, PipelineError> {
        if !force_reload {
            if let Some(cached) = self.cache.get(job_dir) {
                return Ok(cached.clone());
            }
        }

        let mut values = parse_env_file(&self.env_file).await?;

        let job_json_path = job_dir.join("job.json");
        let job_descriptor = crate::util::read_json_opt::<serde_json::Value>(&job_json_path).await?;
        if let Some(serde_json::Value::Object(map)) = &job_descriptor {
            flatten_json_into(map, &mut values);
        }

        let resolved = ResolvedConfig { values, job_descriptor };
        self.cache.insert(job_dir.to_path_buf(), resolved.clone());
        Ok(resolved)
    }

    /// Legacy-only secret lookup; returns `None` if the secrets file is
    /// absent or the key is missing.
    pub async fn legacy_secret(&self, service: &str, key: &str) -> Result<Option<String>, PipelineError> {
        let secrets: Option<serde_json::Value> = crate::util::read_json_opt(&self.secrets_file).await?;
        Ok(secrets
            .as_ref()
            .and_then(|v| v.get(service))
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}

/// Line-oriented `KEY=VALUE` parser; `#` starts a comment, blank lines are
/// skipped. Missing file yields an empty map rather than an error.
async fn parse_env_file(path: &Path) -> Result<BTreeMap<String, String>, PipelineError> {
    let mut values = BTreeMap::new();
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(values),
        Err(e) => return Err(e.into()),
    };

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(values)
}

/// Flattens a single-level JSON object into `key -> stringified value`,
/// nested objects become dot-paths (`mediaProcessing.mode`) so typed
/// accessors can reach into `job.json` the same way they reach env keys.
fn flatten_json_into(map: &serde_json::Map<String, serde_json::Value>, out: &mut BTreeMap<String, String>) {
    for (key, value) in map {
        flatten_value(key, value, out);
    }
}

fn flatten_value(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                flatten_value(&format!("{prefix}.{k}"), v, out);
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_json::Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        serde_json::Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        serde_json::Value::Array(items) => {
            let joined = items
                .iter()
                .map(|i| match i {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        serde_json::Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_env_file_yields_empty_config() {
        let root = tempdir().unwrap();
        let job_dir = tempdir().unwrap();
        let mut resolver = JobConfigResolver::new(root.path());
        let config = resolver.resolve(job_dir.path(), false).await.unwrap();
        assert_eq!(config.get_bool("vad.enabled", true), true);
    }

    #[tokio::test]
    async fn job_json_overrides_env_file() {
        let root = tempdir().unwrap();
        tokio::fs::create_dir_all(root.path().join("config")).await.unwrap();
        tokio::fs::write(root.path().join("config/.env.pipeline"), "numBeams=1\n# comment\n").await.unwrap();

        let job_dir = tempdir().unwrap();
        tokio::fs::write(job_dir.path().join("job.json"), r#"{"numBeams": 5, "workflow": "translate"}"#).await.unwrap();

        let mut resolver = JobConfigResolver::new(root.path());
        let config = resolver.resolve(job_dir.path(), false).await.unwrap();
        assert_eq!(config.get_int("numBeams", 0), 5);
        assert_eq!(config.get_string("workflow", ""), "translate");
    }

    #[tokio::test]
    async fn force_reload_bypasses_cache() {
        let root = tempdir().unwrap();
        let job_dir = tempdir().unwrap();
        tokio::fs::write(job_dir.path().join("job.json"), r#"{"workflow": "transcribe"}"#).await.unwrap();

        let mut resolver = JobConfigResolver::new(root.path());
        let first = resolver.resolve(job_dir.path(), false).await.unwrap();
        assert_eq!(first.get_string("workflow", ""), "transcribe");

        tokio::fs::write(job_dir.path().join("job.json"), r#"{"workflow": "subtitle"}"#).await.unwrap();
        let cached = resolver.resolve(job_dir.path(), false).await.unwrap();
        assert_eq!(cached.get_string("workflow", ""), "transcribe");

        let reloaded = resolver.resolve(job_dir.path(), true).await.unwrap();
        assert_eq!(reloaded.get_string("workflow", ""), "subtitle");
    }

    #[tokio::test]
    async fn nested_media_processing_flattens_to_dot_path() {
        let root = tempdir().unwrap();
        let job_dir = tempdir().unwrap();
        tokio::fs::write(
            job_dir.path().join("job.json"),
            r#"{"mediaProcessing": {"mode": "clip", "startTime": "00:01:00"}}"#,
        )
        .await
        .unwrap();

        let mut resolver = JobConfigResolver::new(root.path());
        let config = resolver.resolve(job_dir.path(), false).await.unwrap();
        assert_eq!(config.get_string("mediaProcessing.mode", ""), "clip");
    }
}
