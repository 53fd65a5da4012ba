// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `UserProfile` and its nested value objects (C5's in-memory data model).
//! Loading/saving from disk is an infra concern; this module is the pure
//! shape plus schema validation and credential-path lookup/mutation logic.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::value_objects::user_id::UserId;
use crate::value_objects::workflow::Workflow;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OnlineService {
    #[serde(flatten)]
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Budget {
    #[serde(default = "default_monthly_limit")]
    pub monthly_limit_usd: f64,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold_percent: f64,
}

fn default_monthly_limit() -> f64 {
    50.0
}

fn default_alert_threshold() -> f64 {
    80.0
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            monthly_limit_usd: default_monthly_limit(),
            alert_threshold_percent: default_alert_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub user_id: u64,
    #[serde(rename = "version")]
    pub schema_version: String,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub credentials: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub online_services: BTreeMap<String, OnlineService>,
    #[serde(default)]
    pub preferences: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub budget: Budget,
}

static SCHEMA_VERSION_DEFAULT: &str = "1.0";

impl UserProfile {
    /// The populated template written by `createNewUser`: credential
    /// placeholders for the known services, disabled online-service
    /// entries, default preferences and budget.
    pub fn new_template(user_id: UserId, name: Option<String>, email: Option<String>) -> Self {
        let mut credentials = BTreeMap::new();
        for service in ["huggingface", "tmdb", "pyannote", "openai", "anthropic", "google"] {
            credentials.insert(service.to_string(), BTreeMap::new());
        }

        let mut online_services = BTreeMap::new();
        for service in ["youtube", "vimeo"] {
            online_services.insert(
                service.to_string(),
                OnlineService {
                    keys: BTreeMap::new(),
                    enabled: false,
                },
            );
        }

        Self {
            user_id: user_id.get(),
            schema_version: SCHEMA_VERSION_DEFAULT.to_string(),
            user: UserInfo {
                name,
                email,
                created_at: None,
            },
            credentials,
            online_services,
            preferences: BTreeMap::new(),
            budget: Budget::default(),
        }
    }

    /// Required fields `userId, version, credentials`; `version` matches
    /// `^\d+\.\d+$`; `userId` is a positive integer.
    pub fn validate_schema(&self) -> Result<(), PipelineError> {
        if self.user_id == 0 {
            return Err(PipelineError::invalid_profile("userId must be a positive integer"));
        }
        let version_re = Regex::new(r"^\d+\.\d+$").expect("static regex is valid");
        if !version_re.is_match(&self.schema_version) {
            return Err(PipelineError::invalid_profile(format!(
                "version '{}' does not match ^\\d+\\.\\d+$",
                self.schema_version
            )));
        }
        Ok(())
    }

    /// Checks `credentials` first, then `onlineServices`; missing or
    /// empty-string values are both treated as absent.
    pub fn get_credential(&self, service: &str, key: &str) -> Option<String> {
        if let Some(section) = self.credentials.get(service) {
            if let Some(v) = section.get(key) {
                if !v.is_empty() {
                    return Some(v.clone());
                }
            }
        }
        if let Some(section) = self.online_services.get(service) {
            if let Some(v) = section.keys.get(key) {
                if !v.is_empty() {
                    return Some(v.clone());
                }
            }
        }
        None
    }

    /// Writes to whichever section already has this service; defaults to
    /// `onlineServices` for a brand-new service.
    pub fn set_credential(&mut self, service: &str, key: &str, value: impl Into<String>) {
        if self.credentials.contains_key(service) {
            self.credentials
                .entry(service.to_string())
                .or_default()
                .insert(key.to_string(), value.into());
            return;
        }
        self.online_services
            .entry(service.to_string())
            .or_insert_with(|| OnlineService {
                keys: BTreeMap::new(),
                enabled: false,
            })
            .keys
            .insert(key.to_string(), value.into());
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.online_services.get(service).map(|s| s.enabled).unwrap_or(false)
    }

    /// Raises `MissingCredential` listing every absent required path for
    /// `workflow`, per the requirement table in `Workflow::required_credentials`.
    pub fn validate_for_workflow(&self, workflow: Workflow) -> Result<(), PipelineError> {
        let mut missing = Vec::new();
        for path in workflow.required_credentials() {
            let (service, key) = path
                .split_once('.')
                .expect("credential paths are always service.key");
            if self.get_credential(service, key).is_none() {
                missing.push((*path).to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::missing_credential(workflow.as_str(), missing))
        }
    }
}
