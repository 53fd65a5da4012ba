// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Workspace-wide error taxonomy.
//!
//! `PipelineError` covers both the stage-level error kinds a workflow can
//! surface and the ambient I/O/serialization/validation kinds every
//! component needs. Conversions from `std::io::Error` and `serde_json::Error`
//! live here because they are mechanical; conversions from config-file
//! formats (TOML/YAML) are deliberately not implemented on this type since
//! choosing a config serialization format is an infrastructure concern, not
//! a domain one.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("missing credential(s) for workflow {workflow}: {missing:?}")]
    MissingCredential { workflow: String, missing: Vec<String> },

    #[error("budget exceeded: spent ${spent:.2} of ${limit:.2} limit")]
    BudgetExceeded { spent: f64, limit: f64 },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("invalid media reference: {0}")]
    InvalidMediaReference(String),

    #[error("external service error: {0}")]
    ExternalServiceError(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    pub fn missing_credential(workflow: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingCredential {
            workflow: workflow.into(),
            missing,
        }
    }

    pub fn budget_exceeded(spent: f64, limit: f64) -> Self {
        Self::BudgetExceeded { spent, limit }
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn unsupported_platform(msg: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(msg.into())
    }

    pub fn invalid_media_reference(msg: impl Into<String>) -> Self {
        Self::InvalidMediaReference(msg.into())
    }

    pub fn external_service_error(msg: impl Into<String>) -> Self {
        Self::ExternalServiceError(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn internal_consistency(msg: impl Into<String>) -> Self {
        Self::InternalConsistency(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Category string for structured logging and metrics tagging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "missing_input",
            Self::InvalidProfile(_) => "invalid_profile",
            Self::MissingCredential { .. } => "missing_credential",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::DownloadFailed(_) => "download_failed",
            Self::UnsupportedPlatform(_) => "unsupported_platform",
            Self::InvalidMediaReference(_) => "invalid_media_reference",
            Self::ExternalServiceError(_) => "external_service_error",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InternalConsistency(_) => "internal_consistency",
            Self::Cancelled(_) => "cancelled",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Validation(_) => "validation",
            Self::InternalError(_) => "internal",
        }
    }

    /// `InternalConsistency` is treated as a cache miss (the resume path
    /// re-runs the stage); ambient `Io` failures are often transient.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InternalConsistency(_) | Self::Io(_))
    }

    /// Exit code per the process-level exit code table: 0 success is
    /// handled by the caller; this only covers error paths.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled(_) => 130,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_maps_to_exit_130() {
        assert_eq!(PipelineError::cancelled("user interrupt").exit_code(), 130);
    }

    #[test]
    fn other_errors_map_to_exit_1() {
        assert_eq!(PipelineError::missing_input("x").exit_code(), 1);
        assert_eq!(PipelineError::budget_exceeded(10.0, 5.0).exit_code(), 1);
    }

    #[test]
    fn internal_consistency_is_recoverable() {
        assert!(PipelineError::internal_consistency("hash mismatch").is_recoverable());
        assert!(!PipelineError::invalid_config("bad").is_recoverable());
    }

    #[test]
    fn categories_are_distinct_labels() {
        assert_eq!(PipelineError::missing_input("x").category(), "missing_input");
        assert_eq!(
            PipelineError::missing_credential("transcribe", vec!["huggingface.token".into()]).category(),
            "missing_credential"
        );
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: PipelineError = io_err.into();
        matches!(err, PipelineError::Io(_));
    }
}
