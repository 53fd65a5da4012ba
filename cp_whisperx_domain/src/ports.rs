// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Collaborator ports (§6). Stage code depends only on these traits, never
//! on a concrete ML/API/ffmpeg implementation. All ML work, third-party
//! API clients, and `ffmpeg` invocations are out of scope for this crate;
//! implementations live wherever the host application wires them in.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Option<Vec<Word>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub segments: Vec<Segment>,
    pub language: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscribeOptions {
    #[serde(default)]
    pub beam_size: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &std::path::Path, language: &str, options: &TranscribeOptions) -> Result<TranscriptionResult, PipelineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

#[async_trait]
pub trait Diarizer: Send + Sync {
    async fn diarize(&self, audio_path: &std::path::Path, min_speakers: Option<u32>, max_speakers: Option<u32>) -> Result<Vec<SpeakerSegment>, PipelineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadSegment {
    pub start: f64,
    pub end: f64,
}

#[async_trait]
pub trait VadDetector: Send + Sync {
    async fn detect(&self, audio_path: &std::path::Path, threshold: Option<f64>) -> Result<Vec<VadSegment>, PipelineError>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_batch(&self, strings: &[String], src_lang: &str, tgt_lang: &str) -> Result<Vec<String>, PipelineError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    pub metadata: DownloadMetadata,
}

pub type ProgressCallback = std::sync::Arc<dyn Fn(f64) + Send + Sync>;

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        format_selector: &str,
        output_template: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadResult, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct SeparationResult {
    pub vocals_path: PathBuf,
    pub accompaniment_path: PathBuf,
}

#[async_trait]
pub trait SourceSeparator: Send + Sync {
    async fn separate(&self, audio_path: &std::path::Path, quality: &str) -> Result<SeparationResult, PipelineError>;
}

/// Discriminated union replacing the source system's runtime duck-typing
/// over AI provider configs, per the design note in §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Gemini,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub transcript_text: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub include_timestamps: bool,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTimestamp {
    pub timestamp: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub key_points: Vec<String>,
    #[serde(default)]
    pub timestamps: Option<Vec<SummaryTimestamp>>,
    #[serde(default)]
    pub source_attribution: Option<String>,
    pub provider: Provider,
    pub tokens_used: u64,
}

#[async_trait]
pub trait AiSummarizer: Send + Sync {
    async fn validate(&self) -> bool;
    async fn summarize(&self, request: SummaryRequest) -> Result<SummaryResponse, PipelineError>;
}

#[async_trait]
pub trait AudioDemuxer: Send + Sync {
    async fn demux(
        &self,
        video_path: &std::path::Path,
        sample_rate: u32,
        channels: u8,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<PathBuf, PipelineError>;
}
