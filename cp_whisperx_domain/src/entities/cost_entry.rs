// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `CostEntry` and `PricingTable` (C6's pure data model). Injectable per
//! the design note in §9: production deployments can source pricing from
//! a versioned file rather than rebuilding the binary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rate {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// `service → model → rate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTable(HashMap<String, HashMap<String, Rate>>);

impl PricingTable {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, service: impl Into<String>, model: impl Into<String>, rate: Rate) {
        self.0.entry(service.into()).or_default().insert(model.into(), rate);
    }

    pub fn rate(&self, service: &str, model: &str) -> Option<Rate> {
        if service == "local" {
            return Some(Rate {
                input_per_1k: 0.0,
                output_per_1k: 0.0,
            });
        }
        self.0.get(service).and_then(|m| m.get(model)).copied()
    }

    /// `cost = (tokensIn/1000)*inputPer1k + (tokensOut/1000)*outputPer1k`.
    /// Unknown `(service, model)` yields `(0.0, false)` — caller emits the warning.
    pub fn cost(&self, service: &str, model: &str, tokens_in: u64, tokens_out: u64) -> (f64, bool) {
        match self.rate(service, model) {
            Some(rate) => {
                let cost = (tokens_in as f64 / 1000.0) * rate.input_per_1k + (tokens_out as f64 / 1000.0) * rate.output_per_1k;
                (cost, true)
            }
            None => (0.0, false),
        }
    }

    /// Mean of input/output rates applied to the full token estimate.
    pub fn estimate(&self, service: &str, model: &str, total_tokens: u64) -> f64 {
        match self.rate(service, model) {
            Some(rate) => {
                let mean_rate = (rate.input_per_1k + rate.output_per_1k) / 2.0;
                (total_tokens as f64 / 1000.0) * mean_rate
            }
            None => 0.0,
        }
    }
}

impl Default for PricingTable {
    /// Seeded from the source system's embedded pricing database.
    fn default() -> Self {
        let mut t = Self::empty();
        t.insert("openai", "gpt-4", Rate { input_per_1k: 0.03, output_per_1k: 0.06 });
        t.insert("openai", "gpt-4o", Rate { input_per_1k: 0.0025, output_per_1k: 0.01 });
        t.insert("openai", "gpt-4-turbo", Rate { input_per_1k: 0.01, output_per_1k: 0.03 });
        t.insert("openai", "gpt-3.5-turbo", Rate { input_per_1k: 0.0005, output_per_1k: 0.0015 });

        t.insert("gemini", "gemini-1.5-pro", Rate { input_per_1k: 0.00025, output_per_1k: 0.00025 });
        t.insert("gemini", "gemini-1.5-flash", Rate { input_per_1k: 0.000075, output_per_1k: 0.000075 });
        t.insert("gemini", "gemini-pro", Rate { input_per_1k: 0.00025, output_per_1k: 0.00025 });

        t.insert("azure", "gpt-4", Rate { input_per_1k: 0.03, output_per_1k: 0.06 });
        t.insert("azure", "gpt-35-turbo", Rate { input_per_1k: 0.0005, output_per_1k: 0.0015 });

        for model in ["large-v3", "large-v2", "medium"] {
            t.insert("whisperx", model, Rate { input_per_1k: 0.0, output_per_1k: 0.0 });
        }

        t.insert("indictrans2", "api", Rate { input_per_1k: 0.001, output_per_1k: 0.001 });

        for model in ["mlx-whisper", "indictrans2-local", "pyannote"] {
            t.insert("local", model, Rate { input_per_1k: 0.0, output_per_1k: 0.0 });
        }

        t
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub service: String,
    pub model: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub tokens_total: u64,
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyCostLogMetadata {
    pub month: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonthlyCostLog {
    #[serde(default)]
    pub entries: Vec<CostEntry>,
    pub metadata: Option<MonthlyCostLogMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s3_gpt4_cost() {
        let table = PricingTable::default();
        let (cost, known) = table.cost("openai", "gpt-4", 1000, 200);
        assert!(known);
        assert!((cost - 0.042).abs() < 1e-4);
    }

    #[test]
    fn scenario_s2_gpt4o_cost() {
        let table = PricingTable::default();
        let (cost, known) = table.cost("openai", "gpt-4o", 1000, 200);
        assert!(known);
        assert!((cost - 0.0045).abs() < 1e-4);
    }

    #[test]
    fn unknown_service_model_yields_zero_and_unknown_flag() {
        let table = PricingTable::default();
        let (cost, known) = table.cost("openai", "gpt-9000", 1000, 200);
        assert_eq!(cost, 0.0);
        assert!(!known);
    }

    #[test]
    fn local_service_is_always_free() {
        let table = PricingTable::default();
        let (cost, known) = table.cost("local", "anything-at-all", 1_000_000, 1_000_000);
        assert_eq!(cost, 0.0);
        assert!(known);
    }

    #[test]
    fn estimate_uses_mean_rate() {
        let table = PricingTable::default();
        let estimate = table.estimate("openai", "gpt-4", 1000);
        // mean(0.03, 0.06) = 0.045 per 1k => for 1000 tokens, 0.045
        assert!((estimate - 0.045).abs() < 1e-9);
    }
}
