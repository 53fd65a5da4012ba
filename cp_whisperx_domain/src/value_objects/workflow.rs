// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `Workflow` — the three supported end-to-end pipelines, strictly ordered
//! by artifact prefix: `transcribe ⊑ translate ⊑ subtitle`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Workflow {
    Transcribe,
    Translate,
    Subtitle,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Translate => "translate",
            Self::Subtitle => "subtitle",
        }
    }

    /// Credentials a profile must have before this workflow may run,
    /// expressed as `service.key` paths.
    pub fn required_credentials(self) -> &'static [&'static str] {
        match self {
            Self::Transcribe => &["huggingface.token"],
            Self::Translate => &["huggingface.token"],
            Self::Subtitle => &["huggingface.token", "tmdb.api_key"],
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcribe" => Ok(Self::Transcribe),
            "translate" => Ok(Self::Translate),
            "subtitle" => Ok(Self::Subtitle),
            other => Err(PipelineError::invalid_config(format!("unknown workflow: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_workflows() {
        assert_eq!("transcribe".parse::<Workflow>().unwrap(), Workflow::Transcribe);
        assert_eq!("subtitle".parse::<Workflow>().unwrap(), Workflow::Subtitle);
    }

    #[test]
    fn rejects_unknown_workflow() {
        assert!("dubbing".parse::<Workflow>().is_err());
    }

    #[test]
    fn subtitle_requires_tmdb_and_huggingface() {
        let req = Workflow::Subtitle.required_credentials();
        assert!(req.contains(&"huggingface.token"));
        assert!(req.contains(&"tmdb.api_key"));
    }

    #[test]
    fn transcribe_requires_only_huggingface() {
        assert_eq!(Workflow::Transcribe.required_credentials(), &["huggingface.token"]);
    }
}
