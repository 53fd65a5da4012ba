// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Glossary data shapes shared between the cache (C7) and the manager (C8).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `source → translations`, ordered by preference.
pub type GlossaryEntry = BTreeMap<String, Vec<String>>;

/// `source → translation → frequencyScore`.
pub type LearnedTerms = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryCacheMetadata {
    pub title: String,
    pub year: i32,
    pub cached_at: DateTime<Utc>,
    pub ttl_days: u32,
    pub expires_at: DateTime<Utc>,
}

impl GlossaryCacheMetadata {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryCacheEntry {
    pub film_slug: String,
    pub metadata: GlossaryCacheMetadata,
    pub glossary: GlossaryEntry,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub tmdb_hits: u64,
    pub tmdb_misses: u64,
}

impl CacheStatistics {
    /// `0.0` if no requests yet, else `round(hits/total*100, 2)`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.tmdb_hits + self.tmdb_misses;
        if total == 0 {
            0.0
        } else {
            (self.tmdb_hits as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_zero_when_no_requests() {
        assert_eq!(CacheStatistics::default().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_rounds_to_two_decimals() {
        let stats = CacheStatistics { tmdb_hits: 1, tmdb_misses: 2 };
        assert_eq!(stats.hit_rate(), 33.33);
    }

    #[test]
    fn expiry_is_inclusive_at_expires_at() {
        let now = Utc::now();
        let meta = GlossaryCacheMetadata {
            title: "Dune".into(),
            year: 2021,
            cached_at: now,
            ttl_days: 30,
            expires_at: now,
        };
        assert!(meta.is_expired(now));
    }
}
