// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Glossary Cache (C7) and the file-loading half of the Glossary Manager
//! (C8). Resolution logic (priority cascade, strategies, text rewriting)
//! lives in the domain crate's `GlossaryResolver`; this module reads the
//! master TSV, TMDB enrichment, film-specific JSON, and learned-term
//! caches from disk and hands the parsed tiers to the resolver.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use cp_whisperx_domain::entities::glossary::{CacheStatistics, GlossaryCacheMetadata, GlossaryEntry, LearnedTerms};
use cp_whisperx_domain::services::glossary_resolver::GlossaryResolver;
use cp_whisperx_domain::value_objects::film_slug::FilmSlug;
use cp_whisperx_domain::PipelineError;

use crate::util::write_json_atomic;

const DEFAULT_TTL_DAYS: u32 = 30;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default)]
struct TmdbIndex(BTreeMap<String, TmdbIndexEntry>);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TmdbIndexEntry {
    title: String,
    year: i32,
    cached_at: chrono::DateTime<Utc>,
}

/// On-disk cache: `{cacheDir}/tmdb/{filmSlug}/{glossary,metadata,enrichment?}.json`,
/// `{cacheDir}/tmdb/index.json`, `{cacheDir}/learned/{filmSlug}/{term_frequency,metadata}.json`.
pub struct GlossaryCache {
    cache_dir: PathBuf,
    ttl_days: u32,
    stats: tokio::sync::Mutex<CacheStatistics>,
}

impl GlossaryCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl_days: DEFAULT_TTL_DAYS,
            stats: tokio::sync::Mutex::new(CacheStatistics::default()),
        }
    }

    fn tmdb_dir(&self, slug: &FilmSlug) -> PathBuf {
        self.cache_dir.join("tmdb").join(slug.as_str())
    }

    fn learned_dir(&self, slug: &FilmSlug) -> PathBuf {
        self.cache_dir.join("learned").join(slug.as_str())
    }

    fn index_path(&self) -> PathBuf {
        self.cache_dir.join("tmdb").join("index.json")
    }

    /// Returns the cached glossary on a live (non-expired) hit, `None` on
    /// miss or expiry. Updates `tmdbHits`/`tmdbMisses` exactly once.
    pub async fn get_tmdb_glossary(&self, title: &str, year: i32) -> Result<Option<GlossaryEntry>, PipelineError> {
        let slug = FilmSlug::new(title, year);
        let dir = self.tmdb_dir(&slug);
        let metadata: Option<GlossaryCacheMetadata> = crate::util::read_json_opt(&dir.join("metadata.json")).await?;
        let glossary: Option<GlossaryEntry> = crate::util::read_json_opt(&dir.join("glossary.json")).await?;

        let mut stats = self.stats.lock().await;
        match (metadata, glossary) {
            (Some(meta), Some(glossary)) if !meta.is_expired(Utc::now()) => {
                stats.tmdb_hits += 1;
                Ok(Some(glossary))
            }
            _ => {
                stats.tmdb_misses += 1;
                Ok(None)
            }
        }
    }

    pub async fn save_tmdb_glossary(
        &self,
        title: &str,
        year: i32,
        glossary: &GlossaryEntry,
        enrichment: Option<&serde_json::Value>,
    ) -> Result<(), PipelineError> {
        let slug = FilmSlug::new(title, year);
        let dir = self.tmdb_dir(&slug);
        let now = Utc::now();
        let metadata = GlossaryCacheMetadata {
            title: title.to_string(),
            year,
            cached_at: now,
            ttl_days: self.ttl_days,
            expires_at: now + Duration::days(self.ttl_days as i64),
        };

        write_json_atomic(&dir.join("glossary.json"), glossary).await?;
        write_json_atomic(&dir.join("metadata.json"), &metadata).await?;
        if let Some(enrichment) = enrichment {
            write_json_atomic(&dir.join("enrichment.json"), enrichment).await?;
        }

        let mut index = self.load_index().await?;
        index.0.insert(
            slug.as_str().to_string(),
            TmdbIndexEntry {
                title: title.to_string(),
                year,
                cached_at: now,
            },
        );
        write_json_atomic(&self.index_path(), &index).await?;
        Ok(())
    }

    async fn load_index(&self) -> Result<TmdbIndex, PipelineError> {
        Ok(crate::util::read_json_opt(&self.index_path()).await?.unwrap_or_default())
    }

    /// Best-effort read; missing file ⇒ empty map.
    pub async fn get_learned_terms(&self, title: &str, year: i32) -> Result<LearnedTerms, PipelineError> {
        let slug = FilmSlug::new(title, year);
        let path = self.learned_dir(&slug).join("term_frequency.json");
        Ok(crate::util::read_json_opt(&path).await?.unwrap_or_default())
    }

    /// Atomic overwrite of the learned-terms cache. A deliberate
    /// strengthening of the weaker guarantee a prior version of this
    /// cache offered, since every other writer in this crate is already
    /// atomic and the cost is nil.
    pub async fn update_learned_terms(&self, title: &str, year: i32, frequencies: &LearnedTerms) -> Result<(), PipelineError> {
        let slug = FilmSlug::new(title, year);
        let dir = self.learned_dir(&slug);
        write_json_atomic(&dir.join("term_frequency.json"), frequencies).await?;
        write_json_atomic(
            &dir.join("metadata.json"),
            &serde_json::json!({ "title": title, "year": year, "updatedAt": Utc::now() }),
        )
        .await?;
        Ok(())
    }

    /// Removes every TMDB entry whose `metadata.expiresAt` has passed,
    /// returning the count removed.
    pub async fn cleanup_expired(&self) -> Result<usize, PipelineError> {
        let tmdb_root = self.cache_dir.join("tmdb");
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&tmdb_root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let mut expired_slugs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let meta_path = entry.path().join("metadata.json");
            if let Some(meta) = crate::util::read_json_opt::<GlossaryCacheMetadata>(&meta_path).await? {
                if meta.is_expired(now) {
                    tokio::fs::remove_dir_all(entry.path()).await?;
                    removed += 1;
                    if let Some(name) = entry.file_name().to_str() {
                        expired_slugs.push(name.to_string());
                    }
                }
            }
        }

        if removed > 0 {
            let mut index = self.load_index().await?;
            for slug in &expired_slugs {
                index.0.remove(slug);
            }
            write_json_atomic(&self.index_path(), &index).await?;
        }
        Ok(removed)
    }

    pub async fn get_cache_statistics(&self) -> CacheStatistics {
        *self.stats.lock().await
    }
}

/// File-loading half of the Glossary Manager: parses the master TSV,
/// film-specific JSON, and composes the in-memory `GlossaryResolver`
/// against the `GlossaryCache`.
pub struct GlossaryManager {
    project_root: PathBuf,
    cache: GlossaryCache,
    learning_enabled: bool,
}

impl GlossaryManager {
    pub fn new(project_root: impl Into<PathBuf>, cache: GlossaryCache, learning_enabled: bool) -> Self {
        Self {
            project_root: project_root.into(),
            cache,
            learning_enabled,
        }
    }

    fn master_path(&self) -> PathBuf {
        self.project_root.join("glossary").join("hinglish_master.tsv")
    }

    fn film_json_path(&self, slug: &FilmSlug) -> PathBuf {
        self.project_root.join("glossary").join("films").join("popular").join(format!("{slug}.json"))
    }

    /// Parses `source\tpreferred_english\t...` rows; `preferred_english`
    /// may hold multiple pipe-separated alternatives. Hand-rolled
    /// line/tab splitting: the format has no quoting rules worth a
    /// dependency. Missing file ⇒ empty map, warning logged. Malformed
    /// rows are skipped with a warning, not fatal.
    async fn load_master(&self) -> GlossaryEntry {
        let path = self.master_path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => {
                tracing::warn!(path = %path.display(), "master glossary TSV not found; proceeding with empty master tier");
                return GlossaryEntry::default();
            }
        };

        let mut out = GlossaryEntry::default();
        for (i, line) in contents.lines().enumerate() {
            if i == 0 || line.trim().is_empty() {
                continue; // header row
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 2 || cols[0].trim().is_empty() || cols[1].trim().is_empty() {
                tracing::warn!(line = i, "skipping malformed master glossary row");
                continue;
            }
            let translations: Vec<String> = cols[1].split('|').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            if translations.is_empty() {
                continue;
            }
            out.insert(cols[0].trim().to_string(), translations);
        }
        out
    }

    /// Reads `films/popular/{slug}.json`, accepting either `{"terms": {...}}`
    /// or a bare `{source: translation|[translations]}` map. Absent ⇒ empty.
    async fn load_film(&self, slug: &FilmSlug) -> Result<GlossaryEntry, PipelineError> {
        let path = self.film_json_path(slug);
        let Some(raw) = crate::util::read_json_opt::<serde_json::Value>(&path).await? else {
            return Ok(GlossaryEntry::default());
        };

        let object = match &raw {
            serde_json::Value::Object(map) if map.contains_key("terms") => map["terms"].as_object(),
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        };

        let mut out = GlossaryEntry::default();
        if let Some(object) = object {
            for (key, value) in object {
                let translations = match value {
                    serde_json::Value::String(s) => vec![s.clone()],
                    serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
                    _ => continue,
                };
                if !translations.is_empty() {
                    out.insert(key.clone(), translations);
                }
            }
        }
        Ok(out)
    }

    /// Cast/crew extraction from a TMDB enrichment payload: top-N cast
    /// names to cleaned character names (parenthetical qualifiers and
    /// `/`-separated aliases stripped to the first alias), and crew names
    /// for `Director`/`Writer`/`Screenplay`/`Producer` roles to role names.
    fn extract_from_enrichment(enrichment: &serde_json::Value, top_n_cast: usize) -> GlossaryEntry {
        let mut out = GlossaryEntry::default();
        if let Some(cast) = enrichment.get("cast").and_then(|v| v.as_array()) {
            for member in cast.iter().take(top_n_cast) {
                let (Some(name), Some(character)) = (
                    member.get("name").and_then(|v| v.as_str()),
                    member.get("character").and_then(|v| v.as_str()),
                ) else {
                    continue;
                };
                let cleaned = clean_character_name(character);
                if !cleaned.is_empty() {
                    out.insert(name.to_string(), vec![cleaned]);
                }
            }
        }
        if let Some(crew) = enrichment.get("crew").and_then(|v| v.as_array()) {
            const ROLES: &[&str] = &["Director", "Writer", "Screenplay", "Producer"];
            for member in crew {
                let (Some(name), Some(job)) = (member.get("name").and_then(|v| v.as_str()), member.get("job").and_then(|v| v.as_str())) else {
                    continue;
                };
                if ROLES.contains(&job) {
                    out.insert(name.to_string(), vec![job.to_string()]);
                }
            }
        }
        out
    }

    /// Loads all four tiers (`loadAllSources`) and returns a ready
    /// `GlossaryResolver`. `tmdb` is `None` when no title/year or
    /// enrichment source is configured, leaving that tier empty.
    pub async fn load_all_sources(&self, title: Option<&str>, year: Option<i32>, enrichment_source: Option<&serde_json::Value>) -> Result<GlossaryResolver, PipelineError> {
        let master = self.load_master().await;

        let (tmdb, learned, film) = match (title, year) {
            (Some(title), Some(year)) => {
                let slug = FilmSlug::new(title, year);
                let tmdb = match self.cache.get_tmdb_glossary(title, year).await? {
                    Some(cached) => cached,
                    None => match enrichment_source {
                        Some(enrichment) => {
                            let extracted = Self::extract_from_enrichment(enrichment, 10);
                            self.cache.save_tmdb_glossary(title, year, &extracted, Some(enrichment)).await?;
                            extracted
                        }
                        None => GlossaryEntry::default(),
                    },
                };
                let learned = self.cache.get_learned_terms(title, year).await?;
                let film = self.load_film(&slug).await?;
                (tmdb, learned, film)
            }
            _ => (GlossaryEntry::default(), LearnedTerms::default(), GlossaryEntry::default()),
        };

        Ok(GlossaryResolver::new(film, tmdb, master, learned, self.learning_enabled))
    }

    /// Persists `resolver.learned` back to the cache for this film.
    /// Call after a batch of `track_usage` calls.
    pub async fn save_learned_terms(&self, title: &str, year: i32, resolver: &GlossaryResolver) -> Result<(), PipelineError> {
        self.cache.update_learned_terms(title, year, &resolver.learned).await
    }

    pub fn cache(&self) -> &GlossaryCache {
        &self.cache
    }
}

/// Strips parenthetical qualifiers (`"Tony Stark (voice)"` → `"Tony Stark"`)
/// and keeps only the first `/`-separated alias (`"Neo/Thomas"` → `"Neo"`).
fn clean_character_name(raw: &str) -> String {
    let without_parens = match raw.find('(') {
        Some(idx) => raw[..idx].trim(),
        None => raw.trim(),
    };
    without_parens.split('/').next().unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_whisperx_domain::services::glossary_resolver::Strategy;
    use tempfile::tempdir;

    #[tokio::test]
    async fn tmdb_cache_miss_then_hit_after_save() {
        let dir = tempdir().unwrap();
        let cache = GlossaryCache::new(dir.path());

        assert!(cache.get_tmdb_glossary("Dune", 2021).await.unwrap().is_none());

        let mut glossary = GlossaryEntry::default();
        glossary.insert("paul".to_string(), vec!["Paul Atreides".to_string()]);
        cache.save_tmdb_glossary("Dune", 2021, &glossary, None).await.unwrap();

        let cached = cache.get_tmdb_glossary("Dune", 2021).await.unwrap();
        assert_eq!(cached.unwrap()["paul"], vec!["Paul Atreides".to_string()]);

        let stats = cache.get_cache_statistics().await;
        assert_eq!(stats.tmdb_hits, 1);
        assert_eq!(stats.tmdb_misses, 1);
    }

    #[tokio::test]
    async fn learned_terms_round_trip_is_atomic_overwrite() {
        let dir = tempdir().unwrap();
        let cache = GlossaryCache::new(dir.path());

        assert!(cache.get_learned_terms("Dune", 2021).await.unwrap().is_empty());

        let mut frequencies = LearnedTerms::default();
        frequencies.insert("yaar".to_string(), BTreeMap::from([("buddy".to_string(), 3.0)]));
        cache.update_learned_terms("Dune", 2021, &frequencies).await.unwrap();

        let loaded = cache.get_learned_terms("Dune", 2021).await.unwrap();
        assert_eq!(loaded["yaar"]["buddy"], 3.0);
    }

    #[tokio::test]
    async fn cleanup_expired_removes_only_past_entries() {
        let dir = tempdir().unwrap();
        let cache = GlossaryCache::new(dir.path());
        cache.save_tmdb_glossary("Fresh", 2024, &GlossaryEntry::default(), None).await.unwrap();

        let slug = FilmSlug::new("Stale", 2000);
        let stale_dir = dir.path().join("tmdb").join(slug.as_str());
        tokio::fs::create_dir_all(&stale_dir).await.unwrap();
        let stale_meta = GlossaryCacheMetadata {
            title: "Stale".into(),
            year: 2000,
            cached_at: Utc::now() - Duration::days(60),
            ttl_days: 30,
            expires_at: Utc::now() - Duration::days(30),
        };
        write_json_atomic(&stale_dir.join("metadata.json"), &stale_meta).await.unwrap();
        write_json_atomic(&stale_dir.join("glossary.json"), &GlossaryEntry::default()).await.unwrap();

        let removed = cache.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(!stale_dir.exists());
        assert!(dir.path().join("tmdb").join("fresh_2024").exists());
    }

    #[tokio::test]
    async fn master_tsv_parses_pipe_separated_alternatives_and_skips_malformed_rows() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("glossary")).await.unwrap();
        tokio::fs::write(
            dir.path().join("glossary").join("hinglish_master.tsv"),
            "source\tpreferred_english\nyaar\tdude|buddy|friend\nbroken_row\n\tempty_source\n",
        )
        .await
        .unwrap();

        let manager = GlossaryManager::new(dir.path(), GlossaryCache::new(dir.path().join("cache")), false);
        let resolver = manager.load_all_sources(None, None, None).await.unwrap();
        assert_eq!(resolver.master["yaar"], vec!["dude".to_string(), "buddy".to_string(), "friend".to_string()]);
        assert_eq!(resolver.master.len(), 1);
    }

    #[tokio::test]
    async fn missing_master_file_yields_empty_tier() {
        let dir = tempdir().unwrap();
        let manager = GlossaryManager::new(dir.path(), GlossaryCache::new(dir.path().join("cache")), false);
        let resolver = manager.load_all_sources(None, None, None).await.unwrap();
        assert!(resolver.master.is_empty());
    }

    #[tokio::test]
    async fn film_json_accepts_bare_map_and_wrapped_terms_shape() {
        let dir = tempdir().unwrap();
        let films_dir = dir.path().join("glossary").join("films").join("popular");
        tokio::fs::create_dir_all(&films_dir).await.unwrap();
        let slug = FilmSlug::new("Dune", 2021);
        tokio::fs::write(films_dir.join(format!("{slug}.json")), r#"{"terms": {"spice": ["melange"]}}"#)
            .await
            .unwrap();

        let manager = GlossaryManager::new(dir.path(), GlossaryCache::new(dir.path().join("cache")), false);
        let resolver = manager.load_all_sources(Some("Dune"), Some(2021), None).await.unwrap();
        assert_eq!(resolver.film["spice"], vec!["melange".to_string()]);
    }

    #[tokio::test]
    async fn enrichment_extraction_cleans_character_names_and_filters_crew_roles() {
        let enrichment = serde_json::json!({
            "cast": [
                {"name": "Actor One", "character": "Hero (voice)"},
                {"name": "Actor Two", "character": "Villain/Antagonist"},
            ],
            "crew": [
                {"name": "Jane Director", "job": "Director"},
                {"name": "Some Gaffer", "job": "Gaffer"},
            ],
        });
        let extracted = GlossaryManager::extract_from_enrichment(&enrichment, 10);
        assert_eq!(extracted["Actor One"], vec!["Hero".to_string()]);
        assert_eq!(extracted["Actor Two"], vec!["Villain".to_string()]);
        assert_eq!(extracted["Jane Director"], vec!["Director".to_string()]);
        assert!(!extracted.contains_key("Some Gaffer"));
    }

    #[tokio::test]
    async fn full_resolver_applies_film_over_master() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("glossary").join("films").join("popular")).await.unwrap();
        tokio::fs::write(
            dir.path().join("glossary").join("hinglish_master.tsv"),
            "source\tpreferred_english\nyaar\tdude\n",
        )
        .await
        .unwrap();
        let slug = FilmSlug::new("Dune", 2021);
        tokio::fs::write(
            dir.path().join("glossary").join("films").join("popular").join(format!("{slug}.json")),
            r#"{"yaar": "brother"}"#,
        )
        .await
        .unwrap();

        let manager = GlossaryManager::new(dir.path(), GlossaryCache::new(dir.path().join("cache")), false);
        let mut resolver = manager.load_all_sources(Some("Dune"), Some(2021), None).await.unwrap();
        assert_eq!(resolver.get_term("yaar", None, Strategy::Cascade), Some("brother".to_string()));
    }
}
