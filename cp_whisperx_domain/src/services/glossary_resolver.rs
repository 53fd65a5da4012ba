// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Glossary Manager (C8) resolution logic — the pure, in-memory half.
//! Loading master TSV/TMDB enrichment/film JSON/learned-term files from
//! disk is an infra concern; this type is handed the already-parsed tiers
//! and does priority-cascade resolution, strategy selection, text
//! rewriting, and usage tracking.

use std::collections::BTreeMap;

use crate::entities::glossary::{GlossaryEntry, LearnedTerms};

const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Formal,
    Casual,
    Emotional,
}

impl Context {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Context::Formal => &["sir", "brother", "formal"],
            Context::Casual => &["dude", "bro", "man"],
            Context::Emotional => &["dear", "love", "heart"],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "formal" => Some(Context::Formal),
            "casual" => Some(Context::Casual),
            "emotional" => Some(Context::Emotional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cascade,
    Frequency,
    Context,
}

impl Strategy {
    pub fn parse(s: &str) -> Self {
        match s {
            "frequency" => Strategy::Frequency,
            "context" => Strategy::Context,
            _ => Strategy::Cascade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Film,
    Tmdb,
    Master,
    Learned,
}

#[derive(Debug, Clone, Default)]
pub struct GlossaryStatistics {
    pub film_size: usize,
    pub tmdb_size: usize,
    pub master_size: usize,
    pub learned_size: usize,
    pub film_hits: u64,
    pub tmdb_hits: u64,
    pub master_hits: u64,
    pub learned_hits: u64,
    pub misses: u64,
}

impl GlossaryStatistics {
    pub fn total_requests(&self) -> u64 {
        self.film_hits + self.tmdb_hits + self.master_hits + self.learned_hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            let hits = total - self.misses;
            (hits as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlossaryResolver {
    pub film: GlossaryEntry,
    pub tmdb: GlossaryEntry,
    pub master: GlossaryEntry,
    pub learned: LearnedTerms,
    learning_enabled: bool,
    stats: GlossaryStatistics,
}

impl GlossaryResolver {
    pub fn new(film: GlossaryEntry, tmdb: GlossaryEntry, master: GlossaryEntry, learned: LearnedTerms, learning_enabled: bool) -> Self {
        let stats = GlossaryStatistics {
            film_size: film.len(),
            tmdb_size: tmdb.len(),
            master_size: master.len(),
            learned_size: learned.len(),
            ..Default::default()
        };
        Self {
            film,
            tmdb,
            master,
            learned,
            learning_enabled,
            stats,
        }
    }

    /// Priority-cascade lookup: `film > tmdb > master > learned`. Updates
    /// hit/miss statistics exactly once per call.
    pub fn get_term(&mut self, source: &str, context: Option<Context>, strategy: Strategy) -> Option<String> {
        let result = self.resolve(source, context, strategy);
        match &result {
            Some((tier, _)) => match tier {
                Tier::Film => self.stats.film_hits += 1,
                Tier::Tmdb => self.stats.tmdb_hits += 1,
                Tier::Master => self.stats.master_hits += 1,
                Tier::Learned => self.stats.learned_hits += 1,
            },
            None => self.stats.misses += 1,
        }
        result.map(|(_, translation)| translation)
    }

    /// Same cascade as `get_term` but without mutating statistics; used by
    /// `apply_to_text` to probe candidate spans before committing to the
    /// longest one that actually resolves.
    fn peek_term(&self, source: &str, context: Option<Context>, strategy: Strategy) -> Option<String> {
        self.resolve(source, context, strategy).map(|(_, translation)| translation)
    }

    fn resolve(&self, source: &str, context: Option<Context>, strategy: Strategy) -> Option<(Tier, String)> {
        if let Some(translations) = self.film.get(source) {
            return Some((Tier::Film, self.select_best(source, translations, context, strategy)));
        }
        if let Some(translations) = self.tmdb.get(source) {
            return Some((Tier::Tmdb, self.select_best(source, translations, context, strategy)));
        }
        if let Some(translations) = self.master.get(source) {
            return Some((Tier::Master, self.select_best(source, translations, context, strategy)));
        }
        if let Some(freqs) = self.learned.get(source) {
            if let Some((best, _)) = freqs.iter().max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal)) {
                return Some((Tier::Learned, best.clone()));
            }
        }
        None
    }

    fn select_best(&self, source: &str, translations: &[String], context: Option<Context>, strategy: Strategy) -> String {
        if translations.is_empty() {
            return String::new();
        }
        match strategy {
            Strategy::Cascade => translations[0].clone(),
            Strategy::Frequency => {
                if !self.learning_enabled {
                    return translations[0].clone();
                }
                let scores = self.learned.get(source);
                let mut best_idx = 0usize;
                let mut best_score = scores.and_then(|s| s.get(&translations[0])).copied().unwrap_or(0.0);
                for (i, t) in translations.iter().enumerate().skip(1) {
                    let score = scores.and_then(|s| s.get(t)).copied().unwrap_or(0.0);
                    if score > best_score {
                        best_score = score;
                        best_idx = i;
                    }
                }
                translations[best_idx].clone()
            }
            Strategy::Context => {
                let ctx = match context {
                    Some(c) => c,
                    None => return translations[0].clone(),
                };
                let keywords = ctx.keywords();
                translations
                    .iter()
                    .find(|t| {
                        let lower = t.to_lowercase();
                        keywords.iter().any(|kw| lower.contains(kw))
                    })
                    .cloned()
                    .unwrap_or_else(|| translations[0].clone())
            }
        }
    }

    /// +1 on success, -0.5 on failure, clamped at 0. Persistence is the
    /// infra crate's job (`save_learned_terms`), triggered by the caller.
    pub fn track_usage(&mut self, source: &str, translation: &str, success: bool) {
        if !self.learning_enabled {
            return;
        }
        let entry = self.learned.entry(source.to_string()).or_default().entry(translation.to_string()).or_insert(0.0);
        *entry += if success { 1.0 } else { -0.5 };
        if *entry < 0.0 {
            *entry = 0.0;
        }
    }

    /// Dedup union of keys from film, tmdb, master (that priority order),
    /// truncated to `max_terms`. Learned terms are deliberately excluded.
    pub fn get_bias_terms(&self, max_terms: usize) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for tier in [&self.film, &self.tmdb, &self.master] {
            for key in tier.keys() {
                if seen.insert(key.clone()) {
                    out.push(key.clone());
                    if out.len() >= max_terms {
                        return out;
                    }
                }
            }
        }
        out
    }

    pub fn statistics(&self) -> &GlossaryStatistics {
        &self.stats
    }

    /// Word-by-word replacement with longest-match across multi-word keys:
    /// the text is scanned with a sliding window over whitespace-delimited
    /// tokens, trying the longest token-run first, so a multi-word master
    /// key takes priority over any single-word key it contains. Leading
    /// and trailing punctuation around a matched span is preserved.
    pub fn apply_to_text(&mut self, text: &str, context: Option<Context>, strategy: Strategy) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return String::new();
        }

        let max_window = self.max_key_word_count().max(1);
        let mut out = Vec::new();
        let mut i = 0;
        while i < words.len() {
            let mut matched = false;
            let upper = (max_window).min(words.len() - i);
            for window in (1..=upper).rev() {
                let span = &words[i..i + window];
                let (prefix, core, suffix) = strip_span_punctuation(span);
                if core.is_empty() {
                    continue;
                }
                if self.peek_term(&core, context, strategy).is_some() {
                    let translation = self.get_term(&core, context, strategy).expect("just confirmed present");
                    out.push(format!("{prefix}{translation}{suffix}"));
                    i += window;
                    matched = true;
                    break;
                }
            }
            if !matched {
                out.push(words[i].to_string());
                i += 1;
            }
        }
        out.join(" ")
    }

    fn max_key_word_count(&self) -> usize {
        [&self.film, &self.tmdb, &self.master]
            .into_iter()
            .flat_map(|tier| tier.keys())
            .map(|k| k.split_whitespace().count())
            .max()
            .unwrap_or(1)
    }
}

/// Strips leading/trailing punctuation from a joined token span, returning
/// `(prefix, core_lookup_key, suffix)`. The core key is lowercased-free
/// (case preserved) since glossary keys are matched case-sensitively, as
/// the source system does.
fn strip_span_punctuation(span: &[&str]) -> (String, String, String) {
    let joined = span.join(" ");
    let prefix_len = joined.chars().take_while(|c| PUNCTUATION.contains(c)).count();
    let prefix: String = joined.chars().take(prefix_len).collect();
    let rest: String = joined.chars().skip(prefix_len).collect();
    let suffix_len = rest.chars().rev().take_while(|c| PUNCTUATION.contains(c)).count();
    let core: String = rest.chars().take(rest.chars().count() - suffix_len).collect();
    let suffix: String = rest.chars().skip(rest.chars().count() - suffix_len).collect();
    (prefix, core, suffix)
}

pub fn merge_glossary_entry(into: &mut GlossaryEntry, from: GlossaryEntry) {
    for (k, v) in from {
        into.entry(k).or_insert(v);
    }
}

pub type RawGlossaryMap = BTreeMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pairs: &[(&str, &[&str])]) -> GlossaryEntry {
        pairs.iter().map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect())).collect()
    }

    #[test]
    fn scenario_s4_cascade_priority() {
        let film = entry(&[("test", &["film_translation"])]);
        let tmdb = entry(&[("test", &["tmdb_translation"])]);
        let master = entry(&[("test", &["master_translation"])]);
        let mut resolver = GlossaryResolver::new(film, tmdb, master, LearnedTerms::default(), false);

        assert_eq!(resolver.get_term("test", None, Strategy::Cascade), Some("film_translation".to_string()));
    }

    #[test]
    fn falls_through_tiers_in_priority_order() {
        let master = entry(&[("hello", &["namaste"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.get_term("hello", None, Strategy::Cascade), Some("namaste".to_string()));
        assert_eq!(resolver.get_term("missing", None, Strategy::Cascade), None);
        assert_eq!(resolver.statistics().misses, 1);
        assert_eq!(resolver.statistics().master_hits, 1);
    }

    #[test]
    fn frequency_strategy_picks_highest_score() {
        let master = entry(&[("yaar", &["dude", "buddy", "friend"])]);
        let mut learned = LearnedTerms::default();
        let mut scores = BTreeMap::new();
        scores.insert("dude".to_string(), 1.0);
        scores.insert("buddy".to_string(), 5.0);
        learned.insert("yaar".to_string(), scores);

        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, learned, true);
        assert_eq!(resolver.get_term("yaar", None, Strategy::Frequency), Some("buddy".to_string()));
    }

    #[test]
    fn frequency_strategy_ties_break_by_position() {
        let master = entry(&[("yaar", &["dude", "buddy"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), true);
        assert_eq!(resolver.get_term("yaar", None, Strategy::Frequency), Some("dude".to_string()));
    }

    #[test]
    fn context_strategy_matches_keyword() {
        let master = entry(&[("tu", &["you", "dear you"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.get_term("tu", Some(Context::Emotional), Strategy::Context), Some("dear you".to_string()));
    }

    #[test]
    fn context_strategy_falls_back_to_first() {
        let master = entry(&[("tu", &["you", "thee"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.get_term("tu", Some(Context::Formal), Strategy::Context), Some("you".to_string()));
    }

    #[test]
    fn track_usage_increments_and_decrements_with_floor() {
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), GlossaryEntry::default(), LearnedTerms::default(), true);
        resolver.track_usage("hello", "namaste", true);
        assert_eq!(resolver.learned["hello"]["namaste"], 1.0);
        resolver.track_usage("hello", "namaste", false);
        assert_eq!(resolver.learned["hello"]["namaste"], 0.5);
        resolver.track_usage("hello", "namaste", false);
        resolver.track_usage("hello", "namaste", false);
        assert_eq!(resolver.learned["hello"]["namaste"], 0.0);
    }

    #[test]
    fn bias_terms_dedup_in_priority_order_and_exclude_learned() {
        let film = entry(&[("a", &["x"])]);
        let tmdb = entry(&[("b", &["y"])]);
        let master = entry(&[("a", &["z"]), ("c", &["w"])]);
        let mut learned = LearnedTerms::default();
        learned.insert("d".to_string(), BTreeMap::new());

        let resolver = GlossaryResolver::new(film, tmdb, master, learned, false);
        let bias = resolver.get_bias_terms(10);
        assert_eq!(bias, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn bias_terms_truncates() {
        let master = entry(&[("a", &["1"]), ("b", &["2"]), ("c", &["3"])]);
        let resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.get_bias_terms(2).len(), 2);
    }

    #[test]
    fn apply_to_text_replaces_single_word_with_punctuation_preserved() {
        let master = entry(&[("hello", &["namaste"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.apply_to_text("hello, world!", None, Strategy::Cascade), "namaste, world!");
    }

    #[test]
    fn apply_to_text_prefers_longest_multiword_match() {
        let master = entry(&[("good morning", &["shubh prabhat"]), ("morning", &["subah"])]);
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), master, LearnedTerms::default(), false);
        assert_eq!(resolver.apply_to_text("good morning friend", None, Strategy::Cascade), "shubh prabhat friend");
    }

    #[test]
    fn apply_to_text_leaves_unknown_words_untouched() {
        let mut resolver = GlossaryResolver::new(GlossaryEntry::default(), GlossaryEntry::default(), GlossaryEntry::default(), LearnedTerms::default(), false);
        assert_eq!(resolver.apply_to_text("nothing matches here", None, Strategy::Cascade), "nothing matches here");
    }
}
