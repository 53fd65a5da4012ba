// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `FilmSlug` — the glossary cache key: `lower(remove_non_word(title))_year`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilmSlug(String);

impl FilmSlug {
    /// `slug = lower(title); strip everything but word chars/spaces/hyphens;
    /// collapse whitespace/underscore runs to a single `_`; append `_year`.`
    /// Mirrors the source system's `_get_film_slug` exactly.
    pub fn new(title: &str, year: impl fmt::Display) -> Self {
        let lower = title.to_lowercase();
        let stripped: String = lower
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '-')
            .collect();

        let mut slug = String::with_capacity(stripped.len());
        let mut last_was_sep = false;
        for c in stripped.chars() {
            if c.is_whitespace() || c == '_' {
                if !last_was_sep {
                    slug.push('_');
                    last_was_sep = true;
                }
            } else {
                slug.push(c);
                last_was_sep = false;
            }
        }

        Self(format!("{}_{}", slug, year))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilmSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
