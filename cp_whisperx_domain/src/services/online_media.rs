// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Online Media Adapter (C9) — pure string-processing half: URL/YouTube
//! detection, video-id extraction, filename sanitization. The filesystem
//! cache scan and the `Downloader` port invocation live in the infra crate.

use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_SANITIZE_MAX_LEN: usize = 35;

/// The four URL shapes YouTube videos are referenced by, each with the
/// video id captured in group 1.
static YOUTUBE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"youtube\.com/watch\?v=([A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"youtube\.com/embed/([A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"youtube\.com/v/([A-Za-z0-9_-]+)").unwrap(),
    ]
});

/// True iff `s` parses as a URL with both a scheme and a host/authority.
pub fn is_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(parsed) => parsed.scheme().len() > 0 && parsed.host().is_some(),
        Err(_) => false,
    }
}

pub fn is_youtube_url(s: &str) -> bool {
    YOUTUBE_PATTERNS.iter().any(|re| re.is_match(s))
}

/// Capture group from whichever YouTube pattern matches, `None` otherwise.
pub fn extract_video_id(url: &str) -> Option<String> {
    YOUTUBE_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).map(|caps| caps[1].to_string()))
}

/// Keep only `[A-Za-z0-9]` and spaces; map spaces to `_`; collapse runs of
/// `_`; trim leading/trailing `_`; truncate to `max_len`; empty ⇒ `"video"`.
pub fn sanitize_filename(s: &str, max_len: usize) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    let mut collapsed = String::with_capacity(kept.len());
    let mut last_was_underscore = false;
    for c in kept.chars() {
        if c == '_' {
            if !last_was_underscore {
                collapsed.push('_');
            }
            last_was_underscore = true;
        } else {
            collapsed.push(c);
            last_was_underscore = false;
        }
    }

    let trimmed = collapsed.trim_matches('_');
    let truncated: String = trimmed.chars().take(max_len).collect();
    let truncated = truncated.trim_end_matches('_');

    if truncated.is_empty() {
        "video".to_string()
    } else {
        truncated.to_string()
    }
}

pub fn sanitize_filename_default(s: &str) -> String {
    sanitize_filename(s, DEFAULT_SANITIZE_MAX_LEN)
}

/// `formatQuality ∈ {best, 1080p, 720p, 480p, audio}` (plus an `audioOnly`
/// override) mapped to a downloader-agnostic format selector string.
pub fn format_selector(quality: &str, audio_only: bool) -> String {
    if audio_only || quality == "audio" {
        return "bestaudio/best".to_string();
    }
    match quality {
        "1080p" => "bestvideo[height<=1080]+bestaudio/best[height<=1080]".to_string(),
        "720p" => "bestvideo[height<=720]+bestaudio/best[height<=720]".to_string(),
        "480p" => "bestvideo[height<=480]+bestaudio/best[height<=480]".to_string(),
        _ => "bestvideo+bestaudio/best".to_string(),
    }
}
