// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Online Media Adapter (C9) — filesystem cache half and `Downloader`
//! port invocation. URL/video-id/filename logic is pure and lives in the
//! domain crate's `services::online_media`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cp_whisperx_domain::ports::{DownloadMetadata, DownloadResult, Downloader, ProgressCallback};
use cp_whisperx_domain::services::online_media::{extract_video_id, format_selector, is_url, is_youtube_url, sanitize_filename_default};
use cp_whisperx_domain::PipelineError;

const CACHED_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "wav", "m4a"];

pub struct OnlineMediaAdapter {
    cache_dir: PathBuf,
    downloader: Arc<dyn Downloader>,
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub metadata: DownloadMetadata,
    pub from_cache: bool,
}

impl OnlineMediaAdapter {
    pub fn new(cache_dir: impl Into<PathBuf>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            downloader,
        }
    }

    /// Scans `cacheDir` for `{videoId}.{ext}`, `*_{videoId}.{ext}`, or any
    /// filename containing `{videoId}`, for each of the known media
    /// extensions. Returns the first match found; entries are visited in
    /// directory order, which is not itself guaranteed stable, but a cache
    /// directory normally holds at most one file per video id.
    pub async fn get_cached_video(&self, video_id: &str) -> Result<Option<PathBuf>, PipelineError> {
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !CACHED_EXTENSIONS.contains(&ext) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == video_id || stem.ends_with(&format!("_{video_id}")) || stem.contains(video_id) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Validates the URL, enforces the Phase-1 YouTube-only policy,
    /// checks the cache, and otherwise delegates to the injected
    /// `Downloader`, renaming the fetched file to
    /// `{sanitizedTitle}_{videoId}.{ext}` (or `{videoId}.{ext}` when
    /// `use_title_as_filename` is false).
    pub async fn download(
        &self,
        url: &str,
        quality: &str,
        audio_only: bool,
        output_filename: Option<&str>,
        use_title_as_filename: bool,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome, PipelineError> {
        if !is_url(url) {
            return Err(PipelineError::invalid_media_reference(format!("not a valid URL: {url}")));
        }
        if !is_youtube_url(url) {
            return Err(PipelineError::unsupported_platform("only YouTube URLs are supported in this phase"));
        }
        let video_id = extract_video_id(url).ok_or_else(|| PipelineError::invalid_media_reference(format!("could not extract video id from: {url}")))?;

        if let Some(cached) = self.get_cached_video(&video_id).await? {
            tracing::info!(video_id, path = %cached.display(), "using cached download");
            return Ok(DownloadOutcome {
                path: cached,
                metadata: DownloadMetadata::default(),
                from_cache: true,
            });
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let selector = format_selector(quality, audio_only);
        let output_template = self.cache_dir.join(format!("{video_id}.%(ext)s"));

        let result = self
            .downloader
            .download(url, &selector, &output_template.to_string_lossy(), progress)
            .await
            .map_err(|e| PipelineError::download_failed(format!("download of {url} failed: {e}")))?;

        let final_path = self.rename_download(&result, &video_id, output_filename, use_title_as_filename, audio_only).await?;

        Ok(DownloadOutcome {
            path: final_path,
            metadata: result.metadata,
            from_cache: false,
        })
    }

    async fn rename_download(
        &self,
        result: &DownloadResult,
        video_id: &str,
        output_filename: Option<&str>,
        use_title_as_filename: bool,
        audio_only: bool,
    ) -> Result<PathBuf, PipelineError> {
        let ext = if audio_only { "wav" } else { "mp4" };
        let stem = if let Some(name) = output_filename {
            sanitize_filename_default(name)
        } else if use_title_as_filename {
            match &result.metadata.title {
                Some(title) => format!("{}_{video_id}", sanitize_filename_default(title)),
                None => video_id.to_string(),
            }
        } else {
            video_id.to_string()
        };

        let final_path = self.cache_dir.join(format!("{stem}.{ext}"));
        if result.local_path != final_path {
            tokio::fs::rename(&result.local_path, &final_path).await?;
        }
        Ok(final_path)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct StubDownloader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Downloader for StubDownloader {
        async fn download(&self, _url: &str, _format_selector: &str, output_template: &str, _progress: Option<ProgressCallback>) -> Result<DownloadResult, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let local_path = PathBuf::from(output_template.replace("%(ext)s", "mp4"));
            tokio::fs::write(&local_path, b"fake video bytes").await.unwrap();
            Ok(DownloadResult {
                local_path,
                metadata: DownloadMetadata {
                    title: Some("My Cool Video!".to_string()),
                    duration_seconds: Some(120.0),
                    extra: Default::default(),
                },
            })
        }
    }

    #[tokio::test]
    async fn rejects_non_url() {
        let dir = tempdir().unwrap();
        let adapter = OnlineMediaAdapter::new(dir.path(), Arc::new(StubDownloader { calls: AtomicUsize::new(0) }));
        let err = adapter.download("not a url", "best", false, None, true, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMediaReference(_)));
    }

    #[tokio::test]
    async fn rejects_non_youtube_host() {
        let dir = tempdir().unwrap();
        let adapter = OnlineMediaAdapter::new(dir.path(), Arc::new(StubDownloader { calls: AtomicUsize::new(0) }));
        let err = adapter.download("https://vimeo.com/12345", "best", false, None, true, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedPlatform(_)));
    }

    #[tokio::test]
    async fn downloads_and_renames_with_title() {
        let dir = tempdir().unwrap();
        let adapter = OnlineMediaAdapter::new(dir.path(), Arc::new(StubDownloader { calls: AtomicUsize::new(0) }));
        let outcome = adapter
            .download("https://youtu.be/dQw4w9WgXcQ", "1080p", false, None, true, None)
            .await
            .unwrap();
        assert!(!outcome.from_cache);
        assert_eq!(outcome.path.file_name().unwrap().to_str().unwrap(), "My_Cool_Video_dQw4w9WgXcQ.mp4");
        assert!(outcome.path.exists());
    }

    #[tokio::test]
    async fn second_download_hits_cache_without_calling_downloader_again() {
        let dir = tempdir().unwrap();
        let downloader = Arc::new(StubDownloader { calls: AtomicUsize::new(0) });
        let adapter = OnlineMediaAdapter::new(dir.path(), downloader.clone());

        adapter.download("https://youtu.be/dQw4w9WgXcQ", "best", false, None, true, None).await.unwrap();
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);

        let outcome = adapter.download("https://youtu.be/dQw4w9WgXcQ", "best", false, None, true, None).await.unwrap();
        assert!(outcome.from_cache);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_cached_video_matches_suffix_pattern() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("Some_Title_abc123.mp4"), b"x").await.unwrap();
        let adapter = OnlineMediaAdapter::new(dir.path(), Arc::new(StubDownloader { calls: AtomicUsize::new(0) }));
        let found = adapter.get_cached_video("abc123").await.unwrap();
        assert!(found.is_some());
    }
}
