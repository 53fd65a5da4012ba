// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared atomic-write and hashing helpers used across the infrastructure
//! modules. Every on-disk writer in this crate goes through
//! [`write_json_atomic`] so readers never observe a half-written file.

use std::path::Path;

use cp_whisperx_domain::value_objects::file_hash::FileHash;
use cp_whisperx_domain::PipelineError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializes `value` as pretty JSON and writes it via write-to-temp then
/// rename, within the same directory as `path` so the rename is atomic.
pub async fn write_json_atomic<T: Serialize + Sync>(path: &Path, value: &T) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension(tmp_extension(path));
    tokio::fs::write(&tmp_path, &body).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

fn tmp_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    }
}

/// Reads and deserializes a JSON file, returning `Ok(None)` if it doesn't
/// exist rather than raising `NotFound`.
pub async fn read_json_opt<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, PipelineError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Streams the file at `path` through SHA-256 in fixed-size chunks rather
/// than loading the whole file into memory, matching the corpus's
/// incremental-hash idiom for large media files.
pub async fn hash_file(path: &Path) -> Result<FileHash, PipelineError> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(FileHash::from_bytes(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn write_then_read_json_atomic_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.json");
        write_json_atomic(&path, &Sample { value: 42 }).await.unwrap();
        let loaded: Option<Sample> = read_json_opt(&path).await.unwrap();
        assert_eq!(loaded, Some(Sample { value: 42 }));
    }

    #[tokio::test]
    async fn read_json_opt_returns_none_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Sample> = read_json_opt(&path).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn hash_file_matches_known_sha256() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"hello world").await.unwrap();
        let hash = hash_file(&path).await.unwrap();
        assert_eq!(hash.as_str(), "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }
}
