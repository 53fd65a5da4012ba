// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! User Profile Store (C5) — monotonic user-id issuance, profile
//! load/save, legacy credential migration. The in-memory profile shape
//! and its schema/credential logic live in the domain crate
//! (`UserProfile`); this module owns the filesystem layout:
//! `users/.userIdCounter` and `users/{userId}/profile.json`.

use std::path::{Path, PathBuf};

use cp_whisperx_domain::entities::user_profile::UserProfile;
use cp_whisperx_domain::value_objects::user_id::UserId;
use cp_whisperx_domain::PipelineError;
use fd_lock::RwLock as FileRwLock;

use crate::util::write_json_atomic;

pub struct UserProfileStore {
    users_dir: PathBuf,
    /// Legacy secrets file consulted only for one-shot migration when a
    /// profile doesn't exist yet. `None` disables migration entirely.
    legacy_secrets_file: Option<PathBuf>,
}

impl UserProfileStore {
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_dir: users_dir.into(),
            legacy_secrets_file: None,
        }
    }

    pub fn with_legacy_secrets_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_secrets_file = Some(path.into());
        self
    }

    fn counter_path(&self) -> PathBuf {
        self.users_dir.join(".userIdCounter")
    }

    fn profile_path(&self, user_id: UserId) -> PathBuf {
        self.users_dir.join(user_id.get().to_string()).join("profile.json")
    }

    /// Reads, increments, and writes back `users/.userIdCounter`, holding
    /// an advisory file lock across the whole read-modify-write so two
    /// concurrent callers in this process (or across processes on a
    /// lock-respecting filesystem) never observe the same value.
    pub async fn get_next_user_id(&self) -> Result<UserId, PipelineError> {
        tokio::fs::create_dir_all(&self.users_dir).await?;
        let counter_path = self.counter_path();

        // fd-lock is synchronous; the file is tiny (one integer) so doing
        // the whole cycle inside spawn_blocking keeps the async runtime
        // from stalling without reaching for an async lock crate just for
        // this one file.
        tokio::task::spawn_blocking(move || -> Result<u64, PipelineError> {
            let file = std::fs::OpenOptions::new().create(true).read(true).write(true).open(&counter_path)?;
            let mut locked = FileRwLock::new(file);
            let mut guard = locked.write().map_err(|e| PipelineError::internal(format!("failed to lock user-id counter: {e}")))?;

            use std::io::{Read, Seek, SeekFrom, Write};
            let mut contents = String::new();
            guard.read_to_string(&mut contents)?;
            let current: u64 = contents.trim().parse().unwrap_or(0);
            let next = current + 1;

            guard.set_len(0)?;
            guard.seek(SeekFrom::Start(0))?;
            guard.write_all(next.to_string().as_bytes())?;
            guard.flush()?;
            Ok(current + 1)
        })
        .await
        .map_err(|e| PipelineError::internal(format!("counter task panicked: {e}")))??
        .try_into()
    }

    /// Issues an id, creates `users/{id}/` and `users/{id}/cache/`, and
    /// persists a populated template profile.
    pub async fn create_new_user(&self, name: Option<String>, email: Option<String>) -> Result<UserId, PipelineError> {
        let user_id = self.get_next_user_id().await?;
        let user_dir = self.users_dir.join(user_id.get().to_string());
        tokio::fs::create_dir_all(user_dir.join("cache")).await?;

        let profile = UserProfile::new_template(user_id, name, email);
        self.save(&profile).await?;
        Ok(user_id)
    }

    pub async fn user_exists(&self, user_id: UserId) -> bool {
        tokio::fs::metadata(self.profile_path(user_id)).await.is_ok()
    }

    /// Lists every numeric directory under `users/` that looks like a
    /// user id. Never acquires the counter lock, per the sharing
    /// discipline in §5.
    pub async fn list_users(&self) -> Result<Vec<UserId>, PipelineError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.users_dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(raw) = name.parse::<u64>() {
                    if let Some(id) = UserId::new(raw) {
                        out.push(id);
                    }
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// Reads `users/{userId}/profile.json`. If it is absent and a legacy
    /// secrets file was configured, synthesizes a profile from it and
    /// persists it under the new id as a one-shot migration.
    pub async fn load(&self, user_id: UserId) -> Result<UserProfile, PipelineError> {
        let path = self.profile_path(user_id);
        match crate::util::read_json_opt::<UserProfile>(&path).await? {
            Some(mut profile) => {
                if profile.user_id != user_id.get() {
                    tracing::warn!(
                        expected = user_id.get(),
                        found = profile.user_id,
                        "profile userId does not match directory name; correcting"
                    );
                    profile.user_id = user_id.get();
                }
                profile.validate_schema()?;
                Ok(profile)
            }
            None => self.migrate_legacy(user_id).await,
        }
    }

    async fn migrate_legacy(&self, user_id: UserId) -> Result<UserProfile, PipelineError> {
        let Some(legacy_path) = &self.legacy_secrets_file else {
            return Err(PipelineError::invalid_profile(format!("no profile found for user {user_id}")));
        };
        let legacy: Option<serde_json::Value> = crate::util::read_json_opt(legacy_path).await?;
        let Some(legacy) = legacy else {
            return Err(PipelineError::invalid_profile(format!("no profile found for user {user_id}")));
        };

        let mut profile = UserProfile::new_template(user_id, None, None);
        if let serde_json::Value::Object(services) = &legacy {
            for (service, keys) in services {
                if let serde_json::Value::Object(keys) = keys {
                    for (key, value) in keys {
                        if let Some(value) = value.as_str() {
                            profile.set_credential(service, key, value);
                        }
                    }
                }
            }
        }
        self.save(&profile).await?;
        tracing::info!(user_id = %user_id, "migrated legacy secrets file into new profile");
        Ok(profile)
    }

    /// Atomic write of the profile JSON.
    pub async fn save(&self, profile: &UserProfile) -> Result<(), PipelineError> {
        profile.validate_schema()?;
        let user_id = UserId::new(profile.user_id).ok_or_else(|| PipelineError::invalid_profile("userId must be a positive integer"))?;
        write_json_atomic(&self.profile_path(user_id), profile).await
    }

    pub fn users_dir(&self) -> &Path {
        &self.users_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_whisperx_domain::value_objects::workflow::Workflow;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scenario_s1_user_creation() {
        let dir = tempdir().unwrap();
        let store = UserProfileStore::new(dir.path());

        let first = store.create_new_user(Some("Alice".into()), None).await.unwrap();
        assert_eq!(first.get(), 1);

        let profile = store.load(first).await.unwrap();
        assert_eq!(profile.user_id, 1);
        assert_eq!(profile.user.name.as_deref(), Some("Alice"));

        let counter = tokio::fs::read_to_string(dir.path().join(".userIdCounter")).await.unwrap();
        assert_eq!(counter, "2");

        let second = store.get_next_user_id().await.unwrap();
        assert_eq!(second.get(), 2);
    }

    #[tokio::test]
    async fn concurrent_id_issuance_is_monotone_and_contiguous() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(UserProfileStore::new(dir.path()));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.get_next_user_id().await.unwrap().get() }));
        }
        let mut ids: Vec<u64> = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort();
        let expected: Vec<u64> = (1..=20).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn load_missing_profile_without_legacy_file_is_invalid_profile() {
        let dir = tempdir().unwrap();
        let store = UserProfileStore::new(dir.path());
        let err = store.load(UserId::new(1).unwrap()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidProfile(_)));
    }

    #[tokio::test]
    async fn load_migrates_legacy_secrets_once() {
        let dir = tempdir().unwrap();
        let legacy_path = dir.path().join("secrets.json");
        tokio::fs::write(&legacy_path, r#"{"huggingface": {"token": "legacy-tok"}}"#).await.unwrap();

        let store = UserProfileStore::new(dir.path().join("users")).with_legacy_secrets_file(legacy_path);
        let profile = store.load(UserId::new(1).unwrap()).await.unwrap();
        assert_eq!(profile.get_credential("huggingface", "token").as_deref(), Some("legacy-tok"));

        assert!(store.user_exists(UserId::new(1).unwrap()).await);
    }

    #[tokio::test]
    async fn list_users_returns_sorted_ids() {
        let dir = tempdir().unwrap();
        let store = UserProfileStore::new(dir.path());
        store.create_new_user(None, None).await.unwrap();
        store.create_new_user(None, None).await.unwrap();
        let users = store.list_users().await.unwrap();
        assert_eq!(users, vec![UserId::new(1).unwrap(), UserId::new(2).unwrap()]);
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_credentials() {
        let dir = tempdir().unwrap();
        let store = UserProfileStore::new(dir.path());
        let id = store.create_new_user(None, None).await.unwrap();

        let mut profile = store.load(id).await.unwrap();
        profile.set_credential("huggingface", "token", "tok");
        profile.set_credential("tmdb", "api_key", "key");
        store.save(&profile).await.unwrap();

        let reloaded = store.load(id).await.unwrap();
        assert!(reloaded.validate_for_workflow(Workflow::Subtitle).is_ok());
    }
}
