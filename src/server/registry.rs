//! Working copies keyed by normalized file path.
//!
//! Each entry sits behind its own mutex so operations on one path are
//! serialized while distinct paths proceed in parallel. A `DashMap` guard is
//! never held while an entry mutex is locked.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::content_source::ContentSource;
use super::working_copy::{TrackingState, WorkingCopy};
use crate::error::{LockResultExt, SyncError, SyncResult};
use crate::protocol::TextChange;

const LOG_TARGET: &str = "tandem::registry";

/// Registry key of a client path: `/proj/./src/../A.java` → `/proj/A.java`.
pub fn normalize_path(path: &str) -> String {
    path_clean::clean(path).to_string_lossy().into_owned()
}

/// Point-in-time copy of a working copy, taken under its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopySnapshot {
    pub path: String,
    pub file_location: String,
    pub project_path: String,
    pub content: String,
    pub revision: u64,
    pub synchronized: bool,
    pub owner_id: Option<String>,
    pub endpoint_id: Option<String>,
}

type SharedCopy = Arc<Mutex<WorkingCopy>>;

pub struct WorkingCopyRegistry {
    copies: DashMap<String, SharedCopy>,
    source: Arc<dyn ContentSource>,
}

impl WorkingCopyRegistry {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            copies: DashMap::new(),
            source,
        }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    fn entry(&self, key: &str) -> Option<SharedCopy> {
        self.copies.get(key).map(|copy| Arc::clone(copy.value()))
    }

    /// Create the mirror of `path` from its saved content.
    ///
    /// Idempotent: returns `Ok(false)` when a mirror already exists and leaves
    /// its content alone.
    pub fn start(&self, path: &str, project_path: Option<&str>) -> SyncResult<bool> {
        let key = normalize_path(path);
        if self.copies.contains_key(&key) {
            log::debug!(target: LOG_TARGET, "{} is already tracked", key);
            return Ok(false);
        }

        let content = self.source.read(&key)?;
        let project = project_path
            .map(str::to_string)
            .unwrap_or_else(|| self.source.project_for(&key));

        match self.copies.entry(key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(WorkingCopy::new(path, project, content))));
                log::debug!(target: LOG_TARGET, "Started tracking {}", key);
                Ok(true)
            }
        }
    }

    /// Drop the mirror of `path`. Returns whether one existed.
    pub fn stop(&self, path: &str) -> bool {
        let key = normalize_path(path);
        let removed = self.copies.remove(&key).is_some();
        if removed {
            log::debug!(target: LOG_TARGET, "Stopped tracking {}", key);
        }
        removed
    }

    /// Re-key a mirror, keeping content, owner and endpoint.
    ///
    /// A mirror already present at `new_path` is replaced.
    pub fn move_path(&self, old_path: &str, new_path: &str, project_path: Option<&str>) -> SyncResult<()> {
        let old_key = normalize_path(old_path);
        let new_key = normalize_path(new_path);
        if old_key == new_key {
            return Ok(());
        }

        let (_, copy) = self
            .copies
            .remove(&old_key)
            .ok_or_else(|| SyncError::missing_working_copy(old_path))?;
        {
            let mut guard = copy.lock().recover_poison("WorkingCopyRegistry::move_path");
            guard.relocate(new_path);
            if let Some(project) = project_path {
                guard.set_project_path(project);
            }
        }
        if self.copies.insert(new_key.clone(), copy).is_some() {
            log::warn!(target: LOG_TARGET, "Move replaced existing working copy {}", new_key);
        }
        log::debug!(target: LOG_TARGET, "Moved {} to {}", old_key, new_key);
        Ok(())
    }

    pub fn set_tracking_state(&self, path: &str, state: TrackingState) -> SyncResult<()> {
        let copy = self
            .entry(&normalize_path(path))
            .ok_or_else(|| SyncError::missing_working_copy(path))?;
        copy.lock()
            .recover_poison("WorkingCopyRegistry::set_tracking_state")
            .set_state(state);
        Ok(())
    }

    pub fn tracking_state(&self, path: &str) -> TrackingState {
        match self.entry(&normalize_path(path)) {
            Some(copy) => copy
                .lock()
                .recover_poison("WorkingCopyRegistry::tracking_state")
                .state(),
            None => TrackingState::Stopped,
        }
    }

    /// Fetch the mirror for a delta, creating it if needed.
    ///
    /// When the saved content cannot be read the mirror starts empty and
    /// desynchronized, so the first delta asks the client for a resync.
    fn get_or_create(&self, key: &str, file_location: &str, project_path: &str) -> SharedCopy {
        if let Some(copy) = self.entry(key) {
            return copy;
        }

        let project = if project_path.is_empty() {
            self.source.project_for(key)
        } else {
            project_path.to_string()
        };
        let copy = match self.source.read(key) {
            Ok(content) => WorkingCopy::new(file_location, project, content),
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Cannot read {} for a new working copy: {}",
                    key,
                    e
                );
                WorkingCopy::desynchronized(file_location, project)
            }
        };
        log::debug!(target: LOG_TARGET, "Created working copy {} on first change", key);

        let shared = self
            .copies
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(copy)));
        Arc::clone(shared.value())
    }

    /// Apply one wire change to its mirror. Returns the new revision.
    ///
    /// A resync replaces the content even when the mirror is desynchronized.
    pub fn apply_change(&self, change: &TextChange, endpoint_id: &str) -> SyncResult<u64> {
        let key = normalize_path(&change.file_location);
        let copy = self.get_or_create(&key, &change.file_location, &change.project_path);
        let mut guard = copy.lock().recover_poison("WorkingCopyRegistry::apply_change");
        guard.note_sender(endpoint_id, &change.working_copy_owner_id);

        if change.resync {
            let content = change.text.as_deref().unwrap_or_default();
            let revision = guard.resync(content);
            log::debug!(target: LOG_TARGET, "Resynced {} at revision {}", key, revision);
            return Ok(revision);
        }

        let mut revision = guard.revision();
        for delta in change.deltas() {
            revision = guard.apply(&delta)?;
        }
        log::trace!(target: LOG_TARGET, "Applied change to {} (revision {})", key, revision);
        Ok(revision)
    }

    pub fn snapshot(&self, path: &str) -> Option<WorkingCopySnapshot> {
        let key = normalize_path(path);
        let copy = self.entry(&key)?;
        let guard = copy.lock().recover_poison("WorkingCopyRegistry::snapshot");
        Some(WorkingCopySnapshot {
            path: key,
            file_location: guard.file_location().to_string(),
            project_path: guard.project_path().to_string(),
            content: guard.content().to_string(),
            revision: guard.revision(),
            synchronized: guard.is_synchronized(),
            owner_id: guard.owner_id().map(str::to_string),
            endpoint_id: guard.endpoint_id().map(str::to_string),
        })
    }

    /// Current revision of the mirror of `path`.
    pub fn revision(&self, path: &str) -> Option<u64> {
        let copy = self.entry(&normalize_path(path))?;
        let revision = copy.lock().recover_poison("WorkingCopyRegistry::revision").revision();
        Some(revision)
    }

    pub fn content(&self, path: &str) -> Option<String> {
        let copy = self.entry(&normalize_path(path))?;
        let guard = copy.lock().recover_poison("WorkingCopyRegistry::content");
        Some(guard.content().to_string())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.copies.contains_key(&normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// Keys of every mirror belonging to `project_path`, sorted.
    pub fn paths_in_project(&self, project_path: &str) -> Vec<String> {
        let copies: Vec<(String, SharedCopy)> = self
            .copies
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut paths: Vec<String> = copies
            .into_iter()
            .filter(|(_, copy)| {
                copy.lock()
                    .recover_poison("WorkingCopyRegistry::paths_in_project")
                    .project_path()
                    == project_path
            })
            .map(|(key, _)| key)
            .collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::content_source::MemoryContentSource;
    use crate::text::EditDelta;
    use rstest::rstest;

    fn registry_with(files: &[(&str, &str)]) -> WorkingCopyRegistry {
        let source = MemoryContentSource::new();
        for (path, content) in files {
            source.insert(*path, *content);
        }
        WorkingCopyRegistry::new(Arc::new(source))
    }

    fn change(delta: EditDelta, path: &str) -> TextChange {
        TextChange::from_delta(&delta, path, "/proj", "owner")
    }

    #[rstest]
    #[case::dot_segment("/proj/./src/A.java", "/proj/src/A.java")]
    #[case::parent_segment("/proj/src/../A.java", "/proj/A.java")]
    #[case::double_slash("/proj//A.java", "/proj/A.java")]
    fn paths_are_normalized(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(raw), expected);
    }

    #[test]
    fn round_trip_insert_then_remove() {
        let registry = registry_with(&[("/proj/a.txt", "abc")]);
        registry
            .apply_change(&change(EditDelta::insert(1, "XY"), "/proj/a.txt"), "c")
            .unwrap();
        assert_eq!(registry.content("/proj/a.txt").unwrap(), "aXYbc");
        registry
            .apply_change(&change(EditDelta::remove(1, 2), "/proj/a.txt"), "c")
            .unwrap();
        assert_eq!(registry.content("/proj/a.txt").unwrap(), "abc");
    }

    #[test]
    fn start_twice_keeps_existing_content() {
        let registry = registry_with(&[("/proj/a.txt", "saved")]);
        assert!(registry.start("/proj/a.txt", None).unwrap());
        registry
            .apply_change(&change(EditDelta::insert(0, ">"), "/proj/a.txt"), "c")
            .unwrap();

        assert!(!registry.start("/proj/a.txt", None).unwrap());
        assert_eq!(registry.content("/proj/a.txt").unwrap(), ">saved");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stop_removes_mirror() {
        let registry = registry_with(&[("/proj/a.txt", "abc")]);
        registry.start("/proj/a.txt", None).unwrap();
        assert!(registry.stop("/proj/a.txt"));
        assert!(!registry.stop("/proj/a.txt"));
        assert_eq!(registry.tracking_state("/proj/a.txt"), TrackingState::Stopped);
    }

    #[test]
    fn move_rekeys_with_content_and_owner() {
        let registry = registry_with(&[("/proj/Old.java", "class Old {}")]);
        registry
            .apply_change(&change(EditDelta::insert(0, "//\n"), "/proj/Old.java"), "client-1")
            .unwrap();

        registry.move_path("/proj/Old.java", "/proj/New.java", None).unwrap();

        assert!(!registry.contains("/proj/Old.java"));
        let snapshot = registry.snapshot("/proj/New.java").unwrap();
        assert_eq!(snapshot.content, "//\nclass Old {}");
        assert_eq!(snapshot.file_location, "/proj/New.java");
        assert_eq!(snapshot.owner_id.as_deref(), Some("owner"));
        assert_eq!(snapshot.endpoint_id.as_deref(), Some("client-1"));
    }

    #[test]
    fn move_of_untracked_path_fails() {
        let registry = registry_with(&[]);
        assert!(matches!(
            registry.move_path("/proj/A.java", "/proj/B.java", None),
            Err(SyncError::MissingWorkingCopy { .. })
        ));
    }

    #[test]
    fn first_delta_creates_mirror_lazily() {
        let registry = registry_with(&[("/proj/a.txt", "abc")]);
        registry
            .apply_change(&change(EditDelta::insert(3, "d"), "/proj/a.txt"), "c")
            .unwrap();
        assert_eq!(registry.content("/proj/a.txt").unwrap(), "abcd");
        assert_eq!(registry.paths_in_project("/proj"), vec!["/proj/a.txt".to_string()]);
    }

    #[test]
    fn unreadable_file_yields_desynchronized_mirror_until_resync() {
        let registry = registry_with(&[]);
        let err = registry
            .apply_change(&change(EditDelta::insert(0, "x"), "/proj/new.txt"), "c")
            .unwrap_err();
        assert!(err.requires_resync());

        let resync = TextChange::resync("full text", "/proj/new.txt", "/proj", "owner");
        registry.apply_change(&resync, "c").unwrap();
        let snapshot = registry.snapshot("/proj/new.txt").unwrap();
        assert!(snapshot.synchronized);
        assert_eq!(snapshot.content, "full text");
    }

    #[test]
    fn suspend_is_recorded_without_blocking_deltas() {
        let registry = registry_with(&[("/proj/a.txt", "abc")]);
        registry.start("/proj/a.txt", None).unwrap();
        registry
            .set_tracking_state("/proj/a.txt", TrackingState::Suspended)
            .unwrap();
        assert_eq!(registry.tracking_state("/proj/a.txt"), TrackingState::Suspended);

        registry
            .apply_change(&change(EditDelta::remove(0, 1), "/proj/a.txt"), "c")
            .unwrap();
        assert_eq!(registry.content("/proj/a.txt").unwrap(), "bc");
    }
}
