//! Authoritative file contents working copies are created from.

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::error::{SyncError, SyncResult};

/// Supplies the saved content of a workspace file.
pub trait ContentSource: Send + Sync {
    fn read(&self, path: &str) -> SyncResult<String>;

    /// Project a file belongs to when the client did not say.
    ///
    /// Defaults to the first path segment: `/proj/src/A.java` → `/proj`.
    fn project_for(&self, path: &str) -> String {
        let trimmed = path.trim_start_matches('/');
        match trimmed.split('/').next() {
            Some(first) if !first.is_empty() => format!("/{}", first),
            _ => "/".to_string(),
        }
    }
}

/// Reads workspace paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a workspace path onto the file system. Parent components are rejected.
    pub fn resolve(&self, path: &str) -> SyncResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(SyncError::missing_working_copy(path));
        }
        Ok(self.root.join(relative))
    }
}

impl ContentSource for FsContentSource {
    fn read(&self, path: &str) -> SyncResult<String> {
        let file = self.resolve(path)?;
        Ok(std::fs::read_to_string(file)?)
    }
}

/// In-memory files, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryContentSource {
    files: DashMap<String, String>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.files.remove(path).map(|(_, content)| content)
    }
}

impl ContentSource for MemoryContentSource {
    fn read(&self, path: &str) -> SyncResult<String> {
        self.files
            .get(path)
            .map(|content| content.value().clone())
            .ok_or_else(|| SyncError::missing_working_copy(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::nested("/proj/src/A.java", "/proj")]
    #[case::top_level_file("/README.md", "/README.md")]
    #[case::root("/", "/")]
    fn default_project_is_first_segment(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(MemoryContentSource::new().project_for(path), expected);
    }

    #[test]
    fn fs_source_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("proj")).unwrap();
        std::fs::write(dir.path().join("proj/a.txt"), "hello").unwrap();

        let source = FsContentSource::new(dir.path());
        assert_eq!(source.read("/proj/a.txt").unwrap(), "hello");
        assert!(matches!(source.read("/proj/missing.txt"), Err(SyncError::Io(_))));
        assert!(source.read("/../etc/passwd").is_err());
    }

    #[test]
    fn memory_source_reports_missing_files() {
        let source = MemoryContentSource::new();
        source.insert("/proj/a.txt", "abc");
        assert_eq!(source.read("/proj/a.txt").unwrap(), "abc");
        assert!(matches!(
            source.read("/proj/b.txt"),
            Err(SyncError::MissingWorkingCopy { .. })
        ));
    }
}
