use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch directory standing in for the host's view of one or more boards.
/// Removed when dropped.
pub struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Absolute path of `relative` inside the scratch directory
    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Write `content` at `relative`, creating parent directories
    pub fn create_file_bytes(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    pub fn create_file(&self, relative: &str, content: &str) -> PathBuf {
        self.create_file_bytes(relative, content.as_bytes())
    }

    /// Empty file, e.g. a status page or a leftover image
    pub fn touch(&self, relative: &str) -> PathBuf {
        self.create_file_bytes(relative, b"")
    }

    pub fn create_dir(&self, relative: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(&path).expect("Failed to create dir");
        path
    }

    /// Empty directory standing in for a board's drive
    pub fn create_mount_point(&self, label: &str) -> PathBuf {
        self.create_dir(label)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    pub fn read_file(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("Failed to read file")
    }
}
