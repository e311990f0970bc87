// Integration test utilities and common code

pub mod fixtures;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary corpus directory holding standoff pairs
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self {
            temp_dir,
            root_path,
        }
    }

    /// Write a file below the corpus root, creating parent directories
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Write `<key>.txt` and `<key>.ann`, returning the annotation path
    pub fn create_pair(&self, key: &str, text: &str, ann: &str) -> PathBuf {
        self.create_file(format!("{key}.txt"), text);
        self.create_file(format!("{key}.ann"), ann)
    }

    /// Path of a directory below the root that does not exist yet
    pub fn subdir(&self, name: &str) -> PathBuf {
        self.root_path.join(name)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
