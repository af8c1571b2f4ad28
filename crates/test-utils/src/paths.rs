//! Temporary directory helpers for tests that write rasters.

use std::path::PathBuf;

/// A temporary root with `outputs/` and `temp/` subdirectories, removed on drop.
pub struct TestWorkspace {
    root: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let root = temp_test_dir_with_prefix("acquisition_test_");
        std::fs::create_dir_all(root.path().join("outputs"))
            .expect("Failed to create outputs directory");
        std::fs::create_dir_all(root.path().join("temp")).expect("Failed to create temp directory");
        Self { root }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.path().join("outputs")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.path().join("temp")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a temporary directory with a specific prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let ws = TestWorkspace::new();
        assert!(ws.output_dir().is_dir());
        assert!(ws.temp_dir().is_dir());
        assert_eq!(ws.output_dir().parent(), ws.temp_dir().parent());
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("raster_test_");
        let path_str = dir.path().to_string_lossy();
        assert!(path_str.contains("raster_test_"));
    }
}
