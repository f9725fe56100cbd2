use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

/// Writes `contents` to a `config.json` inside a unique temporary directory
/// and points `GRADER_CONFIG` at it for the duration of the test. The
/// directory is automatically cleaned up when the returned `TempDir` is
/// dropped.
///
/// Keep the returned `TempDir` in scope for as long as you need the file.
pub fn setup_test_config(contents: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let path = tmp.path().join("config.json");
    std::fs::write(&path, contents).expect("failed to write config.json");
    unsafe {
        env::set_var("GRADER_CONFIG", &path);
    }
    (tmp, path)
}
