use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

/// Runtime limits applied to every check in a grading run.
///
/// Values omitted from the config file fall back to their field defaults,
/// so a partial `config.json` is always usable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Deadline for a single check, in seconds. Individual checks may
    /// override this with their own limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How many workers abandoned by timed-out checks may still be running
    /// before the harness refuses to start another check.
    #[serde(default = "default_max_abandoned_workers")]
    pub max_abandoned_workers: usize,
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_max_abandoned_workers() -> usize {
    4
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_abandoned_workers: default_max_abandoned_workers(),
        }
    }
}

impl ExecutionConfig {
    /// The per-check deadline as a `Duration`.
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Attempts to load a config from a JSON file.
    /// Returns `None` if the file does not exist or cannot be parsed.
    pub fn from_file(path: &Path) -> Option<Self> {
        let file_contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&file_contents).ok()
    }

    /// Loads the config pointed at by the `GRADER_CONFIG` environment
    /// variable, falling back to the defaults if the variable is unset or
    /// the file is unusable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        match env::var("GRADER_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }
}
