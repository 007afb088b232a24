//! Test environment abstraction for isolated config testing.
//!
//! Provides `TestEnvironment` to manage:
//! - A private temporary directory
//! - Config files written into it
//! - The environment pairs a layer process would need to pick them up
//!
//! # Usage
//!
//! ```ignore
//! use xrsplice_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! let path = env.write_config("[sessions]\nmode = \"single\"\n")?;
//! let config = xrsplice_config::Config::load_from(&path)?;
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::ENV_CONFIG_PATH;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with its own config location
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Root of the isolated directory tree
    pub root: PathBuf,
    /// Where `write_config` puts the config file
    pub config_path: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();

        let config_dir = root.join("xrsplice");
        std::fs::create_dir_all(&config_dir)?;
        let config_path = config_dir.join(format!("config-{}.toml", test_id));

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            config_path,
            test_id,
        })
    }

    /// Write `contents` as the environment's config file
    pub fn write_config(&self, contents: &str) -> anyhow::Result<PathBuf> {
        std::fs::write(&self.config_path, contents)?;
        Ok(self.config_path.clone())
    }

    /// Create an arbitrary file relative to the environment root
    pub fn create_file(&self, relative_path: &str, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Environment variables for spawning a process that should load this
    /// environment's config.
    pub fn layer_env(&self) -> Vec<(String, String)> {
        vec![(
            ENV_CONFIG_PATH.to_string(),
            self.config_path.to_string_lossy().into_owned(),
        )]
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
