use std::path::PathBuf;

use anyhow::{Context, Result};
use interview_core::config::InterviewConfig;
use interview_core::storage::FileStore;

/// Paths given on the command line.
pub struct Paths {
    pub config: PathBuf,
    pub data_dir: Option<PathBuf>,
}

pub struct AppContext {
    pub config: InterviewConfig,
    pub data_dir: PathBuf,
}

impl AppContext {
    pub fn load(paths: &Paths) -> Result<Self> {
        let config = InterviewConfig::load(&paths.config)
            .with_context(|| format!("Failed to load config {}", paths.config.display()))?;
        let data_dir = paths
            .data_dir
            .clone()
            .unwrap_or_else(|| config.storage.data_dir.clone());
        Ok(Self { config, data_dir })
    }

    pub fn open_store(&self) -> Result<FileStore> {
        FileStore::open(&self.data_dir)
            .with_context(|| format!("Failed to open data directory {}", self.data_dir.display()))
    }
}
