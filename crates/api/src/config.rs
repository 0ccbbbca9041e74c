use assemble::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: OperationMode,
    pub bind_addr: String,
    pub archive_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    Strict,   // Every target must be covered, no expiration drift tolerated
    Lenient,  // Partial coverage accepted, small drift ignored
    Balanced, // Default pipeline settings
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: OperationMode::Balanced,
            bind_addr: "0.0.0.0:3000".to_string(),
            archive_dir: None,
            pipeline: PipelineConfig::default(),
            cache: CacheConfig {
                enabled: true,
                max_entries: 1000,
            },
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn strict_mode() -> Self {
        Self {
            mode: OperationMode::Strict,
            pipeline: PipelineConfig::strict(),
            cache: CacheConfig {
                enabled: false,
                max_entries: 0,
            },
            ..Self::default()
        }
    }

    pub fn lenient_mode() -> Self {
        Self {
            mode: OperationMode::Lenient,
            pipeline: PipelineConfig::lenient(),
            cache: CacheConfig {
                enabled: true,
                max_entries: 5000,
            },
            ..Self::default()
        }
    }

    pub fn for_mode(mode: OperationMode) -> Self {
        match mode {
            OperationMode::Strict => Self::strict_mode(),
            OperationMode::Lenient => Self::lenient_mode(),
            OperationMode::Balanced => Self::default(),
        }
    }

    /// Switch to a mode's pipeline and cache presets, keeping where the
    /// service binds, reads archives from and how it logs.
    pub fn with_mode(self, mode: OperationMode) -> Self {
        Self {
            bind_addr: self.bind_addr,
            archive_dir: self.archive_dir,
            log_json: self.log_json,
            ..Self::for_mode(mode)
        }
    }
}
