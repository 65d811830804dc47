// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Runtime settings via `campipe.toml`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub filter: String,
    pub with_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            with_target: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Initial state of the global streaming switch.
    pub streaming_enabled: bool,
    /// Prefix for buffer collection names handed to the allocator.
    pub allocation_tag_prefix: String,
    pub logging: LoggingSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            streaming_enabled: true,
            allocation_tag_prefix: "campipe".to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub const FILE_NAME: &'static str = "campipe.toml";

    /// Load settings from a TOML file. Returns error if the file is missing
    /// or cannot be parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded pipeline settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults if the file is missing or
    /// unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Buffer collection name for the node at `path`.
    pub fn allocation_tag(&self, path: &impl std::fmt::Display) -> String {
        format!("{}-{}", self.allocation_tag_prefix, path)
    }
}
