// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::error::{PipelineError, Result};

/// A named configuration or image blob handed to an accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareBlob {
    pub name: String,
    pub data: Arc<[u8]>,
}

/// Resolves product-declared blob identifiers to their contents.
pub trait FirmwareLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<FirmwareBlob>;
}

/// Loads blobs from files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryFirmwareLoader {
    root: PathBuf,
}

impl DirectoryFirmwareLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FirmwareLoader for DirectoryFirmwareLoader {
    fn load(&self, name: &str) -> Result<FirmwareBlob> {
        if name.contains("..") || name.starts_with('/') {
            return Err(PipelineError::Firmware(format!(
                "{}: blob names must be relative",
                name
            )));
        }
        let path = self.root.join(name);
        let data = std::fs::read(&path)
            .map_err(|e| PipelineError::Firmware(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded firmware blob {} ({} bytes)", name, data.len());
        Ok(FirmwareBlob {
            name: name.to_string(),
            data: data.into(),
        })
    }
}
