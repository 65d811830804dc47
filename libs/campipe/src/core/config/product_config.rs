// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Product configuration loaded from YAML.
//!
//! A product lists the stream configurations a client may choose from
//! (`external_configs`) and, index-aligned with them, the node trees that
//! realize each configuration (`internal_configs`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::StreamType;
use super::node_descriptor::{ConfigNode, FrameRate, NodeKind, resolve_stream_path};
use crate::core::error::{ConfigError, PipelineError, Result};
use crate::core::graph::NodePath;
use crate::core::memory::{BufferCollectionConstraints, ImageFormat};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub vendor_name: String,
    #[serde(default)]
    pub vendor_id: u16,
    pub product_name: String,
    #[serde(default)]
    pub product_id: u16,
}

/// A stream as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub stream_type: StreamType,
    pub frame_rate: FrameRate,
    pub image_formats: Vec<ImageFormat>,
    /// Constraints the client is expected to apply to its own buffers.
    #[serde(default)]
    pub constraints: BufferCollectionConstraints,
}

/// One selectable stream configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub streams: Vec<StreamDescription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateRange {
    pub min: FrameRate,
    pub max: FrameRate,
}

/// The node trees behind one external config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalConfig {
    pub roots: Vec<ConfigNode>,
    pub frame_rate_range: FrameRateRange,
}

/// Source of the static product configuration.
pub trait ConfigProvider: Send + Sync {
    fn device_info(&self) -> &DeviceInfo;

    fn external_configs(&self) -> &[ExternalConfig];

    /// Index-aligned with `external_configs`.
    fn internal_configs(&self) -> &[InternalConfig];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductConfig {
    pub device_info: DeviceInfo,
    pub external_configs: Vec<ExternalConfig>,
    pub internal_configs: Vec<InternalConfig>,
}

impl ProductConfig {
    /// Load and validate a product configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| match e {
            PipelineError::Configuration(msg) => {
                PipelineError::Configuration(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        tracing::info!(
            "Loaded product config {} from {}",
            config.device_info.product_name,
            path.display()
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::Configuration(format!("Failed to parse: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural rules every product configuration must satisfy.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.external_configs.len() != self.internal_configs.len() {
            return Err(ConfigError::MisalignedConfigs {
                external: self.external_configs.len(),
                internal: self.internal_configs.len(),
            });
        }

        for (config_index, internal) in self.internal_configs.iter().enumerate() {
            if !internal.frame_rate_range.min.is_valid()
                || !internal.frame_rate_range.max.is_valid()
            {
                return Err(ConfigError::MalformedNode {
                    path: format!("config {}", config_index),
                    reason: "frame rate range must be nonzero".into(),
                });
            }
            for (root_index, root) in internal.roots.iter().enumerate() {
                if !root.is_input() {
                    return Err(ConfigError::MalformedNode {
                        path: root_index.to_string(),
                        reason: format!("root is {}, expected input", root.kind.name()),
                    });
                }
                let path = NodePath::root(u8::try_from(root_index).map_err(|_| {
                    ConfigError::MalformedNode {
                        path: format!("config {}", config_index),
                        reason: "too many roots".into(),
                    }
                })?);
                validate_node(root, &path)?;
            }
        }

        for (config_index, external) in self.external_configs.iter().enumerate() {
            let roots = &self.internal_configs[config_index].roots;
            for stream in &external.streams {
                resolve_stream_path(roots, stream.stream_type)?;
                if stream.image_formats.is_empty() {
                    return Err(ConfigError::MalformedNode {
                        path: format!("config {}", config_index),
                        reason: format!("stream {} lists no image formats", stream.stream_type),
                    });
                }
            }
        }
        Ok(())
    }

    /// Roots of the node trees for one config.
    pub fn roots(&self, config_index: usize) -> Option<&[ConfigNode]> {
        self.internal_configs
            .get(config_index)
            .map(|internal| internal.roots.as_slice())
    }
}

fn validate_node(node: &ConfigNode, path: &NodePath) -> std::result::Result<(), ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedNode {
        path: path.to_string(),
        reason,
    };

    if !node.frame_rate.is_valid() {
        return Err(malformed("frame rate must be nonzero".into()));
    }
    if node.is_input() && !path.is_root() {
        return Err(malformed("input nodes may only be roots".into()));
    }
    if node.is_input() && node.output_constraints.is_none() {
        return Err(malformed("input nodes need output constraints".into()));
    }
    match &node.kind {
        NodeKind::Scaler { config_files } => {
            if config_files.is_empty() {
                return Err(malformed("scaler has no config files".into()));
            }
            if node.image_formats.len() > 1 && config_files.len() != node.image_formats.len() {
                return Err(malformed(format!(
                    "{} config files for {} image formats",
                    config_files.len(),
                    node.image_formats.len()
                )));
            }
        }
        NodeKind::Watermark { watermarks } if watermarks.is_empty() => {
            return Err(malformed("watermark node has no watermarks".into()));
        }
        NodeKind::Output if !node.children.is_empty() => {
            return Err(malformed("output nodes cannot have children".into()));
        }
        _ => {}
    }
    if node.kind.is_accelerator() && node.children.len() > 1 {
        return Err(malformed("accelerator nodes feed a single child".into()));
    }
    if node.kind.is_accelerator() && node.input_constraints.is_none() {
        return Err(malformed("accelerator nodes need input constraints".into()));
    }
    if node.image_formats.is_empty()
        && !node.is_output()
        && !matches!(node.kind, NodeKind::PassThrough)
    {
        return Err(malformed("no image formats".into()));
    }

    for (index, child) in node.children.iter().enumerate() {
        let index = u8::try_from(index)
            .map_err(|_| malformed(format!("{} children exceed path range", node.children.len())))?;
        let child_path = path.child(index);
        // Pulldown can only divide a producer's rate, never raise it.
        if child.interval() < node.interval() {
            return Err(ConfigError::MalformedNode {
                path: child_path.to_string(),
                reason: format!(
                    "frame rate {}/{} exceeds its parent's {}/{}",
                    child.frame_rate.numerator,
                    child.frame_rate.denominator,
                    node.frame_rate.numerator,
                    node.frame_rate.denominator
                ),
            });
        }
        validate_node(child, &child_path)?;
    }
    Ok(())
}

impl ConfigProvider for ProductConfig {
    fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    fn external_configs(&self) -> &[ExternalConfig] {
        &self.external_configs
    }

    fn internal_configs(&self) -> &[InternalConfig] {
        &self.internal_configs
    }
}
