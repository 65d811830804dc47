// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Static description of one pipeline stage and its possible successors.

use serde::{Deserialize, Serialize};

use super::StreamType;
use crate::core::error::ConfigError;
use crate::core::graph::NodePath;
use crate::core::hardware::CropRect;
use crate::core::memory::{BufferCollectionConstraints, ImageFormat};
use crate::core::rational::Fraction;

/// Frames per second as an exact ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    #[serde(default = "default_denominator")]
    pub denominator: u32,
}

fn default_denominator() -> u32 {
    1
}

impl FrameRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn fps(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    pub fn as_fraction(&self) -> Fraction {
        Fraction::new(i64::from(self.numerator), i64::from(self.denominator))
    }

    /// Seconds per frame.
    pub fn interval(&self) -> Fraction {
        self.as_fraction().reciprocal()
    }
}

/// A watermark image and where to blend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    pub filename: String,
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
}

/// What a config node does, with its kind-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Sensor output through the ISP.
    Input {
        #[serde(default = "default_input_variant")]
        variant: String,
    },
    /// Scale/crop accelerator with its firmware configuration blobs, one
    /// per output format.
    Scaler {
        #[serde(default)]
        config_files: Vec<String>,
    },
    /// Compositor resize, optionally cropped.
    Resize {
        #[serde(default)]
        crop: Option<CropRect>,
    },
    /// Compositor watermark blend.
    Watermark { watermarks: Vec<WatermarkConfig> },
    /// Rate alignment only.
    PassThrough,
    /// Client-visible stream.
    Output,
}

fn default_input_variant() -> String {
    "full_resolution".to_string()
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Input { .. } => "input",
            NodeKind::Scaler { .. } => "scaler",
            NodeKind::Resize { .. } => "resize",
            NodeKind::Watermark { .. } => "watermark",
            NodeKind::PassThrough => "pass_through",
            NodeKind::Output => "output",
        }
    }

    pub fn is_compositor(&self) -> bool {
        matches!(self, NodeKind::Resize { .. } | NodeKind::Watermark { .. })
    }

    pub fn is_accelerator(&self) -> bool {
        matches!(self, NodeKind::Scaler { .. }) || self.is_compositor()
    }
}

/// A stream type a node can serve, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSupport {
    pub stream_type: StreamType,
    #[serde(default)]
    pub supports_dynamic_resolution: bool,
    #[serde(default)]
    pub supports_crop_region: bool,
}

impl StreamSupport {
    pub fn new(stream_type: StreamType) -> Self {
        Self {
            stream_type,
            supports_dynamic_resolution: false,
            supports_crop_region: false,
        }
    }
}

/// One node of the static config tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    pub kind: NodeKind,
    pub frame_rate: FrameRate,
    #[serde(default)]
    pub supported_streams: Vec<StreamSupport>,
    #[serde(default)]
    pub children: Vec<ConfigNode>,
    /// Constraints on buffers this node reads.
    #[serde(default)]
    pub input_constraints: Option<BufferCollectionConstraints>,
    /// Constraints on buffers this node writes. Absent means the node works
    /// in place on its parent's buffers.
    #[serde(default)]
    pub output_constraints: Option<BufferCollectionConstraints>,
    #[serde(default)]
    pub image_formats: Vec<ImageFormat>,
}

impl ConfigNode {
    pub fn new(kind: NodeKind, frame_rate: FrameRate) -> Self {
        Self {
            kind,
            frame_rate,
            supported_streams: Vec::new(),
            children: Vec::new(),
            input_constraints: None,
            output_constraints: None,
            image_formats: Vec::new(),
        }
    }

    pub fn with_stream(mut self, support: StreamSupport) -> Self {
        self.supported_streams.push(support);
        self
    }

    pub fn with_child(mut self, child: ConfigNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_input_constraints(mut self, constraints: BufferCollectionConstraints) -> Self {
        self.input_constraints = Some(constraints);
        self
    }

    pub fn with_output_constraints(mut self, constraints: BufferCollectionConstraints) -> Self {
        self.output_constraints = Some(constraints);
        self
    }

    pub fn with_image_format(mut self, format: ImageFormat) -> Self {
        self.image_formats.push(format);
        self
    }

    pub fn is_output(&self) -> bool {
        matches!(self.kind, NodeKind::Output)
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input { .. })
    }

    /// Whether this node works on its parent's buffer collection.
    pub fn is_in_place(&self) -> bool {
        self.output_constraints.is_none()
    }

    pub fn supports(&self, stream_type: StreamType) -> bool {
        self.support(stream_type).is_some()
    }

    pub fn support(&self, stream_type: StreamType) -> Option<&StreamSupport> {
        self.supported_streams
            .iter()
            .find(|support| support.stream_type == stream_type)
    }

    pub fn interval(&self) -> Fraction {
        self.frame_rate.interval()
    }

    /// The node at `path`, with `roots` as the first level.
    pub fn lookup<'a>(roots: &'a [ConfigNode], path: &NodePath) -> Option<&'a ConfigNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = roots.get(usize::from(*first))?;
        for index in rest {
            node = node.children.get(usize::from(*index))?;
        }
        Some(node)
    }
}

/// Find the one node in `candidates` that serves `stream_type`.
///
/// `parent` labels the level in errors. Zero or several matches mean the
/// product configuration is broken.
pub fn find_matching_child<'a>(
    candidates: &'a [ConfigNode],
    stream_type: StreamType,
    parent: &str,
) -> Result<(u8, &'a ConfigNode), ConfigError> {
    let mut matches = candidates
        .iter()
        .enumerate()
        .filter(|(_, node)| node.supports(stream_type));
    let Some((index, node)) = matches.next() else {
        return Err(ConfigError::MissingStreamType {
            stream_type: stream_type.to_string(),
            parent: parent.to_string(),
        });
    };
    let extra = matches.count();
    if extra > 0 {
        return Err(ConfigError::AmbiguousStreamType {
            stream_type: stream_type.to_string(),
            parent: parent.to_string(),
            matches: extra + 1,
        });
    }
    let index = u8::try_from(index).map_err(|_| ConfigError::MalformedNode {
        path: parent.to_string(),
        reason: format!("child index {} exceeds path range", index),
    })?;
    Ok((index, node))
}

/// Walk the tree from `roots` to the output node serving `stream_type`.
pub fn resolve_stream_path(
    roots: &[ConfigNode],
    stream_type: StreamType,
) -> Result<NodePath, ConfigError> {
    let (index, mut node) = find_matching_child(roots, stream_type, "roots")?;
    let mut path = NodePath::root(index);
    while !node.is_output() {
        if node.children.is_empty() {
            return Err(ConfigError::NoOutputNode {
                path: path.to_string(),
            });
        }
        let (index, child) = find_matching_child(&node.children, stream_type, &path.to_string())?;
        path = path.child(index);
        node = child;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FR: StreamType = StreamType::FULL_RESOLUTION;
    const DS: StreamType = StreamType::DOWNSCALED_RESOLUTION;
    const ML: StreamType = StreamType::MACHINE_LEARNING;

    fn output(stream_type: StreamType) -> ConfigNode {
        ConfigNode::new(NodeKind::Output, FrameRate::fps(30))
            .with_stream(StreamSupport::new(stream_type))
    }

    fn tree() -> Vec<ConfigNode> {
        let scaler = ConfigNode::new(
            NodeKind::Scaler {
                config_files: vec!["gdc_ds.bin".into()],
            },
            FrameRate::fps(30),
        )
        .with_stream(StreamSupport::new(DS | ML))
        .with_child(output(DS | ML));

        vec![ConfigNode::new(
            NodeKind::Input {
                variant: "full_resolution".into(),
            },
            FrameRate::fps(30),
        )
        .with_stream(StreamSupport::new(FR | ML))
        .with_stream(StreamSupport::new(DS | ML))
        .with_child(output(FR | ML))
        .with_child(scaler)]
    }

    #[test]
    fn test_resolve_unique_paths() {
        let roots = tree();
        assert_eq!(
            resolve_stream_path(&roots, FR | ML),
            Ok(NodePath::from_indices([0, 0]))
        );
        assert_eq!(
            resolve_stream_path(&roots, DS | ML),
            Ok(NodePath::from_indices([0, 1, 0]))
        );
    }

    #[test]
    fn test_support_is_exact_match() {
        let roots = tree();
        // A subset of a supported combination is a different stream type.
        assert!(matches!(
            resolve_stream_path(&roots, FR),
            Err(ConfigError::MissingStreamType { .. })
        ));
    }

    #[test]
    fn test_ambiguous_children_detected() {
        let mut roots = tree();
        roots[0].children.push(output(FR | ML));
        assert_eq!(
            resolve_stream_path(&roots, FR | ML),
            Err(ConfigError::AmbiguousStreamType {
                stream_type: (FR | ML).to_string(),
                parent: "0".into(),
                matches: 2,
            })
        );
    }

    #[test]
    fn test_tree_without_output_is_detected() {
        let mut roots = tree();
        roots[0].children[1].children.clear();
        assert_eq!(
            resolve_stream_path(&roots, DS | ML),
            Err(ConfigError::NoOutputNode {
                path: "0.1".into()
            })
        );
    }

    #[test]
    fn test_lookup_by_path() {
        let roots = tree();
        let node = ConfigNode::lookup(&roots, &NodePath::from_indices([0, 1])).unwrap();
        assert!(matches!(node.kind, NodeKind::Scaler { .. }));
        assert!(ConfigNode::lookup(&roots, &NodePath::from_indices([0, 5])).is_none());
    }

    #[test]
    fn test_frame_rate_interval() {
        assert_eq!(FrameRate::fps(30).interval(), Fraction::new(1, 30));
        assert_eq!(
            FrameRate::new(30000, 1001).interval(),
            Fraction::new(1001, 30000)
        );
        assert!(!FrameRate::new(0, 1).is_valid());
    }

    #[test]
    fn test_node_from_yaml() {
        let yaml = r#"
kind:
  type: scaler
  config_files: [config_1080p.bin, config_720p.bin]
frame_rate: { numerator: 30 }
supported_streams:
  - stream_type: DOWNSCALED_RESOLUTION | MACHINE_LEARNING
    supports_dynamic_resolution: true
output_constraints:
  min_buffer_count_for_camping: 2
image_formats:
  - { pixel_format: nv12, width: 1920, height: 1080, bytes_per_row: 1920 }
  - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
"#;
        let node: ConfigNode = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(node.frame_rate, FrameRate::fps(30));
        assert_eq!(node.image_formats.len(), 2);
        assert!(!node.is_in_place());
        let support = node.support(DS | ML).unwrap();
        assert!(support.supports_dynamic_resolution);
        assert!(!support.supports_crop_region);
    }
}
