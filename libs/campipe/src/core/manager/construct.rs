// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stream creation: resolving a stream type to a path and building the
//! nodes along it.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedSender};

use super::client::{FrameAvailable, StreamClient, StreamId, StreamRequest};
use super::events::{GraphEvent, GraphNotification, Reply};
use super::{PipelineManager, StreamBinding, fatal_config};
use crate::core::config::{ConfigNode, NodeKind, resolve_stream_path};
use crate::core::error::{PipelineError, Result};
use crate::core::graph::{FrameGraphNode, NodePath};
use crate::core::hardware::{
    Accelerator, HardwareCallback, OutputStreamRequest, TaskConfig, TaskRequest, WatermarkBlob,
};
use crate::core::memory::{
    BufferCollection, BufferCollectionConstraints, ImageFormat, allocate_shared_memory,
};
use crate::core::nodes::{
    AcceleratorKind, AcceleratorNode, DeliverFn, InputNode, NodeCore, NodeId, OutputNode,
    PassThroughNode, ProcessNode,
};

/// Client side of an output node about to be built.
struct OutputBinding {
    stream: StreamId,
    sender: UnboundedSender<FrameAvailable>,
    max_held: u32,
}

impl PipelineManager {
    pub(super) fn configure(&mut self, request: StreamRequest, reply: Reply<StreamClient>) {
        if !self.state.accepts_streams() {
            let error = match self.shutdown {
                Some(_) => PipelineError::ShuttingDown,
                None => PipelineError::BadState(format!(
                    "no configuration active, state is {:?}",
                    self.state
                )),
            };
            let _ = reply.send(Err(error));
            return;
        }
        if self.changing {
            tracing::debug!(
                "Graph changing, queueing {} stream request",
                request.stream_type
            );
            self.pending.push_creation(request, reply);
            return;
        }

        self.changing = true;
        match self.build_stream(request) {
            Ok(client) => {
                let path = client.path().clone();
                // A receiver dropped meanwhile drops the client, which
                // queues a disconnect.
                if reply.send(Ok(client)).is_err() {
                    tracing::debug!("[{}] Stream requester went away", path);
                }
                self.finish_change();
            }
            Err(e) => {
                tracing::warn!("{} stream creation failed: {}", request.stream_type, e);
                let _ = reply.send(Err(e));
                // Remove whatever part of the path was built.
                self.post(GraphEvent::Prune);
            }
        }
    }

    fn build_stream(&mut self, request: StreamRequest) -> Result<StreamClient> {
        let path = match resolve_stream_path(&self.roots, request.stream_type) {
            Ok(path) => path,
            Err(e) => fatal_config(e),
        };
        if self.graph.node(&path).is_some_and(ProcessNode::is_output) {
            return Err(PipelineError::AlreadyBound(format!(
                "{} is already served at {}",
                request.stream_type, path
            )));
        }

        let stream = StreamId(self.next_stream_id);
        self.next_stream_id += 1;
        let (sender, frames) = mpsc::unbounded_channel();
        let mut binding = Some(OutputBinding {
            stream,
            sender,
            max_held: request.buffer_count,
        });

        let indices = path.indices().to_vec();
        for depth in 1..=indices.len() {
            let prefix = NodePath::from_indices(indices[..depth].to_vec());
            if !self.graph.contains(&prefix) {
                self.construct_node(&prefix, &request, &mut binding)?;
            }
        }

        for depth in 1..=indices.len() {
            let prefix = NodePath::from_indices(indices[..depth].to_vec());
            if let Some(node) = self.graph.node_mut(&prefix) {
                node.core_mut().add_stream_type(request.stream_type);
            }
        }

        self.streams.insert(
            stream,
            StreamBinding {
                path: path.clone(),
                stream_type: request.stream_type,
            },
        );
        tracing::info!("[{}] Bound {} as {}", path, request.stream_type, stream);
        self.notify(GraphNotification::StreamBound {
            stream,
            path: path.clone(),
            stream_type: request.stream_type,
        });
        Ok(StreamClient::new(
            stream,
            path,
            request.stream_type,
            self.events(),
            frames,
        ))
    }

    /// Build the node at `path`; its parent must already be live.
    fn construct_node(
        &mut self,
        path: &NodePath,
        request: &StreamRequest,
        binding: &mut Option<OutputBinding>,
    ) -> Result<()> {
        let roots = Arc::clone(&self.roots);
        let config = ConfigNode::lookup(&roots, path).ok_or_else(|| {
            PipelineError::Configuration(format!("no config node at {}", path))
        })?;

        let (parent_formats, parent_format) = path
            .parent()
            .and_then(|parent| self.graph.node(&parent))
            .map(|parent| (parent.output_formats().to_vec(), parent.current_format()))
            .unwrap_or_default();

        let input_collection = match config.input_constraints {
            Some(_) => self
                .graph
                .nearest_collection_owner(path)
                .and_then(|owner| owner.owned_collection().cloned()),
            None => None,
        };

        let owned_collection = match &config.output_constraints {
            Some(own) => {
                let mut constraints = vec![own.clone()];
                collect_consumer_constraints(config, &mut constraints);
                let tag = self.settings.allocation_tag(path);
                let collection =
                    allocate_shared_memory(self.hardware.allocator.as_ref(), &constraints, &tag)?;
                tracing::debug!(
                    "[{}] Allocated {} buffers for {} participants",
                    path,
                    collection.buffer_count(),
                    constraints.len()
                );
                Some(Arc::new(collection))
            }
            None => None,
        };
        let output_collection = owned_collection
            .clone()
            .or_else(|| input_collection.clone());

        let output_formats = if config.image_formats.is_empty() {
            parent_formats.clone()
        } else {
            config.image_formats.clone()
        };
        let default_format = if output_formats.len() > 1
            && (request.image_format_index as usize) < output_formats.len()
        {
            request.image_format_index
        } else {
            0
        };

        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        let core = NodeCore::new(id, path.clone(), self.deliver_fn(path, id))
            .with_input(input_collection.clone(), parent_formats.clone())
            .with_output(output_collection.clone(), output_formats.clone())
            .with_current_format(default_format);

        let node = match &config.kind {
            NodeKind::Input { variant } => {
                let collection = owned_collection.clone().ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "input node {} declares no output constraints",
                        path
                    ))
                })?;
                let stream = self.hardware.isp.create_output_stream(
                    OutputStreamRequest {
                        collection,
                        format: output_formats.get(default_format as usize).copied(),
                        frame_rate: config.frame_rate.as_fraction(),
                        variant: variant.clone(),
                    },
                    self.hardware_callback(path, id),
                )?;
                ProcessNode::Input(InputNode::new(core, stream, self.streaming_enabled))
            }
            NodeKind::Scaler { config_files } => {
                let firmware = config_files
                    .iter()
                    .map(|name| self.hardware.firmware.load(name))
                    .collect::<Result<Vec<_>>>()?;
                let device = Arc::clone(&self.hardware.scaler);
                self.accelerator_node(
                    core,
                    AcceleratorKind::Scaler,
                    device,
                    TaskRequestParts {
                        input: input_collection,
                        output: output_collection,
                        input_format: pick_format(&parent_formats, parent_format),
                        output_formats: &output_formats,
                        default_format,
                    },
                    TaskConfig::Scale { firmware },
                )?
            }
            NodeKind::Resize { crop } => {
                let device = Arc::clone(&self.hardware.compositor);
                self.accelerator_node(
                    core,
                    AcceleratorKind::Resize,
                    device,
                    TaskRequestParts {
                        input: input_collection,
                        output: output_collection,
                        input_format: pick_format(&parent_formats, parent_format),
                        output_formats: &output_formats,
                        default_format,
                    },
                    TaskConfig::Resize { crop: *crop },
                )?
            }
            NodeKind::Watermark { watermarks } => {
                let watermarks = watermarks
                    .iter()
                    .map(|mark| {
                        Ok(WatermarkBlob {
                            blob: self.hardware.firmware.load(&mark.filename)?,
                            x: mark.x,
                            y: mark.y,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let device = Arc::clone(&self.hardware.compositor);
                self.accelerator_node(
                    core,
                    AcceleratorKind::Watermark,
                    device,
                    TaskRequestParts {
                        input: input_collection,
                        output: output_collection,
                        input_format: pick_format(&parent_formats, parent_format),
                        output_formats: &output_formats,
                        default_format,
                    },
                    TaskConfig::Watermark { watermarks },
                )?
            }
            NodeKind::PassThrough => ProcessNode::PassThrough(PassThroughNode::new(core)),
            NodeKind::Output => {
                let OutputBinding {
                    stream,
                    sender,
                    max_held,
                } = binding.take().ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "output node {} is not the end of its stream path",
                        path
                    ))
                })?;
                ProcessNode::Output(OutputNode::new(core, stream, sender, max_held))
            }
        };

        let kind = node.kind_name();
        self.graph
            .insert(FrameGraphNode::new(node, config.interval(), owned_collection));
        tracing::info!("[{}] Created {} node {}", path, kind, id);
        self.notify(GraphNotification::NodeCreated {
            path: path.clone(),
            kind,
        });
        Ok(())
    }

    fn accelerator_node(
        &self,
        core: NodeCore,
        kind: AcceleratorKind,
        device: Arc<dyn Accelerator>,
        parts: TaskRequestParts<'_>,
        config: TaskConfig,
    ) -> Result<ProcessNode> {
        let path = core.path().clone();
        let id = core.id();
        let missing = |what: &str| {
            PipelineError::Configuration(format!("{} node {} has no {}", kind.name(), path, what))
        };
        let input_collection = parts.input.ok_or_else(|| missing("input buffers"))?;
        let output_collection = parts.output.ok_or_else(|| missing("output buffers"))?;
        let input_format = parts
            .input_format
            .or_else(|| input_collection.image_format().copied())
            .ok_or_else(|| missing("input format"))?;

        let request = TaskRequest {
            name: path.to_string(),
            input_collection,
            output_collection,
            input_format: input_format.to_hw(),
            output_formats: parts
                .output_formats
                .iter()
                .map(ImageFormat::to_hw)
                .collect(),
            default_format_index: parts.default_format,
            config,
        };
        let in_place = request.is_in_place();
        let task = device.init_task(request, self.hardware_callback(&path, id))?;
        tracing::debug!(
            "[{}] Task {} initialized (in place: {})",
            path,
            task,
            in_place
        );

        let sender = self.events();
        let submit = Box::new(move || {
            sender.post(GraphEvent::Submit {
                path: path.clone(),
                node: id,
            });
        });
        Ok(ProcessNode::Accelerator(AcceleratorNode::new(
            core, kind, device, task, in_place, submit,
        )))
    }

    fn deliver_fn(&self, path: &NodePath, id: NodeId) -> DeliverFn {
        let sender = self.events();
        let path = path.clone();
        Box::new(move |token, metadata| {
            sender.post(GraphEvent::Deliver {
                path: path.clone(),
                node: id,
                token,
                metadata,
            });
        })
    }

    fn hardware_callback(&self, path: &NodePath, id: NodeId) -> HardwareCallback {
        let sender = self.events();
        let path = path.clone();
        Arc::new(move |event| {
            sender.post(GraphEvent::Hardware {
                path: path.clone(),
                node: id,
                event,
            });
        })
    }
}

/// Buffers and formats resolved for a new accelerator task.
struct TaskRequestParts<'a> {
    input: Option<Arc<BufferCollection>>,
    output: Option<Arc<BufferCollection>>,
    input_format: Option<ImageFormat>,
    output_formats: &'a [ImageFormat],
    default_format: u32,
}

fn pick_format(formats: &[ImageFormat], index: u32) -> Option<ImageFormat> {
    formats
        .get(index as usize)
        .or_else(|| formats.first())
        .copied()
}

/// Input constraints of every consumer that will read `node`'s buffers:
/// each child, and through in-place children their children too.
fn collect_consumer_constraints(node: &ConfigNode, out: &mut Vec<BufferCollectionConstraints>) {
    for child in &node.children {
        if let Some(constraints) = &child.input_constraints {
            out.push(constraints.clone());
        }
        if child.is_in_place() {
            collect_consumer_constraints(child, out);
        }
    }
}
