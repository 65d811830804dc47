// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Messages processed by the graph event loop.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use super::client::{StreamClient, StreamId, StreamRequest};
use crate::core::config::{ConfigNode, StreamType};
use crate::core::error::{PipelineError, Result};
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::graph::NodePath;
use crate::core::hardware::{CropRect, HardwareEvent};
use crate::core::memory::{ClientBuffers, ImageFormat};
use crate::core::nodes::NodeId;

/// Reply channel for a command.
pub type Reply<T> = Sender<Result<T>>;

/// Receiving end of a [`Reply`].
///
/// Replies are sent by the event loop, so a caller on the loop's own thread
/// must run the loop before the reply can arrive.
#[derive(Debug)]
pub struct PendingReply<T> {
    rx: Receiver<Result<T>>,
}

pub(crate) fn reply_channel<T>() -> (Reply<T>, PendingReply<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (tx, PendingReply { rx })
}

impl<T> PendingReply<T> {
    /// A reply that has already been decided.
    pub fn ready(result: Result<T>) -> Self {
        let (tx, pending) = reply_channel();
        let _ = tx.send(result);
        pending
    }

    /// Take the reply if it has arrived.
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PipelineError::PeerClosed)),
        }
    }

    /// Block until the reply arrives.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| PipelineError::PeerClosed)?
    }

    pub fn wait_timeout(self, timeout: Duration) -> Result<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::BadState(format!(
                "no reply within {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::PeerClosed),
        }
    }
}

/// Requests from clients and the device controller.
pub(crate) enum ManagerCommand {
    SetRoots {
        roots: Vec<ConfigNode>,
        reply: Reply<()>,
    },
    CreateStream {
        request: StreamRequest,
        reply: Reply<StreamClient>,
    },
    Disconnect {
        stream: StreamId,
    },
    Start {
        stream: StreamId,
    },
    Stop {
        stream: StreamId,
    },
    ReleaseFrame {
        stream: StreamId,
        buffer_id: u32,
    },
    SetRegionOfInterest {
        stream: StreamId,
        crop: CropRect,
        reply: Reply<()>,
    },
    SetImageFormat {
        stream: StreamId,
        format_index: u32,
        reply: Reply<()>,
    },
    GetImageFormats {
        stream: StreamId,
        reply: Reply<Vec<ImageFormat>>,
    },
    GetBuffers {
        stream: StreamId,
        reply: Reply<ClientBuffers>,
    },
    SetStreamingEnabled {
        enabled: bool,
    },
    Shutdown {
        next_roots: Option<Vec<ConfigNode>>,
        reply: Reply<()>,
    },
}

/// Everything the graph reacts to, in arrival order.
pub(crate) enum GraphEvent {
    Command(ManagerCommand),
    /// Raised by the hardware bound to a node.
    Hardware {
        path: NodePath,
        node: NodeId,
        event: HardwareEvent,
    },
    /// A node produced a frame for its children.
    Deliver {
        path: NodePath,
        node: NodeId,
        token: FrameToken,
        metadata: FrameMetadata,
    },
    /// An accelerator has queued input to hand to its task.
    Submit { path: NodePath, node: NodeId },
    /// A subtree finished its asynchronous shutdown.
    ShutdownComplete { path: NodePath },
    /// Look for one orphaned node to remove.
    Prune,
    /// Replay work deferred during a structural change.
    Drain,
}

/// Cloneable handle for posting onto a graph's event loop.
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<GraphEvent>,
}

impl EventSender {
    pub(crate) fn new(tx: Sender<GraphEvent>) -> Self {
        Self { tx }
    }

    /// Post an event. Returns false once the loop is gone.
    pub(crate) fn post(&self, event: GraphEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub(crate) fn command(&self, command: ManagerCommand) -> bool {
        self.post(GraphEvent::Command(command))
    }

    /// Allow or forbid streaming on every input node.
    pub fn set_streaming_enabled(&self, enabled: bool) {
        self.command(ManagerCommand::SetStreamingEnabled { enabled });
    }

    /// Request a full graph shutdown.
    pub fn shutdown(&self) -> PendingReply<()> {
        let (reply, pending) = reply_channel();
        if !self.command(ManagerCommand::Shutdown {
            next_roots: None,
            reply,
        }) {
            return PendingReply::ready(Err(PipelineError::PeerClosed));
        }
        pending
    }

    /// Request a new stream from another thread.
    pub fn create_stream(&self, request: StreamRequest) -> PendingReply<StreamClient> {
        let (reply, pending) = reply_channel();
        if !self.command(ManagerCommand::CreateStream { request, reply }) {
            return PendingReply::ready(Err(PipelineError::PeerClosed));
        }
        pending
    }
}

/// Structural changes, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphNotification {
    NodeCreated {
        path: NodePath,
        kind: &'static str,
    },
    NodeRemoved {
        path: NodePath,
    },
    StreamBound {
        stream: StreamId,
        path: NodePath,
        stream_type: StreamType,
    },
    StreamUnbound {
        stream: StreamId,
        path: NodePath,
    },
    ShutdownComplete,
}
