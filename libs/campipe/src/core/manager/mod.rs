// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The pipeline graph manager.
//!
//! [`PipelineManager`] owns the frame graph and a single event queue. Every
//! client command, hardware callback, frame fan-out and deferred step is a
//! [`GraphEvent`](events::GraphEvent) handled one at a time on whichever
//! thread drives [`PipelineManager::run_until_idle`]. Structural changes
//! (building or tearing down nodes) are serialized: while one is in flight,
//! new stream requests and disconnects are queued and replayed afterwards
//! by a scheduled drain.

mod client;
mod construct;
mod controls;
mod events;
mod join;
mod pending;
mod state;
mod streaming;
mod teardown;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

pub use self::client::{FrameAvailable, StreamClient, StreamId, StreamRequest};
pub use self::events::{EventSender, GraphNotification, PendingReply, Reply};
pub use self::state::ManagerState;

use self::events::{GraphEvent, ManagerCommand, reply_channel};
use self::pending::PendingRequestQueue;
use crate::core::config::{ConfigNode, PipelineSettings, StreamType};
use crate::core::error::{ConfigError, PipelineError, Result};
use crate::core::graph::{FrameGraph, NodePath};
use crate::core::hardware::PipelineHardware;

/// Where a bound stream lives in the graph.
#[derive(Debug, Clone)]
struct StreamBinding {
    path: NodePath,
    stream_type: StreamType,
}

/// An in-progress full shutdown.
struct ShutdownProgress {
    seeded: bool,
    waiters: Vec<Reply<()>>,
    next_roots: Option<Vec<ConfigNode>>,
}

pub struct PipelineManager {
    state: ManagerState,
    settings: PipelineSettings,
    hardware: PipelineHardware,
    roots: Arc<Vec<ConfigNode>>,
    graph: FrameGraph,

    /// Set while nodes are being built or torn down.
    changing: bool,
    pending: PendingRequestQueue,
    drain_scheduled: bool,
    shutdown: Option<ShutdownProgress>,
    /// Subtree shutdowns whose completion has not arrived yet.
    outstanding_teardowns: usize,

    streams: HashMap<StreamId, StreamBinding>,
    next_node_id: u64,
    next_stream_id: u64,
    streaming_enabled: bool,

    tx: Sender<GraphEvent>,
    rx: Receiver<GraphEvent>,
    subscribers: Vec<Sender<GraphNotification>>,
}

impl PipelineManager {
    pub fn new(hardware: PipelineHardware, settings: PipelineSettings) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            state: ManagerState::Uninitialized,
            streaming_enabled: settings.streaming_enabled,
            settings,
            hardware,
            roots: Arc::new(Vec::new()),
            graph: FrameGraph::new(),
            changing: false,
            pending: PendingRequestQueue::new(),
            drain_scheduled: false,
            shutdown: None,
            outstanding_teardowns: 0,
            streams: HashMap::new(),
            next_node_id: 0,
            next_stream_id: 0,
            tx,
            rx,
            subscribers: Vec::new(),
        }
    }

    /// A handle for posting work from other threads.
    pub fn events(&self) -> EventSender {
        EventSender::new(self.tx.clone())
    }

    /// Receive structural notifications from now on.
    pub fn subscribe(&mut self) -> Receiver<GraphNotification> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Whether a structural change is in flight.
    pub fn is_changing(&self) -> bool {
        self.changing
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn is_streaming_enabled(&self) -> bool {
        self.streaming_enabled
    }

    /// Requests waiting for the current structural change to finish.
    pub fn queued_requests(&self) -> usize {
        self.pending.len()
    }

    /// Output path of a bound stream.
    pub fn stream_path(&self, stream: StreamId) -> Option<&NodePath> {
        self.streams.get(&stream).map(|binding| &binding.path)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Install the config roots of the active product configuration.
    pub fn set_roots(&mut self, roots: Vec<ConfigNode>) -> Result<()> {
        if !self.state.can_set_roots() {
            return Err(PipelineError::BadState(format!(
                "roots can only be set while uninitialized, state is {:?}",
                self.state
            )));
        }
        self.install_roots(roots);
        Ok(())
    }

    fn install_roots(&mut self, roots: Vec<ConfigNode>) {
        tracing::info!("Installing {} config roots", roots.len());
        self.roots = Arc::new(roots);
        self.state = ManagerState::Configured;
        self.schedule_drain();
    }

    /// Queue a stream request. The reply arrives once the loop has run.
    pub fn create_stream(&self, request: StreamRequest) -> PendingReply<StreamClient> {
        self.events().create_stream(request)
    }

    /// Queue a full graph shutdown.
    pub fn shutdown(&self) -> PendingReply<()> {
        self.events().shutdown()
    }

    /// Queue a full shutdown that installs `roots` once the graph is empty.
    pub fn shutdown_and_reconfigure(&self, roots: Vec<ConfigNode>) -> PendingReply<()> {
        let (reply, pending) = reply_channel();
        if !self.events().command(ManagerCommand::Shutdown {
            next_roots: Some(roots),
            reply,
        }) {
            return PendingReply::ready(Err(PipelineError::PeerClosed));
        }
        pending
    }

    pub fn set_streaming_enabled(&mut self, enabled: bool) {
        self.apply_streaming_enabled(enabled);
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Handle queued events until none are left. Returns how many ran.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Handle events until `done` holds or `timeout` passes, waiting for
    /// events posted from other threads. Returns whether `done` held.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_until_idle();
            if done(self) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => return done(self),
                Err(RecvTimeoutError::Disconnected) => return done(self),
            }
        }
    }

    /// Run the loop until `pending` is answered.
    pub fn resolve<T>(&mut self, pending: PendingReply<T>, timeout: Duration) -> Result<T> {
        let mut reply = None;
        self.run_until(timeout, |_| {
            if reply.is_none() {
                reply = pending.try_take();
            }
            reply.is_some()
        });
        reply.unwrap_or_else(|| {
            Err(PipelineError::BadState(format!(
                "no reply within {:?}",
                timeout
            )))
        })
    }

    fn handle_event(&mut self, event: GraphEvent) {
        match event {
            GraphEvent::Command(command) => self.handle_command(command),
            GraphEvent::Hardware { path, node, event } => self.on_hardware(&path, node, event),
            GraphEvent::Deliver {
                path,
                node,
                token,
                metadata,
            } => self.on_deliver(&path, node, token, metadata),
            GraphEvent::Submit { path, node } => self.on_submit(&path, node),
            GraphEvent::ShutdownComplete { path } => self.on_subtree_shut_down(&path),
            GraphEvent::Prune => self.prune(),
            GraphEvent::Drain => self.drain(),
        }
    }

    fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::SetRoots { roots, reply } => {
                let _ = reply.send(self.set_roots(roots));
            }
            ManagerCommand::CreateStream { request, reply } => self.configure(request, reply),
            ManagerCommand::Disconnect { stream } => self.disconnect(stream),
            ManagerCommand::Start { stream } => self.start_stream(stream),
            ManagerCommand::Stop { stream } => self.stop_stream(stream),
            ManagerCommand::ReleaseFrame { stream, buffer_id } => {
                self.release_frame(stream, buffer_id)
            }
            ManagerCommand::SetRegionOfInterest {
                stream,
                crop,
                reply,
            } => {
                let _ = reply.send(self.set_region_of_interest(stream, crop));
            }
            ManagerCommand::SetImageFormat {
                stream,
                format_index,
                reply,
            } => self.set_image_format(stream, format_index, reply),
            ManagerCommand::GetImageFormats { stream, reply } => {
                let _ = reply.send(self.image_formats(stream));
            }
            ManagerCommand::GetBuffers { stream, reply } => {
                let _ = reply.send(self.buffers(stream));
            }
            ManagerCommand::SetStreamingEnabled { enabled } => {
                self.apply_streaming_enabled(enabled)
            }
            ManagerCommand::Shutdown { next_roots, reply } => {
                self.request_shutdown(next_roots, reply)
            }
        }
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    fn post(&self, event: GraphEvent) {
        // The manager holds a receiver, so this cannot fail while it lives.
        let _ = self.tx.send(event);
    }

    fn notify(&mut self, notification: GraphNotification) {
        self.subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }

    fn binding(&self, stream: StreamId) -> Result<&StreamBinding> {
        self.streams
            .get(&stream)
            .ok_or_else(|| PipelineError::NotFound(format!("{} is not bound", stream)))
    }

    fn config_at(&self, path: &NodePath) -> Option<&ConfigNode> {
        ConfigNode::lookup(&self.roots, path)
    }

    /// Structural change done; replay whatever queued up meanwhile.
    fn finish_change(&mut self) {
        self.changing = false;
        self.schedule_drain();
    }

    fn schedule_drain(&mut self) {
        if !self.drain_scheduled {
            self.drain_scheduled = true;
            self.post(GraphEvent::Drain);
        }
    }
}

/// A product configuration the graph cannot be built from.
fn fatal_config(error: ConfigError) -> ! {
    tracing::error!("Fatal configuration error: {}", error);
    panic!("invalid product configuration: {}", error);
}

impl Drop for PipelineManager {
    fn drop(&mut self) {
        if self.state != ManagerState::Uninitialized {
            tracing::error!(
                "PipelineManager dropped in state {:?} with {} live nodes; shut down first",
                self.state,
                self.graph.len()
            );
        }
    }
}
