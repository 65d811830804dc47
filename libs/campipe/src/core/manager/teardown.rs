// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Disconnects, pruning, full shutdown, and replay of deferred requests.

use super::client::StreamId;
use super::events::{GraphEvent, GraphNotification, Reply};
use super::join::CompletionJoin;
use super::state::ManagerState;
use super::{PipelineManager, ShutdownProgress};
use crate::core::config::ConfigNode;
use crate::core::error::PipelineError;
use crate::core::graph::NodePath;

impl PipelineManager {
    pub(super) fn disconnect(&mut self, stream: StreamId) {
        if self.changing {
            tracing::debug!("Graph changing, queueing disconnect of {}", stream);
            self.pending.push_disconnect(stream);
            return;
        }
        let Some(binding) = self.streams.remove(&stream) else {
            tracing::debug!("Disconnect of unbound {}", stream);
            return;
        };

        self.changing = true;
        tracing::info!("[{}] Disconnecting {}", binding.path, stream);
        self.stop_path(&binding.path);
        for depth in 1..=binding.path.depth() {
            let prefix = NodePath::from_indices(binding.path.indices()[..depth].to_vec());
            if let Some(node) = self.graph.node_mut(&prefix) {
                node.core_mut().remove_stream_type(binding.stream_type);
            }
        }
        self.notify(GraphNotification::StreamUnbound {
            stream,
            path: binding.path.clone(),
        });
        self.shutdown_subtree(&binding.path);
    }

    /// Shut down `path` and everything below it. A `ShutdownComplete` event
    /// follows once every node has finished.
    pub(super) fn shutdown_subtree(&mut self, path: &NodePath) {
        let targets = self.graph.subtree(path);
        if targets.is_empty() {
            tracing::warn!("[{}] Teardown of a path with no live nodes", path);
        }
        self.outstanding_teardowns += 1;

        let sender = self.events();
        let root = path.clone();
        let join = CompletionJoin::new(move |result| {
            if let Err(e) = result {
                tracing::error!("[{}] Teardown reported {}", root, e);
            }
            sender.post(GraphEvent::ShutdownComplete { path: root });
        });
        for target in &targets {
            if let Some(node) = self.graph.node_mut(target) {
                if node.is_shutting_down() {
                    continue;
                }
                node.shutdown(join.member_completion());
            }
        }
        join.seal();
    }

    pub(super) fn on_subtree_shut_down(&mut self, path: &NodePath) {
        for target in self.graph.subtree(path) {
            if self.graph.remove(&target).is_some() {
                tracing::info!("[{}] Removed node", target);
                self.notify(GraphNotification::NodeRemoved { path: target });
            }
        }
        self.outstanding_teardowns = self.outstanding_teardowns.saturating_sub(1);
        if self.outstanding_teardowns == 0 {
            self.post(GraphEvent::Prune);
        }
    }

    /// Tear down one node left without children, or finish the change.
    pub(super) fn prune(&mut self) {
        if self.outstanding_teardowns > 0 {
            return;
        }
        let target = match self.state {
            ManagerState::ShuttingDown => self.graph.find_orphan().or_else(|| {
                self.graph
                    .leaves()
                    .into_iter()
                    .find(|leaf| self.graph.node(leaf).is_some_and(|n| !n.is_shutting_down()))
            }),
            _ => self.graph.find_orphan(),
        };
        match target {
            Some(path) => {
                tracing::debug!("[{}] Pruning", path);
                self.shutdown_subtree(&path);
            }
            None if self.state == ManagerState::ShuttingDown => {
                if self.graph.is_empty() {
                    self.finish_shutdown();
                }
            }
            None => self.finish_change(),
        }
    }

    pub(super) fn request_shutdown(
        &mut self,
        next_roots: Option<Vec<ConfigNode>>,
        reply: Reply<()>,
    ) {
        match self.state {
            ManagerState::Uninitialized => {
                if let Some(roots) = next_roots {
                    self.install_roots(roots);
                }
                let _ = reply.send(Ok(()));
            }
            ManagerState::ShuttingDown => {
                if let Some(progress) = self.shutdown.as_mut() {
                    progress.waiters.push(reply);
                    if next_roots.is_some() {
                        progress.next_roots = next_roots;
                    }
                }
            }
            ManagerState::Configured => {
                tracing::info!("Shutting down graph with {} nodes", self.graph.len());
                self.state = ManagerState::ShuttingDown;
                self.shutdown = Some(ShutdownProgress {
                    seeded: false,
                    waiters: vec![reply],
                    next_roots,
                });
                self.schedule_drain();
            }
        }
    }

    /// Start tearing down from every leaf.
    fn seed_shutdown(&mut self) {
        if let Some(progress) = self.shutdown.as_mut() {
            progress.seeded = true;
        }
        self.changing = true;
        let leaves = self.graph.leaves();
        if leaves.is_empty() {
            self.finish_shutdown();
            return;
        }
        for leaf in leaves {
            self.shutdown_subtree(&leaf);
        }
    }

    fn finish_shutdown(&mut self) {
        tracing::info!("Graph shutdown complete");
        self.state = ManagerState::Uninitialized;
        self.changing = false;
        self.roots = std::sync::Arc::new(Vec::new());

        let streams: Vec<_> = self.streams.drain().collect();
        for (stream, binding) in streams {
            self.notify(GraphNotification::StreamUnbound {
                stream,
                path: binding.path,
            });
        }
        for creation in self.pending.drain_creations() {
            let _ = creation.reply.send(Err(PipelineError::ShuttingDown));
        }
        self.notify(GraphNotification::ShutdownComplete);

        let Some(progress) = self.shutdown.take() else {
            return;
        };
        if let Some(roots) = progress.next_roots {
            self.install_roots(roots);
        }
        for waiter in progress.waiters {
            let _ = waiter.send(Ok(()));
        }
    }

    /// Replay deferred work: disconnects first, then either the next step of
    /// a shutdown or queued stream creations in arrival order.
    pub(super) fn drain(&mut self) {
        self.drain_scheduled = false;
        while !self.changing {
            let Some(stream) = self.pending.pop_disconnect() else {
                break;
            };
            self.disconnect(stream);
        }
        if self.changing {
            return;
        }

        if self.state == ManagerState::ShuttingDown {
            if self.shutdown.as_ref().is_some_and(|p| !p.seeded) {
                self.seed_shutdown();
            }
            return;
        }

        while !self.changing {
            let Some(creation) = self.pending.pop_creation() else {
                break;
            };
            self.configure(creation.request, creation.reply);
        }
    }
}
