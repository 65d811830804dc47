// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;
use std::sync::Arc;

use super::{FormatDone, NodeCore};
use crate::core::error::{PipelineError, Result};
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::hardware::{Accelerator, Completion, CropRect, HardwareEvent, TaskIndex};

/// Which accelerator operation a node runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceleratorKind {
    Scaler,
    Resize,
    Watermark,
}

impl AcceleratorKind {
    pub fn name(&self) -> &'static str {
        match self {
            AcceleratorKind::Scaler => "scaler",
            AcceleratorKind::Resize => "resize",
            AcceleratorKind::Watermark => "watermark",
        }
    }
}

/// Scale/crop or compositing stage backed by a hardware task.
///
/// Incoming frames are queued and handed to the task from a separate loop
/// turn, so the task sees them in arrival order. In-place tasks write into
/// the buffer they read, and the input token travels on downstream; other
/// tasks fill a buffer of their own collection and return the input as soon
/// as the output is ready.
pub struct AcceleratorNode {
    pub(super) core: NodeCore,
    kind: AcceleratorKind,
    device: Arc<dyn Accelerator>,
    task: TaskIndex,
    in_place: bool,
    submit: Box<dyn Fn() + Send>,
    queued: VecDeque<(FrameToken, FrameMetadata)>,
    in_hardware: VecDeque<(FrameToken, FrameMetadata)>,
    format_waiters: VecDeque<FormatDone>,
    removal: Option<Completion>,
}

impl AcceleratorNode {
    /// `submit` must schedule a later call to `submit_next` on this node.
    pub fn new(
        core: NodeCore,
        kind: AcceleratorKind,
        device: Arc<dyn Accelerator>,
        task: TaskIndex,
        in_place: bool,
        submit: Box<dyn Fn() + Send>,
    ) -> Self {
        Self {
            core,
            kind,
            device,
            task,
            in_place,
            submit,
            queued: VecDeque::new(),
            in_hardware: VecDeque::new(),
            format_waiters: VecDeque::new(),
            removal: None,
        }
    }

    pub fn kind(&self) -> AcceleratorKind {
        self.kind
    }

    pub(super) fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn task(&self) -> TaskIndex {
        self.task
    }

    pub fn is_in_place(&self) -> bool {
        self.in_place
    }

    /// Frames submitted to the task and not yet completed.
    pub fn frames_in_hardware(&self) -> usize {
        self.in_hardware.len()
    }

    pub(super) fn process_frame(&mut self, token: FrameToken, metadata: FrameMetadata) {
        if !self.core.accepts_frames() {
            tracing::debug!(
                "[{}] Releasing buffer {} while disabled",
                self.core.path(),
                token.buffer_index()
            );
            return;
        }
        self.queued.push_back((token, metadata));
        (self.submit)();
    }

    pub(super) fn submit_next(&mut self) {
        let Some((token, metadata)) = self.queued.pop_front() else {
            return;
        };
        if self.core.is_shutting_down() {
            return;
        }
        let buffer_index = token.buffer_index();
        // Track before submitting; an immediate completion is still a later event.
        self.in_hardware.push_back((token, metadata));
        if let Err(e) = self.device.process_frame(self.task, buffer_index) {
            tracing::warn!(
                "[{}] Submit of buffer {} failed: {}",
                self.core.path(),
                buffer_index,
                e
            );
            self.in_hardware.pop_back();
        }
    }

    pub(super) fn set_output_format(&mut self, format_index: u32, done: FormatDone) {
        if format_index == self.core.current_format() {
            done(Ok(()));
            return;
        }
        match self.device.set_output_resolution(self.task, format_index) {
            Ok(()) => self.format_waiters.push_back(done),
            Err(e) => done(Err(e)),
        }
    }

    pub(super) fn set_crop_rect(&mut self, crop: CropRect) -> Result<()> {
        if self.kind != AcceleratorKind::Resize {
            return Err(PipelineError::NotSupported(format!(
                "[{}] {} tasks cannot crop",
                self.core.path(),
                self.kind_name()
            )));
        }
        self.device.set_crop_rect(self.task, crop)
    }

    pub(super) fn handle_hardware(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::FrameReady { buffer_index, .. } => self.frame_ready(buffer_index),
            HardwareEvent::ResolutionChanged { format_index } => {
                self.core.set_current_format(format_index);
                tracing::debug!(
                    "[{}] Output format {} active",
                    self.core.path(),
                    format_index
                );
                if let Some(done) = self.format_waiters.pop_front() {
                    done(Ok(()));
                }
            }
            HardwareEvent::TaskRemoved { status } => {
                if let Err(e) = &status {
                    tracing::error!("[{}] Task removal reported {}", self.core.path(), e);
                }
                self.in_hardware.clear();
                for done in self.format_waiters.drain(..) {
                    done(Err(PipelineError::ShuttingDown));
                }
                match self.removal.take() {
                    Some(completion) => completion(),
                    None => tracing::warn!(
                        "[{}] Task removed without a pending shutdown",
                        self.core.path()
                    ),
                }
            }
        }
    }

    fn frame_ready(&mut self, output_index: u32) {
        let Some((input, metadata)) = self.in_hardware.pop_front() else {
            tracing::warn!(
                "[{}] Completion for buffer {} with nothing in flight",
                self.core.path(),
                output_index
            );
            self.device.release_frame(self.task, output_index);
            return;
        };

        let output = if self.in_place {
            input
        } else {
            drop(input);
            let device = Arc::clone(&self.device);
            let task = self.task;
            FrameToken::new(output_index, move |index| device.release_frame(task, index))
        };

        if !self.core.accepts_frames() {
            return;
        }
        self.core.deliver(output, metadata);
    }

    pub(super) fn shutdown(&mut self, completion: Completion) {
        self.queued.clear();
        self.removal = Some(completion);
        self.device.remove_task(self.task);
    }
}
