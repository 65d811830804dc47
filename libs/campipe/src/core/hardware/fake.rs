// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Virtual hardware for simulation and tests.
//!
//! The fakes record every request. In [`CompletionMode::Immediate`] they
//! raise completion events from inside the request call; in
//! [`CompletionMode::Manual`] accelerator frames, task removals and stream
//! shutdowns wait until the test releases them.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    Accelerator, Completion, CropRect, FirmwareBlob, FirmwareLoader, HardwareCallback,
    HardwareEvent, IspDevice, IspStream, OutputStreamRequest, PipelineHardware, TaskConfig,
    TaskIndex, TaskRequest,
};
use crate::core::error::{PipelineError, Result};
use crate::core::memory::fake::FakeAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    #[default]
    Immediate,
    Manual,
}

// ============================================================================
// ISP
// ============================================================================

struct IspStreamState {
    running: bool,
    start_count: usize,
    stop_count: usize,
    held: BTreeSet<u32>,
    released: Vec<u32>,
    next_buffer: u32,
    shut_down: bool,
    pending_shutdown: Option<Completion>,
}

/// One sensor output stream created through [`FakeIsp`].
pub struct FakeIspStream {
    variant: String,
    buffer_count: u32,
    mode: CompletionMode,
    callback: HardwareCallback,
    state: Mutex<IspStreamState>,
}

impl FakeIspStream {
    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stop_count
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Buffers currently owned by the pipeline.
    pub fn held_buffers(&self) -> Vec<u32> {
        self.state.lock().held.iter().copied().collect()
    }

    /// Every `release_frame` call, in order.
    pub fn released_frames(&self) -> Vec<u32> {
        self.state.lock().released.clone()
    }

    /// Fill the next free buffer and report it.
    ///
    /// Returns `None` when the stream is stopped or every buffer is held.
    pub fn emit_frame(&self, timestamp: i64) -> Option<u32> {
        let buffer_index = {
            let mut state = self.state.lock();
            if !state.running || state.shut_down {
                return None;
            }
            let free = (0..self.buffer_count)
                .map(|offset| (state.next_buffer + offset) % self.buffer_count)
                .find(|index| !state.held.contains(index))?;
            state.held.insert(free);
            state.next_buffer = (free + 1) % self.buffer_count;
            free
        };
        (self.callback)(HardwareEvent::FrameReady {
            buffer_index,
            timestamp,
            capture_timestamp: timestamp,
        });
        Some(buffer_index)
    }

    /// Finish a shutdown held back in manual mode.
    pub fn complete_shutdown(&self) -> bool {
        let completion = self.state.lock().pending_shutdown.take();
        match completion {
            Some(completion) => {
                completion();
                true
            }
            None => false,
        }
    }
}

impl IspStream for FakeIspStream {
    fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(PipelineError::BadState("stream is shut down".into()));
        }
        state.running = true;
        state.start_count += 1;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.running = false;
        state.stop_count += 1;
        Ok(())
    }

    fn release_frame(&self, buffer_index: u32) {
        let mut state = self.state.lock();
        if !state.held.remove(&buffer_index) {
            tracing::warn!(
                "[isp:{}] Release of buffer {} not held",
                self.variant,
                buffer_index
            );
        }
        state.released.push(buffer_index);
    }

    fn shutdown(&self, completion: Completion) {
        let run_now = {
            let mut state = self.state.lock();
            state.running = false;
            state.shut_down = true;
            match self.mode {
                CompletionMode::Immediate => Some(completion),
                CompletionMode::Manual => {
                    state.pending_shutdown = Some(completion);
                    None
                }
            }
        };
        if let Some(completion) = run_now {
            completion();
        }
    }
}

/// Sensor driver that hands out [`FakeIspStream`]s.
#[derive(Default)]
pub struct FakeIsp {
    mode: CompletionMode,
    streams: Mutex<Vec<Arc<FakeIspStream>>>,
    fail_next: Mutex<bool>,
}

impl FakeIsp {
    pub fn new(mode: CompletionMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Every stream created so far, oldest first.
    pub fn streams(&self) -> Vec<Arc<FakeIspStream>> {
        self.streams.lock().clone()
    }

    pub fn stream(&self, index: usize) -> Option<Arc<FakeIspStream>> {
        self.streams.lock().get(index).cloned()
    }

    /// The most recent stream that has not been shut down.
    pub fn live_stream(&self) -> Option<Arc<FakeIspStream>> {
        self.streams
            .lock()
            .iter()
            .rev()
            .find(|stream| !stream.is_shut_down())
            .cloned()
    }

    pub fn fail_next_stream(&self) {
        *self.fail_next.lock() = true;
    }
}

impl IspDevice for FakeIsp {
    fn create_output_stream(
        &self,
        request: OutputStreamRequest,
        callback: HardwareCallback,
    ) -> Result<Arc<dyn IspStream>> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(PipelineError::Hardware(format!(
                "isp stream {} failed to open",
                request.variant
            )));
        }
        let stream = Arc::new(FakeIspStream {
            variant: request.variant,
            buffer_count: request.collection.buffer_count().max(1),
            mode: self.mode,
            callback,
            state: Mutex::new(IspStreamState {
                running: false,
                start_count: 0,
                stop_count: 0,
                held: BTreeSet::new(),
                released: Vec::new(),
                next_buffer: 0,
                shut_down: false,
                pending_shutdown: None,
            }),
        });
        self.streams.lock().push(Arc::clone(&stream));
        Ok(stream)
    }
}

// ============================================================================
// Accelerators
// ============================================================================

/// Inspection view of one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub index: TaskIndex,
    pub name: String,
    pub in_place: bool,
    pub format_index: u32,
    pub format_count: usize,
    pub crop: Option<CropRect>,
    pub submitted: usize,
    pub held_outputs: Vec<u32>,
    pub removed: bool,
}

struct FakeTask {
    name: String,
    in_place: bool,
    output_buffer_count: u32,
    format_index: u32,
    format_count: usize,
    crop: Option<CropRect>,
    callback: HardwareCallback,
    queued: VecDeque<u32>,
    held: BTreeSet<u32>,
    next_output: u32,
    submitted: usize,
    removed: bool,
}

impl FakeTask {
    fn claim_output(&mut self, input: u32) -> Option<u32> {
        // In-place outputs stay owned by whoever supplied the input.
        if self.in_place {
            return Some(input);
        }
        let output = {
            let count = self.output_buffer_count.max(1);
            let free = (0..count)
                .map(|offset| (self.next_output + offset) % count)
                .find(|index| !self.held.contains(index))?;
            self.next_output = (free + 1) % count;
            free
        };
        self.held.insert(output);
        Some(output)
    }
}

#[derive(Default)]
struct AcceleratorState {
    next_task: u32,
    tasks: BTreeMap<TaskIndex, FakeTask>,
    pending_removals: VecDeque<TaskIndex>,
    fail_next_init: bool,
}

/// Scaling or compositing accelerator that completes work in memory.
pub struct FakeAccelerator {
    label: &'static str,
    mode: CompletionMode,
    state: Mutex<AcceleratorState>,
}

impl FakeAccelerator {
    pub fn new(label: &'static str, mode: CompletionMode) -> Self {
        Self {
            label,
            mode,
            state: Mutex::new(AcceleratorState::default()),
        }
    }

    pub fn fail_next_init(&self) {
        self.state.lock().fail_next_init = true;
    }

    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        self.state
            .lock()
            .tasks
            .iter()
            .map(|(index, task)| TaskSnapshot {
                index: *index,
                name: task.name.clone(),
                in_place: task.in_place,
                format_index: task.format_index,
                format_count: task.format_count,
                crop: task.crop,
                submitted: task.submitted,
                held_outputs: task.held.iter().copied().collect(),
                removed: task.removed,
            })
            .collect()
    }

    pub fn task(&self, name: &str) -> Option<TaskSnapshot> {
        self.tasks()
            .into_iter()
            .find(|task| task.name == name && !task.removed)
    }

    /// Tasks initialized and not yet removed.
    pub fn active_tasks(&self) -> usize {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|task| !task.removed)
            .count()
    }

    /// Frames submitted in manual mode that have not completed.
    pub fn queued_frames(&self) -> usize {
        self.state
            .lock()
            .tasks
            .values()
            .map(|task| task.queued.len())
            .sum()
    }

    /// Complete the oldest queued frame of any task. Returns false when idle.
    pub fn complete_next(&self) -> bool {
        let ready = {
            let mut state = self.state.lock();
            let next = state
                .tasks
                .values_mut()
                .find(|task| !task.removed && !task.queued.is_empty());
            let Some(task) = next else {
                return false;
            };
            let Some(input) = task.queued.pop_front() else {
                return false;
            };
            match task.claim_output(input) {
                Some(output) => Some((Arc::clone(&task.callback), output)),
                None => {
                    task.queued.push_front(input);
                    None
                }
            }
        };
        match ready {
            Some((callback, output)) => {
                callback(frame_ready(output));
                true
            }
            None => false,
        }
    }

    /// Complete every queued frame.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    /// Acknowledge the oldest pending `remove_task`.
    pub fn complete_removal(&self) -> bool {
        let callback = {
            let mut state = self.state.lock();
            let Some(index) = state.pending_removals.pop_front() else {
                return false;
            };
            state
                .tasks
                .get(&index)
                .map(|task| Arc::clone(&task.callback))
        };
        if let Some(callback) = &callback {
            callback(HardwareEvent::TaskRemoved { status: Ok(()) });
        }
        callback.is_some()
    }

    pub fn pending_removals(&self) -> usize {
        self.state.lock().pending_removals.len()
    }
}

fn frame_ready(buffer_index: u32) -> HardwareEvent {
    HardwareEvent::FrameReady {
        buffer_index,
        timestamp: 0,
        capture_timestamp: 0,
    }
}

impl Accelerator for FakeAccelerator {
    fn init_task(&self, request: TaskRequest, callback: HardwareCallback) -> Result<TaskIndex> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_init) {
            return Err(PipelineError::Hardware(format!(
                "{}: init failed for {}",
                self.label, request.name
            )));
        }
        if request.default_format_index as usize >= request.output_formats.len().max(1) {
            return Err(PipelineError::InvalidArgs(format!(
                "{}: default format {} out of range",
                self.label, request.default_format_index
            )));
        }
        state.next_task += 1;
        let index = TaskIndex(state.next_task);
        let crop = match &request.config {
            TaskConfig::Resize { crop } => *crop,
            _ => None,
        };
        tracing::debug!("[{}] {} initialized as {}", request.name, self.label, index);
        state.tasks.insert(
            index,
            FakeTask {
                in_place: request.is_in_place(),
                output_buffer_count: request.output_collection.buffer_count(),
                format_index: request.default_format_index,
                format_count: request.output_formats.len(),
                crop,
                name: request.name,
                callback,
                queued: VecDeque::new(),
                held: BTreeSet::new(),
                next_output: 0,
                submitted: 0,
                removed: false,
            },
        );
        Ok(index)
    }

    fn process_frame(&self, task: TaskIndex, buffer_index: u32) -> Result<()> {
        let ready = {
            let mut state = self.state.lock();
            let entry = state
                .tasks
                .get_mut(&task)
                .filter(|entry| !entry.removed)
                .ok_or_else(|| PipelineError::NotFound(format!("{} {}", self.label, task)))?;
            entry.submitted += 1;
            match self.mode {
                CompletionMode::Manual => {
                    entry.queued.push_back(buffer_index);
                    None
                }
                CompletionMode::Immediate => {
                    let output = entry.claim_output(buffer_index).ok_or_else(|| {
                        PipelineError::Hardware(format!(
                            "{}: no free output buffer for {}",
                            self.label, task
                        ))
                    })?;
                    Some((Arc::clone(&entry.callback), output))
                }
            }
        };
        if let Some((callback, output)) = ready {
            callback(frame_ready(output));
        }
        Ok(())
    }

    fn release_frame(&self, task: TaskIndex, buffer_index: u32) {
        let mut state = self.state.lock();
        let released = state
            .tasks
            .get_mut(&task)
            .is_some_and(|entry| entry.held.remove(&buffer_index));
        if !released {
            tracing::warn!(
                "{}: release of buffer {} not held by {}",
                self.label,
                buffer_index,
                task
            );
        }
    }

    fn set_output_resolution(&self, task: TaskIndex, format_index: u32) -> Result<()> {
        let callback = {
            let mut state = self.state.lock();
            let entry = state
                .tasks
                .get_mut(&task)
                .filter(|entry| !entry.removed)
                .ok_or_else(|| PipelineError::NotFound(format!("{} {}", self.label, task)))?;
            if format_index as usize >= entry.format_count {
                return Err(PipelineError::InvalidArgs(format!(
                    "{}: format {} out of range",
                    self.label, format_index
                )));
            }
            entry.format_index = format_index;
            Arc::clone(&entry.callback)
        };
        callback(HardwareEvent::ResolutionChanged { format_index });
        Ok(())
    }

    fn set_crop_rect(&self, task: TaskIndex, crop: CropRect) -> Result<()> {
        let mut state = self.state.lock();
        let entry = state
            .tasks
            .get_mut(&task)
            .filter(|entry| !entry.removed)
            .ok_or_else(|| PipelineError::NotFound(format!("{} {}", self.label, task)))?;
        entry.crop = Some(crop);
        Ok(())
    }

    fn remove_task(&self, task: TaskIndex) {
        let callback = {
            let mut state = self.state.lock();
            let Some(entry) = state.tasks.get_mut(&task) else {
                tracing::warn!("{}: remove of unknown {}", self.label, task);
                return;
            };
            entry.removed = true;
            entry.queued.clear();
            let callback = Arc::clone(&entry.callback);
            match self.mode {
                CompletionMode::Immediate => Some(callback),
                CompletionMode::Manual => {
                    state.pending_removals.push_back(task);
                    None
                }
            }
        };
        if let Some(callback) = callback {
            callback(HardwareEvent::TaskRemoved { status: Ok(()) });
        }
    }
}

// ============================================================================
// Firmware
// ============================================================================

/// Firmware loader that synthesizes blobs from their names.
#[derive(Default)]
pub struct FakeFirmwareLoader {
    missing: Mutex<HashSet<String>>,
    loaded: Mutex<Vec<String>>,
}

impl FakeFirmwareLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `name` fail from now on.
    pub fn mark_missing(&self, name: &str) {
        self.missing.lock().insert(name.to_string());
    }

    /// Names loaded so far, in order.
    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().clone()
    }
}

impl FirmwareLoader for FakeFirmwareLoader {
    fn load(&self, name: &str) -> Result<FirmwareBlob> {
        if self.missing.lock().contains(name) {
            return Err(PipelineError::Firmware(format!("{}: not found", name)));
        }
        self.loaded.lock().push(name.to_string());
        Ok(FirmwareBlob {
            name: name.to_string(),
            data: name.as_bytes().into(),
        })
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// A complete set of fakes, with typed handles kept for inspection.
#[derive(Clone)]
pub struct VirtualHardware {
    pub isp: Arc<FakeIsp>,
    pub scaler: Arc<FakeAccelerator>,
    pub compositor: Arc<FakeAccelerator>,
    pub allocator: Arc<FakeAllocator>,
    pub firmware: Arc<FakeFirmwareLoader>,
}

impl VirtualHardware {
    pub fn new() -> Self {
        Self::with_mode(CompletionMode::Immediate)
    }

    /// Hardware whose completions must be released by hand.
    pub fn manual() -> Self {
        Self::with_mode(CompletionMode::Manual)
    }

    pub fn with_mode(mode: CompletionMode) -> Self {
        Self {
            isp: Arc::new(FakeIsp::new(mode)),
            scaler: Arc::new(FakeAccelerator::new("scaler", mode)),
            compositor: Arc::new(FakeAccelerator::new("compositor", mode)),
            allocator: Arc::new(FakeAllocator::new()),
            firmware: Arc::new(FakeFirmwareLoader::new()),
        }
    }

    pub fn hardware(&self) -> PipelineHardware {
        PipelineHardware {
            isp: self.isp.clone(),
            scaler: self.scaler.clone(),
            compositor: self.compositor.clone(),
            allocator: self.allocator.clone(),
            firmware: self.firmware.clone(),
        }
    }
}
