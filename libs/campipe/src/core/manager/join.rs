// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{PipelineError, Result};
use crate::core::hardware::Completion;
use crate::core::nodes::FormatDone;

struct JoinState {
    remaining: usize,
    sealed: bool,
    first_error: Option<PipelineError>,
    on_done: Option<Box<dyn FnOnce(Result<()>) + Send>>,
}

/// Runs one callback after every member has finished.
///
/// Members are handed out first, then the join is sealed; the callback
/// fires once the join is sealed and the last member has reported, with the
/// first error any member reported.
#[derive(Clone)]
pub(crate) struct CompletionJoin {
    state: Arc<Mutex<JoinState>>,
}

impl CompletionJoin {
    pub fn new(on_done: impl FnOnce(Result<()>) + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(JoinState {
                remaining: 0,
                sealed: false,
                first_error: None,
                on_done: Some(Box::new(on_done)),
            })),
        }
    }

    /// A member that reports a result.
    pub fn member(&self) -> FormatDone {
        self.state.lock().remaining += 1;
        let join = self.clone();
        Box::new(move |result| join.finish(result))
    }

    /// A member that only reports completion.
    pub fn member_completion(&self) -> Completion {
        let done = self.member();
        Box::new(move || done(Ok(())))
    }

    /// No more members will be added.
    pub fn seal(self) {
        self.state.lock().sealed = true;
        self.try_fire();
    }

    fn finish(&self, result: Result<()>) {
        {
            let mut state = self.state.lock();
            state.remaining = state.remaining.saturating_sub(1);
            if let Err(e) = result {
                state.first_error.get_or_insert(e);
            }
        }
        self.try_fire();
    }

    fn try_fire(&self) {
        let fire = {
            let mut state = self.state.lock();
            if !state.sealed || state.remaining > 0 {
                return;
            }
            state
                .on_done
                .take()
                .map(|on_done| (on_done, state.first_error.take()))
        };
        // Outside the lock; the callback may start new work.
        if let Some((on_done, error)) = fire {
            on_done(error.map_or(Ok(()), Err));
        }
    }
}
