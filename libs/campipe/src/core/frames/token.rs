// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

type ReleaseFn = Box<dyn FnOnce(u32) + Send>;

/// Ownership of one in-flight buffer.
///
/// Dropping the token returns the buffer to whoever produced it. Tokens
/// cross threads freely: clients release frames from their own context.
pub struct FrameToken {
    buffer_index: u32,
    release: Option<ReleaseFn>,
}

impl FrameToken {
    pub fn new(buffer_index: u32, release: impl FnOnce(u32) + Send + 'static) -> Self {
        Self {
            buffer_index,
            release: Some(Box::new(release)),
        }
    }

    /// A token whose release does nothing.
    pub fn detached(buffer_index: u32) -> Self {
        Self {
            buffer_index,
            release: None,
        }
    }

    pub fn buffer_index(&self) -> u32 {
        self.buffer_index
    }
}

impl Drop for FrameToken {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.buffer_index);
        }
    }
}

impl fmt::Debug for FrameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameToken")
            .field("buffer_index", &self.buffer_index)
            .field("attached", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_drop_releases_once() {
        let released = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&released);
        let token = FrameToken::new(7, move |index| {
            assert_eq!(index, 7);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(token.buffer_index(), 7);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(token);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_from_another_thread() {
        let released = Arc::new(AtomicU32::new(u32::MAX));
        let seen = Arc::clone(&released);
        let token = FrameToken::new(3, move |index| seen.store(index, Ordering::SeqCst));
        std::thread::spawn(move || drop(token)).join().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }
}
