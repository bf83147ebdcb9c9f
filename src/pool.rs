//! Bounded free-list of decoded frames, reused across decodes to cut allocations.
//!
//! Purely an optimisation: a pooled decode yields the same frame a plain one does.

use crate::frame::Frame;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

pub const DEFAULT_POOL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("frame `{0}` cannot be recycled: it is not checked out of a pool")]
    NotCheckedOut(String),
}

#[derive(Debug)]
pub struct FramePool {
    free: Mutex<VecDeque<Frame>>,
    capacity: usize,
}

impl FramePool {
    pub fn new(capacity: usize) -> Self {
        FramePool { free: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Take the most recently recycled frame, or a fresh one when the pool is empty.
    pub fn obtain(&self) -> Frame {
        let mut frame = self.lock().pop_back().unwrap_or_default();
        frame.checked_out = true;
        frame
    }

    /// Return a frame obtained from a pool. When full, the oldest free frame is dropped.
    pub fn recycle(&self, mut frame: Frame) -> Result<(), PoolError> {
        if !frame.checked_out {
            error!(frame = frame.name(), "recycle of a frame that is not checked out");
            return Err(PoolError::NotCheckedOut(frame.name().to_string()));
        }
        frame.checked_out = false;
        let mut free = self.lock();
        free.push_back(frame);
        if free.len() > self.capacity {
            free.pop_front();
            warn!(capacity = self.capacity, "frame pool full, discarded oldest frame");
        }
        Ok(())
    }

    /// Frames currently waiting for reuse.
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        // A panic while holding the lock cannot leave the deque inconsistent.
        self.free.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obtain_recycle_reuses() {
        let pool = FramePool::new(2);
        let f = pool.obtain();
        assert!(f.is_checked_out());
        pool.recycle(f).unwrap();
        assert_eq!(pool.available(), 1);
        let f = pool.obtain();
        assert_eq!(pool.available(), 0);
        pool.recycle(f).unwrap();
    }

    #[test]
    fn foreign_frame_is_refused() {
        let pool = FramePool::default();
        let f = Frame::new("X", &[1]);
        assert_eq!(pool.recycle(f), Err(PoolError::NotCheckedOut("X".into())));
        let cloned = pool.obtain().clone();
        assert!(pool.recycle(cloned).is_err());
    }

    #[test]
    fn overflow_drops_oldest() {
        let pool = FramePool::new(2);
        let mut frames: Vec<Frame> = (0..3).map(|_| pool.obtain()).collect();
        for (i, f) in frames.iter_mut().enumerate() {
            f.reset(&format!("f{}", i), &[]);
        }
        for f in frames {
            pool.recycle(f).unwrap();
        }
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.obtain().name(), "f2");
        assert_eq!(pool.obtain().name(), "f1");
        assert_eq!(pool.obtain().name(), "");
    }
}
