//! Reusable request body buffers.
//!
//! Every request reads its upload into a [`PooledBuffer`] checked out of a
//! shared [`BufferPool`]. Dropping the buffer clears it and hands it back, so
//! the allocation is reused on every exit path, failures included. At most
//! `max_idle` buffers are kept; extra ones are freed.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Checkout counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub checkouts: u64,
    /// Checkouts served by a recycled buffer.
    pub reuse_hits: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Vec<u8>>,
    checkouts: u64,
    reuse_hits: u64,
}

/// Thread-safe pool of byte buffers. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct BufferPool {
    state: Arc<Mutex<PoolState>>,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                idle: Vec::with_capacity(max_idle.min(1024)),
                ..PoolState::default()
            })),
            max_idle,
        }
    }

    // A panic while holding the lock cannot leave the idle list inconsistent.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take an empty buffer, recycled when one is idle.
    pub fn checkout(&self) -> PooledBuffer {
        let mut state = self.lock();
        state.checkouts += 1;
        let buf = match state.idle.pop() {
            Some(buf) => {
                state.reuse_hits += 1;
                buf
            }
            None => Vec::new(),
        };
        PooledBuffer {
            buf,
            pool: self.clone(),
        }
    }

    fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut state = self.lock();
        if state.idle.len() < self.max_idle {
            state.idle.push(buf);
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            checkouts: state.checkouts,
            reuse_hits: state.reuse_hits,
            idle: state.idle.len(),
        }
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }
}

/// A buffer on loan from a [`BufferPool`]. Returned on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: BufferPool,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.recycle(std::mem::take(&mut self.buf));
    }
}
