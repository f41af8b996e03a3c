//! Process-wide byte-buffer pool.
//!
//! Buffers come in power-of-two size classes from 256 B to 1 MiB. Returning
//! a buffer resets its length, not its contents; each shelf is bounded and
//! overflow buffers are simply dropped. Oversized requests fall back to a
//! plain allocation that never re-enters the pool.

use std::ops::{Deref, DerefMut};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

const MIN_SHIFT: u32 = 8;
const MAX_SHIFT: u32 = 20;
const CLASS_COUNT: usize = (MAX_SHIFT - MIN_SHIFT + 1) as usize;
const PER_CLASS_CAP: usize = 32;

static POOL: Lazy<BufferPool> = Lazy::new(BufferPool::new);

/// Rent a buffer with capacity of at least `min_size` from the process pool.
pub fn rent(min_size: usize) -> PooledBuf {
    POOL.rent(min_size)
}

struct BufferPool {
    shelves: Vec<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    fn new() -> Self {
        Self {
            shelves: (0..CLASS_COUNT).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    fn class_for(min_size: usize) -> Option<usize> {
        let size = min_size.max(1 << MIN_SHIFT).checked_next_power_of_two()?;
        let shift = size.trailing_zeros();
        (shift <= MAX_SHIFT).then(|| (shift - MIN_SHIFT) as usize)
    }

    fn rent(&self, min_size: usize) -> PooledBuf {
        match Self::class_for(min_size) {
            Some(class) => {
                let reused = self.shelves[class].lock().pop();
                let buf = reused
                    .unwrap_or_else(|| Vec::with_capacity(1usize << (class as u32 + MIN_SHIFT)));
                PooledBuf {
                    buf,
                    class: Some(class),
                }
            }
            None => PooledBuf {
                buf: Vec::with_capacity(min_size),
                class: None,
            },
        }
    }

    fn give_back(&self, class: usize, mut buf: Vec<u8>) {
        buf.clear();
        let mut shelf = self.shelves[class].lock();
        if shelf.len() < PER_CLASS_CAP {
            shelf.push(buf);
        }
    }
}

/// A rented buffer. Dropping it returns the buffer to its shelf exactly
/// once; the take in `drop` leaves nothing behind to double-free.
pub struct PooledBuf {
    buf: Vec<u8>,
    class: Option<usize>,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(class) = self.class {
            POOL.give_back(class, std::mem::take(&mut self.buf));
        }
    }
}
