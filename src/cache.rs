//! Content-addressed header cache.
//!
//! Keyed by the exact base64url header bytes, so two tokens share an entry
//! only when their header segments are byte-identical. The cached value
//! carries the parsed header and whether the critical-header check passed
//! against the owning policy's handler set. Bounded LRU, thread-safe.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::header::JwtHeader;

pub const DEFAULT_HEADER_CACHE_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct CachedHeader {
    pub header: JwtHeader,
    /// Critical-header check outcome under the policy that owns this cache.
    pub crit_ok: bool,
}

pub struct HeaderCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<Vec<u8>, CachedHeader>,
    order: VecDeque<Vec<u8>>,
}

impl HeaderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<CachedHeader> {
        let mut inner = self.inner.lock();
        let hit = inner.map.get(key).cloned()?;
        if let Some(pos) = inner.order.iter().position(|k| k == key) {
            let key = inner.order.remove(pos).expect("position just found");
            inner.order.push_back(key);
        }
        Some(hit)
    }

    pub fn insert(&self, key: &[u8], value: CachedHeader) {
        let mut inner = self.inner.lock();
        if inner.map.insert(key.to_vec(), value).is_some() {
            return;
        }
        if inner.map.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
        inner.order.push_back(key.to_vec());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
