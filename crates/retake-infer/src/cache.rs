//! Query embedding cache with LRU eviction and a time-to-live.
//!
//! Keys include the embedder version so a backend change never serves a
//! vector from the old space.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type Key = (String, String);

struct Slot {
    vector: Vec<f32>,
    stored_at: Instant,
}

pub struct QueryCache {
    capacity: usize,
    ttl: Duration,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    slots: HashMap<Key, Slot>,
    // Front is least recently used.
    recency: VecDeque<Key>,
}

impl CacheState {
    fn touch(&mut self, key: &Key) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &Key) {
        self.slots.remove(key);
        self.recency.retain(|k| k != key);
    }
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// 1000 queries, one hour.
    pub fn with_defaults() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    pub fn get(&self, version: &str, query: &str) -> Option<Vec<f32>> {
        let key = (version.to_string(), query.to_string());
        let mut state = self.state.lock();

        let fresh = match state.slots.get(&key) {
            Some(slot) if slot.stored_at.elapsed() < self.ttl => Some(slot.vector.clone()),
            Some(_) => None,
            None => return None,
        };

        match fresh {
            Some(vector) => {
                state.touch(&key);
                Some(vector)
            }
            None => {
                state.forget(&key);
                None
            }
        }
    }

    pub fn put(&self, version: &str, query: &str, vector: Vec<f32>) {
        let key = (version.to_string(), query.to_string());
        let mut state = self.state.lock();

        if state.slots.contains_key(&key) {
            state.touch(&key);
        } else {
            while state.slots.len() >= self.capacity {
                match state.recency.pop_front() {
                    Some(oldest) => {
                        state.slots.remove(&oldest);
                    }
                    None => break,
                }
            }
            state.recency.push_back(key.clone());
        }
        state.slots.insert(
            key,
            Slot {
                vector,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.slots.clear();
        state.recency.clear();
    }
}
