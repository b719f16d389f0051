//! Weighted counting semaphore over solver cores.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::debug;

#[derive(Debug)]
struct SlotState {
    capacity: usize,
    in_use: usize,
}

/// A fixed pool of cores shared by concurrent evaluations.
///
/// A request heavier than the whole pool is clamped to the capacity so it
/// can still run, alone.
#[derive(Debug, Clone)]
pub struct SlotPool {
    inner: Arc<(Mutex<SlotState>, Condvar)>,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(SlotState {
                    capacity: capacity.max(1),
                    in_use: 0,
                }),
                Condvar::new(),
            )),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn in_use(&self) -> usize {
        self.lock().in_use
    }

    /// Block until `weight` slots are free.
    pub fn acquire(&self, weight: usize) -> SlotGuard {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let weight = weight.clamp(1, state.capacity);
        while state.in_use + weight > state.capacity {
            state = cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.in_use += weight;
        debug!(weight, in_use = state.in_use, "solver slots acquired");
        SlotGuard {
            pool: self.clone(),
            weight,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its slots on drop, whatever the phase outcome.
#[derive(Debug)]
pub struct SlotGuard {
    pool: SlotPool,
    weight: usize,
}

impl SlotGuard {
    pub fn weight(&self) -> usize {
        self.weight
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut state = self.pool.lock();
        state.in_use -= self.weight;
        self.pool.inner.1.notify_all();
    }
}
