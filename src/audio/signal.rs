//! Shared handle to a live audio signal.
//!
//! Producers (cpal callbacks, tests) push mono samples; analysers copy the
//! most recent window without draining it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct SignalShared {
    samples: Mutex<VecDeque<f32>>,
    capacity: usize,
    sample_rate_hz: u32,
    closed: AtomicBool,
}

/// Cheaply clonable reference to a live mono audio stream
#[derive(Clone)]
pub struct SignalHandle {
    shared: Arc<SignalShared>,
}

impl std::fmt::Debug for SignalHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHandle")
            .field("capacity", &self.shared.capacity)
            .field("sample_rate_hz", &self.shared.sample_rate_hz)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SignalHandle {
    /// Create a signal retaining the latest `capacity` samples
    pub fn new(sample_rate_hz: u32, capacity: usize) -> Self {
        Self {
            shared: Arc::new(SignalShared {
                samples: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                sample_rate_hz,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.shared.sample_rate_hz
    }

    /// Append samples, discarding the oldest beyond capacity
    pub fn push_samples(&self, samples: &[f32]) {
        let capacity = self.shared.capacity;
        let mut ring = self.lock();

        // Only the tail can survive
        let incoming = &samples[samples.len().saturating_sub(capacity)..];
        let overflow = (ring.len() + incoming.len()).saturating_sub(capacity);
        let len = ring.len();
        ring.drain(..overflow.min(len));
        ring.extend(incoming.iter().copied());
    }

    /// Copy the latest `out.len()` samples into `out`, oldest first.
    /// Missing history is zero-filled at the front.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let ring = self.lock();
        let available = ring.len().min(out.len());
        let pad = out.len() - available;

        out[..pad].fill(0.0);
        for (dst, src) in out[pad..]
            .iter_mut()
            .zip(ring.iter().skip(ring.len() - available))
        {
            *dst = *src;
        }
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the stream as ended (device lost, producer dropped)
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        // A panicking producer cannot leave the ring structurally broken
        self.shared
            .samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
