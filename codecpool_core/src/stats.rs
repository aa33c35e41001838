use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances built because no idle one was available.
    pub constructed: u64,
    /// Acquisitions served by resetting an idle instance.
    pub reused: u64,
    /// Instances returned to idle storage.
    pub released: u64,
    /// Instances dropped after a failed reset, bind, or finalize.
    pub discarded: u64,
    /// Idle instances at the time of the snapshot.
    pub idle: usize,
}

// Relaxed everywhere: these are statistics, not synchronization.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    constructed: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn constructed(&self) {
        self.constructed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, idle: usize) -> PoolStats {
        PoolStats {
            constructed: self.constructed.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle,
        }
    }
}
