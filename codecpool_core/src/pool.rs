use crossbeam_queue::SegQueue;

/// Unordered, unbounded cache of idle objects.
///
/// Any number of threads may call [`get`](Pool::get) and [`put`](Pool::put)
/// concurrently. Both are lock-free: a `get` never hands the same object to
/// two callers, and an object `put` on one thread is visible to a later `get`
/// on any other thread without further synchronization.
///
/// Members have no identity or order. Idle objects live until [`clear`]
/// drops them or the pool itself is dropped.
///
/// [`clear`]: Pool::clear
pub struct Pool<T> {
    idle: SegQueue<T>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            idle: SegQueue::new(),
        }
    }

    /// Take any idle object, if there is one.
    #[inline]
    pub fn get(&self) -> Option<T> {
        self.idle.pop()
    }

    /// Store an idle object.
    #[inline]
    pub fn put(&self, item: T) {
        self.idle.push(item);
    }

    /// Number of idle objects. Only a snapshot under concurrent use.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Drop every idle object, returning how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.idle.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("idle", &self.idle()).finish()
    }
}
