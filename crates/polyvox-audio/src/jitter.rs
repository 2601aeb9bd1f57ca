//! Bounded jitter buffer with drop-oldest eviction.

use std::collections::VecDeque;

/// Default capacity, in frames.
pub const DEFAULT_CAPACITY: usize = 50;

/// A bounded FIFO smoothing buffer for audio frames arriving at irregular
/// intervals.
///
/// Under sustained overload the *oldest* frame is evicted, trading gaps for
/// freshness: latency stays bounded and the consumer always drains toward
/// the most recent audio. Both operations are synchronous and never
/// suspend; backpressure is the eviction policy, not producer pausing.
#[derive(Debug)]
pub struct JitterBuffer<T> {
    queue: VecDeque<T>,
    capacity: usize,
}

impl<T> JitterBuffer<T> {
    /// Creates a buffer holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Appends a frame. If the buffer is full, the oldest frame is evicted
    /// and returned so callers can count drops.
    pub fn push(&mut self, frame: T) -> Option<T> {
        self.queue.push_back(frame);
        if self.queue.len() > self.capacity {
            let dropped = self.queue.pop_front();
            tracing::trace!(capacity = self.capacity, "jitter buffer full, dropped oldest frame");
            dropped
        } else {
            None
        }
    }

    /// Removes and returns the oldest frame, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards all buffered frames.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for JitterBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_frames_in_push_order() {
        let mut buf = JitterBuffer::new(4);
        buf.push(1u32);
        buf.push(2);
        buf.push(3);
        assert_eq!(buf.pop(), Some(1));
        assert_eq!(buf.pop(), Some(2));
        assert_eq!(buf.pop(), Some(3));
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let max = 8usize;
        let mut buf = JitterBuffer::new(max);
        for i in 0..(max as u32 + 5) {
            buf.push(i);
        }
        assert_eq!(buf.len(), max);
        // The survivors are the most recently pushed `max` frames, in order.
        for expect in 5..(max as u32 + 5) {
            assert_eq!(buf.pop(), Some(expect));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn push_reports_the_evicted_frame() {
        let mut buf = JitterBuffer::new(2);
        assert_eq!(buf.push(10u32), None);
        assert_eq!(buf.push(20), None);
        assert_eq!(buf.push(30), Some(10));
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut buf = JitterBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(1u32);
        assert_eq!(buf.push(2), Some(1));
        assert_eq!(buf.pop(), Some(2));
    }

    #[test]
    fn clear_empties_the_buffer() {
        let mut buf = JitterBuffer::new(4);
        buf.push(vec![0.0f32; 128]);
        buf.push(vec![0.1f32; 128]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
    }
}
