//! Sliding sample window for the frame source.
//!
//! [`RingBuffer`] keeps the newest `capacity` items.  Writes and reads work
//! on at most two contiguous segments, so a 2048-sample window is refreshed
//! with a couple of `copy_from_slice` calls per frame regardless of how much
//! audio arrived.
//!
//! ```rust
//! use voice_quality::audio::RingBuffer;
//!
//! let mut window = RingBuffer::new(4);
//! window.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//!
//! let mut out = Vec::new();
//! window.window_into(&mut out, 0.0);
//! assert_eq!(out, vec![2.0, 3.0, 4.0, 5.0]);
//! ```

/// Fixed-capacity FIFO that overwrites its oldest items.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Box<[T]>,
    /// Index of the oldest item.
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            slots: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append `data`; once full, each new item evicts the oldest.
    pub fn push_slice(&mut self, data: &[T]) {
        let cap = self.capacity();
        let data = &data[data.len().saturating_sub(cap)..];
        if data.is_empty() {
            return;
        }

        let tail = (self.head + self.len) % cap;
        let first = data.len().min(cap - tail);
        self.slots[tail..tail + first].copy_from_slice(&data[..first]);
        self.slots[..data.len() - first].copy_from_slice(&data[first..]);

        let total = self.len + data.len();
        if total > cap {
            self.head = (self.head + total - cap) % cap;
            self.len = cap;
        } else {
            self.len = total;
        }
    }

    /// Stored items as two slices, oldest first.
    pub fn as_slices(&self) -> (&[T], &[T]) {
        let cap = self.capacity();
        let end = self.head + self.len;
        if end <= cap {
            (&self.slots[self.head..end], &[])
        } else {
            (&self.slots[self.head..], &self.slots[..end - cap])
        }
    }

    /// Replace `out` with a `capacity`-long window, oldest first, padding the
    /// front with `fill` until the buffer has filled once.
    pub fn window_into(&self, out: &mut Vec<T>, fill: T) {
        out.clear();
        out.resize(self.capacity() - self.len, fill);
        let (a, b) = self.as_slices();
        out.extend_from_slice(a);
        out.extend_from_slice(b);
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(buf: &RingBuffer<i32>) -> Vec<i32> {
        let mut out = Vec::new();
        buf.window_into(&mut out, 0);
        out
    }

    #[test]
    fn fresh_window_is_all_fill() {
        let buf = RingBuffer::<i32>::new(4);
        assert!(buf.is_empty());
        assert_eq!(window(&buf), vec![0, 0, 0, 0]);
    }

    #[test]
    fn partial_fill_is_right_aligned() {
        let mut buf = RingBuffer::new(5);
        buf.push_slice(&[7, 8]);
        assert_eq!(buf.len(), 2);
        assert_eq!(window(&buf), vec![0, 0, 0, 7, 8]);
    }

    #[test]
    fn wraps_across_many_small_pushes() {
        let mut buf = RingBuffer::new(3);
        for i in 1..=10 {
            buf.push_slice(&[i]);
        }
        assert!(buf.is_full());
        assert_eq!(window(&buf), vec![8, 9, 10]);
        let (a, b) = buf.as_slices();
        assert_eq!([a, b].concat(), vec![8, 9, 10]);
    }

    #[test]
    fn push_straddling_the_end_splits_in_two() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1, 2, 3]);
        buf.push_slice(&[4, 5, 6]);
        assert_eq!(window(&buf), vec![3, 4, 5, 6]);
        let (a, b) = buf.as_slices();
        assert!(!b.is_empty());
        assert_eq!(a.len() + b.len(), 4);
    }

    #[test]
    fn oversized_push_keeps_the_tail() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1, 2]);
        buf.push_slice(&(10..30).collect::<Vec<_>>());
        assert_eq!(window(&buf), vec![26, 27, 28, 29]);
    }

    #[test]
    fn empty_push_is_a_no_op() {
        let mut buf = RingBuffer::new(2);
        buf.push_slice(&[1]);
        buf.push_slice(&[]);
        assert_eq!(window(&buf), vec![0, 1]);
    }

    #[test]
    fn window_reuses_output_vector() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1, 2, 3, 4]);
        let mut out = vec![99; 10];
        buf.window_into(&mut out, 0);
        assert_eq!(out, vec![2, 3, 4]);
    }

    #[test]
    fn clear_starts_over() {
        let mut buf = RingBuffer::new(3);
        buf.push_slice(&[1, 2, 3, 4, 5]);
        buf.clear();
        assert!(buf.is_empty());
        buf.push_slice(&[9]);
        assert_eq!(window(&buf), vec![0, 0, 9]);
    }

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = RingBuffer::<f32>::new(0);
    }
}
