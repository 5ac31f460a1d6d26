use super::circular::CircularArrayRange;

/// Fixed-capacity FIFO ring over a power-of-two array
///
/// One slot is always left free so that `head == tail` means empty. Ranges
/// returned by [`CircularBuffer::range`] and friends index the backing array
/// returned by [`CircularBuffer::as_slice`].
#[derive(Debug, Clone)]
pub struct CircularBuffer<T> {
    items: Vec<T>,
    mask: usize,
    head: usize,
    tail: usize,
}

impl<T: Clone + Default> CircularBuffer<T> {
    /// Buffer able to hold at least `size` items
    pub fn with_size(size: usize) -> Self {
        let capacity = (size + 1).next_power_of_two();
        Self {
            items: vec![T::default(); capacity],
            mask: capacity - 1,
            head: 0,
            tail: 0,
        }
    }
}

impl<T: Default> CircularBuffer<T> {
    /// Remove and return the oldest item
    pub fn dequeue(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = std::mem::take(&mut self.items[self.head]);
        self.head = (self.head + 1) & self.mask;
        Some(item)
    }

    /// Drop the `n` oldest items, or all of them if fewer are held
    pub fn dequeue_n(&mut self, n: usize) {
        for _ in 0..n.min(self.len()) {
            self.items[self.head] = T::default();
            self.head = (self.head + 1) & self.mask;
        }
    }

    pub fn clear(&mut self) {
        let len = self.len();
        self.dequeue_n(len);
        self.head = 0;
        self.tail = 0;
    }
}

impl<T> CircularBuffer<T> {
    /// Size of the backing array
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.mask
    }

    /// Append an item.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    pub fn enqueue(&mut self, item: T) {
        assert!(!self.is_full(), "circular buffer is full");
        self.items[self.tail] = item;
        self.tail = (self.tail + 1) & self.mask;
    }

    /// Item at logical position `index`, oldest first
    pub fn get(&self, index: usize) -> Option<&T> {
        if index < self.len() {
            Some(&self.items[(self.head + index) & self.mask])
        } else {
            None
        }
    }

    /// Every held item
    pub fn range(&self) -> CircularArrayRange {
        CircularArrayRange::new(self.capacity(), self.head, self.tail)
    }

    /// The `n` newest items
    pub fn last_range(&self, n: usize) -> CircularArrayRange {
        let n = n.min(self.len());
        CircularArrayRange::new(self.capacity(), self.tail.wrapping_sub(n) & self.mask, self.tail)
    }

    /// The `n` oldest items
    pub fn first_range(&self, n: usize) -> CircularArrayRange {
        let n = n.min(self.len());
        CircularArrayRange::new(self.capacity(), self.head, (self.head + n) & self.mask)
    }

    /// Backing array, indexed by the physical positions of a range
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Held items, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.range().into_iter().map(move |i| &self.items[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_power_of_two() {
        assert_eq!(CircularBuffer::<u8>::with_size(4).capacity(), 8);
        assert_eq!(CircularBuffer::<u8>::with_size(7).capacity(), 8);
        assert_eq!(CircularBuffer::<u8>::with_size(8).capacity(), 16);
    }

    #[test]
    fn test_fifo_across_wraparound() {
        let mut buf = CircularBuffer::with_size(3);
        for round in 0..5 {
            buf.enqueue(round * 10);
            buf.enqueue(round * 10 + 1);
            assert_eq!(buf.dequeue(), Some(round * 10));
            assert_eq!(buf.dequeue(), Some(round * 10 + 1));
        }
        assert!(buf.is_empty());
        assert_eq!(buf.dequeue(), None);
    }

    #[test]
    fn test_first_and_last_ranges() {
        let mut buf = CircularBuffer::with_size(7);
        for i in 0..6 {
            buf.enqueue(i);
        }
        buf.dequeue_n(4);
        for i in 6..10 {
            buf.enqueue(i);
        }
        // Holds 4..10 wrapped around the end of an 8-slot array
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![4, 5, 6, 7, 8, 9]);

        let slice = buf.as_slice();
        let last: Vec<i32> = buf.last_range(2).iter().map(|i| slice[i]).collect();
        let first: Vec<i32> = buf.first_range(3).iter().map(|i| slice[i]).collect();
        assert_eq!(last, vec![8, 9]);
        assert_eq!(first, vec![4, 5, 6]);
        assert_eq!(buf.get(5), Some(&9));
        assert_eq!(buf.get(6), None);
    }

    #[test]
    #[should_panic(expected = "full")]
    fn test_enqueue_past_capacity_panics() {
        let mut buf = CircularBuffer::with_size(1);
        buf.enqueue(1);
        buf.enqueue(2);
    }
}
