//! Index ranges over power-of-two ring buffers
//!
//! A span `[head, tail)` of a ring of capacity `C` is either one contiguous
//! segment or, when it wraps past the end of the array, two. Describing it as
//! exactly two segments (the second possibly empty) lets consumers walk the
//! span with two plain loops and no per-element wraparound arithmetic.

/// Half-open contiguous index range `[head, tail)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrayRange {
    pub head: usize,
    pub tail: usize,
}

impl ArrayRange {
    pub fn new(head: usize, tail: usize) -> Self {
        debug_assert!(head <= tail);
        Self { head, tail }
    }

    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }
}

/// The span `[head, tail)` of a ring buffer as two contiguous segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularArrayRange {
    capacity: usize,
    pub first: ArrayRange,
    pub second: ArrayRange,
}

impl CircularArrayRange {
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two or `head`/`tail` is out of
    /// range.
    pub fn new(capacity: usize, head: usize, tail: usize) -> Self {
        assert!(capacity.is_power_of_two(), "capacity must be a power of two");
        assert!(head < capacity && tail < capacity, "index out of range");

        if head <= tail {
            Self {
                capacity,
                first: ArrayRange::new(head, tail),
                second: ArrayRange::default(),
            }
        } else {
            Self {
                capacity,
                first: ArrayRange::new(head, capacity),
                second: ArrayRange::new(0, tail),
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of indices in the span
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    pub fn iter(&self) -> CircularArrayIter {
        CircularArrayIter {
            current: self.first.head,
            end: self.first.tail,
            second: self.second,
            in_second: false,
        }
    }
}

impl IntoIterator for CircularArrayRange {
    type Item = usize;
    type IntoIter = CircularArrayIter;

    fn into_iter(self) -> CircularArrayIter {
        self.iter()
    }
}

impl IntoIterator for &CircularArrayRange {
    type Item = usize;
    type IntoIter = CircularArrayIter;

    fn into_iter(self) -> CircularArrayIter {
        self.iter()
    }
}

/// Physical indices of a [`CircularArrayRange`], first segment then second
#[derive(Debug, Clone)]
pub struct CircularArrayIter {
    current: usize,
    end: usize,
    second: ArrayRange,
    in_second: bool,
}

impl Iterator for CircularArrayIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.current == self.end {
            if self.in_second {
                return None;
            }
            self.in_second = true;
            self.current = self.second.head;
            self.end = self.second.tail;
            if self.current == self.end {
                return None;
            }
        }
        let index = self.current;
        self.current += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.end - self.current;
        let n = if self.in_second { rest } else { rest + self.second.len() };
        (n, Some(n))
    }
}

impl ExactSizeIterator for CircularArrayIter {}
