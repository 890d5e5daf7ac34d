//! Ring buffer.

/// Fixed-capacity byte ring buffer.
///
/// One slot is kept free to tell a full buffer from an empty one,
/// thus at most `SIZE - 1` bytes can be stored.
///
/// The buffer itself performs no locking.
/// [`DmaLog`](crate::DmaLog) accesses it from within a critical section only.
pub struct RingBuffer<const SIZE: usize> {
    /// Read position.
    read_pos: usize,
    /// Write position.
    write_pos: usize,
    /// Buffer.
    buf: [u8; SIZE],
}

impl<const SIZE: usize> Default for RingBuffer<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> RingBuffer<SIZE> {
    /// Number of bytes the ring buffer can hold.
    pub const CAPACITY: usize = SIZE - 1;

    /// Creates an empty ring buffer.
    pub const fn new() -> Self {
        Self { read_pos: 0, write_pos: 0, buf: [0; SIZE] }
    }

    /// Number of stored bytes.
    pub fn len(&self) -> usize {
        if self.write_pos >= self.read_pos {
            self.write_pos - self.read_pos
        } else {
            SIZE - self.read_pos + self.write_pos
        }
    }

    /// Whether no bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.write_pos == self.read_pos
    }

    /// Whether no more bytes can be stored.
    pub fn is_full(&self) -> bool {
        Self::advance(self.write_pos, 1) == self.read_pos
    }

    /// Number of bytes that can be stored before the buffer is full.
    pub fn free(&self) -> usize {
        Self::CAPACITY - self.len()
    }

    /// Discards all stored bytes.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    fn advance(pos: usize, n: usize) -> usize {
        let pos = pos + n;
        if pos >= SIZE {
            pos - SIZE
        } else {
            pos
        }
    }

    /// Writes as much of `data` as fits into the ring buffer.
    ///
    /// Returns the number of bytes written.
    /// Bytes that do not fit are dropped.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.free());
        let (mut data, _dropped) = data.split_at(n);

        while !data.is_empty() {
            // Split data into part that fits until end of buffer.
            let to_end = SIZE - self.write_pos;
            let (part, rest) = data.split_at(to_end.min(data.len()));
            data = rest;

            let from = self.write_pos;
            let to = from + part.len();
            self.buf[from..to].copy_from_slice(part);

            self.write_pos = if to == SIZE { 0 } else { to };
        }

        n
    }

    /// Copies stored bytes into `data` without removing them.
    ///
    /// Returns the number of bytes copied.
    pub fn peek(&self, data: &mut [u8]) -> usize {
        let n = self.len().min(data.len());

        // First run until end of buffer, second run from start of buffer.
        let first = n.min(SIZE - self.read_pos);
        data[..first].copy_from_slice(&self.buf[self.read_pos..self.read_pos + first]);
        data[first..n].copy_from_slice(&self.buf[..n - first]);

        n
    }

    /// Removes up to `n` stored bytes.
    ///
    /// Returns the number of bytes removed.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        self.read_pos = Self::advance(self.read_pos, n);
        n
    }

    /// Reads and removes stored bytes into `data`.
    ///
    /// Returns the number of bytes read.
    pub fn pop(&mut self, data: &mut [u8]) -> usize {
        let n = self.peek(data);
        self.consume(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_and_pop() {
        let mut rb = RingBuffer::<16>::new();
        assert!(rb.is_empty());
        assert_eq!(rb.push(b"hello"), 5);
        assert_eq!(rb.len(), 5);

        let mut out = [0; 16];
        assert_eq!(rb.pop(&mut out), 5);
        assert_eq!(&out[..5], b"hello");
        assert!(rb.is_empty());
        assert_eq!(rb.pop(&mut out), 0);
    }

    #[test]
    fn one_slot_is_sacrificed() {
        let mut rb = RingBuffer::<8>::new();
        assert_eq!(RingBuffer::<8>::CAPACITY, 7);
        assert_eq!(rb.push(b"ABCDEFGHIJ"), 7);
        assert!(rb.is_full());
        assert_eq!(rb.free(), 0);
        assert_eq!(rb.push(b"K"), 0);

        let mut out = [0; 8];
        assert_eq!(rb.pop(&mut out), 7);
        assert_eq!(&out[..7], b"ABCDEFG");
    }

    #[test]
    fn wraps_around() {
        let mut rb = RingBuffer::<8>::new();
        let mut out = [0; 8];

        assert_eq!(rb.push(b"12345"), 5);
        assert_eq!(rb.pop(&mut out[..4]), 4);
        assert_eq!(&out[..4], b"1234");

        // Write position wraps.
        assert_eq!(rb.push(b"67890A"), 6);
        assert!(rb.is_full());
        assert_eq!(rb.len(), 7);

        assert_eq!(rb.pop(&mut out), 7);
        assert_eq!(&out[..7], b"567890A");
        assert!(rb.is_empty());
    }

    #[test]
    fn peek_leaves_data_in_place() {
        let mut rb = RingBuffer::<8>::new();
        let mut out = [0; 3];

        rb.push(b"xyz");
        assert_eq!(rb.peek(&mut out), 3);
        assert_eq!(&out, b"xyz");
        assert_eq!(rb.len(), 3);

        assert_eq!(rb.consume(2), 2);
        assert_eq!(rb.len(), 1);
        assert_eq!(rb.consume(5), 1);
        assert!(rb.is_empty());
    }

    #[test]
    fn clear_resets_positions() {
        let mut rb = RingBuffer::<4>::new();
        rb.push(b"abc");
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.free(), 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(Vec<u8>),
        Pop(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            proptest::collection::vec(any::<u8>(), 0..24).prop_map(Op::Push),
            (0usize..24).prop_map(Op::Pop),
        ]
    }

    proptest! {
        #[test]
        fn behaves_like_bounded_fifo(ops in proptest::collection::vec(op(), 0..64)) {
            let mut rb = RingBuffer::<13>::new();
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(data) => {
                        let before = rb.len();
                        let n = rb.push(&data);
                        prop_assert_eq!(n, data.len().min(RingBuffer::<13>::CAPACITY - before));
                        if n == data.len() {
                            prop_assert!(before + n <= RingBuffer::<13>::CAPACITY);
                        }
                        model.extend(&data[..n]);
                    }
                    Op::Pop(max) => {
                        let mut out = vec![0; max];
                        let n = rb.pop(&mut out);
                        let expected: Vec<u8> = model.drain(..n.min(model.len())).collect();
                        prop_assert_eq!(&out[..n], &expected[..]);
                        prop_assert_eq!(n, max.min(n + model.len()));
                    }
                }
                prop_assert!(rb.len() <= RingBuffer::<13>::CAPACITY);
                prop_assert_eq!(rb.len(), model.len());
            }
        }
    }
}
