// ============================================================
// Layer 4: Context Window Buffer
// ============================================================
// A fixed-size ring buffer holding the most recent `span` tokens
// of one stream, where span = 2 * skip_window + 1.
//
//   slots:  [ t5 | t3 | t4 ]     head = 1
//   logical order (oldest → newest): t3, t4, t5
//
// push() overwrites the oldest slot and moves `head` forward, so
// advancing the window by one token is O(1) with no allocation.
// refill() replaces the whole window at once; the sampler uses it
// to restart from the beginning of the stream at a document end.

use crate::domain::token_stream::TokenId;

#[derive(Debug, Clone)]
pub struct ContextWindowBuffer {
    slots:  Box<[TokenId]>,
    /// Physical index of the oldest token once the buffer is full
    head:   usize,
    filled: usize,
}

impl ContextWindowBuffer {
    /// # Panics
    /// Panics if `span` is zero.
    pub fn new(span: usize) -> Self {
        assert!(span > 0, "context window span must be positive");
        Self {
            slots:  vec![0; span].into_boxed_slice(),
            head:   0,
            filled: 0,
        }
    }

    pub fn span(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_warm(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Replace the whole window with `tokens`, which must be exactly
    /// `span` long.
    pub fn refill(&mut self, tokens: &[TokenId]) {
        debug_assert_eq!(tokens.len(), self.slots.len());
        self.slots.copy_from_slice(tokens);
        self.head   = 0;
        self.filled = self.slots.len();
    }

    /// Append one token, evicting the oldest when full.
    pub fn push(&mut self, token: TokenId) {
        let span = self.slots.len();
        if self.filled < span {
            self.slots[self.filled] = token;
            self.filled += 1;
        } else {
            self.slots[self.head] = token;
            self.head = (self.head + 1) % span;
        }
    }

    /// Token at logical position `i`, 0 = oldest.
    pub fn get(&self, i: usize) -> TokenId {
        debug_assert!(i < self.filled);
        if self.filled < self.slots.len() {
            self.slots[i]
        } else {
            self.slots[(self.head + i) % self.slots.len()]
        }
    }

    /// The middle element of a warm window.
    pub fn center(&self) -> TokenId {
        self.get(self.slots.len() / 2)
    }

    pub fn to_vec(&self) -> Vec<TokenId> {
        (0..self.filled).map(|i| self.get(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_most_recent_span_tokens() {
        let mut w = ContextWindowBuffer::new(3);
        for t in 0..5 {
            w.push(t);
        }
        assert!(w.is_warm());
        assert_eq!(w.to_vec(), vec![2, 3, 4]);
        assert_eq!(w.center(), 3);
    }

    #[test]
    fn test_length_stays_at_span_once_warm() {
        let mut w = ContextWindowBuffer::new(5);
        w.refill(&[10, 11, 12, 13, 14]);
        for t in 15..40 {
            w.push(t);
            assert_eq!(w.len(), 5);
        }
        assert_eq!(w.to_vec(), vec![35, 36, 37, 38, 39]);
    }

    #[test]
    fn test_refill_resets_logical_order() {
        let mut w = ContextWindowBuffer::new(3);
        w.refill(&[7, 8, 9]);
        w.push(10);
        w.refill(&[0, 1, 2]);
        assert_eq!(w.to_vec(), vec![0, 1, 2]);
        assert_eq!(w.center(), 1);
    }

    #[test]
    fn test_partial_window_reads_in_insertion_order() {
        let mut w = ContextWindowBuffer::new(4);
        w.push(5);
        w.push(6);
        assert!(!w.is_warm());
        assert_eq!(w.to_vec(), vec![5, 6]);
    }
}
