// ============================================================
// Layer 3: Token Stream Domain Types
// ============================================================
// A TokenStream is one capture file's worth of integer tokens,
// produced by the external packet tokenizer. The core only ever
// reads it. A Cursor is an offset into one stream and is passed
// in and returned by the sampler, never kept in hidden state.

use serde::{Deserialize, Serialize};

/// Token ids are fixed-width signed integers on disk.
pub type TokenId = i64;

/// An immutable, ordered sequence of token ids for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStream {
    /// File name the tokens were read from, for log lines
    pub source: String,
    tokens: Vec<TokenId>,
}

impl TokenStream {
    pub fn new(source: impl Into<String>, tokens: Vec<TokenId>) -> Self {
        Self { source: source.into(), tokens }
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// First token that does not fit a vocabulary of `vocab_size` ids.
    pub fn first_out_of_range(&self, vocab_size: usize) -> Option<TokenId> {
        self.tokens
            .iter()
            .copied()
            .find(|&t| t < 0 || t as u64 >= vocab_size as u64)
    }
}

/// Read position inside a TokenStream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(usize);

impl Cursor {
    pub fn start() -> Self {
        Self(0)
    }

    pub fn at(offset: usize) -> Self {
        Self(offset)
    }

    pub fn offset(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_detects_negative_and_large_ids() {
        let s = TokenStream::new("a.bin", vec![0, 3, 9]);
        assert_eq!(s.first_out_of_range(10), None);
        assert_eq!(s.first_out_of_range(9), Some(9));

        let neg = TokenStream::new("b.bin", vec![1, -2]);
        assert_eq!(neg.first_out_of_range(10), Some(-2));
    }

    #[test]
    fn test_cursor_defaults_to_stream_start() {
        assert_eq!(Cursor::default(), Cursor::start());
        assert_eq!(Cursor::at(7).offset(), 7);
    }
}
