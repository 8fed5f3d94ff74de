// ============================================================
// Layer 4: Skip-Gram Batch Sampler
// ============================================================
// Turns one token stream into (center token, context token) pairs.
//
// With skip_window = 1 (span = 3) and num_skips = 2:
//
//   stream:  0 1 2 3 4 5 6 7
//   window: [0 1 2]          center 1 → (1,0) (1,2)
//   window:   [1 2 3]        center 2 → (2,1) (2,3)
//
// The read position is an explicit Cursor: sample() takes one and
// returns the next, so repeated calls walk the stream cyclically
// without any hidden state. When the window would run past the end
// of the stream it is reseeded from the start; the tail context is
// dropped and nothing from another document is mixed in.
//
// Reference: Mikolov et al. (2013) Distributed Representations of
//            Words and Phrases and their Compositionality

use rand::Rng;

use crate::data::context_window::ContextWindowBuffer;
use crate::data::quality_gate::BatchQualityGate;
use crate::domain::error::TrainingError;
use crate::domain::token_stream::{Cursor, TokenId, TokenStream};

/// Random position draws allowed per (group, context slot, window slot)
/// before the distinct-position draw gives up.
const POSITION_DRAWS_PER_SLOT: usize = 64;

// ─── Batch ────────────────────────────────────────────────────────────────────
/// `batch_size` skip-gram pairs. `inputs[i]` is a center token and
/// `labels[i]` one of its context tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    inputs: Vec<TokenId>,
    labels: Vec<TokenId>,
}

/// One (input, label) pair of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipGramPair {
    pub input: TokenId,
    pub label: TokenId,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn inputs(&self) -> &[TokenId] {
        &self.inputs
    }

    pub fn labels(&self) -> &[TokenId] {
        &self.labels
    }

    /// Labels are consumed as a column: [batch_size, 1].
    pub fn label_shape(&self) -> [usize; 2] {
        [self.labels.len(), 1]
    }

    pub fn pairs(&self) -> impl Iterator<Item = SkipGramPair> + '_ {
        self.inputs
            .iter()
            .zip(&self.labels)
            .map(|(&input, &label)| SkipGramPair { input, label })
    }
}

// ─── SkipGramBatchSampler ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipGramBatchSampler {
    batch_size:  usize,
    num_skips:   usize,
    skip_window: usize,
}

impl SkipGramBatchSampler {
    /// Validate the sampling parameters. Nothing is sampled from an
    /// invalid configuration.
    pub fn new(batch_size: usize, num_skips: usize, skip_window: usize) -> Result<Self, TrainingError> {
        if num_skips == 0 || batch_size == 0 {
            return Err(TrainingError::Configuration(format!(
                "batch_size ({batch_size}) and num_skips ({num_skips}) must be positive"
            )));
        }
        if batch_size % num_skips != 0 {
            return Err(TrainingError::Configuration(format!(
                "batch_size ({batch_size}) must be a multiple of num_skips ({num_skips})"
            )));
        }
        if num_skips > 2 * skip_window {
            return Err(TrainingError::Configuration(format!(
                "num_skips ({num_skips}) must not exceed 2 * skip_window ({})",
                2 * skip_window
            )));
        }
        Ok(Self { batch_size, num_skips, skip_window })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn span(&self) -> usize {
        2 * self.skip_window + 1
    }

    /// Draw one batch starting at `cursor`; returns the cursor for the
    /// next call alongside the batch.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        stream: &TokenStream,
        cursor: Cursor,
        rng:    &mut R,
    ) -> Result<(Cursor, Batch), TrainingError> {
        let tokens = stream.tokens();
        let len    = tokens.len();
        let span   = self.span();
        if len < span {
            return Err(TrainingError::StreamTooShort { len, span });
        }

        let mut index = cursor.offset();
        if index + span > len {
            index = 0;
        }
        let mut window = ContextWindowBuffer::new(span);
        window.refill(&tokens[index..index + span]);
        index += span;

        let mut inputs = Vec::with_capacity(self.batch_size);
        let mut labels = Vec::with_capacity(self.batch_size);

        for _ in 0..self.batch_size / self.num_skips {
            let center = window.center();
            for position in self.draw_context_positions(rng)? {
                inputs.push(center);
                labels.push(window.get(position));
            }

            // Slide by one token, or start over at the stream head
            if index == len {
                window.refill(&tokens[..span]);
                index = span;
            } else {
                window.push(tokens[index]);
                index += 1;
            }
        }

        let next = Cursor::at((index + len - span) % len);
        Ok((next, Batch { inputs, labels }))
    }

    /// Keep sampling from the advancing cursor until `gate` accepts a
    /// batch, giving up after `max_attempts` draws.
    pub fn sample_accepted<R: Rng + ?Sized>(
        &self,
        stream:       &TokenStream,
        cursor:       Cursor,
        gate:         &BatchQualityGate,
        max_attempts: usize,
        rng:          &mut R,
    ) -> Result<(Cursor, Batch), TrainingError> {
        let mut cursor = cursor;
        for _ in 0..max_attempts {
            let (next, batch) = self.sample(stream, cursor, rng)?;
            if gate.accepts(batch.inputs()) {
                return Ok((next, batch));
            }
            cursor = next;
        }
        Err(TrainingError::SamplingExhausted {
            what:     "quality-gated batch",
            attempts: max_attempts,
        })
    }

    /// An endless iterator of batches over `stream`, threading the
    /// cursor internally.
    pub fn batches<'a, R: Rng + ?Sized>(
        &'a self,
        stream: &'a TokenStream,
        cursor: Cursor,
        rng:    &'a mut R,
    ) -> SkipGramBatches<'a, R> {
        SkipGramBatches { sampler: self, stream, cursor, rng }
    }

    /// `num_skips` distinct window positions, none of them the center.
    fn draw_context_positions<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<usize>, TrainingError> {
        let span   = self.span();
        let center = self.skip_window;
        let budget = POSITION_DRAWS_PER_SLOT * span * self.num_skips;

        let mut chosen = Vec::with_capacity(self.num_skips);
        let mut draws  = 0usize;
        while chosen.len() < self.num_skips {
            if draws == budget {
                return Err(TrainingError::SamplingExhausted {
                    what:     "distinct context position",
                    attempts: budget,
                });
            }
            draws += 1;
            let position = rng.gen_range(0..span);
            if position != center && !chosen.contains(&position) {
                chosen.push(position);
            }
        }
        Ok(chosen)
    }
}

// ─── SkipGramBatches ──────────────────────────────────────────────────────────
/// Lazy, restartable sequence of batches. `cursor()` reports where the
/// next batch will start so a caller can resume later.
pub struct SkipGramBatches<'a, R: Rng + ?Sized> {
    sampler: &'a SkipGramBatchSampler,
    stream:  &'a TokenStream,
    cursor:  Cursor,
    rng:     &'a mut R,
}

impl<R: Rng + ?Sized> SkipGramBatches<'_, R> {
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }
}

impl<R: Rng + ?Sized> Iterator for SkipGramBatches<'_, R> {
    type Item = Result<Batch, TrainingError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(
            self.sampler
                .sample(self.stream, self.cursor, self.rng)
                .map(|(next, batch)| {
                    self.cursor = next;
                    batch
                }),
        )
    }
}
