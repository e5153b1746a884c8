//! Body bookkeeping shared by request and response frames.

use crate::protocol::PayloadSize;

/// Tracks a body's declared length and how much of it has been consumed.
///
/// A state is *limited* once its final size is known: up front for `Content-Length` bodies,
/// or after the last chunk for chunked bodies. Unbounded states are never finalized.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ContentState {
    length: u64,
    offset: u64,
    limited: bool,
    exceeds: bool,
    prefetch: u64,
}

impl ContentState {
    /// A body of exactly `length` bytes.
    pub fn limited(length: u64) -> Self {
        Self { length, limited: true, ..Default::default() }
    }

    /// A body whose size is not known yet (chunked, or delimited by close).
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_limited(&self) -> bool {
        self.limited
    }

    /// Whether the body was routed away from memory (to a temp file or discarded).
    pub fn exceeds(&self) -> bool {
        self.exceeds
    }

    /// Bytes of the body that arrived in the same read as the head.
    pub fn prefetch(&self) -> u64 {
        self.prefetch
    }

    pub fn is_finalized(&self) -> bool {
        self.limited && self.offset >= self.length
    }

    /// Bytes still expected, `None` while unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.limited.then(|| self.length.saturating_sub(self.offset))
    }

    pub fn advance(&mut self, n: u64) {
        self.offset = self.offset.saturating_add(n);
    }

    /// Fixes the final size of an unbounded body at what has been consumed so far.
    pub fn finish(&mut self) {
        if !self.limited {
            self.length = self.offset;
            self.limited = true;
        }
    }

    pub fn mark_exceeds(&mut self) {
        self.exceeds = true;
    }

    pub fn set_prefetch(&mut self, prefetch: u64) {
        self.prefetch = prefetch;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl From<PayloadSize> for ContentState {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => ContentState::limited(length),
            PayloadSize::Empty => ContentState::limited(0),
            PayloadSize::Chunked | PayloadSize::UntilEof => ContentState::unbounded(),
        }
    }
}
