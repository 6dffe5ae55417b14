//! Byte positions and spans.

use std::fmt;
use std::ops::Range;

/// A byte offset into a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BytePos(pub u32);

impl BytePos {
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BytePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open byte range `[start, end)` within a single source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: BytePos,
    pub end: BytePos,
}

impl Span {
    /// Creates a span from `usize` offsets, as produced by the lexer.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        Self::from_u32(start as u32, end as u32)
    }

    #[inline]
    pub const fn from_u32(start: u32, end: u32) -> Self {
        Self {
            start: BytePos(start),
            end: BytePos(end),
        }
    }

    /// An empty span at `pos`.
    #[inline]
    pub fn point(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Returns the span from the start of `self` to the end of `other`.
    #[inline]
    pub fn to(&self, other: &Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end.to_usize().saturating_sub(self.start.to_usize())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The span as a `usize` range, the form diagnostic labels take.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start.to_usize()..self.end.to_usize()
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_to() {
        let a = Span::new(2, 5);
        let b = Span::new(8, 12);
        assert_eq!(a.to(&b), Span::new(2, 12));
        assert_eq!(a.len(), 3);
        assert!(Span::point(4).is_empty());
        assert_eq!(a.range(), 2..5);
    }
}
