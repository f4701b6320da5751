//
// span.rs
//
// Character-offset spans and line/column positions. Every syntactic node,
// token, and reference in the analyzer is addressed by a Span into its
// document's text.
//

use serde::Serialize;

/// How span boundaries are treated by [`Span::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainsBehavior {
    /// The offsets from `start_index` through `end_index`, inclusive.
    Strict,
    /// `Strict` plus the one-past-end offset. Used for cursor queries,
    /// where a cursor sitting just after a token still "touches" it.
    Extended,
    /// Excludes the start offset and the one-past-end offset: the cursor
    /// is *inside* the braces, not sitting on the opening one. For a span
    /// `[3, 13)` this admits offsets 4 through 12.
    Enclosed,
}

/// A contiguous range of character offsets within one document's text.
///
/// Stored as `(start_index, length)`. A zero-length span is permitted and
/// contains no offsets under any behavior except `Extended`, which admits
/// the start offset itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    start_index: usize,
    length: usize,
}

impl Span {
    pub fn new(start_index: usize, length: usize) -> Self {
        Self {
            start_index,
            length,
        }
    }

    /// Construct from a start offset and the offset just past the end.
    ///
    /// Panics if `after_end_index < start_index` — a negative length is a
    /// caller bug, not a document problem.
    pub fn from_bounds(start_index: usize, after_end_index: usize) -> Self {
        assert!(
            after_end_index >= start_index,
            "span bounds reversed: start {start_index}, after-end {after_end_index}"
        );
        Self {
            start_index,
            length: after_end_index - start_index,
        }
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The offset of the last character in the span, or `start_index` for
    /// an empty span.
    pub fn end_index(&self) -> usize {
        self.start_index + self.length.saturating_sub(1)
    }

    /// The offset just past the end of the span.
    pub fn after_end_index(&self) -> usize {
        self.start_index + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether `index` falls within this span under the given behavior.
    pub fn contains(&self, index: usize, behavior: ContainsBehavior) -> bool {
        match behavior {
            ContainsBehavior::Strict => {
                index >= self.start_index && index <= self.end_index()
            }
            ContainsBehavior::Extended => {
                index >= self.start_index && index <= self.after_end_index()
            }
            ContainsBehavior::Enclosed => {
                index > self.start_index && index <= self.end_index()
            }
        }
    }

    /// The smallest span covering both `self` and `other`. A missing
    /// operand unions to `self`.
    pub fn union(&self, other: Option<Span>) -> Span {
        match other {
            None => *self,
            Some(other) => {
                let start = self.start_index.min(other.start_index);
                let after_end = self.after_end_index().max(other.after_end_index());
                Span::from_bounds(start, after_end)
            }
        }
    }

    /// The overlap of `self` and `other`, or `None` when they share no
    /// offsets (merely adjacent spans do not intersect) or the operand is
    /// missing.
    pub fn intersect(&self, other: Option<Span>) -> Option<Span> {
        let other = other?;
        let start = self.start_index.max(other.start_index);
        let after_end = self.after_end_index().min(other.after_end_index());
        if after_end > start {
            Some(Span::from_bounds(start, after_end))
        } else {
            None
        }
    }

    /// Shift the start offset by `delta`, preserving the length.
    ///
    /// Panics if the result would start before offset zero.
    pub fn translate(&self, delta: isize) -> Span {
        let start = self
            .start_index
            .checked_add_signed(delta)
            .unwrap_or_else(|| {
                panic!(
                    "span translate out of range: start {} by {delta}",
                    self.start_index
                )
            });
        Span::new(start, self.length)
    }

    /// Grow the span to the left by `count` offsets (clamped at zero).
    pub fn extend_left(&self, count: usize) -> Span {
        let moved = count.min(self.start_index);
        Span::new(self.start_index - moved, self.length + moved)
    }

    /// Grow the span to the right by `count` offsets.
    pub fn extend_right(&self, count: usize) -> Span {
        Span::new(self.start_index, self.length + count)
    }

    /// The text this span covers, optionally shifted by `offset_adjust`
    /// (used when a span is relative to an embedded substring). Returns an
    /// empty string when the span falls outside `text`.
    pub fn text_of<'a>(&self, text: &'a str, offset_adjust: isize) -> &'a str {
        let Some(start) = self.start_index.checked_add_signed(offset_adjust) else {
            return "";
        };
        let after_end = start + self.length;
        text.get(start..after_end).unwrap_or("")
    }
}

/// A zero-based line/column position, independent of any document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LineColPosition {
    pub line: usize,
    pub column: usize,
}

impl LineColPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}
