//! Incremental, seekable materialization of a linearized format.
//!
//! [`FormatCache`] sits between a [`Linearizer`] and the renderer. Spans are
//! pulled lazily, kept in arrival order and indexed by byte range, so a seek to
//! an already-seen offset is a lookup rather than a re-linearization. Every
//! read the linearizer makes is recorded; a change notification only throws
//! the cache away when it hits bytes the cache actually depended on.

use crate::format::{Format, FormatError, Span};
use crate::interval::IntervalIndex;
use crate::linearize::Linearizer;
use crate::scope::Scope;
use crate::source::ByteSource;
use std::cell::RefCell;
use std::io;

/// Byte source wrapper that records every requested range before reading it.
pub struct TouchRecorder<S> {
    inner: S,
    touched: RefCell<IntervalIndex<()>>,
}

impl<S: ByteSource> TouchRecorder<S> {
    pub fn new(inner: S) -> Self {
        TouchRecorder {
            inner,
            touched: RefCell::new(IntervalIndex::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// True if any recorded read overlaps `[lo, hi]`.
    pub fn was_touched(&self, lo: u64, hi: u64) -> bool {
        self.touched.borrow().overlaps(lo, hi)
    }

    pub fn touched_ranges(&self) -> Vec<(u64, u64)> {
        self.touched
            .borrow()
            .iter()
            .map(|(lo, hi, _)| (lo, hi))
            .collect()
    }

    fn forget(&self) {
        self.touched.borrow_mut().clear();
    }
}

impl<S: ByteSource> ByteSource for TouchRecorder<S> {
    fn read(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        tracing::trace!(offset, length, "Read caught");
        if length > 0 {
            self.touched
                .borrow_mut()
                .insert(offset, offset.saturating_add(length - 1), ());
        }
        self.inner.read(offset, length)
    }

    fn name(&self) -> Option<String> {
        self.inner.name()
    }
}

/// Materialized, seekable view over the spans of `format` on one byte source.
///
/// `next` and `seek_to` share one cursor: after `seek_to` finds a span,
/// `next` continues with the span after it. An error from the linearizer is
/// returned once and ends the sequence; already materialized spans stay
/// available until [`invalidate`](Self::invalidate).
pub struct FormatCache<S: ByteSource> {
    format: Format,
    linearizer: Linearizer<TouchRecorder<S>>,
    spans: Vec<Span>,
    index: IntervalIndex<usize>,
    cursor: usize,
    current: Option<usize>,
}

impl<S: ByteSource> FormatCache<S> {
    /// Fails with [`FormatError::Structural`] if `format` has an open group.
    pub fn new(format: &Format, source: S) -> Result<Self, FormatError> {
        format.check()?;
        let linearizer =
            Linearizer::start_checked(format, TouchRecorder::new(source), 0, Scope::new());
        Ok(FormatCache {
            format: format.clone(),
            linearizer,
            spans: Vec::new(),
            index: IntervalIndex::new(),
            cursor: 0,
            current: None,
        })
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn source(&self) -> &S {
        self.linearizer.source().inner()
    }

    /// Spans materialized so far, in linearization order.
    pub fn materialized(&self) -> &[Span] {
        &self.spans
    }

    /// True once the linearizer has ended, normally or with an error.
    pub fn is_exhausted(&self) -> bool {
        self.linearizer.is_done()
    }

    /// Span last returned by `next` or `seek_to`.
    pub fn current(&self) -> Option<&Span> {
        self.current.map(|i| &self.spans[i])
    }

    pub fn touched_ranges(&self) -> Vec<(u64, u64)> {
        self.linearizer.source().touched_ranges()
    }

    /// The span after the cursor, pulling from the linearizer only when nothing
    /// further is materialized.
    pub fn next(&mut self) -> Result<Option<&Span>, FormatError> {
        let i = if self.cursor < self.spans.len() {
            self.cursor
        } else {
            match self.pull()? {
                Some(i) => i,
                None => return Ok(None),
            }
        };
        self.cursor = i + 1;
        self.current = Some(i);
        Ok(Some(&self.spans[i]))
    }

    /// The span covering `offset`, materializing up to it if needed.
    ///
    /// Spans come out in strictly increasing offset order, so an offset that no
    /// span covers yields `None` as soon as a span past it exists, without
    /// pulling further.
    pub fn seek_to(&mut self, offset: u64) -> Result<Option<&Span>, FormatError> {
        let hit = self.index.search(offset, offset).first().map(|&&i| i);
        if let Some(i) = hit {
            return Ok(Some(self.land(i)));
        }
        if self.spans.last().map_or(false, |s| offset <= s.to) {
            return Ok(None);
        }
        loop {
            let i = match self.pull()? {
                Some(i) => i,
                None => return Ok(None),
            };
            let span = &self.spans[i];
            if span.to < offset {
                continue;
            }
            if !span.contains(offset) {
                return Ok(None);
            }
            return Ok(Some(self.land(i)));
        }
    }

    /// Drop everything materialized and start linearizing again from offset 0.
    pub fn invalidate(&mut self) {
        tracing::debug!(materialized = self.spans.len(), "Format cache invalidated");
        self.spans.clear();
        self.index.clear();
        self.cursor = 0;
        self.current = None;
        self.linearizer.source().forget();
        self.linearizer.restart(&self.format, 0);
    }

    /// Notify that `[offset, offset + length - 1]` changed in the byte source.
    /// Invalidates and returns true iff the cache ever read from that range.
    pub fn on_change(&mut self, offset: u64, length: u64) -> bool {
        if length == 0 {
            return false;
        }
        let hi = offset.saturating_add(length - 1);
        if !self.linearizer.source().was_touched(offset, hi) {
            return false;
        }
        tracing::debug!(offset, length, "Change overlaps bytes read by the format");
        self.invalidate();
        true
    }

    fn land(&mut self, i: usize) -> &Span {
        self.cursor = i + 1;
        self.current = Some(i);
        &self.spans[i]
    }

    /// Materialize one more span; its position in `spans`.
    fn pull(&mut self) -> Result<Option<usize>, FormatError> {
        let span = match self.linearizer.next_span() {
            Ok(Some(span)) => span,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, materialized = self.spans.len(), "Linearization stopped");
                return Err(e);
            }
        };
        let i = self.spans.len();
        self.index.insert(span.from, span.to, i);
        self.spans.push(span);
        Ok(Some(i))
    }
}
