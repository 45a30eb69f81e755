//! Lazy linearization of a [`Format`] against a [`ByteSource`].
//!
//! The traversal is depth-first and offset-threading. Instead of recursing, it
//! keeps an explicit stack of frames, one per open nesting level, so it can
//! stop after any span and resume exactly there on the next pull:
//!
//! - a **body** frame walks the children of a group (or of a format's root),
//!   remembering the index of the next child and the naming prefix;
//! - a **repeat** frame drives a composite, remembering how many repetitions
//!   are left (`None` for sequences).
//!
//! Every group entry and every repetition pushes a [`Scope`] frame, popped when
//! the matching body frame completes. A single running offset is enough
//! because every span starts where the previous one ended.
//!
//! ## Example
//!
//! ```
//! use hexlayout::{Color, Format, Linearizer};
//!
//! let item = Format::new().uint8("X", Color::White);
//! let format = Format::new().sequence(None, &item);
//! let data = vec![0u8; 16];
//! let spans: Vec<_> = Linearizer::new(&format, &data, 0)?.take(3).collect::<Result<_, _>>()?;
//! assert_eq!((spans[2].from, spans[2].to), (2, 2));
//! # Ok::<(), hexlayout::FormatError>(())
//! ```

use crate::format::{join_name, Color, Format, FormatError, FormatNode, Group, Repeat, Span};
use crate::scope::Scope;
use crate::source::ByteSource;
use std::iter::FusedIterator;
use std::sync::Arc;

enum Frame {
    Body {
        group: Arc<Group>,
        next: usize,
        prefix: Arc<str>,
        /// Whether completing this body pops a scope frame.
        scoped: bool,
    },
    Repeat {
        child: Arc<Group>,
        remaining: Option<u64>,
        prefix: Arc<str>,
        /// Offset at which the last repetition started.
        rep_start: Option<u64>,
    },
}

impl Frame {
    fn root(format: &Format) -> Self {
        Frame::Body {
            group: Arc::clone(format.root()),
            next: 0,
            prefix: Arc::from(""),
            scoped: false,
        }
    }
}

/// Resumable cursor over the spans of one format against one byte source.
///
/// Not rewindable: start over by building a new `Linearizer`. After an error
/// or the end of the format every further pull returns `None`.
pub struct Linearizer<S> {
    source: S,
    scope: Scope,
    stack: Vec<Frame>,
    offset: u64,
    done: bool,
}

impl<S: ByteSource> Linearizer<S> {
    /// Check `format` for open groups, then position a cursor at `start`.
    pub fn new(format: &Format, source: S, start: u64) -> Result<Self, FormatError> {
        Self::with_scope(format, source, start, Scope::new())
    }

    /// Like [`new`](Self::new), with caller-provided root bindings.
    pub fn with_scope(
        format: &Format,
        source: S,
        start: u64,
        scope: Scope,
    ) -> Result<Self, FormatError> {
        format.check()?;
        Ok(Self::start_checked(format, source, start, scope))
    }

    /// `format` must already have passed [`Format::check`].
    pub(crate) fn start_checked(format: &Format, source: S, start: u64, scope: Scope) -> Self {
        Linearizer {
            source,
            scope,
            stack: vec![Frame::root(format)],
            offset: start,
            done: false,
        }
    }

    /// Rewind to `start` with an empty root scope, as if freshly built.
    pub(crate) fn restart(&mut self, format: &Format, start: u64) {
        self.scope = Scope::new();
        self.stack.clear();
        self.stack.push(Frame::root(format));
        self.offset = start;
        self.done = false;
    }

    /// Offset the next span will start at.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Produce the next span, `Ok(None)` at the end of the format.
    pub fn next_span(&mut self) -> Result<Option<Span>, FormatError> {
        if self.done {
            return Ok(None);
        }
        match self.step() {
            Ok(Some(span)) => Ok(Some(span)),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                self.stack.clear();
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<Option<Span>, FormatError> {
        loop {
            let top = match self.stack.last_mut() {
                Some(top) => top,
                None => return Ok(None),
            };
            match top {
                Frame::Body {
                    group,
                    next,
                    prefix,
                    scoped,
                } => {
                    if *next >= group.children.len() {
                        let scoped = *scoped;
                        self.stack.pop();
                        if scoped {
                            self.scope.pop();
                        }
                        continue;
                    }
                    let idx = *next;
                    *next += 1;
                    let group = Arc::clone(group);
                    let prefix = Arc::clone(prefix);
                    if let Some(span) = self.visit(&group.children[idx], &prefix)? {
                        return Ok(Some(span));
                    }
                }
                Frame::Repeat {
                    child,
                    remaining,
                    prefix,
                    rep_start,
                } => {
                    // A repetition that covered no bytes would repeat identically forever.
                    let stalled = *rep_start == Some(self.offset);
                    if stalled || *remaining == Some(0) {
                        self.stack.pop();
                        continue;
                    }
                    if let Some(n) = remaining {
                        *n -= 1;
                    }
                    *rep_start = Some(self.offset);
                    let child = Arc::clone(child);
                    let prefix = Arc::clone(prefix);
                    self.scope.push();
                    self.stack.push(Frame::Body {
                        group: child,
                        next: 0,
                        prefix,
                        scoped: true,
                    });
                }
            }
        }
    }

    fn visit(&mut self, node: &FormatNode, prefix: &Arc<str>) -> Result<Option<Span>, FormatError> {
        match node {
            FormatNode::Scalar(s) => {
                let width = s.ty.width();
                let buf = self.source.read(self.offset, width)?;
                if buf.len() as u64 != width {
                    return Err(FormatError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "short read: {} of {} bytes at offset {}",
                            buf.len(),
                            width,
                            self.offset
                        ),
                    )));
                }
                if let Some(var) = &s.bind {
                    self.scope.set(var.as_str(), s.ty.decode(&buf));
                }
                self.emit(join_name(prefix, &s.name), s.color, width).map(Some)
            }
            FormatNode::RawArray(a) => {
                let n = a.count.resolve(&self.scope);
                if n == 0 {
                    return Ok(None);
                }
                self.emit(join_name(prefix, &a.name), a.color, n).map(Some)
            }
            FormatNode::Group(g) => {
                self.scope.push();
                self.stack.push(Frame::Body {
                    group: Arc::clone(g),
                    next: 0,
                    prefix: Arc::from(join_name(prefix, &g.name)),
                    scoped: true,
                });
                Ok(None)
            }
            FormatNode::Composite(c) => {
                let remaining = match &c.repeat {
                    Repeat::Times(count) => Some(count.resolve(&self.scope)),
                    Repeat::Unbounded => None,
                };
                let prefix = match &c.name {
                    Some(name) => Arc::from(join_name(prefix, name)),
                    None => Arc::clone(prefix),
                };
                self.stack.push(Frame::Repeat {
                    child: Arc::clone(c.child.root()),
                    remaining,
                    prefix,
                    rep_start: None,
                });
                Ok(None)
            }
        }
    }

    /// Span of `length` bytes at the cursor; advances the cursor past it.
    fn emit(&mut self, name: String, color: Color, length: u64) -> Result<Span, FormatError> {
        let end = self
            .offset
            .checked_add(length)
            .ok_or(FormatError::OffsetOverflow {
                offset: self.offset,
                length,
            })?;
        let span = Span::new(name, color, self.offset, end - 1);
        self.offset = end;
        Ok(span)
    }
}

impl<S: ByteSource> Iterator for Linearizer<S> {
    type Item = Result<Span, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_span().transpose()
    }
}

impl<S: ByteSource> FusedIterator for Linearizer<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Count;
    use crate::value::Value;

    /// Byte `i` of the file is `i as u8`.
    struct Counting;

    impl ByteSource for Counting {
        fn read(&self, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
            Ok((offset..offset + length).map(|i| i as u8).collect())
        }
    }

    fn spans(format: &Format) -> Vec<(String, u64, u64)> {
        Linearizer::new(format, Counting, 0)
            .expect("balanced")
            .map(|r| r.map(|s| (s.name, s.from, s.to)))
            .collect::<Result<_, _>>()
            .expect("linearize")
    }

    #[test]
    fn empty_format_has_no_spans() {
        assert!(spans(&Format::new()).is_empty());
    }

    #[test]
    fn start_offset_shifts_everything() {
        let f = Format::new().uint16("a", Color::White).uint8("b", Color::White);
        let got: Vec<_> = Linearizer::new(&f, Counting, 100)
            .expect("balanced")
            .map(|r| r.map(|s| (s.from, s.to)))
            .collect::<Result<_, _>>()
            .expect("linearize");
        assert_eq!(got, vec![(100, 101), (102, 102)]);
    }

    #[test]
    fn group_scope_is_dropped_after_the_group() {
        let f = Format::new()
            .group("G")
            .scalar(
                crate::format::ScalarType::from_keyword("u8").expect("u8"),
                "n",
                Color::White,
                Some("n"),
            )
            .endgroup()
            .expect("balanced")
            .raw_array("after", "n", Color::White);
        // Byte 0 is 0 anyway, so probe visibility through a closure.
        let probe = Format::new()
            .group("G")
            .scalar(
                crate::format::ScalarType::from_keyword("u8").expect("u8"),
                "n",
                Color::White,
                Some("n"),
            )
            .endgroup()
            .expect("balanced")
            .raw_array("after", Count::func(|s| if s.contains("n") { 5 } else { 0 }), Color::White);
        assert_eq!(spans(&f), vec![("G > n".to_string(), 0, 0)]);
        assert_eq!(spans(&probe), vec![("G > n".to_string(), 0, 0)]);
    }

    #[test]
    fn repetitions_do_not_share_bindings() {
        let x = crate::format::ScalarType::from_keyword("u8").expect("u8");
        // Only the first repetition binds `seen`; later ones must not see it.
        let child = Format::new()
            .raw_array("pad", Count::func(|s| if s.contains("seen") { 1 } else { 0 }), Color::Gray)
            .scalar(x, "b", Color::White, Some("seen"));
        let f = Format::new().array(Some("R"), 3, &child);
        assert_eq!(
            spans(&f),
            vec![
                ("R > b".to_string(), 0, 0),
                ("R > b".to_string(), 1, 1),
                ("R > b".to_string(), 2, 2),
            ]
        );
    }

    #[test]
    fn caller_scope_seeds_counts() {
        let mut scope = Scope::new();
        scope.set("len", Value::U32(4));
        let f = Format::new().raw_array("blob", "len", Color::Blue);
        let mut lin = Linearizer::with_scope(&f, Counting, 0, scope).expect("balanced");
        let span = lin.next_span().expect("ok").expect("span");
        assert_eq!((span.from, span.to, span.color), (0, 3, Color::Blue));
        assert!(lin.next_span().expect("ok").is_none());
        assert!(lin.is_done());
    }

    #[test]
    fn source_is_handed_back_after_the_walk() {
        let f = Format::new().uint16le("w", Color::White);
        let mut lin = Linearizer::new(&f, vec![1u8, 2], 0).expect("balanced");
        assert_eq!(lin.next_span().expect("ok").map(|s| s.size()), Some(2));
        assert_eq!(lin.scope().depth(), 1);
        assert_eq!(lin.into_source(), vec![1, 2]);
    }

    #[test]
    fn sequence_of_empty_child_ends() {
        let f = Format::new().sequence(Some("S"), &Format::new()).uint8("tail", Color::White);
        assert_eq!(spans(&f), vec![("tail".to_string(), 0, 0)]);
    }

    #[test]
    fn read_failure_ends_the_sequence() {
        let data = vec![0u8; 3];
        let item = Format::new().uint16("w", Color::White);
        let f = Format::new().sequence(None, &item);
        let mut lin = Linearizer::new(&f, &data, 0).expect("balanced");
        assert_eq!(lin.next_span().expect("ok").map(|s| s.to), Some(1));
        assert!(matches!(lin.next_span(), Err(FormatError::Io(_))));
        assert!(lin.next().is_none());
    }

    #[test]
    fn offset_overflow_is_reported() {
        let f = Format::new().raw_array("huge", Count::Const(u64::MAX), Color::White).uint8("x", Color::White);
        let mut lin = Linearizer::new(&f, Counting, 2).expect("balanced");
        assert!(matches!(lin.next_span(), Err(FormatError::OffsetOverflow { .. })));
    }
}
