//! Format descriptors: the declarative tree built with the fluent [`Format`] API.
//!
//! A descriptor holds no I/O state. It is pure data plus closures for
//! data-dependent counts, cheap to clone and safe to share between
//! linearizations running against different byte sources.

use crate::scope::Scope;
use crate::value::Value;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Joins group/child names onto descendant span names.
pub const SEPARATOR: &str = " > ";

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Structural: {0}")]
    Structural(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Offset overflow: {length} bytes at offset {offset}")]
    OffsetOverflow { offset: u64, length: u64 },
    #[error("Duplicate format name: {0}")]
    DuplicateFormat(String),
    #[error("Unknown format: {0}")]
    UnknownFormat(String),
    #[error("Parse: {0}")]
    Parse(String),
}

/// Display palette for spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    White,
    Gray,
    Blue,
    Red,
    Pink,
    Green,
    Purple,
    Orange,
}

impl Color {
    pub const ALL: [Color; 8] = [
        Color::White,
        Color::Gray,
        Color::Blue,
        Color::Red,
        Color::Pink,
        Color::Green,
        Color::Purple,
        Color::Orange,
    ];

    /// Palette index used by the renderer.
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Gray => "gray",
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Pink => "pink",
            Color::Green => "green",
            Color::Purple => "purple",
            Color::Orange => "orange",
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("Unknown color: {}", s))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
}

impl BaseType {
    pub fn width(self) -> u64 {
        match self {
            BaseType::U8 | BaseType::I8 => 1,
            BaseType::U16 | BaseType::I16 => 2,
            BaseType::U32 | BaseType::I32 | BaseType::Float => 4,
            BaseType::U64 | BaseType::I64 | BaseType::Double => 8,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            BaseType::U8 => "u8",
            BaseType::U16 => "u16",
            BaseType::U32 => "u32",
            BaseType::U64 => "u64",
            BaseType::I8 => "i8",
            BaseType::I16 => "i16",
            BaseType::I32 => "i32",
            BaseType::I64 => "i64",
            BaseType::Float => "f32",
            BaseType::Double => "f64",
        }
    }
}

/// Width, signedness and byte order of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarType {
    pub base: BaseType,
    pub endianness: Endianness,
}

impl ScalarType {
    pub const fn new(base: BaseType, endianness: Endianness) -> Self {
        ScalarType { base, endianness }
    }

    pub fn width(&self) -> u64 {
        self.base.width()
    }

    /// Parse a width keyword: `u8`, `i16le`, `u32be`, `f64`, ... Suffix-less
    /// multi-byte keywords are big-endian.
    pub fn from_keyword(s: &str) -> Option<Self> {
        let (stem, endianness) = if let Some(stem) = s.strip_suffix("le") {
            (stem, Some(Endianness::Little))
        } else if let Some(stem) = s.strip_suffix("be") {
            (stem, Some(Endianness::Big))
        } else {
            (s, None)
        };
        let base = [
            BaseType::U8,
            BaseType::U16,
            BaseType::U32,
            BaseType::U64,
            BaseType::I8,
            BaseType::I16,
            BaseType::I32,
            BaseType::I64,
            BaseType::Float,
            BaseType::Double,
        ]
        .into_iter()
        .find(|b| b.keyword() == stem)?;
        // Byte order is meaningless for single bytes.
        if base.width() == 1 && endianness.is_some() {
            return None;
        }
        Some(ScalarType::new(base, endianness.unwrap_or(Endianness::Big)))
    }

    /// Decode `buf`, which must hold exactly [`width`](Self::width) bytes.
    pub fn decode(&self, buf: &[u8]) -> Value {
        macro_rules! read {
            ($m:ident) => {
                match self.endianness {
                    Endianness::Big => BigEndian::$m(buf),
                    Endianness::Little => LittleEndian::$m(buf),
                }
            };
        }
        match self.base {
            BaseType::U8 => Value::U8(buf[0]),
            BaseType::I8 => Value::I8(buf[0] as i8),
            BaseType::U16 => Value::U16(read!(read_u16)),
            BaseType::I16 => Value::I16(read!(read_i16)),
            BaseType::U32 => Value::U32(read!(read_u32)),
            BaseType::I32 => Value::I32(read!(read_i32)),
            BaseType::U64 => Value::U64(read!(read_u64)),
            BaseType::I64 => Value::I64(read!(read_i64)),
            BaseType::Float => Value::Float(read!(read_f32)),
            BaseType::Double => Value::Double(read!(read_f64)),
        }
    }
}

/// How many bytes (raw arrays) or repetitions (composites) to produce.
#[derive(Clone)]
pub enum Count {
    Const(u64),
    /// Looked up in the current scope; unbound counts as 0.
    Var(String),
    Func(Arc<dyn Fn(&Scope) -> i64 + Send + Sync>),
}

impl Count {
    pub fn var(name: impl Into<String>) -> Self {
        Count::Var(name.into())
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Scope) -> i64 + Send + Sync + 'static,
    {
        Count::Func(Arc::new(f))
    }

    /// Resolve against `scope`. Non-positive results are 0.
    pub fn resolve(&self, scope: &Scope) -> u64 {
        match self {
            Count::Const(n) => *n,
            Count::Var(name) => match scope.get(name) {
                Some(v) => v.as_count(),
                None => {
                    tracing::debug!(variable = %name, "Unbound count variable, using 0");
                    0
                }
            },
            Count::Func(f) => f(scope).max(0) as u64,
        }
    }
}

impl fmt::Debug for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::Const(n) => write!(f, "Const({})", n),
            Count::Var(name) => write!(f, "Var({:?})", name),
            Count::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<u64> for Count {
    fn from(n: u64) -> Self {
        Count::Const(n)
    }
}

impl From<u32> for Count {
    fn from(n: u32) -> Self {
        Count::Const(n as u64)
    }
}

impl From<usize> for Count {
    fn from(n: usize) -> Self {
        Count::Const(n as u64)
    }
}

impl From<i32> for Count {
    fn from(n: i32) -> Self {
        Count::Const(n.max(0) as u64)
    }
}

impl From<&str> for Count {
    fn from(name: &str) -> Self {
        Count::Var(name.to_string())
    }
}

impl From<String> for Count {
    fn from(name: String) -> Self {
        Count::Var(name)
    }
}

#[derive(Debug, Clone)]
pub enum Repeat {
    Times(Count),
    Unbounded,
}

#[derive(Debug, Clone)]
pub struct Scalar {
    pub name: String,
    pub ty: ScalarType,
    pub color: Color,
    /// Scope variable receiving the decoded value.
    pub bind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawArray {
    pub name: String,
    pub count: Count,
    pub color: Color,
}

#[derive(Debug, Clone)]
pub struct Composite {
    /// Prefixed onto every span of the child when present.
    pub name: Option<String>,
    pub repeat: Repeat,
    pub child: Format,
}

#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    pub children: Vec<FormatNode>,
}

#[derive(Debug, Clone)]
pub enum FormatNode {
    Scalar(Scalar),
    RawArray(RawArray),
    Composite(Composite),
    Group(Arc<Group>),
}

/// A named, colored, closed byte range `[from, to]` at absolute file offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub name: String,
    pub color: Color,
    pub from: u64,
    pub to: u64,
}

impl Span {
    pub fn new(name: impl Into<String>, color: Color, from: u64, to: u64) -> Self {
        Span {
            name: name.into(),
            color,
            from,
            to,
        }
    }

    pub fn size(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.from <= offset && offset <= self.to
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}] {} ({})", self.from, self.to, self.name, self.color)
    }
}

/// Join `name` onto `prefix` with [`SEPARATOR`], skipping empty segments.
pub fn join_name(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}{}{}", prefix, SEPARATOR, name),
    }
}

macro_rules! scalar_shortcuts {
    ($($method:ident => $base:ident, $endian:ident;)*) => {
        $(
            #[doc = concat!("Append a `", stringify!($method), "` field.")]
            pub fn $method(self, name: impl Into<String>, color: Color) -> Self {
                self.scalar(ScalarType::new(BaseType::$base, Endianness::$endian), name, color, None)
            }
        )*
    };
}

/// Fluent builder and the descriptor it produces.
///
/// Every call appends to the innermost open group and hands the builder back,
/// so chains read in file order:
///
/// ```
/// use hexlayout::{Color, Count, Format};
///
/// let entry = Format::new()
///     .scalar(hexlayout::ScalarType::from_keyword("u8").unwrap(), "Length", Color::Red, Some("len"))
///     .raw_array("String", Count::var("len"), Color::Green);
/// let file = Format::new().sequence(Some("Entry"), &entry);
/// assert!(file.check().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Format {
    root: Arc<Group>,
    open: Vec<Group>,
}

impl Format {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level nodes. Nodes inside still-open groups are not included.
    pub fn nodes(&self) -> &[FormatNode] {
        &self.root.children
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.open.is_empty()
    }

    pub(crate) fn root(&self) -> &Arc<Group> {
        &self.root
    }

    fn push(mut self, node: FormatNode) -> Self {
        match self.open.last_mut() {
            Some(g) => g.children.push(node),
            None => Arc::make_mut(&mut self.root).children.push(node),
        }
        self
    }

    /// Append a fixed-width field. When `bind` is set, the decoded value is
    /// stored in the current scope under that name.
    pub fn scalar(
        self,
        ty: ScalarType,
        name: impl Into<String>,
        color: Color,
        bind: Option<&str>,
    ) -> Self {
        self.push(FormatNode::Scalar(Scalar {
            name: name.into(),
            ty,
            color,
            bind: bind.map(str::to_string),
        }))
    }

    scalar_shortcuts! {
        uint8 => U8, Big;
        int8 => I8, Big;
        uint16 => U16, Big;
        uint16le => U16, Little;
        uint16be => U16, Big;
        int16 => I16, Big;
        int16le => I16, Little;
        int16be => I16, Big;
        uint32 => U32, Big;
        uint32le => U32, Little;
        uint32be => U32, Big;
        int32 => I32, Big;
        int32le => I32, Little;
        int32be => I32, Big;
        uint64 => U64, Big;
        uint64le => U64, Little;
        uint64be => U64, Big;
        int64 => I64, Big;
        int64le => I64, Little;
        int64be => I64, Big;
        float32 => Float, Big;
        float32le => Float, Little;
        float32be => Float, Big;
        float64 => Double, Big;
        float64le => Double, Little;
        float64be => Double, Big;
    }

    /// Append a run of raw bytes. A count resolving to 0 produces no span.
    pub fn raw_array(self, name: impl Into<String>, count: impl Into<Count>, color: Color) -> Self {
        self.push(FormatNode::RawArray(RawArray {
            name: name.into(),
            count: count.into(),
            color,
        }))
    }

    /// Embed `child` once.
    pub fn child(self, name: Option<&str>, child: &Format) -> Self {
        self.array(name, Count::Const(1), child)
    }

    /// Embed `child` repeated `count` times, each repetition in its own scope frame.
    pub fn array(self, name: Option<&str>, count: impl Into<Count>, child: &Format) -> Self {
        self.composite(name, Repeat::Times(count.into()), child)
    }

    /// Embed `child` repeated without bound.
    pub fn sequence(self, name: Option<&str>, child: &Format) -> Self {
        self.composite(name, Repeat::Unbounded, child)
    }

    fn composite(self, name: Option<&str>, repeat: Repeat, child: &Format) -> Self {
        self.push(FormatNode::Composite(Composite {
            name: name.map(str::to_string),
            repeat,
            child: child.clone(),
        }))
    }

    /// Open a naming scope; close it with [`endgroup`](Self::endgroup).
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.open.push(Group {
            name: name.into(),
            children: Vec::new(),
        });
        self
    }

    pub fn endgroup(mut self) -> Result<Self, FormatError> {
        let group = self
            .open
            .pop()
            .ok_or_else(|| FormatError::Structural("endgroup without a matching group".to_string()))?;
        Ok(self.push(FormatNode::Group(Arc::new(group))))
    }

    /// Fails if this descriptor, or any descriptor embedded in it, still has an
    /// open group.
    pub fn check(&self) -> Result<(), FormatError> {
        if let Some(g) = self.open.last() {
            return Err(FormatError::Structural(format!(
                "group \"{}\" is never closed",
                g.name
            )));
        }
        check_nodes(&self.root.children)
    }
}

fn check_nodes(nodes: &[FormatNode]) -> Result<(), FormatError> {
    for node in nodes {
        match node {
            FormatNode::Composite(c) => c.child.check()?,
            FormatNode::Group(g) => check_nodes(&g.children)?,
            FormatNode::Scalar(_) | FormatNode::RawArray(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_keywords() {
        assert_eq!(ScalarType::from_keyword("u8").map(|t| t.width()), Some(1));
        assert_eq!(
            ScalarType::from_keyword("i16le"),
            Some(ScalarType::new(BaseType::I16, Endianness::Little))
        );
        assert_eq!(
            ScalarType::from_keyword("u32"),
            Some(ScalarType::new(BaseType::U32, Endianness::Big))
        );
        assert_eq!(ScalarType::from_keyword("f64be").map(|t| t.width()), Some(8));
        assert_eq!(ScalarType::from_keyword("u8le"), None);
        assert_eq!(ScalarType::from_keyword("u24"), None);
    }

    #[test]
    fn decode_respects_byte_order() {
        let le = ScalarType::new(BaseType::U16, Endianness::Little);
        let be = ScalarType::new(BaseType::U16, Endianness::Big);
        assert_eq!(le.decode(&[0, 1]), Value::U16(0x0100));
        assert_eq!(be.decode(&[0, 1]), Value::U16(0x0001));
        let i8t = ScalarType::new(BaseType::I8, Endianness::Big);
        assert_eq!(i8t.decode(&[0xff]), Value::I8(-1));
        let f = ScalarType::new(BaseType::Float, Endianness::Little);
        assert_eq!(f.decode(&1.5f32.to_le_bytes()), Value::Float(1.5));
    }

    #[test]
    fn names_skip_empty_segments() {
        assert_eq!(join_name("", "a"), "a");
        assert_eq!(join_name("G", ""), "G");
        assert_eq!(join_name("G1 > G2", "F"), "G1 > G2 > F");
    }

    #[test]
    fn span_bounds_are_inclusive() {
        let s = Span::new("x", Color::White, 4, 7);
        assert_eq!(s.size(), 4);
        assert!(s.contains(4) && s.contains(7));
        assert!(!s.contains(3) && !s.contains(8));
    }

    #[test]
    fn colors_parse_by_name() {
        assert_eq!("orange".parse::<Color>(), Ok(Color::Orange));
        assert_eq!(Color::Orange.index(), 7);
        assert!("teal".parse::<Color>().is_err());
    }

    #[test]
    fn unbalanced_endgroup_is_structural() {
        let r = Format::new().group("1").endgroup().and_then(|f| f.endgroup());
        assert!(matches!(r, Err(FormatError::Structural(_))));
    }

    #[test]
    fn open_group_fails_check_even_when_embedded() {
        let open = Format::new().group("1").group("2").endgroup().expect("balanced so far");
        assert!(matches!(open.check(), Err(FormatError::Structural(_))));
        let outer = Format::new().child(Some("inner"), &open);
        assert!(matches!(outer.check(), Err(FormatError::Structural(_))));
    }

    #[test]
    fn builder_appends_into_innermost_group() {
        let f = Format::new()
            .group("G")
            .uint8("a", Color::White)
            .endgroup()
            .expect("balanced")
            .uint8("b", Color::White);
        assert_eq!(f.nodes().len(), 2);
        match &f.nodes()[0] {
            FormatNode::Group(g) => assert_eq!(g.children.len(), 1),
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn count_resolution() {
        let mut scope = Scope::new();
        scope.set("n", Value::U8(4));
        assert_eq!(Count::from(17).resolve(&scope), 17);
        assert_eq!(Count::var("n").resolve(&scope), 4);
        assert_eq!(Count::var("missing").resolve(&scope), 0);
        assert_eq!(Count::func(|s| s.count("n") as i64 * 2).resolve(&scope), 8);
        assert_eq!(Count::func(|_| -5).resolve(&scope), 0);
    }
}
