//! # hexlayout: binary layout descriptions and incremental linearization
//!
//! Describe the byte layout of a binary file declaratively (fixed-width fields,
//! raw byte runs whose length depends on earlier fields, nested and repeated
//! sub-formats, unbounded sequences), then lazily turn that description into an
//! ordered list of labeled byte ranges ([`Span`]s) for display and navigation.
//!
//! ## Pieces
//!
//! - [`Format`]: fluent builder for format descriptors (no I/O).
//! - [`Linearizer`]: resumable depth-first walk of a descriptor against a
//!   [`ByteSource`], producing spans with absolute offsets.
//! - [`FormatCache`]: materializes spans once, seeks by offset through an
//!   [`IntervalIndex`], records which bytes it read and invalidates itself only
//!   when those bytes change.
//! - [`Scope`]: chained variable environment carrying values read from the file
//!   to later length/count expressions.
//! - [`FormatRegistry`]: named formats plus magic/extension guessing.
//! - [`parse`]: a small text language (`.hfmt`) for descriptors.
//!
//! ## Example description
//!
//! ```text
//! format string_entry {
//!     u8 "Length" red as strlen;
//!     bytes "String" strlen green;
//! }
//!
//! format strings extension "str" {
//!     sequence "Entry" string_entry;
//! }
//! ```
//!
//! ## Usage
//!
//! ```
//! use hexlayout::{Color, Count, Format, FormatCache, ScalarType};
//!
//! let entry = Format::new()
//!     .scalar(ScalarType::from_keyword("u8").unwrap(), "Length", Color::Red, Some("n"))
//!     .raw_array("String", Count::var("n"), Color::Green);
//! let format = Format::new().sequence(Some("Entry"), &entry);
//!
//! let data = vec![2u8, b'h', b'i', 1, b'!'];
//! let mut cache = FormatCache::new(&format, data)?;
//! let span = cache.seek_to(4)?.unwrap();
//! assert_eq!((span.name.as_str(), span.from, span.to), ("Entry > String", 4, 4));
//! # Ok::<(), hexlayout::FormatError>(())
//! ```
//!
//! See `tests/integration.rs` and `tests/dsl.rs` for more.

pub mod ast;
pub mod cache;
pub mod dump;
pub mod format;
pub mod interval;
pub mod linearize;
pub mod parser;
pub mod registry;
pub mod scope;
pub mod source;
pub mod value;

pub use ast::{FormatFile, ResolvedFormats};
pub use cache::{FormatCache, TouchRecorder};
pub use format::{
    BaseType, Color, Count, Endianness, Format, FormatError, FormatNode, Repeat, ScalarType, Span,
    SEPARATOR,
};
pub use interval::IntervalIndex;
pub use linearize::Linearizer;
pub use parser::parse;
pub use registry::{FormatRegistry, Guess};
pub use scope::Scope;
pub use source::{ByteSource, FileSource, NamedBytes};
pub use value::Value;
