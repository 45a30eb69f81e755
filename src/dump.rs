//! Text rendering of spans for dumps: offset range, color, name and an optional
//! hex preview of the covered bytes.

use crate::format::Span;
use crate::source::ByteSource;
use std::io::{self, Write};

/// Longest hex preview shown per span, in bytes.
pub const PREVIEW_BYTES: u64 = 16;

/// Space-separated lowercase hex.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One dump line: `0x00000000..0x00000005  red     Magic`.
pub fn span_line(span: &Span) -> String {
    format!(
        "{:#010x}..{:#010x}  {:<7} {}",
        span.from,
        span.to,
        span.color.name(),
        span.name
    )
}

/// First [`PREVIEW_BYTES`] bytes of `span`, with `...` when truncated. Read
/// failures render as `<unreadable>`.
pub fn preview<S: ByteSource + ?Sized>(source: &S, span: &Span) -> String {
    let n = span.size().min(PREVIEW_BYTES);
    match source.read(span.from, n) {
        Ok(bytes) if n < span.size() => format!("{} ...", hex_string(&bytes)),
        Ok(bytes) => hex_string(&bytes),
        Err(_) => "<unreadable>".to_string(),
    }
}

/// Write one line per span, with a preview line under each when `source` is given.
pub fn write_span<W: Write, S: ByteSource + ?Sized>(
    w: &mut W,
    span: &Span,
    source: Option<&S>,
) -> io::Result<()> {
    writeln!(w, "{}", span_line(span))?;
    if let Some(src) = source {
        writeln!(w, "    {}", preview(src, span))?;
    }
    Ok(())
}
