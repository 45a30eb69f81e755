//! Print the spans a format description produces for a file.
//!
//! Usage:
//!   dump_spans [OPTIONS] FILE [DESC.hfmt ...]
//!
//! The built-in formats (LUKS, Mifare Classic 1K, length-prefixed strings) are
//! always loaded; description files given on the command line are loaded after
//! them and may reference them.
//!
//! Options:
//!   --format=NAME   Use NAME instead of guessing from magic bytes / extension
//!   --seek=OFFSET   Start at the span covering OFFSET (decimal or 0x hex)
//!   --limit=N       Print at most N spans (default 256; sequences are unbounded)
//!   --hex, -x       Print a hex preview under each span
//!   --list          List registered formats and exit
//!
//! Logging goes to stderr and is controlled with RUST_LOG (e.g. RUST_LOG=hexlayout=trace).

use hexlayout::dump::write_span;
use hexlayout::{FileSource, FormatRegistry};
use std::io::Write;
use std::path::PathBuf;

const BUILTIN: [(&str, &str); 3] = [
    ("luks.hfmt", include_str!("../../formats/luks.hfmt")),
    ("mifare.hfmt", include_str!("../../formats/mifare.hfmt")),
    ("strings.hfmt", include_str!("../../formats/strings.hfmt")),
];

fn parse_offset(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn take_value(args: &mut Vec<String>, prefix: &str) -> Option<String> {
    let pos = args.iter().position(|a| a.starts_with(prefix))?;
    let arg = args.remove(pos);
    arg.strip_prefix(prefix).map(str::to_string)
}

fn take_flag(args: &mut Vec<String>, names: &[&str]) -> bool {
    match args.iter().position(|a| names.contains(&a.as_str())) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let hex = take_flag(&mut args, &["--hex", "-x"]);
    let list = take_flag(&mut args, &["--list"]);
    let format_name = take_value(&mut args, "--format=");
    let seek = match take_value(&mut args, "--seek=") {
        Some(s) => Some(parse_offset(&s).ok_or_else(|| anyhow::anyhow!("bad --seek offset: {}", s))?),
        None => None,
    };
    let limit: usize = match take_value(&mut args, "--limit=") {
        Some(s) => s.parse().map_err(|_| anyhow::anyhow!("bad --limit: {}", s))?,
        None => 256,
    };

    let mut registry = FormatRegistry::new();
    for (name, src) in BUILTIN {
        registry
            .load_source(src)
            .map_err(|e| anyhow::anyhow!("built-in {}: {}", name, e))?;
    }
    let mut args = args.into_iter();
    let file_path: Option<PathBuf> = args.next().map(PathBuf::from);
    for desc in args {
        let src = std::fs::read_to_string(&desc)?;
        let names = registry
            .load_source(&src)
            .map_err(|e| anyhow::anyhow!("{}: {}", desc, e))?;
        tracing::info!(file = %desc, formats = ?names, "Loaded format descriptions");
    }

    if list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let file_path = file_path.ok_or_else(|| anyhow::anyhow!("usage: dump_spans [OPTIONS] FILE [DESC.hfmt ...]"))?;
    let source = FileSource::open(&file_path)?;
    let name = match format_name {
        Some(n) => n,
        None => registry.guess(&source).to_string(),
    };
    eprintln!("{}: format {}", file_path.display(), name);

    let preview_source = if hex { Some(FileSource::open(&file_path)?) } else { None };
    let mut cache = registry.activate(&name, source)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut printed = 0usize;
    if let Some(offset) = seek {
        match cache.seek_to(offset)? {
            Some(span) => {
                write_span(&mut out, span, preview_source.as_ref())?;
                printed += 1;
            }
            None => {
                eprintln!("no span covers offset {:#x}", offset);
                return Ok(());
            }
        }
    }
    while printed < limit {
        match cache.next() {
            Ok(Some(span)) => write_span(&mut out, span, preview_source.as_ref())?,
            Ok(None) => break,
            // Unbounded sequences end on the first read past the data.
            Err(e) => {
                out.flush()?;
                eprintln!("stopped at {:#x}: {}", cache.materialized().last().map_or(0, |s| s.to + 1), e);
                break;
            }
        }
        printed += 1;
    }
    out.flush()?;
    if printed == limit && !cache.is_exhausted() {
        eprintln!("(stopped after {} spans; use --limit=N for more)", limit);
    }
    Ok(())
}
