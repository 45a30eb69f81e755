//! Parse format description source into AST using PEST.

use crate::ast::*;
use crate::format::{Color, ScalarType};
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct FormatParser;

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse description source into AST.
pub fn parse(source: &str) -> Result<FormatFile, String> {
    let pairs = FormatParser::parse(Rule::file, source).map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    let mut formats = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::format_def {
            formats.push(build_format_def(inner)?);
        }
    }
    Ok(FormatFile { formats })
}

fn build_format_def(pair: Pair) -> Result<FormatDef, String> {
    let mut name = None;
    let mut extension = None;
    let mut magic = None;
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::extension_clause => {
                let s = inner.into_inner().find(|p| p.as_rule() == Rule::string).ok_or("extension: missing string")?;
                extension = Some(parse_string(s)?);
            }
            Rule::magic_clause => {
                let lit = inner
                    .into_inner()
                    .find(|p| matches!(p.as_rule(), Rule::hex | Rule::string))
                    .ok_or("magic: missing literal")?;
                let bytes = match lit.as_rule() {
                    Rule::hex => parse_hex_bytes(lit.as_str())?,
                    _ => parse_string_bytes(lit)?,
                };
                if bytes.is_empty() {
                    return Err("magic must not be empty".to_string());
                }
                magic = Some(bytes);
            }
            _ => {
                if let Some(item) = build_item(inner)? {
                    items.push(item);
                }
            }
        }
    }
    Ok(FormatDef {
        name: name.ok_or("format: missing name")?,
        extension,
        magic,
        items,
    })
}

/// `None` for keyword tokens and anything that is not an item.
fn build_item(pair: Pair) -> Result<Option<Item>, String> {
    let rule = pair.as_rule();
    let item = match rule {
        Rule::scalar_item => build_scalar(pair)?,
        Rule::bytes_item => build_bytes(pair)?,
        Rule::child_item | Rule::array_item | Rule::sequence_item => build_embed(pair)?,
        Rule::group_item => build_group(pair)?,
        _ => return Ok(None),
    };
    Ok(Some(item))
}

fn build_scalar(pair: Pair) -> Result<Item, String> {
    let mut ty = None;
    let mut name = None;
    let mut color = Color::default();
    let mut bind = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::scalar_type => {
                let kw = inner.as_str();
                ty = Some(
                    ScalarType::from_keyword(kw)
                        .ok_or_else(|| format!("Invalid scalar type: {}", kw))?,
                );
            }
            Rule::string => name = Some(parse_string(inner)?),
            Rule::color => color = inner.as_str().parse()?,
            Rule::bind => {
                let var = inner.into_inner().find(|p| p.as_rule() == Rule::ident).ok_or("as: missing name")?;
                bind = Some(var.as_str().to_string());
            }
            _ => {}
        }
    }
    Ok(Item::Scalar {
        ty: ty.ok_or("scalar: missing type")?,
        name: name.ok_or("scalar: missing name")?,
        color,
        bind,
    })
}

fn build_bytes(pair: Pair) -> Result<Item, String> {
    let mut name = None;
    let mut count = None;
    let mut color = Color::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => name = Some(parse_string(inner)?),
            Rule::count => count = Some(build_count(inner)?),
            Rule::color => color = inner.as_str().parse()?,
            _ => {}
        }
    }
    Ok(Item::Bytes {
        name: name.ok_or("bytes: missing name")?,
        count: count.ok_or("bytes: missing count")?,
        color,
    })
}

fn build_embed(pair: Pair) -> Result<Item, String> {
    let rule = pair.as_rule();
    let mut name = None;
    let mut count = None;
    let mut target = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => name = Some(parse_string(inner)?),
            Rule::count => count = Some(build_count(inner)?),
            Rule::ident => target = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    let repeat = match rule {
        Rule::array_item => RepeatSpec::Times(count.ok_or("array: missing count")?),
        Rule::sequence_item => RepeatSpec::Unbounded,
        _ => RepeatSpec::Once,
    };
    Ok(Item::Embed {
        name,
        repeat,
        format: target.ok_or("missing format reference")?,
    })
}

fn build_group(pair: Pair) -> Result<Item, String> {
    let mut name = None;
    let mut items = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string => name = Some(parse_string(inner)?),
            _ => {
                if let Some(item) = build_item(inner)? {
                    items.push(item);
                }
            }
        }
    }
    Ok(Item::Group {
        name: name.ok_or("group: missing name")?,
        items,
    })
}

fn build_count(pair: Pair) -> Result<CountSpec, String> {
    let inner = pair.into_inner().next().ok_or("Empty count")?;
    match inner.as_rule() {
        Rule::hex => {
            let digits = &inner.as_str()[2..];
            u64::from_str_radix(digits, 16)
                .map(CountSpec::Const)
                .map_err(|_| format!("Count out of range: {}", inner.as_str()))
        }
        Rule::int => inner
            .as_str()
            .parse::<u64>()
            .map(CountSpec::Const)
            .map_err(|_| format!("Count out of range: {}", inner.as_str())),
        Rule::ident => Ok(CountSpec::Var(inner.as_str().to_string())),
        other => Err(format!("unexpected count: {:?}", other)),
    }
}

fn parse_string(pair: Pair) -> Result<String, String> {
    Ok(String::from_utf8_lossy(&parse_string_bytes(pair)?).into_owned())
}

/// Unescape a string literal: `\\`, `\"`, `\n`, `\t`, `\0` and `\xNN`.
fn parse_string_bytes(pair: Pair) -> Result<Vec<u8>, String> {
    let raw = pair
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("");
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let b = u8::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 2)
                    .ok_or_else(|| format!("Invalid escape: \\x{}", hex))?;
                out.push(b);
            }
            Some(other) => return Err(format!("Invalid escape: \\{}", other)),
            None => return Err("Dangling backslash in string".to_string()),
        }
    }
    Ok(out)
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let hex = &s[2..];
    if hex.len() % 2 != 0 {
        return Err("Hex literal must have even length".to_string());
    }
    let mut bytes = Vec::new();
    for chunk in hex.as_bytes().chunks(2) {
        let s = std::str::from_utf8(chunk).map_err(|_| "Invalid hex")?;
        let b = u8::from_str_radix(s, 16).map_err(|_| "Invalid hex")?;
        bytes.push(b);
    }
    Ok(bytes)
}
