//! Description language tests: syntax (parse success/failure) and semantics
//! (resolution, registry loading, the bundled format files).

use hexlayout::ast::{CountSpec, Item, RepeatSpec};
use hexlayout::{
    parse, Color, FormatError, FormatRegistry, Linearizer, NamedBytes, ResolvedFormats, Span,
};

const LUKS: &str = include_str!("../formats/luks.hfmt");
const MIFARE: &str = include_str!("../formats/mifare.hfmt");
const STRINGS: &str = include_str!("../formats/strings.hfmt");

fn registry() -> FormatRegistry {
    let mut reg = FormatRegistry::new();
    for src in [LUKS, MIFARE, STRINGS] {
        reg.load_source(src).expect("bundled formats load");
    }
    reg
}

fn spans_of(reg: &FormatRegistry, name: &str, data: Vec<u8>) -> Vec<Span> {
    let format = reg.get(name).expect("registered");
    Linearizer::new(format, data, 0)
        .expect("balanced")
        .collect::<Result<Vec<_>, _>>()
        .expect("linearize")
}

// ==================== Syntax: valid programs ====================

#[test]
fn parse_empty_file() {
    let file = parse("").expect("empty file parses");
    assert!(file.formats.is_empty());
    let file = parse("// only a comment\n/* and a block */").expect("comments only");
    assert!(file.formats.is_empty());
}

#[test]
fn parse_minimal_format() {
    let file = parse(r#"format f { u8 "x"; }"#).expect("parse");
    assert_eq!(file.formats.len(), 1);
    assert_eq!(file.formats[0].name, "f");
    match &file.formats[0].items[0] {
        Item::Scalar { name, color, bind, .. } => {
            assert_eq!(name, "x");
            assert_eq!(*color, Color::White);
            assert!(bind.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_all_scalar_keywords() {
    let mut src = String::from("format all {\n");
    for base in ["u16", "i16", "u32", "i32", "u64", "i64", "f32", "f64"] {
        for suffix in ["", "le", "be"] {
            src.push_str(&format!("  {}{} \"{}{}\";\n", base, suffix, base, suffix));
        }
    }
    src.push_str("  u8 \"u8\";\n  i8 \"i8\";\n}\n");
    let file = parse(&src).expect("parse");
    assert_eq!(file.formats[0].items.len(), 26);
}

#[test]
fn parse_every_color() {
    let src = r#"format c {
        u8 "a" white; u8 "b" gray; u8 "c" blue; u8 "d" red;
        u8 "e" pink; u8 "f" green; u8 "g" purple; u8 "h" orange;
    }"#;
    let file = parse(src).expect("parse");
    let colors: Vec<Color> = file.formats[0]
        .items
        .iter()
        .map(|i| match i {
            Item::Scalar { color, .. } => *color,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(colors, Color::ALL.to_vec());
}

#[test]
fn parse_embed_forms() {
    let src = r#"
format inner { u8 "x"; }
format outer {
    child inner;
    child "Named" inner;
    array 4 inner;
    array "Counted" n inner;
    sequence "Rest" inner;
}
"#;
    let file = parse(src).expect("parse");
    let embeds: Vec<(Option<String>, RepeatSpec)> = file.formats[1]
        .items
        .iter()
        .map(|i| match i {
            Item::Embed { name, repeat, format } => {
                assert_eq!(format, "inner");
                (name.clone(), repeat.clone())
            }
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(
        embeds,
        vec![
            (None, RepeatSpec::Once),
            (Some("Named".to_string()), RepeatSpec::Once),
            (None, RepeatSpec::Times(CountSpec::Const(4))),
            (
                Some("Counted".to_string()),
                RepeatSpec::Times(CountSpec::Var("n".to_string()))
            ),
            (Some("Rest".to_string()), RepeatSpec::Unbounded),
        ]
    );
}

#[test]
fn parse_extension_and_magic_in_any_order() {
    let file = parse(r#"format f magic 0xcafe extension "bin" { }"#).expect("parse");
    assert_eq!(file.formats[0].extension.as_deref(), Some("bin"));
    assert_eq!(file.formats[0].magic.as_deref(), Some(&[0xca, 0xfe][..]));
}

// ==================== Syntax: invalid programs ====================

#[test]
fn parse_rejects_unknown_color() {
    assert!(parse(r#"format f { u8 "x" cyan; }"#).is_err());
}

#[test]
fn parse_rejects_unknown_type() {
    assert!(parse(r#"format f { u24 "x"; }"#).is_err());
    assert!(parse(r#"format f { f16 "x"; }"#).is_err());
}

#[test]
fn parse_rejects_missing_semicolon() {
    assert!(parse(r#"format f { u8 "x" }"#).is_err());
}

#[test]
fn parse_rejects_unnamed_group() {
    assert!(parse(r#"format f { group { u8 "x"; } }"#).is_err());
}

#[test]
fn parse_rejects_empty_magic() {
    assert!(parse(r#"format f magic "" { }"#).is_err());
}

// ==================== Semantics: resolution ====================

#[test]
fn resolve_rejects_forward_and_unknown_references() {
    let file = parse("format a { child b; } format b { u8 \"x\"; }").expect("parse");
    let err = ResolvedFormats::resolve(file, |_| None).expect_err("forward reference");
    assert!(err.contains("Unknown format reference: b"), "{}", err);
}

#[test]
fn resolve_rejects_duplicate_names() {
    let file = parse("format a { } format a { }").expect("parse");
    let err = ResolvedFormats::resolve(file, |_| None).expect_err("duplicate");
    assert!(err.contains("Duplicate"), "{}", err);
}

fn linearize_def(src: &str, name: &str, data: Vec<u8>) -> Vec<Span> {
    let resolved = ResolvedFormats::resolve(parse(src).expect("parse"), |_| None).expect("resolve");
    let format = resolved.get(name).expect("defined");
    Linearizer::new(format, data, 0)
        .expect("balanced")
        .collect::<Result<_, _>>()
        .expect("linearize")
}

#[test]
fn resolve_builds_groups_and_bindings() {
    let src = r#"
format rec {
    u16le "Count" blue as n;
    group "Header" {
        u8 "Kind" red;
    }
    bytes "Body" n green;
}
"#;
    assert_eq!(
        linearize_def(src, "rec", vec![3u8, 0, 7, 9, 9, 9]),
        vec![
            Span::new("Count", Color::Blue, 0, 1),
            Span::new("Header > Kind", Color::Red, 2, 2),
            Span::new("Body", Color::Green, 3, 5),
        ]
    );
}

#[test]
fn group_bindings_end_with_the_group() {
    let src = r#"
format rec {
    group "Header" {
        u16le "Count" blue as n;
        bytes "Inside" n pink;
    }
    bytes "Body" n green;
}
"#;
    assert_eq!(
        linearize_def(src, "rec", vec![3u8, 0, 9, 9, 9, 9]),
        vec![
            Span::new("Header > Count", Color::Blue, 0, 1),
            Span::new("Header > Inside", Color::Pink, 2, 4),
        ]
    );
}

#[test]
fn load_source_errors_map_to_format_errors() {
    let mut reg = FormatRegistry::new();
    assert!(matches!(
        reg.load_source("format a { child missing; }"),
        Err(FormatError::Parse(_))
    ));
    assert!(matches!(reg.load_source("format"), Err(FormatError::Parse(_))));
    assert_eq!(reg.names().count(), 1);
}

// ==================== Bundled formats ====================

#[test]
fn bundled_formats_register() {
    let reg = registry();
    let names: Vec<&str> = reg.names().collect();
    assert_eq!(
        names,
        vec![
            "none",
            "luks_key_slot",
            "luks",
            "mifare_data_block",
            "mifare_trailer",
            "mifare_sector",
            "mifare_1k",
            "string_entry",
            "strings",
        ]
    );
}

#[test]
fn luks_header_layout() {
    let reg = registry();
    let mut data = b"LUKS\xba\xbe".to_vec();
    data.resize(592, 0);
    assert_eq!(reg.guess(&data), "luks");

    let spans = spans_of(&reg, "luks", data);
    assert_eq!(spans.len(), 11 + 8 * 5);
    assert_eq!(spans[0], Span::new("Magic", Color::Red, 0, 5));
    assert_eq!(spans[10], Span::new("UUID", Color::Red, 168, 207));
    assert_eq!(spans[11], Span::new("Key slot #0 > State", Color::Green, 208, 211));
    assert_eq!(
        spans.last(),
        Some(&Span::new(
            "Key slot #7 > Number of anti-forensic stripes",
            Color::Gray,
            588,
            591
        ))
    );
    assert!(spans.windows(2).all(|w| w[0].to + 1 == w[1].from));
    let slots: Vec<&str> = spans
        .iter()
        .filter(|s| s.name.ends_with("> State"))
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(slots.len(), 8);
    assert_eq!(slots[3], "Key slot #3 > State");
}

#[test]
fn mifare_dump_layout() {
    let reg = registry();
    let src = NamedBytes::new("card.mfd", vec![0u8; 1024]);
    assert_eq!(reg.guess(&src), "mifare_1k");

    let spans = spans_of(&reg, "mifare_1k", vec![0u8; 1024]);
    assert_eq!(spans.len(), 7 + 15 * 7);
    assert_eq!(
        spans[0],
        Span::new("Sector #0 > Block #0 > UID", Color::Red, 0, 3)
    );
    assert_eq!(spans[3].name, "Sector #0 > Trailer > Key A");
    assert_eq!(spans[7], Span::new("Sector #1 > Block > Data", Color::White, 64, 79));
    assert_eq!(
        spans.last(),
        Some(&Span::new("Sector #15 > Trailer > Key B", Color::Orange, 1018, 1023))
    );
}

#[test]
fn strings_run_until_the_data_ends() {
    let reg = registry();
    let src = NamedBytes::new("words.str", vec![2, b'h', b'i', 0, 3, b'a', b'b', b'c']);
    assert_eq!(reg.guess(&src), "strings");

    let mut cache = reg.activate("strings", src).expect("activate");
    let mut spans = Vec::new();
    let err = loop {
        match cache.next() {
            Ok(Some(span)) => spans.push(span.clone()),
            Ok(None) => panic!("a sequence only ends on a failed read"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, FormatError::Io(_)));
    assert_eq!(
        spans,
        vec![
            Span::new("Entry > Length", Color::Red, 0, 0),
            Span::new("Entry > String", Color::Green, 1, 2),
            Span::new("Entry > Length", Color::Red, 3, 3),
            Span::new("Entry > Length", Color::Red, 4, 4),
            Span::new("Entry > String", Color::Green, 5, 7),
        ]
    );
}
