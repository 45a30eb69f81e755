//! Abstract syntax tree for the format description language, and its resolution
//! into [`Format`] descriptors.

use crate::format::{Color, Count, Format, ScalarType};
use crate::registry::Guess;
use std::collections::HashMap;

/// A parsed description file: format definitions in source order.
#[derive(Debug, Clone)]
pub struct FormatFile {
    pub formats: Vec<FormatDef>,
}

#[derive(Debug, Clone)]
pub struct FormatDef {
    pub name: String,
    pub extension: Option<String>,
    pub magic: Option<Vec<u8>>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone)]
pub enum Item {
    Scalar {
        ty: ScalarType,
        name: String,
        color: Color,
        bind: Option<String>,
    },
    Bytes {
        name: String,
        count: CountSpec,
        color: Color,
    },
    /// `child`, `array` and `sequence` all embed another format.
    Embed {
        name: Option<String>,
        repeat: RepeatSpec,
        format: String,
    },
    Group {
        name: String,
        items: Vec<Item>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountSpec {
    Const(u64),
    Var(String),
}

impl From<&CountSpec> for Count {
    fn from(spec: &CountSpec) -> Self {
        match spec {
            CountSpec::Const(n) => Count::Const(*n),
            CountSpec::Var(v) => Count::Var(v.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepeatSpec {
    Once,
    Times(CountSpec),
    Unbounded,
}

/// Description file with every embedded reference turned into a [`Format`].
#[derive(Debug, Clone)]
pub struct ResolvedFormats {
    pub formats: Vec<(String, Guess, Format)>,
    by_name: HashMap<String, usize>,
}

impl ResolvedFormats {
    /// Build descriptors in source order. A reference must name a format
    /// defined earlier in the file, or one `known` can supply.
    pub fn resolve<F>(file: FormatFile, known: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<Format>,
    {
        let mut formats: Vec<(String, Guess, Format)> = Vec::new();
        let mut by_name = HashMap::new();
        for def in file.formats {
            if by_name.contains_key(&def.name) {
                return Err(format!("Duplicate format name: {}", def.name));
            }
            let lookup = |name: &str| {
                by_name
                    .get(name)
                    .map(|&i: &usize| formats[i].2.clone())
                    .or_else(|| known(name))
            };
            let format = build_items(Format::new(), &def.items, &lookup)
                .map_err(|e| format!("format {}: {}", def.name, e))?;
            let guess = Guess {
                extension: def.extension,
                magic: def.magic,
            };
            by_name.insert(def.name.clone(), formats.len());
            formats.push((def.name, guess, format));
        }
        Ok(ResolvedFormats { formats, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Format> {
        self.by_name.get(name).map(|&i| &self.formats[i].2)
    }
}

fn build_items(
    mut format: Format,
    items: &[Item],
    lookup: &dyn Fn(&str) -> Option<Format>,
) -> Result<Format, String> {
    for item in items {
        format = match item {
            Item::Scalar {
                ty,
                name,
                color,
                bind,
            } => format.scalar(*ty, name.as_str(), *color, bind.as_deref()),
            Item::Bytes { name, count, color } => {
                format.raw_array(name.as_str(), Count::from(count), *color)
            }
            Item::Embed {
                name,
                repeat,
                format: target,
            } => {
                let child =
                    lookup(target).ok_or_else(|| format!("Unknown format reference: {}", target))?;
                let name = name.as_deref();
                match repeat {
                    RepeatSpec::Once => format.child(name, &child),
                    RepeatSpec::Times(count) => format.array(name, Count::from(count), &child),
                    RepeatSpec::Unbounded => format.sequence(name, &child),
                }
            }
            Item::Group { name, items } => {
                let opened = format.group(name.as_str());
                build_items(opened, items, lookup)?
                    .endgroup()
                    .map_err(|e| e.to_string())?
            }
        };
    }
    Ok(format)
}
