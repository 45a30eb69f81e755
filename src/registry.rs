//! Named formats and automatic format guessing.
//!
//! The registry is plain owned state: the host builds one, registers formats
//! (from code or description files) and asks it to guess or activate a format
//! for a byte source.

use crate::ast::ResolvedFormats;
use crate::cache::FormatCache;
use crate::format::{Format, FormatError};
use crate::parser::parse;
use crate::source::ByteSource;
use std::collections::HashMap;

/// Hints used to pick a format for a freshly opened file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Guess {
    /// File extension without the dot.
    pub extension: Option<String>,
    /// Bytes the file starts with.
    pub magic: Option<Vec<u8>>,
}

impl Guess {
    pub fn extension(ext: impl Into<String>) -> Self {
        Guess {
            extension: Some(ext.into()),
            magic: None,
        }
    }

    pub fn magic(bytes: impl Into<Vec<u8>>) -> Self {
        Guess {
            extension: None,
            magic: Some(bytes.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, Format>,
    order: Vec<String>,
    by_extension: HashMap<String, String>,
    by_magic: Vec<(Vec<u8>, String)>,
    max_magic_len: usize,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut formats = HashMap::new();
        formats.insert(Self::NONE.to_string(), Format::new());
        FormatRegistry {
            formats,
            order: vec![Self::NONE.to_string()],
            by_extension: HashMap::new(),
            by_magic: Vec::new(),
            max_magic_len: 0,
        }
    }
}

impl FormatRegistry {
    /// The always-present empty format, used when nothing else matches.
    pub const NONE: &'static str = "none";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register `format` under `name`. Names are unique and the format must be
    /// structurally complete.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        guess: Guess,
        format: Format,
    ) -> Result<(), FormatError> {
        let name = name.into();
        if self.formats.contains_key(&name) {
            return Err(FormatError::DuplicateFormat(name));
        }
        format.check()?;
        if let Some(ext) = guess.extension {
            self.by_extension.insert(ext, name.clone());
        }
        if let Some(magic) = guess.magic.filter(|m| !m.is_empty()) {
            self.max_magic_len = self.max_magic_len.max(magic.len());
            self.by_magic.push((magic, name.clone()));
        }
        self.order.push(name.clone());
        self.formats.insert(name, format);
        Ok(())
    }

    /// Parse a description file and register every format it defines. Returns
    /// the new names in definition order.
    pub fn load_source(&mut self, source: &str) -> Result<Vec<String>, FormatError> {
        let file = parse(source).map_err(FormatError::Parse)?;
        let resolved = ResolvedFormats::resolve(file, |name| self.formats.get(name).cloned())
            .map_err(FormatError::Parse)?;
        // Reject clashes before registering anything.
        if let Some((name, _, _)) = resolved
            .formats
            .iter()
            .find(|(name, _, _)| self.formats.contains_key(name))
        {
            return Err(FormatError::DuplicateFormat(name.clone()));
        }
        let mut names = Vec::with_capacity(resolved.formats.len());
        for (name, guess, format) in resolved.formats {
            self.register(name.clone(), guess, format)?;
            names.push(name);
        }
        Ok(names)
    }

    pub fn get(&self, name: &str) -> Option<&Format> {
        self.formats.get(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Pick a format for `source`: first by magic bytes (first registered
    /// match wins), then by file-name extension, else [`NONE`](Self::NONE).
    pub fn guess<S: ByteSource + ?Sized>(&self, source: &S) -> &str {
        if self.max_magic_len > 0 {
            // Files shorter than the longest magic can still match shorter ones.
            let mut lengths: Vec<usize> = self.by_magic.iter().map(|(m, _)| m.len()).collect();
            lengths.sort_unstable_by(|a, b| b.cmp(a));
            lengths.dedup();
            let head = lengths
                .into_iter()
                .find_map(|n| source.read(0, n as u64).ok());
            if let Some(head) = head {
                if let Some((_, name)) = self.by_magic.iter().find(|(m, _)| head.starts_with(m)) {
                    tracing::debug!(format = %name, "Guessing format for matching magic");
                    return name;
                }
            }
        }
        if let Some(name) = source.name() {
            if let Some(format) = extension_of(&name).and_then(|ext| self.by_extension.get(ext)) {
                tracing::debug!(format = %format, "Guessing format for matching extension");
                return format;
            }
        }
        Self::NONE
    }

    /// Start a [`FormatCache`] for the named format over `source`.
    pub fn activate<S: ByteSource>(&self, name: &str, source: S) -> Result<FormatCache<S>, FormatError> {
        let format = self
            .formats
            .get(name)
            .ok_or_else(|| FormatError::UnknownFormat(name.to_string()))?;
        FormatCache::new(format, source)
    }
}

/// Text after the last `.`, if it is a non-empty run of word characters.
fn extension_of(file_name: &str) -> Option<&str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(ext)
}
