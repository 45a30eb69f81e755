//! Chained variable environment for data-dependent layouts.
//!
//! A [`Scope`] is a stack of frames. Lookups walk from the innermost frame out
//! to the root; writes only touch the innermost frame. Popping a frame drops
//! everything bound in it, so bindings never leak to the parent, to later
//! siblings or to the next repetition of the same composite.

use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<HashMap<String, Value>>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope {
            frames: vec![HashMap::new()],
        }
    }
}

impl Scope {
    /// A fresh scope with only the root frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames, root included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Discard the innermost frame. The root frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Innermost binding of `name`, if any frame has one.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames.iter().rev().find_map(|f| f.get(name).copied())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind `name` in the innermost frame, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Convenience for count closures: `name` coerced to a count, 0 if unbound.
    pub fn count(&self, name: &str) -> u64 {
        self.get(name).map_or(0, |v| v.as_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_frames_read_through_and_shadow() {
        let mut s = Scope::new();
        s.set("x", Value::U8(1));
        s.push();
        assert_eq!(s.get("x"), Some(Value::U8(1)));
        s.set("x", Value::U32(7));
        s.set("y", Value::U8(2));
        assert_eq!(s.get("x"), Some(Value::U32(7)));
        s.pop();
        assert_eq!(s.get("x"), Some(Value::U8(1)));
        assert!(!s.contains("y"));
    }

    #[test]
    fn sibling_frames_do_not_see_each_other() {
        let mut s = Scope::new();
        s.push();
        s.set("a", Value::U8(9));
        s.pop();
        s.push();
        assert_eq!(s.get("a"), None);
        assert_eq!(s.count("a"), 0);
    }

    #[test]
    fn root_frame_survives_extra_pops() {
        let mut s = Scope::new();
        s.set("k", Value::I16(-4));
        s.pop();
        s.pop();
        assert_eq!(s.depth(), 1);
        assert_eq!(s.get("k"), Some(Value::I16(-4)));
        assert_eq!(s.count("k"), 0);
    }
}
