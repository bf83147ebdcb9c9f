//! Decoded frame: the source bytes plus named values. Verified checksum values
//! come first, then every field in declaration order.

use crate::value::Value;

#[derive(Debug, Default, PartialEq)]
pub struct Frame {
    name: String,
    src: Vec<u8>,
    values: Vec<(String, Value)>,
    /// Set while the frame is handed out by a [`crate::pool::FramePool`].
    pub(crate) checked_out: bool,
}

impl Frame {
    pub fn new(name: impl Into<String>, src: &[u8]) -> Self {
        Frame { name: name.into(), src: src.to_vec(), values: Vec::new(), checked_out: false }
    }

    /// Refill for another decode, keeping allocations.
    pub(crate) fn reset(&mut self, name: &str, src: &[u8]) {
        self.name.clear();
        self.name.push_str(name);
        self.src.clear();
        self.src.extend_from_slice(src);
        self.values.clear();
    }

    pub(crate) fn push(&mut self, name: &str, value: Value) {
        self.values.push((name.to_string(), value));
    }

    /// Frame type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes the frame was decoded from.
    pub fn src(&self) -> &[u8] {
        &self.src
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == field).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_checked_out(&self) -> bool {
        self.checked_out
    }
}

/// A clone is a fresh value owned by the caller, never a pooled one.
impl Clone for Frame {
    fn clone(&self) -> Self {
        Frame {
            name: self.name.clone(),
            src: self.src.clone(),
            values: self.values.clone(),
            checked_out: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_values() {
        let mut f = Frame::new("A", &[1, 2]);
        f.push("x", Value::I8(1));
        assert_eq!(f.get("x"), Some(&Value::I8(1)));
        f.reset("B", &[3]);
        assert_eq!(f.name(), "B");
        assert_eq!(f.src(), &[3]);
        assert!(f.is_empty());
    }

    #[test]
    fn clone_is_not_checked_out() {
        let mut f = Frame::new("A", &[]);
        f.checked_out = true;
        assert!(!f.clone().is_checked_out());
    }
}
