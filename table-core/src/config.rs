//! Typed key/value configuration passed to a backend at `init` time. The
//! core does not interpret its contents; only backend adapters do.

use std::collections::HashMap;

/// A typed key/value accessor handed to [`crate::BackendAdapter::init`].
pub trait ConfigReader: Send + Sync {
    /// Raw string lookup.
    fn get(&self, key: &str) -> Option<&str>;

    /// Parses the value at `key` as a [`std::time::Duration`] expressed in
    /// whole milliseconds.
    fn get_duration_millis(&self, key: &str) -> Option<std::time::Duration> {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map(std::time::Duration::from_millis)
    }

    /// Parses the value at `key` as a `u64`.
    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }
}

/// A [`ConfigReader`] backed by an in-memory map, used in tests and by the
/// in-memory reference backend.
#[derive(Debug, Clone, Default)]
pub struct MapConfigReader(HashMap<String, String>);

impl MapConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl ConfigReader for MapConfigReader {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_typed_values() {
        let cfg = MapConfigReader::new()
            .with("timeout_ms", "5000")
            .with("max_rows", "100");
        assert_eq!(
            cfg.get_duration_millis("timeout_ms"),
            Some(std::time::Duration::from_millis(5000))
        );
        assert_eq!(cfg.get_u64("max_rows"), Some(100));
        assert_eq!(cfg.get("nonexistent"), None);
    }
}
