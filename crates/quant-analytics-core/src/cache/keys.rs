use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// How series arguments contribute to a cache key.
///
/// `ShapeDigest` only looks at the length and the boundary values of each
/// series, so two different arrays that share both ends collide. Callers must
/// pass fresh arrays when data changes in place. `ContentHash` hashes every
/// value and never collides in practice, at the cost of a full pass per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    #[default]
    ShapeDigest,
    ContentHash,
}

/// Deterministic key built from a method name and its argument digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    strategy: KeyStrategy,
    repr: String,
}

impl CacheKey {
    pub fn new(method: &str, strategy: KeyStrategy) -> Self {
        CacheKey {
            strategy,
            repr: method.to_string(),
        }
    }

    pub fn series(mut self, name: &str, values: &[f64]) -> Self {
        match self.strategy {
            KeyStrategy::ShapeDigest => {
                let first = values.first().map(|v| v.to_bits()).unwrap_or(0);
                let last = values.last().map(|v| v.to_bits()).unwrap_or(0);
                let _ = write!(
                    self.repr,
                    "|{name}:n={},first={first:x},last={last:x}",
                    values.len()
                );
            }
            KeyStrategy::ContentHash => {
                let mut hasher = Sha256::new();
                for v in values {
                    hasher.update(v.to_bits().to_le_bytes());
                }
                let _ = write!(self.repr, "|{name}:n={},sha256=", values.len());
                for byte in hasher.finalize().iter() {
                    let _ = write!(self.repr, "{byte:02x}");
                }
            }
        }
        self
    }

    pub fn matrix(self, name: &str, columns: &[Vec<f64>]) -> Self {
        let mut key = self;
        for (i, col) in columns.iter().enumerate() {
            key = key.series(&format!("{name}[{i}]"), col);
        }
        key
    }

    pub fn param(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        let _ = write!(self.repr, "|{name}={value}");
        self
    }

    pub fn as_str(&self) -> &str {
        &self.repr
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.repr)
    }
}
