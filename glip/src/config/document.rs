//! Hierarchical configuration documents.
//!
//! A [`ConfigDocument`] is the parsed form of one experiment profile: a
//! nested mapping of option name to value. Documents are immutable after
//! load; each run loads its own instance.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{GlipError, GlipResult};

/// An immutable, hierarchical key/value document loaded from a profile.
///
/// Options are addressed by dotted paths, e.g. `MODEL.BACKBONE.CONV_BODY`.
/// Two loads of the same profile compare equal structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    root: Value,
}

impl ConfigDocument {
    /// Parses a document from YAML text.
    ///
    /// `origin` is only used in error messages.
    pub fn from_str(text: &str, origin: &Path) -> GlipResult<Self> {
        let root: Value = serde_yaml::from_str(text).map_err(|source| GlipError::ProfileParse {
            path: origin.to_owned(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Reads and parses the document at `path`.
    pub fn from_path(path: &Path) -> GlipResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                GlipError::ProfileNotFound {
                    path: path.to_owned(),
                }
            } else {
                GlipError::ProfileRead {
                    path: path.to_owned(),
                    source,
                }
            }
        })?;
        Self::from_str(&text, path)
    }

    /// Whether the document holds no options at all.
    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Null => true,
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Looks up the value at a dotted `path`, descending through nested
    /// mappings. Returns `None` if any segment is absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// The string at `path`, if present and a string.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    /// The unsigned integer at `path`, if present and non-negative.
    pub fn usize_at(&self, path: &str) -> Option<usize> {
        self.get(path)?.as_u64().map(|value| value as usize)
    }

    /// The float at `path`. Integer values are widened.
    pub fn f64_at(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    /// The boolean at `path`, if present and a boolean.
    pub fn bool_at(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    /// The sequence of floats at `path`, if present and fully numeric.
    pub fn f64_seq_at(&self, path: &str) -> Option<Vec<f64>> {
        self.get(path)?
            .as_sequence()?
            .iter()
            .map(Value::as_f64)
            .collect()
    }

    /// The string at `path`, failing if absent or not a string.
    pub fn require_str(&self, path: &str) -> GlipResult<&str> {
        match self.get(path) {
            None => Err(GlipError::MissingOption {
                path: path.to_owned(),
            }),
            Some(value) => value.as_str().ok_or_else(|| GlipError::InvalidOption {
                path: path.to_owned(),
                expected: "a string".to_owned(),
            }),
        }
    }

    /// The unsigned integer at `path`, failing if absent or not one.
    pub fn require_usize(&self, path: &str) -> GlipResult<usize> {
        match self.get(path) {
            None => Err(GlipError::MissingOption {
                path: path.to_owned(),
            }),
            Some(value) => value
                .as_u64()
                .map(|value| value as usize)
                .ok_or_else(|| GlipError::InvalidOption {
                    path: path.to_owned(),
                    expected: "an unsigned integer".to_owned(),
                }),
        }
    }

    /// The sequence of floats at `path`, failing if absent or non-numeric.
    pub fn require_f64_seq(&self, path: &str) -> GlipResult<Vec<f64>> {
        match self.get(path) {
            None => Err(GlipError::MissingOption {
                path: path.to_owned(),
            }),
            Some(_) => self.f64_seq_at(path).ok_or_else(|| GlipError::InvalidOption {
                path: path.to_owned(),
                expected: "a sequence of numbers".to_owned(),
            }),
        }
    }
}
