use std::fmt;

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Length of the random token appended to generated keys.
const TOKEN_LEN: usize = 12;

/// Longest key accepted by [`ObjectKey::parse`].
const MAX_KEY_LEN: usize = 512;

/// A validated object key such as `uploads/{owner}/{millis}-{token}.pdf`.
///
/// Keys are relative, `/`-separated and restricted to `[A-Za-z0-9._-]`
/// segments, so they can be used verbatim as filesystem paths and S3 keys.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Generate a fresh upload key for `owner`.
    ///
    /// The millisecond timestamp plus random token keeps concurrent uploads
    /// by the same owner from colliding.
    pub fn generate(owner: &str, filename: &str) -> Result<Self, StorageError> {
        validate_segment(owner)?;
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        let ext = extension_of(filename);
        Ok(Self(format!(
            "uploads/{owner}/{}-{token}.{ext}",
            Utc::now().timestamp_millis()
        )))
    }

    /// Parse and validate an existing key.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        if s.is_empty() || s.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key must be 1-{MAX_KEY_LEN} bytes"
            )));
        }
        for segment in s.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(StorageError::InvalidKey(format!(
            "invalid path segment '{segment}'"
        )));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(StorageError::InvalidKey(format!(
            "segment '{segment}' contains disallowed characters"
        )));
    }
    Ok(())
}

/// Lowercased alphanumeric extension of `filename`, or `bin`.
fn extension_of(filename: &str) -> String {
    let ext = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => return "bin".into(),
    };
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return "bin".into();
    }
    ext.to_ascii_lowercase()
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ObjectKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ObjectKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
