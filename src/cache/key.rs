//! Cache key type
//!
//! A `CacheKey` combines the short name of the response type with the
//! request fingerprint. Namespacing by response type keeps two different
//! response shapes that share a destination from colliding on one file.

/// Key identifying one cached response on disk
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    type_tag: String,
    fingerprint: String,
}

impl CacheKey {
    pub fn new(type_tag: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Short name of the response type this entry deserializes into
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// File name for this key: the type tag followed by the fingerprint
    pub fn file_name(&self) -> String {
        format!("{}{}", self.type_tag, self.fingerprint)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_name())
    }
}
