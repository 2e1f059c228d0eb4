//! Converted page body.

use std::fmt;

/// Page body in Confluence storage format.
///
/// Only the converter constructs values of this type, so every instance is a
/// well-formed XML fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StorageContent(String);

impl StorageContent {
    pub(crate) fn new(xhtml: String) -> Self {
        Self(xhtml)
    }

    /// Storage format markup.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for StorageContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
