//! Numbered hyperlink references.

/// A hyperlink extracted from the body and replaced by a `[index]` marker.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkRef {
    /// 1-based index, unique within one rendered message.
    pub index: usize,
    /// Target URL.
    pub url: String,
    /// Visible label (for plain-text links, the URL itself).
    pub text: String,
}
