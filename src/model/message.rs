//! Message content value objects consumed by the renderer.

/// Message content as delivered by a mail source.
///
/// Either body may be empty. `payload` is the root of the MIME part tree,
/// used only to discover attachments and inline images.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// HTML body (from a `text/html` part), possibly empty.
    pub html: String,
    /// Plain-text body (from a `text/plain` part), possibly empty.
    pub plain_text: String,
    /// Root of the MIME part tree.
    pub payload: Option<MimePart>,
}

/// One node of a MIME part tree.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MimePart {
    /// Content type without parameters, e.g. `"image/png"`.
    pub mime_type: String,
    /// Filename from `Content-Disposition`/`Content-Type`, possibly empty.
    pub filename: String,
    /// Raw `(name, value)` header pairs in message order.
    pub headers: Vec<(String, String)>,
    /// Body reference.
    pub body: PartBody,
    /// Child parts (for `multipart/*`).
    pub parts: Vec<MimePart>,
}

/// Reference to the stored body of a part.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PartBody {
    /// Provider attachment identifier; empty for parts stored inline.
    pub attachment_id: String,
    /// Body size in bytes.
    pub size: i64,
}

impl MimePart {
    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
