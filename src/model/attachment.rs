//! Attachment and inline-image metadata.
//!
//! Content is never loaded: only what the renderer needs to list the part.

/// Metadata about an attachment or an inline image.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// Filename of the part (may be empty).
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub mime_type: String,

    /// Size in bytes as reported by the message source (0 when unknown).
    pub size: i64,

    /// `true` for inline images, `false` for regular downloadable attachments.
    pub inline: bool,

    /// Content-ID, angle brackets stripped (may be empty).
    pub content_id: String,
}

impl AttachmentMeta {
    /// Build an entry whose `inline` flag follows the classification rule:
    /// inline iff the mimetype is an image or a Content-ID is present.
    pub fn classified(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size: i64,
        content_id: impl Into<String>,
    ) -> Self {
        let mime_type = mime_type.into();
        let content_id = content_id.into();
        let inline = is_image_type(&mime_type) || !content_id.is_empty();
        Self {
            filename: filename.into(),
            mime_type,
            size,
            inline,
            content_id,
        }
    }

    /// De-duplication key: `cid:<id>` when a Content-ID is known,
    /// otherwise `filename|mimetype`.
    pub fn dedup_key(&self) -> String {
        if self.content_id.is_empty() {
            format!("{}|{}", self.filename, self.mime_type)
        } else {
            format!("cid:{}", self.content_id)
        }
    }
}

/// Whether a MIME type names an image.
pub fn is_image_type(mime_type: &str) -> bool {
    mime_type.to_ascii_lowercase().starts_with("image/")
}

/// Strip surrounding whitespace and angle brackets from a Content-ID value.
pub fn clean_content_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}
