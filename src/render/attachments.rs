//! MIME attachment collection: splits a part tree into downloadable
//! attachments and inline images.

use std::collections::HashSet;

use tracing::debug;

use crate::model::attachment::{clean_content_id, AttachmentMeta};
use crate::model::message::MimePart;

/// Walk the part tree depth-first and classify every relevant part.
///
/// Returns `(attachments, inline_images)` in encounter order.
///
/// - A part with both an attachment id and a filename is an attachment,
///   unless it is an image or carries a `Content-Id`, in which case it is an
///   inline image.
/// - Any other part that is an image or carries a `Content-Id` is an inline
///   image (embedded reference).
/// - Everything else is ignored.
///
/// The walk uses an explicit stack, so tree depth is unbounded.
pub fn collect_attachments(
    payload: Option<&MimePart>,
) -> (Vec<AttachmentMeta>, Vec<AttachmentMeta>) {
    let mut attachments = Vec::new();
    let mut images = Vec::new();

    let Some(root) = payload else {
        return (attachments, images);
    };

    let mut stack: Vec<&MimePart> = vec![root];
    while let Some(part) = stack.pop() {
        let cid = part.header("Content-Id").map(clean_content_id).unwrap_or_default();

        let meta = AttachmentMeta::classified(
            part.filename.clone(),
            part.mime_type.clone(),
            part.body.size,
            cid,
        );

        if !part.body.attachment_id.is_empty() && !part.filename.is_empty() {
            if meta.inline {
                images.push(meta);
            } else {
                attachments.push(meta);
            }
        } else if meta.inline {
            images.push(meta);
        }

        // Reverse push keeps children in document order.
        stack.extend(part.parts.iter().rev());
    }

    debug!(
        attachments = attachments.len(),
        images = images.len(),
        "Collected MIME parts"
    );
    (attachments, images)
}

/// Merge inline images found in HTML with those found in the MIME tree.
///
/// Entries are keyed by [`AttachmentMeta::dedup_key`]; the first occurrence
/// wins and order is preserved (HTML images first).
pub fn merge_images(
    html_images: Vec<AttachmentMeta>,
    mime_images: Vec<AttachmentMeta>,
) -> Vec<AttachmentMeta> {
    let mut seen = HashSet::new();
    html_images
        .into_iter()
        .chain(mime_images)
        .filter(|img| seen.insert(img.dedup_key()))
        .collect()
}
