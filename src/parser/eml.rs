//! Parser for individual `.eml` files (RFC 5322 messages).
//!
//! Builds the renderer's [`Message`] value: the first real `text/html` and
//! `text/plain` bodies plus the full MIME part tree.

use std::path::Path;

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::model::message::{Message, MimePart, PartBody};

/// Maximum nesting of multipart containers that is followed; deeper parts
/// are dropped from the tree.
const MAX_DEPTH: usize = 64;

/// Read and parse a single `.eml` file.
pub fn parse_eml(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RenderError::FileNotFound(path.to_path_buf())
        } else {
            RenderError::io(path, e)
        }
    })?;
    parse_message(&data)
}

/// Parse raw message bytes (an optional leading mbox `From ` line is skipped).
pub fn parse_message(raw: &[u8]) -> Result<Message> {
    let bytes = skip_from_line(raw);
    let parsed = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| RenderError::MimeError("message could not be parsed".into()))?;

    let html = parsed
        .html_part(0)
        .filter(|p| matches!(p.body, PartType::Html(_)))
        .and_then(|p| p.text_contents())
        .unwrap_or_default()
        .to_string();

    let plain_text = parsed
        .text_part(0)
        .filter(|p| matches!(p.body, PartType::Text(_)))
        .and_then(|p| p.text_contents())
        .unwrap_or_default()
        .to_string();

    let payload = if parsed.parts.is_empty() {
        None
    } else {
        Some(build_part(&parsed.parts, 0, 0))
    };

    debug!(
        html = html.len(),
        text = plain_text.len(),
        parts = parsed.parts.len(),
        "Parsed message"
    );

    Ok(Message {
        html,
        plain_text,
        payload,
    })
}

/// Convert the part with index `id` (and its children) into a [`MimePart`].
fn build_part(parts: &[MessagePart<'_>], id: usize, depth: usize) -> MimePart {
    let Some(part) = parts.get(id) else {
        return MimePart::default();
    };

    let mime_type = part
        .content_type()
        .map(|ct| match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        })
        .unwrap_or_else(|| "text/plain".to_string())
        .to_ascii_lowercase();

    let filename = part.attachment_name().unwrap_or("").to_string();

    let mut headers = vec![("Content-Type".to_string(), mime_type.clone())];
    if let Some(disposition) = part.content_disposition() {
        headers.push(("Content-Disposition".to_string(), disposition.ctype().to_string()));
    }
    if let Some(cid) = part.content_id() {
        headers.push(("Content-ID".to_string(), format!("<{cid}>")));
    }

    let mut children = Vec::new();
    let is_container = matches!(part.body, PartType::Multipart(_));
    if let PartType::Multipart(child_ids) = &part.body {
        if depth < MAX_DEPTH {
            children = child_ids
                .iter()
                .map(|&child| build_part(parts, child, depth + 1))
                .collect();
        } else {
            warn!(depth, "Multipart nesting too deep, ignoring children");
        }
    }

    // EML files carry no provider attachment ids: downloadable leaves get a
    // synthetic one derived from their part index.
    let is_binary = matches!(
        part.body,
        PartType::Binary(_) | PartType::InlineBinary(_) | PartType::Message(_)
    );
    let attachment_id = if !is_container && (is_binary || !filename.is_empty()) {
        format!("part-{id}")
    } else {
        String::new()
    };

    MimePart {
        mime_type,
        filename,
        headers,
        body: PartBody {
            attachment_id,
            size: part.contents().len() as i64,
        },
        parts: children,
    }
}

/// Skip the `From ` separator line at the start of MBOX-framed messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
