//! Value objects: message content, MIME parts, attachments, and links.

pub mod attachment;
pub mod link;
pub mod message;
