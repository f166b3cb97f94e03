//! `mailrender`: render email bodies as deterministic, terminal-safe text.
//!
//! This crate converts a message (HTML and/or plain text plus a MIME part
//! tree) into a four-section text block: body, attachments, inline images,
//! and numbered links. See [`render::format_email_for_terminal`].

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;

pub use error::{RenderError, Result};
pub use model::attachment::AttachmentMeta;
pub use model::link::LinkRef;
pub use model::message::{Message, MimePart, PartBody};
pub use render::{
    format_email_for_terminal, render_sections, CommandTouchUp, FormatOptions, RenderedEmail,
    TouchUp, TouchUpContext,
};
