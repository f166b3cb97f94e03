//! Email body rendering pipeline.
//!
//! Turns a [`Message`] into terminal text with four sections:
//!
//! ```text
//! [BODY]
//! ...
//!
//! [ATTACHMENTS]
//! ...
//!
//! [IMAGES]
//! ...
//!
//! [LINKS]
//! ...
//! ```
//!
//! The body comes from the HTML part when it renders to something
//! non-blank, otherwise from the plain-text part. It is then wrapped,
//! sanitized, and de-duplicated. An optional [`TouchUp`] hook may replace
//! the composed text.

pub mod attachments;
pub mod dedupe;
pub mod html;
pub mod links;
pub mod sanitize;
pub mod touch_up;
pub mod wrap;

use tracing::{debug, info, warn};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::model::attachment::AttachmentMeta;
use crate::model::link::LinkRef;
use crate::model::message::Message;

pub use touch_up::{CommandTouchUp, TouchUp, TouchUpContext};

/// Rendering options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FormatOptions {
    /// Target column width; 0 disables wrapping.
    pub wrap_width: usize,
    /// Run the touch-up hook, if one is supplied.
    pub use_llm: bool,
}

impl From<&RenderConfig> for FormatOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            wrap_width: config.wrap_width,
            use_llm: config.use_llm,
        }
    }
}

/// The four output sections as data.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RenderedEmail {
    /// Wrapped, sanitized, de-duplicated body text.
    pub body: String,
    /// Downloadable attachments.
    pub attachments: Vec<AttachmentMeta>,
    /// Inline images (HTML references merged with MIME parts).
    pub images: Vec<AttachmentMeta>,
    /// Numbered links referenced from the body as `[n]`.
    pub links: Vec<LinkRef>,
}

impl RenderedEmail {
    /// Compose the exact four-section text.
    pub fn compose(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 256);

        out.push_str("[BODY]\n");
        out.push_str(&self.body);
        out.push_str("\n\n");

        out.push_str("[ATTACHMENTS]\n");
        push_parts(&mut out, &self.attachments, |a| {
            if a.filename.is_empty() {
                "(attachment)".to_string()
            } else {
                a.filename.clone()
            }
        });
        out.push('\n');

        out.push_str("[IMAGES]\n");
        push_parts(&mut out, &self.images, |img| {
            if !img.filename.is_empty() {
                img.filename.clone()
            } else if !img.content_id.is_empty() {
                format!("cid:{}", img.content_id)
            } else {
                "(image)".to_string()
            }
        });
        out.push('\n');

        out.push_str("[LINKS]\n");
        if self.links.is_empty() {
            out.push_str("None\n");
        } else {
            let mut sorted: Vec<&LinkRef> = self.links.iter().collect();
            sorted.sort_by_key(|l| l.index);
            for link in sorted {
                out.push_str(&format!("({}) {}\n", link.index, link.url));
            }
        }

        out
    }
}

fn push_parts(out: &mut String, parts: &[AttachmentMeta], name: impl Fn(&AttachmentMeta) -> String) {
    if parts.is_empty() {
        out.push_str("None\n");
        return;
    }
    for part in parts {
        out.push_str(&name(part));
        if !part.mime_type.is_empty() {
            out.push_str(&format!(" ({})", part.mime_type));
        }
        out.push('\n');
    }
}

/// Run the deterministic pipeline and return the sections as data.
///
/// 1. HTML extraction, falling back to plain text on error or blank output
/// 2. MIME attachment collection, merged with HTML images
/// 3. newline normalization
/// 4. plain-text URL numbering when no HTML links were found
/// 5. wrapping (when `wrap_width > 0`)
/// 6. sanitizing
/// 7. de-duplication
pub fn render_sections(message: &Message, options: &FormatOptions) -> Result<RenderedEmail> {
    let (mut body, mut links, html_images) = body_source(message);

    let (attachments, mime_images) = attachments::collect_attachments(message.payload.as_ref());
    let images = attachments::merge_images(html_images, mime_images);

    body = sanitize::normalize_newlines(&body);

    if links.is_empty() {
        let (rewritten, detected) = links::detect_links(&body);
        body = rewritten;
        links = detected;
    }

    if options.wrap_width > 0 {
        // Sanitizing first measures the final glyphs; the later pass is then a no-op
        // for the characters it already handled.
        body = wrap::wrap_preserving(&sanitize::sanitize(&body), options.wrap_width);
    }

    body = sanitize::sanitize(&body);
    body = dedupe::dedupe(&body);
    let body = body.trim_matches('\n').to_string();

    debug!(
        chars = body.len(),
        links = links.len(),
        attachments = attachments.len(),
        images = images.len(),
        "Rendered message sections"
    );

    Ok(RenderedEmail {
        body,
        attachments,
        images,
        links,
    })
}

/// Pick the body text: rendered HTML when usable, plain text otherwise.
fn body_source(message: &Message) -> (String, Vec<LinkRef>, Vec<AttachmentMeta>) {
    if !message.html.trim().is_empty() {
        match html::extract_html(&message.html) {
            Ok(extracted) if !extracted.body.trim().is_empty() => {
                return (extracted.body, extracted.links, extracted.images);
            }
            Ok(_) => debug!("HTML body rendered blank, using plain text"),
            Err(e) => warn!(error = %e, "HTML extraction failed, using plain text"),
        }
    }
    (message.plain_text.clone(), Vec::new(), Vec::new())
}

/// Render a message for terminal display.
///
/// When `options.use_llm` is set and a `touch_up` hook is supplied, the
/// hook receives the composed text; a non-blank result replaces it. Hook
/// errors, blank results, and cancellation or expiry of `ctx` all keep the
/// deterministic output.
pub fn format_email_for_terminal(
    ctx: &TouchUpContext,
    message: &Message,
    options: &FormatOptions,
    touch_up: Option<&dyn TouchUp>,
) -> Result<String> {
    let composed = render_sections(message, options)?.compose();

    let Some(hook) = touch_up.filter(|_| options.use_llm) else {
        return Ok(composed);
    };

    if let Err(e) = ctx.check() {
        warn!(error = %e, "Skipping touch-up");
        return Ok(composed);
    }

    match hook.touch_up(ctx, &composed, options.wrap_width) {
        Ok(text) if text.trim().is_empty() => {
            warn!("Touch-up returned blank text, keeping deterministic output");
            Ok(composed)
        }
        Ok(text) => match ctx.check() {
            Ok(()) => {
                info!(chars = text.len(), "Applied touch-up");
                Ok(text)
            }
            Err(e) => {
                warn!(error = %e, "Touch-up finished after its context ended, discarding");
                Ok(composed)
            }
        },
        Err(e) => {
            warn!(error = %e, "Touch-up failed, keeping deterministic output");
            Ok(composed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::model::message::{MimePart, PartBody};

    fn plain(text: &str) -> Message {
        Message {
            plain_text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_compose_empty_message() {
        let out = format_email_for_terminal(
            &TouchUpContext::new(),
            &Message::default(),
            &FormatOptions::default(),
            None,
        )
        .unwrap();
        assert_eq!(
            out,
            "[BODY]\n\n\n[ATTACHMENTS]\nNone\n\n[IMAGES]\nNone\n\n[LINKS]\nNone\n"
        );
    }

    #[test]
    fn test_compose_sections() {
        let rendered = RenderedEmail {
            body: "Hi [1]".to_string(),
            attachments: vec![AttachmentMeta::classified("", "application/zip", 0, "")],
            images: vec![
                AttachmentMeta::classified("", "image/png", 0, "logo"),
                AttachmentMeta::classified("", "", 0, ""),
            ],
            links: vec![
                LinkRef {
                    index: 2,
                    url: "https://b".to_string(),
                    text: "b".to_string(),
                },
                LinkRef {
                    index: 1,
                    url: "https://a".to_string(),
                    text: "a".to_string(),
                },
            ],
        };
        assert_eq!(
            rendered.compose(),
            "[BODY]\nHi [1]\n\n\
             [ATTACHMENTS]\n(attachment) (application/zip)\n\n\
             [IMAGES]\ncid:logo (image/png)\n(image)\n\n\
             [LINKS]\n(1) https://a\n(2) https://b\n"
        );
    }

    #[test]
    fn test_html_with_anchor_skips_plain_detection() {
        let message = Message {
            html: r#"<p><a href="https://a.example">A</a> and https://raw.example</p>"#.to_string(),
            ..Default::default()
        };
        let rendered = render_sections(&message, &FormatOptions::default()).unwrap();
        assert_eq!(rendered.links.len(), 1);
        assert_eq!(rendered.body, "A [1] and https://raw.example");
    }

    #[test]
    fn test_html_without_anchor_uses_plain_detection() {
        let message = Message {
            html: "<p>visit https://raw.example now</p>".to_string(),
            ..Default::default()
        };
        let rendered = render_sections(&message, &FormatOptions::default()).unwrap();
        assert_eq!(rendered.body, "visit [1] now");
        assert_eq!(rendered.links[0].url, "https://raw.example");
    }

    #[test]
    fn test_blank_html_falls_back_to_plain_text() {
        let message = Message {
            html: "<html><head><style>x{}</style></head><body> </body></html>".to_string(),
            plain_text: "plain body".to_string(),
            ..Default::default()
        };
        let rendered = render_sections(&message, &FormatOptions::default()).unwrap();
        assert_eq!(rendered.body, "plain body");
    }

    #[test]
    fn test_wrap_measures_sanitized_glyphs() {
        let options = FormatOptions {
            wrap_width: 12,
            use_llm: false,
        };
        let text = "one\u{2026} two\u{2026} six\u{2026} ten\u{2026}";
        let rendered = render_sections(&plain(text), &options).unwrap();
        assert_eq!(rendered.body, "one...\ntwo...\nsix...\nten...");
    }

    #[test]
    fn test_newlines_normalized() {
        let rendered =
            render_sections(&plain("a\r\nb\r\n\r\n\r\n\r\nc\r\n"), &FormatOptions::default())
                .unwrap();
        assert_eq!(rendered.body, "a\nb\n\nc");
    }

    #[test]
    fn test_attachments_collected_without_html() {
        let message = Message {
            plain_text: "see attached".to_string(),
            payload: Some(MimePart {
                mime_type: "multipart/mixed".to_string(),
                parts: vec![MimePart {
                    mime_type: "application/pdf".to_string(),
                    filename: "a.pdf".to_string(),
                    body: PartBody {
                        attachment_id: "id1".to_string(),
                        size: 10,
                    },
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let rendered = render_sections(&message, &FormatOptions::default()).unwrap();
        assert_eq!(rendered.attachments.len(), 1);
        assert!(rendered.compose().contains("[ATTACHMENTS]\na.pdf (application/pdf)\n"));
    }

    #[test]
    fn test_touch_up_replaces_output() {
        let hook = |_: &TouchUpContext, _: &str, _: usize| -> Result<String> {
            Ok("touched".to_string())
        };
        let options = FormatOptions {
            wrap_width: 80,
            use_llm: true,
        };
        let out =
            format_email_for_terminal(&TouchUpContext::new(), &plain("x"), &options, Some(&hook))
                .unwrap();
        assert_eq!(out, "touched");
    }

    #[test]
    fn test_touch_up_receives_width_and_composed_text() {
        let hook = |_: &TouchUpContext, text: &str, width: usize| -> Result<String> {
            assert!(text.starts_with("[BODY]\nx\n"));
            assert_eq!(width, 72);
            Ok(text.to_string())
        };
        let options = FormatOptions {
            wrap_width: 72,
            use_llm: true,
        };
        format_email_for_terminal(&TouchUpContext::new(), &plain("x"), &options, Some(&hook))
            .unwrap();
    }

    #[test]
    fn test_touch_up_ignored_when_disabled() {
        let hook = |_: &TouchUpContext, _: &str, _: usize| -> Result<String> {
            Ok("touched".to_string())
        };
        let options = FormatOptions {
            wrap_width: 0,
            use_llm: false,
        };
        let out =
            format_email_for_terminal(&TouchUpContext::new(), &plain("x"), &options, Some(&hook))
                .unwrap();
        assert!(out.starts_with("[BODY]\nx\n"));
    }

    #[test]
    fn test_touch_up_failure_and_blank_are_ignored() {
        let options = FormatOptions {
            wrap_width: 0,
            use_llm: true,
        };
        let failing = |_: &TouchUpContext, _: &str, _: usize| -> Result<String> {
            Err(RenderError::TouchUp("provider down".to_string()))
        };
        let blank =
            |_: &TouchUpContext, _: &str, _: usize| -> Result<String> { Ok("  \n".to_string()) };
        let expected = render_sections(&plain("x"), &options).unwrap().compose();
        for hook in [&failing as &dyn TouchUp, &blank as &dyn TouchUp] {
            let out =
                format_email_for_terminal(&TouchUpContext::new(), &plain("x"), &options, Some(hook))
                    .unwrap();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn test_touch_up_result_discarded_after_cancel() {
        let options = FormatOptions {
            wrap_width: 0,
            use_llm: true,
        };
        let hook = |ctx: &TouchUpContext, _: &str, _: usize| -> Result<String> {
            ctx.cancel();
            Ok("late".to_string())
        };
        let out =
            format_email_for_terminal(&TouchUpContext::new(), &plain("x"), &options, Some(&hook))
                .unwrap();
        assert!(out.starts_with("[BODY]"));
    }

    #[test]
    fn test_expired_context_skips_hook() {
        let options = FormatOptions {
            wrap_width: 0,
            use_llm: true,
        };
        let hook = |_: &TouchUpContext, _: &str, _: usize| -> Result<String> {
            panic!("hook must not run on an expired context");
        };
        let ctx = TouchUpContext::with_timeout(std::time::Duration::ZERO);
        let out = format_email_for_terminal(&ctx, &plain("x"), &options, Some(&hook)).unwrap();
        assert!(out.starts_with("[BODY]"));
    }
}
