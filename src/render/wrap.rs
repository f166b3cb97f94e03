//! Structure-preserving line wrapper.
//!
//! Greedy word wrap measured in terminal columns that keeps `"> "` quote
//! prefixes on every continuation line, never splits URLs that fit, and
//! leaves code fences and PGP armor untouched.

use crate::render::sanitize::{display_width, is_fence};

const QUOTE_PREFIX: &str = "> ";
const PGP_BEGIN: &str = "-----BEGIN ";
const PGP_END: &str = "-----END ";

/// Wrap every line of `text` to at most `width` columns.
///
/// `width == 0` disables wrapping. Lines that already fit are returned
/// unchanged. A URL token wider than the available width is hard-cut by
/// character so the loop always makes progress; other over-wide words are
/// placed alone on their own line.
pub fn wrap_preserving(text: &str, width: usize) -> String {
    if width == 0 {
        return text.to_string();
    }

    let mut out: Vec<String> = Vec::new();
    let mut in_code_fence = false;
    let mut in_pgp_block = false;

    for line in text.split('\n') {
        if is_fence(line) {
            in_code_fence = !in_code_fence;
            out.push(line.to_string());
            continue;
        }
        if in_code_fence {
            out.push(line.to_string());
            continue;
        }
        if in_pgp_block {
            if line.starts_with(PGP_END) {
                in_pgp_block = false;
            }
            out.push(line.to_string());
            continue;
        }
        if line.starts_with(PGP_BEGIN) {
            in_pgp_block = true;
            out.push(line.to_string());
            continue;
        }

        if display_width(line) <= width {
            out.push(line.to_string());
            continue;
        }
        wrap_line(line, width, &mut out);
    }

    out.join("\n")
}

/// Split a line into its leading `"> "` run and the remainder.
fn split_quote_prefix(line: &str) -> (&str, &str) {
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix(QUOTE_PREFIX) {
        rest = stripped;
    }
    line.split_at(line.len() - rest.len())
}

fn wrap_line(line: &str, width: usize, out: &mut Vec<String>) {
    let (prefix, rest) = split_quote_prefix(line);
    let available = width.saturating_sub(display_width(prefix)).max(1);

    let mut current = String::new();
    let mut current_width = 0usize;
    let mut emitted = false;

    let mut flush = |current: &mut String, current_width: &mut usize, out: &mut Vec<String>| {
        if !current.is_empty() {
            out.push(format!("{prefix}{current}").trim_end().to_string());
            current.clear();
            *current_width = 0;
            emitted = true;
        }
    };

    for token in rest.split_whitespace() {
        let token_width = display_width(token);

        if is_url_token(token) && token_width > available {
            flush(&mut current, &mut current_width, out);
            let mut chunks = hard_cut(token, available);
            let last = chunks.pop().unwrap_or_default();
            for chunk in chunks {
                out.push(format!("{prefix}{chunk}"));
            }
            current_width = display_width(&last);
            current = last;
            continue;
        }

        if current.is_empty() {
            current.push_str(token);
            current_width = token_width;
        } else if current_width + 1 + token_width <= available {
            current.push(' ');
            current.push_str(token);
            current_width += 1 + token_width;
        } else {
            flush(&mut current, &mut current_width, out);
            current.push_str(token);
            current_width = token_width;
        }
    }
    flush(&mut current, &mut current_width, out);

    if !emitted {
        // Whitespace-only remainder: keep the prefix line itself.
        out.push(line.trim_end().to_string());
    }
}

/// `scheme://` followed by at least one non-space character.
fn is_url_token(token: &str) -> bool {
    let Some((scheme, rest)) = token.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}

/// Cut a token into chunks of at most `width` columns (at least one
/// character per chunk).
fn hard_cut(token: &str, width: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_width = 0usize;
    for c in token.chars() {
        let w = display_width(c.encode_utf8(&mut [0u8; 4]));
        if !chunk.is_empty() && chunk_width + w > width {
            chunks.push(std::mem::take(&mut chunk));
            chunk_width = 0;
        }
        chunk.push(c);
        chunk_width += w;
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}
