//! Boilerplate removal: repeated lines, near-duplicate paragraphs, and
//! repeated pipe-delimited navigation bars.
//!
//! Lines inside fenced code blocks are never dropped.

use std::collections::VecDeque;

use crate::render::sanitize::{collapse_newlines, is_fence, sanitize};

/// Number of previously kept paragraphs a new paragraph is compared with.
pub const PARAGRAPH_WINDOW: usize = 8;

/// Run the three passes in order: consecutive lines, paragraphs, nav bars.
pub fn dedupe(text: &str) -> String {
    let text = dedupe_consecutive_lines(text);
    let text = dedupe_paragraphs(&text);
    collapse_nav_runs(&text)
}

/// Drop lines equal (after trimming) to the previous kept line, and
/// degenerate table-artifact lines (`|`, `| |`).
pub fn dedupe_consecutive_lines(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut prev: Option<&str> = None;
    let mut in_fence = false;

    for line in text.split('\n') {
        if in_fence || is_fence(line) {
            if is_fence(line) {
                in_fence = !in_fence;
            }
            kept.push(line);
            prev = None;
            continue;
        }

        let trimmed = line.trim();
        if trimmed == "|" || trimmed == "| |" {
            continue;
        }
        if prev == Some(trimmed) {
            continue;
        }
        kept.push(line);
        prev = Some(trimmed);
    }

    collapse_newlines(&kept.join("\n"))
}

/// Drop paragraphs whose normalized form matches one of the last
/// [`PARAGRAPH_WINDOW`] kept paragraphs.
///
/// Normalization trims, sanitizes, and collapses internal whitespace. Empty
/// paragraphs are always kept and never compared.
pub fn dedupe_paragraphs(text: &str) -> String {
    let mut window: VecDeque<String> = VecDeque::with_capacity(PARAGRAPH_WINDOW + 1);
    let mut kept: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for paragraph in text.split("\n\n") {
        let started_in_fence = in_fence;
        let mut touches_fence = false;
        for line in paragraph.split('\n') {
            if is_fence(line) {
                in_fence = !in_fence;
                touches_fence = true;
            }
        }
        if started_in_fence || touches_fence {
            kept.push(paragraph);
            continue;
        }

        let normalized = normalize_paragraph(paragraph);
        if normalized.is_empty() {
            kept.push(paragraph);
            continue;
        }
        if window.contains(&normalized) {
            continue;
        }

        kept.push(paragraph);
        window.push_back(normalized);
        if window.len() > PARAGRAPH_WINDOW {
            window.pop_front();
        }
    }

    kept.join("\n\n")
}

/// Drop a pipe-delimited navigation line (two or more `|`) when it matches
/// the immediately preceding navigation line after normalization. Any other
/// line resets the comparison.
pub fn collapse_nav_runs(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut prev_nav: Option<String> = None;
    let mut in_fence = false;

    for line in text.split('\n') {
        if in_fence || is_fence(line) {
            if is_fence(line) {
                in_fence = !in_fence;
            }
            kept.push(line);
            prev_nav = None;
            continue;
        }

        if line.matches('|').count() < 2 {
            kept.push(line);
            prev_nav = None;
            continue;
        }

        let normalized = normalize_nav(line);
        if prev_nav.as_deref() == Some(normalized.as_str()) {
            continue;
        }
        kept.push(line);
        prev_nav = Some(normalized);
    }

    kept.join("\n")
}

fn normalize_paragraph(paragraph: &str) -> String {
    sanitize(paragraph.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_nav(line: &str) -> String {
    line.replace('|', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
