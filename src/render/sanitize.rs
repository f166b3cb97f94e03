//! Terminal sanitizer: replaces or drops characters that terminals render
//! as "tofu" boxes, normalizes typographic punctuation, and strips control
//! characters. Fenced code blocks pass through untouched.

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_width::UnicodeWidthStr;

/// Code fence marker. A line whose trimmed form starts with it toggles
/// verbatim mode.
pub const FENCE: &str = "```";

/// Sanitize text for terminal display.
///
/// Applied line by line. Lines inside a fenced code block (and the fence
/// lines themselves) are copied byte-for-byte. Outside fences, runs of three
/// or more newlines collapse to exactly two.
///
/// The function is idempotent: `sanitize(&sanitize(t)) == sanitize(t)`.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;
    let mut trailing_newlines = 0usize;

    for (i, line) in text.split('\n').enumerate() {
        // The newline before this line is verbatim only inside a fence.
        let newline_in_fence = in_fence;
        let piece = if in_fence {
            if is_fence(line) {
                in_fence = false;
            }
            std::borrow::Cow::Borrowed(line)
        } else {
            let cleaned = sanitize_line(line);
            if is_fence(&cleaned) {
                in_fence = true;
            }
            std::borrow::Cow::Owned(cleaned)
        };

        if i > 0 && (newline_in_fence || trailing_newlines < 2) {
            out.push('\n');
            trailing_newlines += 1;
        }

        if !piece.is_empty() {
            out.push_str(&piece);
            trailing_newlines = 0;
        }
    }

    out
}

/// Sanitize a single line (no newline characters expected).
pub fn sanitize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{00A0}' => out.push(' '),
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => {}
            '\u{034F}' | '\u{2060}' | '\u{00AD}' => {}
            '\u{2000}'..='\u{200A}' | '\u{202F}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2022}' | '\u{2023}' | '\u{25AA}' | '\u{25CF}' | '\u{25E6}' => {
                out.push('-');
                if chars.peek().is_some_and(|next| !next.is_whitespace()) {
                    out.push(' ');
                }
            }
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            '\t' => out.push('\t'),
            c if c.is_control() => {}
            c if get_general_category(c) == GeneralCategory::OtherSymbol => {}
            c => out.push(c),
        }
    }

    out
}

/// Whether a line opens or closes a fenced code block.
pub fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

/// Convert CRLF and lone CR to LF, then collapse 3+ newlines to 2.
pub fn normalize_newlines(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    collapse_newlines(&unified)
}

/// Collapse every run of three or more `\n` into exactly two.
pub fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run > 2 {
                continue;
            }
        } else {
            run = 0;
        }
        out.push(c);
    }
    out
}

/// Display width of a string in terminal columns.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullet_becomes_dash() {
        assert_eq!(sanitize("Hello • world"), "Hello - world");
        assert_eq!(sanitize("•item"), "- item");
        assert_eq!(sanitize("◦ nested"), "- nested");
    }

    #[test]
    fn test_typography() {
        assert_eq!(
            sanitize("\u{201C}Quote\u{201D} it\u{2019}s \u{2014} done\u{2026}"),
            "\"Quote\" it's - done..."
        );
    }

    #[test]
    fn test_spaces_and_invisibles() {
        assert_eq!(sanitize("a\u{00A0}b\u{2003}c\u{202F}d"), "a b c d");
        assert_eq!(sanitize("zero\u{200B}width\u{FEFF}\u{00AD}\u{2060}"), "zerowidth");
    }

    #[test]
    fn test_symbols_and_controls_dropped() {
        assert_eq!(sanitize("ok \u{2705} done"), "ok  done");
        assert_eq!(sanitize("bell\u{0007}\tTab\r"), "bell\tTab");
    }

    #[test]
    fn test_collapses_blank_runs() {
        assert_eq!(sanitize("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(sanitize("a\n\n\n"), "a\n\n");
        assert_eq!(sanitize("a\nb\n"), "a\nb\n");
    }

    #[test]
    fn test_collapses_blank_runs_around_fences() {
        assert_eq!(sanitize("a\n\n\n\n```\nx\n```"), "a\n\n```\nx\n```");
        assert_eq!(sanitize("```\nx\n```\n\n\n\nb"), "```\nx\n```\n\nb");
        assert_eq!(sanitize("```\n\n\n\nx\n```"), "```\n\n\n\nx\n```");
    }

    #[test]
    fn test_fenced_content_is_verbatim() {
        let text = "before \u{2705}\n```\nlet x = \"\u{1F600}\u{2014}\";\n\n\n\nend\n```\nafter \u{2022} x";
        let out = sanitize(text);
        assert_eq!(
            out,
            "before \n```\nlet x = \"\u{1F600}\u{2014}\";\n\n\n\nend\n```\nafter - x"
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Hello • world\n\n\n\nx",
            "\u{200B}```\n\u{1F600}\n```",
            "•\u{200B}x \u{2026}",
            "a\r\nb\u{0007}\n\n\n",
            "```\nunterminated \u{2705}\n\n\n",
        ];
        for s in samples {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n\n\n\nd"), "a\nb\nc\n\nd");
    }

    #[test]
    fn test_display_width_counts_columns() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本"), 4);
    }
}
