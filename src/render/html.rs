//! HTML-to-text extraction.
//!
//! Walks the parsed DOM with an explicit visitor that threads an
//! accumulator (text buffer, links, inline images, quote depth,
//! preformatted flag) and produces terminal text that keeps quotes, code
//! blocks, lists and tables recognizable.
//!
//! - `<a href>` becomes `"label [n]"` and is recorded as a [`LinkRef`]
//! - `<img>` is recorded as an inline image and emits nothing
//! - `<blockquote>` prefixes its lines with `"> "` (at most three levels)
//! - `<pre>`/`<code>` are wrapped in ```` ``` ```` fences and copied verbatim
//! - tables render one line per row, cells joined with `" | "`

use scraper::{ElementRef, Html, Node};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::model::attachment::{clean_content_id, AttachmentMeta};
use crate::model::link::LinkRef;
use crate::render::sanitize::{collapse_newlines, is_fence, sanitize_line, FENCE};

/// Quote prefix for one nesting level.
const QUOTE_PREFIX: &str = "> ";

/// Deeper nesting is rendered at this level.
const MAX_QUOTE_DEPTH: usize = 3;

/// Tables with at least this many cells, all at most one character wide,
/// are treated as spacer/button grids and concatenated.
const GRID_MIN_CELLS: usize = 5;

/// Elements whose whole subtree is ignored.
const SKIPPED_TAGS: &[&str] = &["head", "style", "script", "title", "meta", "link"];

/// Output of [`extract_html`].
#[derive(Debug, Clone, Default)]
pub struct HtmlExtraction {
    /// Rendered body text.
    pub body: String,
    /// Hyperlinks in encounter order, numbered from 1.
    pub links: Vec<LinkRef>,
    /// Inline images referenced by `<img>` tags.
    pub images: Vec<AttachmentMeta>,
}

/// Convert an HTML document into terminal text plus its links and images.
///
/// Parsing is lenient: malformed markup is repaired the way browsers do, so
/// an error is returned only when no document could be built at all.
pub fn extract_html(html: &str) -> Result<HtmlExtraction> {
    let document = Html::parse_document(html);
    if !document.errors.is_empty() {
        debug!(count = document.errors.len(), "HTML parsed with recoverable errors");
    }

    let root = document
        .tree
        .root()
        .children()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| RenderError::HtmlParse("document has no root element".into()))?;

    let mut visitor = Visitor::default();
    visitor.visit_element(root);

    let body = finish_body(&visitor.out);
    debug!(
        links = visitor.links.len(),
        images = visitor.images.len(),
        chars = body.len(),
        "Extracted HTML body"
    );

    Ok(HtmlExtraction {
        body,
        links: visitor.links,
        images: visitor.images,
    })
}

/// Accumulator threaded through the DOM walk.
#[derive(Default)]
struct Visitor {
    out: String,
    links: Vec<LinkRef>,
    images: Vec<AttachmentMeta>,
    quote_depth: usize,
    preformatted: bool,
    /// Set while rendering a table cell: nested tables are emitted as rows
    /// of the enclosing table instead.
    in_cell: bool,
}

impl Visitor {
    fn visit_children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.visit_element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        if SKIPPED_TAGS.contains(&name) {
            return;
        }

        match name {
            "div" | "section" => {
                self.ensure_block_start();
                self.visit_children(el);
                self.ensure_line_start();
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let text = inner_text(el);
                if !text.is_empty() {
                    self.ensure_blank_line();
                    self.push_str(&text);
                    self.push_str("\n\n");
                }
            }
            "hr" => {
                self.ensure_line_start();
                self.push_str("-----\n");
            }
            "br" => self.push_str("\n"),
            "p" => {
                self.ensure_block_start();
                self.visit_children(el);
                self.ensure_line_start();
                self.push_str("\n");
            }
            "ul" | "ol" => self.visit_list(el),
            "blockquote" => {
                self.ensure_line_start();
                self.quote_depth += 1;
                self.visit_children(el);
                self.quote_depth -= 1;
                self.ensure_line_start();
            }
            "pre" | "code" => self.visit_preformatted(el),
            "a" => self.visit_anchor(el),
            "img" => self.record_image(el),
            "table" if self.in_cell => {}
            "table" => self.visit_table(el),
            _ => self.visit_children(el),
        }
    }

    fn visit_list(&mut self, el: ElementRef<'_>) {
        self.ensure_line_start();
        for item in el.children().filter_map(ElementRef::wrap) {
            if item.value().name() == "li" {
                self.ensure_line_start();
                self.push_str("- ");
                self.visit_children(item);
                // Block content inside the item leaves a paragraph break.
                while self.out.ends_with("\n\n") {
                    self.out.pop();
                }
                self.ensure_line_start();
            } else {
                self.visit_element(item);
            }
        }
    }

    fn visit_preformatted(&mut self, el: ElementRef<'_>) {
        // <code> inside <pre> is already fenced.
        if self.preformatted {
            self.visit_children(el);
            return;
        }
        self.ensure_line_start();
        self.push_raw(FENCE);
        self.push_raw("\n");
        self.preformatted = true;
        self.visit_children(el);
        self.preformatted = false;
        self.ensure_line_start();
        self.push_raw(FENCE);
        self.push_raw("\n");
    }

    fn visit_anchor(&mut self, el: ElementRef<'_>) {
        let href = el.value().attr("href").unwrap_or("").trim();
        if href.is_empty() {
            self.visit_children(el);
            return;
        }
        self.collect_images(el);

        let label = [
            inner_text(el),
            attr_text(el, "aria-label"),
            attr_text(el, "title"),
            attr_text(el, "alt"),
            nested_img_alt(el),
        ]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| href.to_string());

        let index = self.links.len() + 1;
        self.links.push(LinkRef {
            index,
            url: href.to_string(),
            text: label.clone(),
        });
        self.push_inline(&format!("{label} [{index}]"));
    }

    fn record_image(&mut self, el: ElementRef<'_>) {
        let src = el.value().attr("src").unwrap_or("").trim();
        let mut cid = el
            .value()
            .attr("cid")
            .or_else(|| el.value().attr("data-cid"))
            .map(clean_content_id)
            .unwrap_or_default();
        if cid.is_empty() {
            if let Some(rest) = strip_prefix_ignore_case(src, "cid:") {
                cid = clean_content_id(rest);
            }
        }

        let filename = image_filename(src);
        let mime_type = image_mime_type(src);
        self.images
            .push(AttachmentMeta::classified(filename, mime_type, 0, cid));
    }

    fn collect_images(&mut self, el: ElementRef<'_>) {
        for img in el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "img")
        {
            self.record_image(img);
        }
    }

    fn visit_table(&mut self, el: ElementRef<'_>) {
        self.ensure_line_start();
        for row in table_rows(el) {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|cell| self.render_cell(cell))
                .collect();
            if cells.is_empty() {
                continue;
            }

            let is_grid = cells.len() >= GRID_MIN_CELLS
                && cells.iter().all(|c| c.trim().chars().count() <= 1);
            let line = if is_grid {
                cells.iter().map(|c| c.trim()).collect::<String>()
            } else if cells.len() == 1 {
                cells[0].trim().to_string()
            } else {
                cells
                    .iter()
                    .map(|c| flatten(c))
                    .collect::<Vec<_>>()
                    .join(" | ")
            };

            self.ensure_line_start();
            self.push_str(&line);
            self.push_str("\n");
        }
    }

    /// Render a cell with a nested visitor that shares link numbering and
    /// image collection with this one.
    fn render_cell(&mut self, cell: ElementRef<'_>) -> String {
        let mut nested = Visitor {
            links: std::mem::take(&mut self.links),
            images: std::mem::take(&mut self.images),
            in_cell: true,
            ..Default::default()
        };
        nested.visit_children(cell);
        self.links = nested.links;
        self.images = nested.images;
        finish_body(&nested.out)
    }

    fn push_text(&mut self, text: &str) {
        if self.preformatted {
            self.push_raw(text);
            return;
        }
        self.push_inline(&sanitize_line(&collapse_whitespace(text)));
    }

    /// Append inline content, dropping leading spaces at the start of a line.
    fn push_inline(&mut self, text: &str) {
        let text = if self.at_line_start() {
            text.trim_start()
        } else {
            text
        };
        if !text.is_empty() {
            self.push_str(text);
        }
    }

    /// Append text, quote-prefixing every line that gets content.
    fn push_str(&mut self, text: &str) {
        if self.quote_depth == 0 || self.preformatted {
            self.out.push_str(text);
            return;
        }
        let prefix = QUOTE_PREFIX.repeat(self.quote_depth.min(MAX_QUOTE_DEPTH));
        for c in text.chars() {
            if c != '\n' && self.at_line_start() {
                self.out.push_str(&prefix);
            }
            self.out.push(c);
        }
    }

    fn push_raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn ensure_line_start(&mut self) {
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    /// Start a block on a fresh line, unless the line holds only a list
    /// marker that the block's content belongs to.
    fn ensure_block_start(&mut self) {
        let line = self.out.rsplit('\n').next().unwrap_or("");
        if line.trim_start_matches(QUOTE_PREFIX) != "- " {
            self.ensure_line_start();
        }
    }

    fn ensure_blank_line(&mut self) {
        self.ensure_line_start();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

/// Every row in the table's subtree, including rows of nested tables, in
/// document order.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr")
        .collect()
}

/// Plain inner text of an element: whitespace collapsed, sanitized, trimmed.
fn inner_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    sanitize_line(&collapse_whitespace(&raw)).trim().to_string()
}

fn attr_text(el: ElementRef<'_>, name: &str) -> String {
    el.value()
        .attr(name)
        .map(|v| sanitize_line(&collapse_whitespace(v)).trim().to_string())
        .unwrap_or_default()
}

fn nested_img_alt(el: ElementRef<'_>) -> String {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "img")
        .map(|img| attr_text(img, "alt"))
        .find(|alt| !alt.is_empty())
        .unwrap_or_default()
}

/// Replace every whitespace run with a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Join the lines of a rendered cell into one line.
fn flatten(cell: &str) -> String {
    cell.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim trailing whitespace on lines outside code fences, collapse blank
/// runs, and strip leading/trailing blank lines.
fn finish_body(raw: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;
    for line in raw.split('\n') {
        if in_fence {
            if is_fence(line) {
                in_fence = false;
            }
            lines.push(line);
        } else {
            if is_fence(line) {
                in_fence = true;
            }
            lines.push(line.trim_end());
        }
    }
    collapse_newlines(&lines.join("\n"))
        .trim_matches('\n')
        .to_string()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Last path segment of an image URL; empty for `cid:` and `data:` sources.
fn image_filename(src: &str) -> String {
    if src.is_empty()
        || strip_prefix_ignore_case(src, "cid:").is_some()
        || strip_prefix_ignore_case(src, "data:").is_some()
    {
        return String::new();
    }
    let path = src.split(['?', '#']).next().unwrap_or("");
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Best-effort image mimetype from a `data:` URI or the file extension.
fn image_mime_type(src: &str) -> String {
    if let Some(rest) = strip_prefix_ignore_case(src, "data:") {
        let mime = rest.split([';', ',']).next().unwrap_or("").trim();
        if !mime.is_empty() {
            return mime.to_ascii_lowercase();
        }
    }
    let name = image_filename(src).to_ascii_lowercase();
    let ext = name.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "image/*",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(html: &str) -> String {
        extract_html(html).expect("extract").body
    }

    #[test]
    fn test_paragraphs_and_breaks() {
        assert_eq!(
            body("<p>Hello <b>world</b></p><p>Second<br>line</p>"),
            "Hello world\n\nSecond\nline"
        );
    }

    #[test]
    fn test_skips_head_script_style() {
        let html = "<html><head><title>T</title><style>p{}</style></head>\
                    <body><script>alert(1)</script><p>Visible</p></body></html>";
        assert_eq!(body(html), "Visible");
    }

    #[test]
    fn test_headings_hr_and_lists() {
        let html = "<h1> Title <a href='x'>ignored link</a></h1><hr>\
                    <ul><li>one</li><li>two</li></ul>";
        let out = extract_html(html).unwrap();
        assert_eq!(out.body, "Title ignored link\n\n-----\n- one\n- two");
        assert!(out.links.is_empty());
    }

    #[test]
    fn test_list_items_with_block_content() {
        assert_eq!(body("<ul><li><p>one</p></li></ul>"), "- one");
        assert_eq!(
            body("<ul><li><p>one</p></li><li><div>two</div></li></ul>"),
            "- one\n- two"
        );
        assert_eq!(
            body("<blockquote><ul><li><p>quoted</p></li></ul></blockquote>"),
            "> - quoted"
        );
    }

    #[test]
    fn test_anchor_without_href_records_image_once() {
        let out = extract_html(r#"<p><a name="top"><img src="a.png"></a></p>"#).unwrap();
        assert_eq!(out.images.len(), 1);
        assert!(out.links.is_empty());
    }

    #[test]
    fn test_anchor_labels_and_numbering() {
        let html = r#"<p><a href="https://a.example">First</a>
            <a href="https://b.example" aria-label="Second"></a>
            <a href="https://c.example"></a></p>"#;
        let out = extract_html(html).unwrap();
        assert_eq!(out.body, "First [1] Second [2] https://c.example [3]");
        let indices: Vec<_> = out.links.iter().map(|l| l.index).collect();
        assert_eq!(indices, [1, 2, 3]);
        assert_eq!(out.links[1].url, "https://b.example");
        assert_eq!(out.links[1].text, "Second");
    }

    #[test]
    fn test_anchor_without_href_is_plain_text() {
        let out = extract_html("<p><a name='top'>Top</a></p>").unwrap();
        assert_eq!(out.body, "Top");
        assert!(out.links.is_empty());
    }

    #[test]
    fn test_blockquote_prefixes_lines() {
        let html = "<p>Reply</p><blockquote><p>quoted one</p>\
                    <blockquote>inner<br>second</blockquote></blockquote>";
        assert_eq!(
            body(html),
            "Reply\n\n> quoted one\n\n> > inner\n> > second"
        );
    }

    #[test]
    fn test_quote_depth_capped_at_three() {
        let html = "<blockquote><blockquote><blockquote><blockquote>deep\
                    </blockquote></blockquote></blockquote></blockquote>";
        assert_eq!(body(html), "> > > deep");
    }

    #[test]
    fn test_pre_is_fenced_and_verbatim() {
        let html = "<blockquote><pre>fn main() {\n    \u{1F600}\n}</pre></blockquote>";
        assert_eq!(body(html), "```\nfn main() {\n    \u{1F600}\n}\n```");
    }

    #[test]
    fn test_code_inside_pre_single_fence() {
        assert_eq!(body("<pre><code>x = 1</code></pre>"), "```\nx = 1\n```");
    }

    #[test]
    fn test_table_rows_pipe_joined() {
        let html = "<table><thead><tr><th>Name</th><th>Qty</th></tr></thead>\
                    <tbody><tr><td>Apple</td><td>3</td></tr></tbody></table>";
        assert_eq!(body(html), "Name | Qty\nApple | 3");
    }

    #[test]
    fn test_table_grid_collapses() {
        let html = "<table><tr><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td><td>f</td></tr></table>";
        assert_eq!(body(html), "abcdef");
    }

    #[test]
    fn test_nested_table_rows_emitted_once() {
        let html = "<table><tr><td>Header</td><td>\
                    <table><tr><td>in1</td><td>in2</td></tr></table>\
                    </td></tr></table>";
        assert_eq!(body(html), "Header |\nin1 | in2");
    }

    #[test]
    fn test_links_inside_tables_keep_numbering() {
        let html = "<p><a href='https://one'>one</a></p>\
                    <table><tr><td><a href='https://two'>two</a></td><td>x</td></tr></table>";
        let out = extract_html(html).unwrap();
        assert_eq!(out.body, "one [1]\n\ntwo [2] | x");
        assert_eq!(out.links.len(), 2);
    }

    #[test]
    fn test_images_recorded_not_emitted() {
        let html = r#"<p>Hi<img src="photo.jpg" cid="<abc123>"></p>
            <a href="https://home"><img src="cid:logo@x" alt="Home"></a>"#;
        let out = extract_html(html).unwrap();
        assert_eq!(out.body, "Hi\n\nHome [1]");
        assert_eq!(out.images.len(), 2);
        assert_eq!(out.images[0].filename, "photo.jpg");
        assert_eq!(out.images[0].content_id, "abc123");
        assert_eq!(out.images[0].mime_type, "image/jpeg");
        assert!(out.images[0].inline);
        assert_eq!(out.images[1].filename, "");
        assert_eq!(out.images[1].content_id, "logo@x");
    }

    #[test]
    fn test_text_is_sanitized_and_entities_decoded() {
        assert_eq!(
            body("<p>Tom &amp; Jerry &bull; &ldquo;hi&rdquo;&nbsp;\u{2705}</p>"),
            "Tom & Jerry - \"hi\""
        );
    }

    #[test]
    fn test_malformed_markup_does_not_error() {
        let out = extract_html("<div><p>unclosed <b>bold<table><tr><td>x").unwrap();
        assert!(out.body.contains("unclosed bold"));
        assert!(out.body.contains('x'));
    }

    #[test]
    fn test_image_filename_and_mime() {
        assert_eq!(image_filename("https://cdn.example/a/b/pic.png?w=10"), "pic.png");
        assert_eq!(image_filename("cid:abc"), "");
        assert_eq!(image_mime_type("data:image/gif;base64,AAAA"), "image/gif");
        assert_eq!(image_mime_type("https://t.example/open"), "image/*");
    }
}
