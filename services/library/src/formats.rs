//! Book file formats readable in the browser

use std::path::Path;
use std::sync::OnceLock;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};
use regex::Regex;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm"];
const EDITABLE_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Whether the file can be shown as text on the reading page
pub fn is_text_file(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether the owner may rewrite the file content from the edit page
pub fn is_editable(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| EDITABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Book content prepared for the reading page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookContent {
    /// Plain text, escaped by the view
    Text(String),
    /// Markup already rendered and made safe to embed
    Markup(String),
}

/// Read a book file for display
///
/// Markdown is rendered to HTML, HTML is reduced to plain text and every
/// other format is returned as stored, with invalid UTF-8 replaced.
pub async fn read_content(path: impl AsRef<Path>) -> std::io::Result<BookContent> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    Ok(match ext.as_deref() {
        Some("html" | "htm") => BookContent::Text(html_to_text(&content)),
        Some("md" | "markdown") => BookContent::Markup(markdown_to_html(&content)),
        _ => BookContent::Text(content),
    })
}

fn is_script_url(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    url.starts_with("javascript:") || url.starts_with("vbscript:") || url.starts_with("data:")
}

/// Render markdown to HTML
///
/// Raw HTML in the source is emitted as text and script URLs are dropped
/// from links and images.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_script_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if is_script_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed(""),
            title,
            id,
        }),
        event => event,
    });

    let mut rendered = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut rendered, events);
    rendered
}

struct HtmlPatterns {
    dropped: Vec<Regex>,
    breaks: Regex,
    tags: Regex,
    blank_lines: Regex,
}

fn html_patterns() -> &'static HtmlPatterns {
    static PATTERNS: OnceLock<HtmlPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| HtmlPatterns {
        dropped: ["script", "style", "nav", "header", "footer"]
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>"))
                    .expect("Failed to compile HTML block regex")
            })
            .collect(),
        breaks: Regex::new(r"(?i)<br\s*/?>|<(p|div|h[1-6])\b[^>]*>")
            .expect("Failed to compile HTML break regex"),
        tags: Regex::new(r"<[^>]*>").expect("Failed to compile HTML tag regex"),
        blank_lines: Regex::new(r"\n\s*\n").expect("Failed to compile blank line regex"),
    })
}

/// Strip markup from an HTML document, keeping paragraph breaks
pub fn html_to_text(html: &str) -> String {
    let patterns = html_patterns();

    let mut text = html.to_string();
    for block in &patterns.dropped {
        text = block.replace_all(&text, "").into_owned();
    }
    let text = patterns.breaks.replace_all(&text, "\n");
    let text = patterns.tags.replace_all(&text, "");
    let text = patterns.blank_lines.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Human-readable file size using binary units
pub fn format_file_size(bytes: i64) -> String {
    const UNIT: i64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 5 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_editable_formats() {
        assert!(is_text_file("notes.TXT"));
        assert!(is_text_file("page.html"));
        assert!(!is_text_file("book.pdf"));
        assert!(!is_text_file("README"));

        assert!(is_editable("chapter.md"));
        assert!(!is_editable("page.htm"));
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><style>p { color: red }</style></head>\
                    <body><nav>menu</nav><h1>Title</h1><p>First</p><p>Second<br>line</p>\
                    <script>alert(1)</script></body></html>";

        let text = html_to_text(html);
        assert!(text.starts_with("Title"));
        assert!(text.contains("First"));
        assert!(text.contains("Second\nline"));
        assert!(!text.contains("menu"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn test_read_content_strips_html() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("page.html");
        let txt = dir.path().join("plain.txt");
        tokio::fs::write(&html, "<p>Hello</p>").await.unwrap();
        tokio::fs::write(&txt, "<p>Hello</p>").await.unwrap();

        assert_eq!(
            read_content(&html).await.unwrap(),
            BookContent::Text("Hello".to_string())
        );
        assert_eq!(
            read_content(&txt).await.unwrap(),
            BookContent::Text("<p>Hello</p>".to_string())
        );
        assert!(read_content(dir.path().join("missing.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_read_content_renders_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("chapter.MD");
        tokio::fs::write(&md, "# Chapter One\n\nIt was a *dark* night.")
            .await
            .unwrap();

        let BookContent::Markup(rendered) = read_content(&md).await.unwrap() else {
            panic!("markdown should be rendered");
        };
        assert!(rendered.contains("<h1>Chapter One</h1>"));
        assert!(rendered.contains("<em>dark</em>"));
    }

    #[test]
    fn test_markdown_neutralises_raw_html_and_script_links() {
        let rendered = markdown_to_html(
            "<script>alert(1)</script>\n\nHi <b>there</b> [click](javascript:alert(1)) [ok](https://example.com)",
        );

        assert!(!rendered.contains("<script>"));
        assert!(!rendered.contains("<b>"));
        assert!(rendered.contains("&lt;b&gt;"));
        assert!(!rendered.contains("javascript:"));
        assert!(rendered.contains(r#"<a href="https://example.com">ok</a>"#));
    }
}
