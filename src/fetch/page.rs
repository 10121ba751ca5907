// src/fetch/page.rs
//! Web page → single snapshot entry (main-content text hash + outline).

use anyhow::{bail, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use super::{normalize_text, truncate_chars, ParseOptions};
use crate::catalog::Source;
use crate::snapshot::{fingerprint, Entry, Heading};

const MAX_HEADINGS: usize = 10;

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("page regex"))
}

/// Main content region: `<article>`, else `<main>`, else `div.content` (to end of body).
fn main_content(html: &str) -> Option<&str> {
    static RE_ARTICLE: OnceCell<Regex> = OnceCell::new();
    static RE_MAIN: OnceCell<Regex> = OnceCell::new();
    static RE_CONTENT_DIV: OnceCell<Regex> = OnceCell::new();

    for (cell, pattern) in [
        (&RE_ARTICLE, r"(?is)<article\b[^>]*>(.*?)</article>"),
        (&RE_MAIN, r"(?is)<main\b[^>]*>(.*?)</main>"),
    ] {
        if let Some(m) = re(cell, pattern).captures(html).and_then(|c| c.get(1)) {
            return Some(m.as_str());
        }
    }

    let div = re(
        &RE_CONTENT_DIV,
        r#"(?is)<div\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?content(?:\s[^"']*)?["'][^>]*>"#,
    );
    let start = div.find(html)?.end();
    let rest = &html[start..];
    let end = rest.to_ascii_lowercase().find("</body>").unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Visible text, one line per block element, empty lines dropped.
fn content_text(fragment: &str) -> String {
    static RE_DROP: OnceCell<Regex> = OnceCell::new();
    static RE_BLOCK: OnceCell<Regex> = OnceCell::new();

    let without_code = re(
        &RE_DROP,
        r"(?is)<(script|style|noscript|template)\b[^>]*>.*?</(script|style|noscript|template)>",
    )
    .replace_all(fragment, " ");
    let with_breaks = re(
        &RE_BLOCK,
        r"(?i)<(br|/?p|/?div|/?li|/?ul|/?ol|/?tr|/?table|/?section|/?h[1-6]|/?pre|/?blockquote)\b[^>]*>",
    )
    .replace_all(&without_code, "\n");

    with_breaks
        .lines()
        .map(normalize_text)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn headings(fragment: &str) -> Vec<Heading> {
    static RE_H: OnceCell<Regex> = OnceCell::new();
    re(&RE_H, r"(?is)<(h[1-3])\b[^>]*>(.*?)</h[1-3]\s*>")
        .captures_iter(fragment)
        .filter_map(|c| {
            let text = normalize_text(c.get(2)?.as_str());
            (!text.is_empty()).then(|| Heading {
                level: c[1].to_ascii_lowercase(),
                text,
            })
        })
        .take(MAX_HEADINGS)
        .collect()
}

/// One entry keyed by the source id; its fingerprint is the hash of the extracted text.
pub fn parse_page(html: &str, source: &Source, opts: &ParseOptions) -> Result<Vec<Entry>> {
    let Some(fragment) = main_content(html) else {
        bail!("could not find main content");
    };
    let text = content_text(fragment);
    if text.is_empty() {
        bail!("main content is empty");
    }

    let outline = headings(fragment);
    let title = outline
        .first()
        .map(|h| h.text.clone())
        .unwrap_or_else(|| source.id.clone());

    Ok(vec![Entry {
        key: source.id.clone(),
        fingerprint: fingerprint(&text),
        title,
        link: Some(source.url.clone()),
        published: None,
        summary: String::new(),
        headings: outline,
        text_preview: truncate_chars(&text, opts.preview_chars),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> Source {
        Source::page("deprecation", "https://docs.example.com/deprecation/")
    }

    #[test]
    fn article_is_preferred_over_main() {
        let html = r#"<html><body>
            <nav>Menu</nav>
            <main><p>Main text</p></main>
            <article><h1>Deprecation</h1><p>Feature X is removed.</p><script>var x = 1;</script></article>
        </body></html>"#;
        let e = &parse_page(html, &src(), &ParseOptions::default()).unwrap()[0];
        assert_eq!(e.key, "deprecation");
        assert_eq!(e.title, "Deprecation");
        assert_eq!(e.text_preview, "Deprecation\nFeature X is removed.");
        assert_eq!(e.headings.len(), 1);
        assert_eq!(e.headings[0].level, "h1");
    }

    #[test]
    fn content_div_is_the_last_resort() {
        let html = r#"<html><body><div class="page content wide"><h2>Notes</h2><p>Hello</p></div></body></html>"#;
        let e = &parse_page(html, &src(), &ParseOptions::default()).unwrap()[0];
        assert_eq!(e.text_preview, "Notes\nHello");
    }

    #[test]
    fn missing_main_content_is_an_error() {
        let html = "<html><body><p>No landmarks here</p></body></html>";
        let err = parse_page(html, &src(), &ParseOptions::default()).unwrap_err();
        assert!(err.to_string().contains("main content"));
    }

    #[test]
    fn markup_only_changes_keep_the_fingerprint() {
        let a = "<article><p>Same   text</p></article>";
        let b = "<article class=\"x\"><p>Same text</p>\n</article>";
        let fa = &parse_page(a, &src(), &ParseOptions::default()).unwrap()[0];
        let fb = &parse_page(b, &src(), &ParseOptions::default()).unwrap()[0];
        assert_eq!(fa.fingerprint, fb.fingerprint);
    }
}
