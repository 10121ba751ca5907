// src/fetch/feed.rs
//! RSS 2.0 / Atom parsing into snapshot entries.

use anyhow::{bail, Context, Result};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use super::{normalize_text, truncate_chars, ParseOptions};
use crate::snapshot::{fingerprint, Entry};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

/// RSS 1.0: `<item>` elements are siblings of `<channel>` under the root.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    /// `dc:date` in RSS 1.0 feeds.
    #[serde(rename = "date", alias = "dc:date")]
    dc_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<AtomLink>,
    id: Option<String>,
    updated: Option<String>,
    published: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

/// Element whose attributes (`type`, `isPermaLink`, ...) we do not need, only its text.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Feed item before it becomes an [`Entry`].
struct RawItem {
    title: String,
    link: Option<String>,
    fallback_id: Option<String>,
    published: Option<String>,
    body: String,
}

/// Parse a feed document, keeping the first `opts.max_feed_entries` items in document order.
pub fn parse_feed(xml: &str, opts: &ParseOptions) -> Result<Vec<Entry>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let head = head_of(&xml_clean);

    let items = if head.contains("<rdf:RDF") || head.contains("<RDF") {
        let rdf: Rdf = from_str(&xml_clean).context("parsing rdf xml")?;
        rdf.item.into_iter().map(raw_from_rss).collect::<Vec<_>>()
    } else if head.contains("<rss") {
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
        rss.channel.item.into_iter().map(raw_from_rss).collect::<Vec<_>>()
    } else if head.contains("<feed") {
        let atom: Atom = from_str(&xml_clean).context("parsing atom xml")?;
        atom.entry.into_iter().map(raw_from_atom).collect::<Vec<_>>()
    } else {
        bail!("document is neither RSS nor Atom");
    };

    let mut out = Vec::with_capacity(items.len().min(opts.max_feed_entries));
    for it in items {
        if out.len() >= opts.max_feed_entries {
            break;
        }
        if let Some(e) = into_entry(it, opts) {
            out.push(e);
        }
    }
    Ok(out)
}

fn raw_from_rss(it: RssItem) -> RawItem {
    RawItem {
        title: it.title.unwrap_or_default(),
        link: it.link,
        fallback_id: it.guid.map(|g| g.value),
        published: it.pub_date.or(it.dc_date),
        body: it.description.unwrap_or_default(),
    }
}

fn raw_from_atom(it: AtomEntry) -> RawItem {
    let link = it
        .link
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
        .or_else(|| it.link.first())
        .and_then(|l| l.href.clone());
    RawItem {
        title: it.title.map(|t| t.value).unwrap_or_default(),
        link,
        fallback_id: it.id,
        published: it.published.or(it.updated),
        body: it
            .summary
            .or(it.content)
            .map(|t| t.value)
            .unwrap_or_default(),
    }
}

fn into_entry(it: RawItem, opts: &ParseOptions) -> Option<Entry> {
    let title = normalize_text(&it.title);
    let summary = truncate_chars(&normalize_text(&it.body), opts.summary_chars);
    let link = it
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let key = link
        .clone()
        .or_else(|| it.fallback_id.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()))
        .or_else(|| (!title.is_empty()).then(|| title.clone()))?;

    Some(Entry {
        key,
        fingerprint: fingerprint(&format!("{title}\n{summary}")),
        title,
        link,
        published: it.published.map(|p| normalize_date(&p)),
        summary,
        headings: Vec::new(),
        text_preview: String::new(),
    })
}

/// RFC 2822 / RFC 3339 dates become RFC 3339 UTC; anything else is kept trimmed.
fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    OffsetDateTime::parse(raw, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .ok()
        .and_then(|dt| dt.to_offset(UtcOffset::UTC).format(&Rfc3339).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn head_of(s: &str) -> &str {
    let mut end = s.len().min(2048);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// HTML named entities that are not defined in XML and would abort the parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Agent Release Notes</title>
    <item>
      <title>Agent 13.2.0</title>
      <link>https://docs.example.com/agent/13.2.0</link>
      <pubDate>Tue, 30 Sep 2025 10:00:00 +0200</pubDate>
      <description>&lt;p&gt;Fixes CVE-2025-0001&amp;nbsp;in the probe.&lt;/p&gt;</description>
    </item>
    <item>
      <title>Agent 13.1.0</title>
      <link>https://docs.example.com/agent/13.1.0</link>
      <description><![CDATA[<p>New &ldquo;eBPF&rdquo; driver</p>]]></description>
    </item>
    <item>
      <title>Agent 13.0.0</title>
      <link>https://docs.example.com/agent/13.0.0</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn rss_items_become_entries_in_document_order() {
        let opts = ParseOptions {
            max_feed_entries: 2,
            ..ParseOptions::default()
        };
        let entries = parse_feed(RSS, &opts).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "https://docs.example.com/agent/13.2.0");
        assert_eq!(entries[0].title, "Agent 13.2.0");
        assert_eq!(entries[0].summary, "Fixes CVE-2025-0001 in the probe.");
        assert_eq!(entries[0].published.as_deref(), Some("2025-09-30T08:00:00Z"));
        assert_eq!(entries[1].summary, "New \"eBPF\" driver");
    }

    #[test]
    fn summary_is_truncated() {
        let opts = ParseOptions {
            summary_chars: 5,
            ..ParseOptions::default()
        };
        let entries = parse_feed(RSS, &opts).unwrap();
        assert_eq!(entries[0].summary, "Fixes");
    }

    #[test]
    fn atom_feeds_are_supported() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Falco rules</title>
  <entry>
    <title type="html">Rules 4.1</title>
    <link rel="self" href="https://x/self"/>
    <link rel="alternate" href="https://x/rules/4.1"/>
    <id>urn:rules:4.1</id>
    <updated>2025-09-01T00:00:00Z</updated>
    <summary>Adds a rule</summary>
  </entry>
</feed>"#;
        let entries = parse_feed(atom, &ParseOptions::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "https://x/rules/4.1");
        assert_eq!(entries[0].title, "Rules 4.1");
        assert_eq!(entries[0].summary, "Adds a rule");
    }

    #[test]
    fn fingerprint_follows_content() {
        let a = parse_feed(RSS, &ParseOptions::default()).unwrap();
        let changed = RSS.replace("in the probe", "in the kernel probe");
        let b = parse_feed(&changed, &ParseOptions::default()).unwrap();
        assert_eq!(a[0].key, b[0].key);
        assert_ne!(a[0].fingerprint, b[0].fingerprint);
        assert_eq!(a[1].fingerprint, b[1].fingerprint);
    }

    #[test]
    fn rss_1_0_items_next_to_channel_are_read() {
        let rdf = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns="http://purl.org/rss/1.0/"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel rdf:about="https://docs.example.com/">
    <title>Notes</title>
    <items><rdf:Seq><rdf:li rdf:resource="https://docs.example.com/a"/></rdf:Seq></items>
  </channel>
  <item rdf:about="https://docs.example.com/a">
    <title>Release A</title>
    <link>https://docs.example.com/a</link>
    <description>First</description>
    <dc:date>2025-09-30T10:00:00+02:00</dc:date>
  </item>
  <item rdf:about="https://docs.example.com/b">
    <title>Release B</title>
    <link>https://docs.example.com/b</link>
    <description>Second</description>
  </item>
</rdf:RDF>"#;
        let entries = parse_feed(rdf, &ParseOptions::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "https://docs.example.com/a");
        assert_eq!(entries[0].published.as_deref(), Some("2025-09-30T08:00:00Z"));
        assert_eq!(entries[1].title, "Release B");
        assert_eq!(entries[1].summary, "Second");
    }

    #[test]
    fn html_document_is_rejected() {
        assert!(parse_feed("<html><body>oops</body></html>", &ParseOptions::default()).is_err());
    }
}
