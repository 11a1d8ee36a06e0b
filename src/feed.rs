// src/feed.rs
//! RSS 2.0 rendering of a source and its stored items.

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::ingest::types::SourceMeta;
use crate::store::{parse_stored_timestamp, StoredItem};

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// RFC 822 date as used by `<pubDate>`.
const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Wire date for a stored timestamp; unparseable values pass through verbatim.
pub fn format_pub_date(raw: &str) -> String {
    match parse_stored_timestamp(raw) {
        Some(dt) => dt.format(PUB_DATE_FORMAT).to_string(),
        None => raw.to_string(),
    }
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Renders the channel for `source` with one `<item>` per stored item, in the given order.
pub fn render_rss(source: &SourceMeta, items: &[StoredItem]) -> Result<Vec<u8>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0")]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &source.title)?;
    text_element(&mut w, "link", &source.url)?;
    text_element(&mut w, "description", &source.description)?;

    for item in items {
        w.write_event(Event::Start(BytesStart::new("item")))?;
        text_element(&mut w, "title", &item.title)?;
        text_element(&mut w, "link", &item.link)?;
        text_element(&mut w, "guid", &item.link)?;
        text_element(&mut w, "pubDate", &format_pub_date(&item.published))?;
        if let Some(summary) = item.summary.as_deref().filter(|s| !s.is_empty()) {
            text_element(&mut w, "description", summary)?;
        }
        w.write_event(Event::End(BytesEnd::new("item")))?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))?;
    w.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceMeta {
        SourceMeta::new("acme", "Acme & Co", "https://acme.test", "Acme news")
    }

    fn item(link: &str, published: &str, summary: Option<&str>) -> StoredItem {
        StoredItem {
            link: link.to_string(),
            title: format!("Post {link}"),
            published: published.to_string(),
            summary: summary.map(str::to_string),
        }
    }

    fn render(items: &[StoredItem]) -> String {
        String::from_utf8(render_rss(&source(), items).unwrap()).unwrap()
    }

    #[test]
    fn pub_date_uses_rfc822() {
        assert_eq!(
            format_pub_date("2024-05-01T10:00:00.000000+00:00"),
            "Wed, 01 May 2024 10:00:00 +0000"
        );
    }

    #[test]
    fn unparseable_date_is_emitted_verbatim() {
        let xml = render(&[item("https://acme.test/a", "sometime in May", None)]);
        assert!(xml.contains("<pubDate>sometime in May</pubDate>"), "{xml}");
    }

    #[test]
    fn channel_and_items_are_escaped_and_ordered() {
        let xml = render(&[
            item("https://acme.test/b", "2024-05-02T10:00:00.000000+00:00", Some("B <i>x</i>")),
            item("https://acme.test/a", "2024-05-01T10:00:00.000000+00:00", None),
        ]);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>Acme &amp; Co</title>"));
        assert!(xml.contains("<guid>https://acme.test/b</guid>"));
        assert!(xml.contains("<description>B &lt;i&gt;x&lt;/i&gt;</description>"));
        let b = xml.find("acme.test/b").unwrap();
        let a = xml.find("acme.test/a").unwrap();
        assert!(b < a);
    }

    #[test]
    fn absent_summary_produces_no_description() {
        let xml = render(&[item("https://acme.test/a", "2024-05-01T10:00:00Z", None)]);
        // only the channel-level description
        assert_eq!(xml.matches("<description>").count(), 1);
    }

    #[test]
    fn empty_feed_still_has_channel() {
        let xml = render(&[]);
        assert!(xml.contains("<channel>"));
        assert!(!xml.contains("<item>"));
    }
}
