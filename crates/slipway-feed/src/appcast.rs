//! Appcast feed maintenance
//!
//! Inserts a new `<item>` into the Sparkle appcast. The item lands after the
//! channel metadata elements (title, link, description, language) and before
//! any existing item, so the newest release is always the first entry Sparkle
//! sees. The rest of the document passes through untouched.

use std::path::Path;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};

use slipway_core::{ReleaseConfig, RollbackManager};
use slipway_version::VersionPair;

use crate::error::{FeedError, Result};
use crate::signature::SparkleSignature;

/// Default location of the appcast feed, relative to the repository root.
pub const APPCAST_PATH: &str = "appcast.xml";

/// One fully-resolved feed entry, ready to serialize.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub build: u64,
    pub marketing_version: String,
    pub minimum_system_version: String,
    /// Rendered HTML release notes, emitted inside a CDATA section.
    pub description_html: String,
    /// RFC-822 publication date, always in +0000.
    pub pub_date: String,
    pub enclosure_url: String,
    pub ed_signature: String,
    pub length: u64,
}

impl FeedEntry {
    pub fn new(
        config: &ReleaseConfig,
        pair: &VersionPair,
        signature: &SparkleSignature,
        description_html: String,
    ) -> Self {
        Self {
            title: pair.header(),
            link: config.website_url.clone(),
            build: pair.build,
            marketing_version: pair.marketing.clone(),
            minimum_system_version: config.minimum_system_version.clone(),
            description_html,
            pub_date: format_pub_date(Utc::now()),
            enclosure_url: config.download_url(&pair.marketing),
            ed_signature: signature.ed_signature.clone(),
            length: signature.length,
        }
    }
}

/// Format a timestamp the way RSS readers expect: RFC-822 with a literal
/// +0000 offset.
pub fn format_pub_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// Insert the entry into an appcast document and return the rewritten XML.
pub fn insert_entry(document: &str, entry: &FeedEntry) -> Result<String> {
    let mut reader = Reader::from_str(document);
    let mut events: Vec<Event<'static>> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            ev => events.push(ev.into_owned()),
        }
    }

    let insert_at = insertion_index(&events)?;

    let mut writer = Writer::new(Vec::new());
    for ev in &events[..insert_at] {
        writer.write_event(ev.clone())?;
    }
    for ev in entry_events(entry) {
        writer.write_event(ev)?;
    }
    for ev in &events[insert_at..] {
        writer.write_event(ev.clone())?;
    }

    let out = writer.into_inner();
    String::from_utf8(out).map_err(|e| FeedError::Io(std::io::Error::other(e)))
}

/// Rewrite the appcast on disk, backing it up first so a later failure can
/// restore the previous feed.
pub fn update_feed(
    path: &Path,
    entry: &FeedEntry,
    rollback: &mut RollbackManager,
) -> Result<()> {
    debug!(path = %path.display(), version = %entry.marketing_version, "updating appcast");
    rollback.backup(path)?;
    let document = std::fs::read_to_string(path)?;
    let rewritten = insert_entry(&document, entry)?;
    std::fs::write(path, rewritten)?;
    info!(path = %path.display(), "appcast updated");
    Ok(())
}

/// Event index at which the new item belongs: just after the last channel
/// metadata element, stopping at the first existing item.
fn insertion_index(events: &[Event<'static>]) -> Result<usize> {
    let channel_start = events
        .iter()
        .position(|ev| matches!(ev, Event::Start(s) if s.local_name().as_ref() == b"channel"))
        .ok_or(FeedError::ChannelNotFound)?;

    let mut insert_at = channel_start + 1;
    let mut depth: usize = 0;
    let mut open_child: Option<Vec<u8>> = None;

    for (i, ev) in events.iter().enumerate().skip(channel_start + 1) {
        match ev {
            Event::Start(s) => {
                if depth == 0 {
                    if s.local_name().as_ref() == b"item" {
                        break;
                    }
                    open_child = Some(s.local_name().as_ref().to_vec());
                }
                depth += 1;
            }
            Event::End(e) => {
                if depth == 0 {
                    // End of the channel itself.
                    debug_assert_eq!(e.local_name().as_ref(), b"channel");
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(name) = open_child.take() {
                        if is_channel_metadata(&name) {
                            insert_at = i + 1;
                        }
                    }
                }
            }
            Event::Empty(s) if depth == 0 => {
                if s.local_name().as_ref() == b"item" {
                    break;
                }
                if is_channel_metadata(s.local_name().as_ref()) {
                    insert_at = i + 1;
                }
            }
            _ => {}
        }
    }

    Ok(insert_at)
}

fn is_channel_metadata(name: &[u8]) -> bool {
    matches!(name, b"title" | b"link" | b"description" | b"language")
}

fn elem(name: &'static str, value: &str, indent: &'static str) -> Vec<Event<'static>> {
    vec![
        Event::Text(BytesText::new(indent).into_owned()),
        Event::Start(BytesStart::new(name)),
        Event::Text(BytesText::new(value).into_owned()),
        Event::End(BytesEnd::new(name)),
    ]
}

/// Serialized form of the entry, indented to sit inside `<channel>`.
fn entry_events(entry: &FeedEntry) -> Vec<Event<'static>> {
    const ITEM_INDENT: &str = "\n        ";
    const CHILD_INDENT: &str = "\n            ";

    let mut events = vec![
        Event::Text(BytesText::new(ITEM_INDENT).into_owned()),
        Event::Start(BytesStart::new("item")),
    ];
    events.extend(elem("title", &entry.title, CHILD_INDENT));
    events.extend(elem("link", &entry.link, CHILD_INDENT));
    events.extend(elem(
        "sparkle:version",
        &entry.build.to_string(),
        CHILD_INDENT,
    ));
    events.extend(elem(
        "sparkle:shortVersionString",
        &entry.marketing_version,
        CHILD_INDENT,
    ));
    events.extend(elem(
        "sparkle:minimumSystemVersion",
        &entry.minimum_system_version,
        CHILD_INDENT,
    ));

    events.push(Event::Text(BytesText::new(CHILD_INDENT).into_owned()));
    events.push(Event::Start(BytesStart::new("description")));
    events.push(Event::CData(BytesCData::new(entry.description_html.clone())));
    events.push(Event::End(BytesEnd::new("description")));

    events.extend(elem("pubDate", &entry.pub_date, CHILD_INDENT));

    let mut enclosure = BytesStart::new("enclosure");
    enclosure.push_attribute(("url", entry.enclosure_url.as_str()));
    enclosure.push_attribute(("sparkle:edSignature", entry.ed_signature.as_str()));
    enclosure.push_attribute(("length", entry.length.to_string().as_str()));
    enclosure.push_attribute(("type", "application/octet-stream"));
    events.push(Event::Text(BytesText::new(CHILD_INDENT).into_owned()));
    events.push(Event::Empty(enclosure));

    events.push(Event::Text(BytesText::new(ITEM_INDENT).into_owned()));
    events.push(Event::End(BytesEnd::new("item")));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry() -> FeedEntry {
        FeedEntry {
            title: "Version 1.2.3 (46)".to_string(),
            link: "https://example.com".to_string(),
            build: 46,
            marketing_version: "1.2.3".to_string(),
            minimum_system_version: "15.0".to_string(),
            description_html: "<h2>Changes</h2>\n<ul>\n<li>Fixed a bug</li>\n</ul>".to_string(),
            pub_date: "Thu, 02 Jan 2025 03:04:05 +0000".to_string(),
            enclosure_url:
                "https://github.com/acme/app/releases/download/v1.2.3/App_v1.2.3.dmg".to_string(),
            ed_signature: "sigsigsig==".to_string(),
            length: 1024,
        }
    }

    const FEED_WITH_ITEM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
    <channel>
        <title>App Updates</title>
        <link>https://example.com</link>
        <description>Latest updates</description>
        <language>en</language>
        <item>
            <title>Version 1.2.2 (45)</title>
        </item>
    </channel>
</rss>"#;

    #[test]
    fn inserts_before_existing_items() {
        let out = insert_entry(FEED_WITH_ITEM, &sample_entry()).unwrap();
        let new_pos = out.find("Version 1.2.3 (46)").unwrap();
        let old_pos = out.find("Version 1.2.2 (45)").unwrap();
        assert!(new_pos < old_pos, "new item must precede older items");
    }

    #[test]
    fn inserts_after_channel_metadata() {
        let out = insert_entry(FEED_WITH_ITEM, &sample_entry()).unwrap();
        let language_pos = out.find("<language>").unwrap();
        let item_pos = out.find("<item>").unwrap();
        assert!(language_pos < item_pos, "metadata must stay ahead of items");
    }

    #[test]
    fn inserts_into_feed_without_items() {
        let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
    <channel>
        <title>App Updates</title>
        <link>https://example.com</link>
    </channel>
</rss>"#;
        let out = insert_entry(feed, &sample_entry()).unwrap();
        assert!(out.contains("<item>"));
        let link_pos = out.find("<link>https://example.com</link>").unwrap();
        let item_pos = out.find("<item>").unwrap();
        assert!(link_pos < item_pos);
    }

    #[test]
    fn missing_channel_is_fatal() {
        let doc = r#"<?xml version="1.0"?><rss version="2.0"></rss>"#;
        let err = insert_entry(doc, &sample_entry()).unwrap_err();
        assert!(matches!(err, FeedError::ChannelNotFound));
    }

    #[test]
    fn release_notes_live_in_cdata() {
        let out = insert_entry(FEED_WITH_ITEM, &sample_entry()).unwrap();
        assert!(out.contains("<![CDATA[<h2>Changes</h2>"));
    }

    #[test]
    fn enclosure_carries_signature_attributes() {
        let out = insert_entry(FEED_WITH_ITEM, &sample_entry()).unwrap();
        assert!(out.contains(r#"sparkle:edSignature="sigsigsig==""#));
        assert!(out.contains(r#"length="1024""#));
        assert!(out.contains(r#"type="application/octet-stream""#));
    }

    #[test]
    fn pub_date_is_rfc822_in_utc() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_pub_date(at), "Thu, 02 Jan 2025 03:04:05 +0000");
    }

    #[test]
    fn feed_update_backs_up_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appcast.xml");
        std::fs::write(&path, FEED_WITH_ITEM).unwrap();

        let mut rollback = RollbackManager::new();
        update_feed(&path, &sample_entry(), &mut rollback).unwrap();

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("Version 1.2.3 (46)"));

        let report = rollback.rollback();
        assert_eq!(report.failures(), 0);
        let restored = std::fs::read_to_string(&path).unwrap();
        assert_eq!(restored, FEED_WITH_ITEM);
    }
}
