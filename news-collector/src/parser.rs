use crate::types::{Entry, FeedParse, FeedParseFailure};
use feed_rs::parser;
use patterns::{charset_param, declared_encoding};
use tracing::debug;

/// Feed parser backed by `feed-rs`.
///
/// Besides hard failures it reports two tolerated anomalies, both of which
/// still carry the parsed entries: a content type that does not look like
/// a feed, and an XML declaration whose encoding disagrees with the
/// transport charset.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedRsParser;

impl FeedRsParser {
    pub fn new() -> Self {
        Self
    }

    fn convert(entry: feed_rs::model::Entry) -> Option<Entry> {
        let link = entry.links.into_iter().next()?.href;
        let title = entry.title.map(|t| t.content).unwrap_or_default();

        Some(Entry {
            link,
            title,
            published: entry.published,
        })
    }

    fn anomaly(body: &[u8], content_type: Option<&str>) -> Option<String> {
        let content_type = content_type?.to_ascii_lowercase();
        let media_type = content_type.split(';').next().unwrap_or("").trim();

        let feedish = ["xml", "rss", "atom", "json"]
            .iter()
            .any(|marker| media_type.contains(marker));
        if !feedish {
            return Some(format!("non-XML content type {:?}", media_type));
        }

        let head = String::from_utf8_lossy(&body[..body.len().min(256)]);
        if let (Some(transport), Some(declared)) =
            (charset_param(&content_type), declared_encoding(&head))
        {
            if !transport.eq_ignore_ascii_case(&declared) {
                return Some(format!(
                    "document declared as {} but parsed as {}",
                    declared, transport
                ));
            }
        }

        None
    }
}

impl FeedParse for FeedRsParser {
    fn parse(&self, body: &[u8], content_type: Option<&str>) -> Result<Vec<Entry>, FeedParseFailure> {
        debug!("Parsing feed content ({} bytes)", body.len());

        let feed = parser::parse(body)
            .map_err(|e| FeedParseFailure::fatal(format!("Failed to parse feed: {}", e)))?;

        let entries: Vec<Entry> = feed.entries.into_iter().filter_map(Self::convert).collect();
        debug!("Parsed feed with {} entries", entries.len());

        match Self::anomaly(body, content_type) {
            Some(reason) => Err(FeedParseFailure::benign(reason, entries)),
            None => Ok(entries),
        }
    }
}

mod patterns {
    use regex::Regex;
    use std::sync::OnceLock;

    fn charset_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r#"charset\s*=\s*"?([A-Za-z0-9._-]+)"#).unwrap())
    }

    fn declaration_re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r#"<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9._-]+)["']"#).unwrap()
        })
    }

    pub fn charset_param(content_type: &str) -> Option<String> {
        charset_re()
            .captures(content_type)
            .map(|c| c[1].to_string())
    }

    pub fn declared_encoding(head: &str) -> Option<String> {
        declaration_re().captures(head).map(|c| c[1].to_string())
    }
}
