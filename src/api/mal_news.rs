// MyAnimeList news RSS: fetch and parse feed items

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use tracing::warn;

use crate::error::{AyumiError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
    pub thumbnail: Option<String>,
}

#[derive(Default)]
struct NewsItemBuilder {
    title: Option<String>,
    link: Option<String>,
    description: String,
    pub_date: Option<String>,
    thumbnail: Option<String>,
}

impl NewsItemBuilder {
    fn build(self) -> Option<NewsItem> {
        let link = self.link.filter(|l| !l.is_empty())?;
        Some(NewsItem {
            title: self.title.unwrap_or_else(|| link.clone()),
            link,
            description: self.description,
            published: self
                .pub_date
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc)),
            thumbnail: self.thumbnail.filter(|t| !t.is_empty()),
        })
    }

    fn push_text(&mut self, element: &str, text: &str) {
        match element {
            "title" => self.title.get_or_insert_with(String::new).push_str(text),
            "link" => self.link.get_or_insert_with(String::new).push_str(text),
            "description" => self.description.push_str(text),
            "pubDate" => self.pub_date.get_or_insert_with(String::new).push_str(text),
            "media:thumbnail" => self.thumbnail.get_or_insert_with(String::new).push_str(text),
            _ => {}
        }
    }

    fn take_url_attr(&mut self, e: &BytesStart<'_>) {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"url" {
                self.thumbnail = Some(String::from_utf8_lossy(&attr.value).to_string());
            }
        }
    }
}

/// Items in feed order. `media:thumbnail` may carry the url as text or as an attribute.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<NewsItem>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<NewsItemBuilder> = None;
    let mut element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                element = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if element == "item" {
                    current = Some(NewsItemBuilder::default());
                } else if element == "media:thumbnail" {
                    if let Some(ref mut item) = current {
                        item.take_url_attr(&e);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"media:thumbnail" {
                    if let Some(ref mut item) = current {
                        item.take_url_attr(&e);
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    if let Some(item) = current.take().and_then(NewsItemBuilder::build) {
                        items.push(item);
                    }
                }
                element.clear();
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut item) = current {
                    let text = e.unescape().unwrap_or_default();
                    item.push_text(&element, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut item) = current {
                    let text = String::from_utf8_lossy(&e);
                    item.push_text(&element, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(AyumiError::api("RSS", format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// Decodes entities, strips tags and cuts to `limit` chars with a trailing ellipsis
pub fn clean_description(raw: &str, limit: usize) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let mut plain = String::with_capacity(decoded.len());
    let mut in_tag = false;
    for ch in decoded.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut: String = collapsed.chars().take(limit).collect();
    format!("{cut}...")
}

pub async fn fetch_feed(http: &Client, url: &str) -> Result<Vec<NewsItem>> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        warn!("RSS feed {} returned {}", url, status);
        return Err(AyumiError::api("RSS", status.to_string()));
    }
    let body = response.bytes().await?;
    parse_feed(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>MyAnimeList News</title>
    <link>https://myanimelist.net/news</link>
    <item>
      <title>Frieren Season 2 Announced</title>
      <link>https://myanimelist.net/news/1</link>
      <description><![CDATA[<p>The official website &amp; X account revealed...</p>]]></description>
      <pubDate>Tue, 14 Oct 2025 09:30:00 -0700</pubDate>
      <media:thumbnail>https://cdn.myanimelist.net/s/1.jpg</media:thumbnail>
    </item>
    <item>
      <title>Second &amp; Final</title>
      <link>https://myanimelist.net/news/2</link>
      <description>Plain text</description>
      <media:thumbnail url="https://cdn.myanimelist.net/s/2.jpg"/>
    </item>
    <item>
      <title>No link, skipped</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_items() {
        let items = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].title, "Frieren Season 2 Announced");
        assert_eq!(items[0].thumbnail.as_deref(), Some("https://cdn.myanimelist.net/s/1.jpg"));
        assert!(items[0].description.contains("&amp;"));
        assert_eq!(items[0].published.unwrap().to_rfc3339(), "2025-10-14T16:30:00+00:00");

        assert_eq!(items[1].title, "Second & Final");
        assert_eq!(items[1].thumbnail.as_deref(), Some("https://cdn.myanimelist.net/s/2.jpg"));
        assert!(items[1].published.is_none());
    }

    #[test]
    fn test_clean_description() {
        assert_eq!(
            clean_description("<p>The official website &amp; X   account</p>", 200),
            "The official website & X account..."
        );
        assert_eq!(clean_description("abcdef", 3), "abc...");
    }

    #[test]
    fn test_parse_garbage_is_error_or_empty() {
        let result = parse_feed(b"<rss><channel><item><title>x</title></channel>");
        assert!(result.map(|v| v.is_empty()).unwrap_or(true));
    }
}
