// Atom rendering of a single forecast
use crate::forecast::ForecastRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
pub const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid server url {url}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
}

// Feed-level text and the entry content template
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub server_url: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub entry_summary: String,
    /// Supports `{temp}`, `{locality}` and `{observed}`.
    pub content_template: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8090".to_string(),
            title: "Weather RSS".to_string(),
            subtitle: "Weather forecast delivered as an RSS feed".to_string(),
            author: "Yandex".to_string(),
            entry_summary: "Прогноз погоды".to_string(),
            content_template: "<p>{temp}ºC</p>".to_string(),
        }
    }
}

// Structures for Atom serialization
#[derive(Debug, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename = "feed")]
pub struct AtomFeed {
    #[serde(rename = "@xmlns", default)]
    pub xmlns: String,
    pub title: String,
    pub id: String,
    pub updated: String,
    pub subtitle: String,
    pub link: AtomLink,
    #[serde(rename = "entry", default)]
    pub entries: Vec<AtomEntry>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
pub struct AtomEntry {
    pub title: String,
    pub updated: String,
    pub id: String,
    pub content: AtomText,
    pub link: AtomLink,
    pub summary: AtomText,
    pub author: AtomPerson,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
pub struct AtomLink {
    #[serde(rename = "@href")]
    pub href: String,
    #[serde(rename = "@rel", default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
pub struct AtomText {
    #[serde(rename = "@type")]
    pub text_type: String,
    #[serde(rename = "$value", default)]
    pub value: String,
}

#[derive(Debug, PartialEq, Default, Deserialize, Clone, Serialize)]
pub struct AtomPerson {
    pub name: String,
}

pub struct FeedRenderer {
    settings: FeedSettings,
    feed_url: Url,
    // Tagging entity for entry ids; IP hosts do not qualify
    tag_authority: Option<String>,
}

impl FeedRenderer {
    pub fn new(settings: FeedSettings) -> Result<Self, RenderError> {
        let invalid = |reason: String| RenderError::InvalidServerUrl {
            url: settings.server_url.clone(),
            reason,
        };

        let feed_url = Url::parse(&format!(
            "{}/feed",
            settings.server_url.trim_end_matches('/')
        ))
        .map_err(|e| invalid(e.to_string()))?;
        let tag_authority = match feed_url.host() {
            Some(Host::Domain(domain)) => Some(domain.to_string()),
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => None,
            None => return Err(invalid("missing host".to_string())),
        };

        Ok(Self {
            settings,
            feed_url,
            tag_authority,
        })
    }

    // Self link of the feed served under `slug`
    pub fn feed_link(&self, slug: &str) -> String {
        let mut link = self.feed_url.clone();
        link.query_pairs_mut().append_pair("slug", slug);
        link.to_string()
    }

    pub fn render(
        &self,
        slug: &str,
        record: &ForecastRecord,
        now: DateTime<Utc>,
    ) -> Result<String, RenderError> {
        let updated = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let feed_link = self.feed_link(slug);
        let content = expand_template(&self.settings.content_template, record)?;

        let entry = AtomEntry {
            title: format!(
                "{} - погода на {}",
                record.locality_name, record.observation_timestamp
            ),
            updated: updated.clone(),
            id: self.entry_id(slug, record, now, &feed_link),
            content: AtomText {
                text_type: "html".to_string(),
                value: content,
            },
            link: AtomLink {
                href: record.source_url.clone(),
                rel: Some("alternate".to_string()),
            },
            summary: AtomText {
                text_type: "html".to_string(),
                value: self.settings.entry_summary.clone(),
            },
            author: AtomPerson {
                name: self.settings.author.clone(),
            },
        };

        let feed = AtomFeed {
            xmlns: ATOM_NAMESPACE.to_string(),
            title: self.settings.title.clone(),
            id: feed_link.clone(),
            updated,
            subtitle: self.settings.subtitle.clone(),
            link: AtomLink {
                href: feed_link,
                rel: Some("self".to_string()),
            },
            entries: vec![entry],
        };

        let body = quick_xml::se::to_string(&feed)
            .map_err(|e| RenderError::Serialize(e.to_string()))?;

        Ok(format!("{}{}", XML_DECLARATION, body))
    }

    fn entry_id(
        &self,
        slug: &str,
        record: &ForecastRecord,
        now: DateTime<Utc>,
        feed_link: &str,
    ) -> String {
        match &self.tag_authority {
            Some(authority) => format!(
                "tag:{},{}:/feed/{}/{}",
                authority,
                now.format("%Y-%m-%d"),
                slug,
                record.locality_id
            ),
            None => feed_link.to_string(),
        }
    }
}

// Substitutes `{name}` placeholders with forecast values
fn expand_template(template: &str, record: &ForecastRecord) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find(&['{', '}'][..]) {
        if rest[open..].starts_with('}') {
            return Err(RenderError::Template(format!(
                "unmatched '}}' in {:?}",
                template
            )));
        }

        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| RenderError::Template(format!("unclosed placeholder in {:?}", template)))?;

        match &after[..close] {
            "temp" => out.push_str(&record.temperature.to_string()),
            "locality" => out.push_str(&record.locality_name),
            "observed" => out.push_str(&record.observation_timestamp),
            other => {
                return Err(RenderError::Template(format!(
                    "unknown placeholder {{{}}}",
                    other
                )))
            }
        }

        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn record() -> ForecastRecord {
        ForecastRecord {
            temperature: 5,
            observation_timestamp: "2024-01-01T00:00".to_string(),
            source_url: "http://example/info".to_string(),
            locality_name: "Moscow".to_string(),
            locality_id: 213,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 3, 4, 5).unwrap()
    }

    fn renderer() -> FeedRenderer {
        FeedRenderer::new(FeedSettings::default()).unwrap()
    }

    #[test]
    fn test_render_round_trip() {
        let xml = renderer().render("moscow", &record(), now()).unwrap();

        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("5ºC"));

        let feed: AtomFeed = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert!(entry.title.contains("Moscow"));
        assert!(entry.title.contains("2024-01-01T00:00"));
        assert_eq!(entry.link.href, "http://example/info");
        assert_eq!(entry.content.value, "<p>5ºC</p>");
        assert_eq!(entry.content.text_type, "html");
        assert_eq!(entry.author.name, "Yandex");
    }

    #[test]
    fn test_feed_links_back_to_itself() {
        let xml = renderer().render("moscow", &record(), now()).unwrap();
        let feed: AtomFeed = quick_xml::de::from_str(&xml).unwrap();

        assert_eq!(feed.link.href, "http://localhost:8090/feed?slug=moscow");
        assert_eq!(feed.link.rel.as_deref(), Some("self"));
        assert_eq!(feed.entries[0].link.rel.as_deref(), Some("alternate"));
        assert_eq!(feed.id, feed.link.href);
        assert_eq!(feed.title, "Weather RSS");
    }

    #[test]
    fn test_slug_is_query_encoded() {
        let renderer = FeedRenderer::new(FeedSettings {
            server_url: "https://feeds.example.org/".to_string(),
            ..FeedSettings::default()
        })
        .unwrap();

        assert_eq!(
            renderer.feed_link("new york&co"),
            "https://feeds.example.org/feed?slug=new+york%26co"
        );
    }

    #[test]
    fn test_timestamps_come_from_one_instant() {
        let xml = renderer().render("moscow", &record(), now()).unwrap();
        let feed: AtomFeed = quick_xml::de::from_str(&xml).unwrap();

        assert_eq!(feed.updated, "2024-01-01T03:04:05Z");
        assert_eq!(feed.entries[0].updated, feed.updated);
        assert_eq!(feed.entries[0].id, "tag:localhost,2024-01-01:/feed/moscow/213");
    }

    #[test_case("http://[::1]:8090", "http://[::1]:8090/feed?slug=moscow" ; "ipv6 host")]
    #[test_case("http://127.0.0.1:8090", "http://127.0.0.1:8090/feed?slug=moscow" ; "ipv4 host")]
    fn test_ip_host_entry_id_falls_back_to_feed_link(server_url: &str, expected: &str) {
        let renderer = FeedRenderer::new(FeedSettings {
            server_url: server_url.to_string(),
            ..FeedSettings::default()
        })
        .unwrap();

        let xml = renderer.render("moscow", &record(), now()).unwrap();
        let feed: AtomFeed = quick_xml::de::from_str(&xml).unwrap();

        assert_eq!(feed.link.href, expected);
        assert_eq!(feed.entries[0].id, expected);
        assert!(!feed.entries[0].id.starts_with("tag:"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = renderer();
        let first = renderer.render("moscow", &record(), now()).unwrap();
        let second = renderer.render("moscow", &record(), now()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_markup_in_record_is_escaped() {
        let mut record = record();
        record.locality_name = "Rock & <Roll>".to_string();

        let xml = renderer().render("rock", &record, now()).unwrap();
        assert!(!xml.contains("<Roll>"));

        let feed: AtomFeed = quick_xml::de::from_str(&xml).unwrap();
        assert!(feed.entries[0].title.starts_with("Rock & <Roll>"));
    }

    #[test]
    fn test_template_placeholders() {
        let text = expand_template("{locality}: {temp}° at {observed}", &record()).unwrap();
        assert_eq!(text, "Moscow: 5° at 2024-01-01T00:00");
    }

    #[test_case("<p>{temp</p>" ; "unclosed placeholder")]
    #[test_case("<p>temp}</p>" ; "stray closing brace")]
    #[test_case("<p>{humidity}%</p>" ; "unknown placeholder")]
    fn test_malformed_template_is_render_error(template: &str) {
        let renderer = FeedRenderer::new(FeedSettings {
            content_template: template.to_string(),
            ..FeedSettings::default()
        })
        .unwrap();

        let result = renderer.render("moscow", &record(), now());
        assert!(matches!(result, Err(RenderError::Template(_))));
    }

    #[test]
    fn test_invalid_server_url() {
        let result = FeedRenderer::new(FeedSettings {
            server_url: "not a url".to_string(),
            ..FeedSettings::default()
        });
        assert!(matches!(result, Err(RenderError::InvalidServerUrl { .. })));
    }
}
