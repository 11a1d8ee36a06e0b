use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::{CandidateItem, FetchContract, FetchError, FetchResult};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fetcher that reads an upstream RSS 2.0 document and republishes its items.
pub struct UpstreamRssFetcher {
    source: String,
    mode: Mode,
}

enum Mode {
    // Own copy of the document, so tests can pass any &str.
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl UpstreamRssFetcher {
    pub fn from_url(
        source: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            source: source.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    pub fn from_fixture(source: impl Into<String>, xml: &str) -> Self {
        Self {
            source: source.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items(&self, xml: &str, since: DateTime<Utc>) -> FetchResult {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).map_err(|e| FetchError::Parse(e.to_string()))?;
        let now = Utc::now();

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let Some(link) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
            else {
                continue;
            };
            let title = it
                .title
                .as_deref()
                .map(normalize_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| link.clone());

            // Undated or badly dated entries count as seen now.
            let published = it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822_utc)
                .unwrap_or(now);
            if published <= since {
                continue;
            }

            let summary = it
                .description
                .as_deref()
                .map(normalize_text)
                .filter(|s| !s.is_empty());

            out.push(CandidateItem::new(
                link.clone(),
                title,
                link,
                published,
                summary,
            ));
        }
        Ok(out)
    }

    fn report(&self, err: FetchError) -> FetchError {
        tracing::warn!(target: "ingest", source = %self.source, error = %err, "upstream feed error");
        counter!("feed_upstream_errors_total", "source" => self.source.clone()).increment(1);
        err
    }
}

#[async_trait]
impl FetchContract for UpstreamRssFetcher {
    async fn fetch(&self, since: DateTime<Utc>) -> FetchResult {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| self.report(FetchError::Http(e.to_string())))?;
                resp.text()
                    .await
                    .map_err(|e| self.report(FetchError::Http(e.to_string())))?
            }
        };
        self.parse_items(&body, since).map_err(|e| self.report(e))
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_dates_are_converted_to_utc() {
        let got = parse_rfc2822_utc("Wed, 01 May 2024 12:00:00 +0200").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert!(parse_rfc2822_utc("yesterday").is_none());
    }

    #[test]
    fn scrub_replaces_html_only_entities() {
        assert_eq!(
            scrub_html_entities_for_xml("a&nbsp;b &mdash; &amp;"),
            "a b - &amp;"
        );
    }
}
