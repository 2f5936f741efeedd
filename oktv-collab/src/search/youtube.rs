use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchError, SearchProvider, VideoResult};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// Searches videos through the YouTube Data API v3.
pub struct YouTubeSearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.default
            .or(self.medium)
            .or(self.high)
            .map(|thumb| thumb.url)
    }
}

impl YouTubeSearch {
    pub fn new(api_key: &str, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            max_results,
        }
    }
}

#[async_trait]
impl SearchProvider for YouTubeSearch {
    async fn search(&self, query: &str) -> Result<Vec<VideoResult>, SearchError> {
        let query = query.trim();

        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if self.api_key.is_empty() {
            return Err(SearchError::NotConfigured("missing api key"));
        }

        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", &self.max_results.to_string()),
                ("q", query),
                ("key", &self.api_key),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| SearchError::FetchError(err.to_string()))?;

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|err| SearchError::ParseError(err.to_string()))?;

        Ok(parse_results(body))
    }
}

fn parse_results(body: SearchResponse) -> Vec<VideoResult> {
    body.items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;

            Some(VideoResult {
                video_id,
                title: decode_entities(&item.snippet.title),
                thumbnail: item.snippet.thumbnails.best().unwrap_or_default(),
                channel: decode_entities(&item.snippet.channel_title),
            })
        })
        .collect()
}

/// The search endpoint html-escapes titles. Decode the entities it actually
/// emits so queue entries read naturally.
fn decode_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_html_entities() {
        assert_eq!(
            decode_entities("Don&#39;t Stop Me Now &amp; More"),
            "Don't Stop Me Now & More"
        );
        assert_eq!(decode_entities("&quot;A&quot; &lt;B&gt;"), "\"A\" <B>");
    }

    #[test]
    fn parses_search_response() {
        let body: SearchResponse = serde_json::from_str(
            r#"{
                "items": [
                    {
                        "id": { "kind": "youtube#video", "videoId": "abc" },
                        "snippet": {
                            "title": "Song &amp; Dance",
                            "channelTitle": "SomeChannel",
                            "thumbnails": {
                                "default": { "url": "https://img/default.jpg" },
                                "high": { "url": "https://img/high.jpg" }
                            }
                        }
                    },
                    {
                        "id": { "kind": "youtube#channel" },
                        "snippet": {
                            "title": "Not a video",
                            "channelTitle": "Other"
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        let results = parse_results(body);

        assert_eq!(
            results,
            vec![VideoResult {
                video_id: "abc".to_string(),
                title: "Song & Dance".to_string(),
                thumbnail: "https://img/default.jpg".to_string(),
                channel: "SomeChannel".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn empty_query_and_missing_key_are_rejected() {
        let search = YouTubeSearch::new("key", 5);
        assert!(matches!(
            search.search("  ").await,
            Err(SearchError::EmptyQuery)
        ));

        let unconfigured = YouTubeSearch::new("", 5);
        assert!(matches!(
            unconfigured.search("queen").await,
            Err(SearchError::NotConfigured(_))
        ));
    }
}
