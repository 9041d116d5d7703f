use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

use crate::error::LookupError;

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Resolves a video ID to its title.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// `Ok(None)` means the service answered but knows no such video.
    async fn fetch_title(&self, video_id: &str) -> Result<Option<String>, LookupError>;
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "totalResults", default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
}

/// `videos.list` client for the YouTube Data API v3
pub struct DataApi {
    client: reqwest::Client,
    api_key: String,
    locale: String,
    endpoint: String,
}

impl DataApi {
    pub fn new(api_key: impl Into<String>, locale: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            locale: locale.into(),
            endpoint: VIDEOS_ENDPOINT.to_string(),
        })
    }
}

#[async_trait]
impl MetadataLookup for DataApi {
    async fn fetch_title(&self, video_id: &str) -> Result<Option<String>, LookupError> {
        debug!("Requesting snippet for video {video_id}");

        // without_url() keeps the API key out of error messages
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("hl", self.locale.as_str()),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::Status { status, body });
        }

        let list: VideoListResponse = resp.json().await.map_err(reqwest::Error::without_url)?;
        title_from_response(list, video_id)
    }
}

fn title_from_response(list: VideoListResponse, video_id: &str) -> Result<Option<String>, LookupError> {
    let total = list.page_info.map_or(0, |p| p.total_results);
    if total == 0 {
        debug!("No video found for {video_id}");
        return Ok(None);
    }

    list.items
        .into_iter()
        .next()
        .map(|item| Some(item.snippet.title))
        .ok_or_else(|| LookupError::MissingItem(video_id.to_string()))
}
