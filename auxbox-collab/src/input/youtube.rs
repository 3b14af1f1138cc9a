use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::{InputError, TrackDetails};
use crate::util::URL_SCHEME_REGEX;

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

lazy_static! {
    static ref ISO8601_DURATION_REGEX: Regex =
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("duration regex compiles");
}

/// A YouTube video reference extracted from a user-supplied URL.
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubeVideoInput {
    pub id: String,
}

impl YouTubeVideoInput {
    /// Returns true if the query is one of the accepted YouTube URL shapes.
    pub fn test(query: &str) -> bool {
        Self::extract_id(query).is_some()
    }

    pub fn from_query(query: &str) -> Result<Self, InputError> {
        Self::extract_id(query)
            .map(|id| Self { id })
            .ok_or_else(|| InputError::Invalid("Unrecognized YouTube URL".to_string()))
    }

    pub async fn resolve(&self, metadata: &MetadataClient) -> Result<TrackDetails, InputError> {
        metadata.video_details(&self.id).await
    }

    /// Accepts watch URLs, youtu.be short links, and embed or /v/ paths.
    /// The scheme is optional.
    fn extract_id(query: &str) -> Option<String> {
        let normalized = URL_SCHEME_REGEX.replace(query, "https://");
        let url = Url::parse(&normalized).ok()?;
        let host = url.host_str()?;

        if host == "youtu.be" {
            return first_segment(url.path());
        }

        if !host.ends_with("youtube.com") {
            return None;
        }

        if url.path() == "/watch" {
            return url
                .query_pairs()
                .find(|(key, value)| key == "v" && !value.is_empty())
                .map(|(_, value)| value.into_owned());
        }

        for prefix in ["/embed/", "/v/"] {
            if let Some(rest) = url.path().strip_prefix(prefix) {
                return first_segment(rest);
            }
        }

        None
    }
}

fn first_segment(path: &str) -> Option<String> {
    let segment = path.trim_start_matches('/').split('/').next()?;

    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

/// Parses an ISO-8601 duration like `PT1H2M3S` into whole seconds.
pub fn parse_iso8601_duration(value: &str) -> Option<u32> {
    let captures = ISO8601_DURATION_REGEX.captures(value)?;

    let part = |index: usize| {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };

    Some(part(1) * 3600 + part(2) * 60 + part(3))
}

/// Client for the YouTube Data API v3, used to resolve video ids into
/// titles, thumbnails, and durations.
pub struct MetadataClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    #[serde(rename = "default")]
    fallback: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

impl MetadataClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Fetches the snippet and content details of a single video.
    pub async fn video_details(&self, video_id: &str) -> Result<TrackDetails, InputError> {
        let response = self
            .http
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("id", video_id),
                ("part", "snippet,contentDetails"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| InputError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(InputError::Fetch(format!(
                "metadata lookup returned {}",
                response.status()
            )));
        }

        let body: VideoListResponse = response
            .json()
            .await
            .map_err(|e| InputError::Parse(e.to_string()))?;

        let video = body.items.into_iter().next().ok_or(InputError::NotFound)?;

        let duration_secs = parse_iso8601_duration(&video.content_details.duration)
            .ok_or_else(|| {
                InputError::Parse(format!(
                    "invalid duration {}",
                    video.content_details.duration
                ))
            })?;

        let thumbnail = video
            .snippet
            .thumbnails
            .high
            .or(video.snippet.thumbnails.fallback)
            .map(|t| t.url)
            .unwrap_or_default();

        Ok(TrackDetails {
            video_id: video.id,
            title: video.snippet.title,
            thumbnail,
            duration_secs,
        })
    }
}
