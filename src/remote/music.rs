//! HTTP music-search provider with lenient response normalization

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use super::{MusicProvider, Track};
use crate::{Error, Result};

/// Music search over `GET {endpoint}?keyword=..`
pub struct HttpMusicProvider {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpMusicProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::with_client(name, endpoint, reqwest::Client::new())
    }

    pub fn with_client(name: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl MusicProvider for HttpMusicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
        tracing::debug!("Searching {} for {:?}", self.name, keyword);

        let body: Value = self
            .client
            .get(&self.endpoint)
            .query(&[("keyword", keyword)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_tracks(&self.name, body)
    }
}

/// Track as returned by the various aggregator APIs
#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    id: Value,
    #[serde(alias = "title", alias = "songname", default)]
    name: String,
    #[serde(alias = "singer", alias = "author", default)]
    artist: String,
    #[serde(default)]
    album: String,
    #[serde(alias = "pic", alias = "picture", default)]
    cover: String,
    #[serde(alias = "src", alias = "music_url", default)]
    url: String,
    #[serde(alias = "lrc", default)]
    lyric: String,
}

impl RawTrack {
    fn into_track(self, source: &str) -> Option<Track> {
        let id = match self.id {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => self.url.clone(),
        };
        if self.name.trim().is_empty() || id.is_empty() {
            return None;
        }
        Some(Track {
            id,
            name: self.name,
            artist: self.artist,
            album: self.album,
            cover: self.cover,
            url: self.url,
            lyric: self.lyric,
            source: source.to_string(),
        })
    }
}

/// The result list may be the body itself or nested under a common wrapper key
fn result_list(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => ["data", "songs", "result", "list"]
            .iter()
            .find_map(|key| map.remove(*key))
            .and_then(result_list),
        _ => None,
    }
}

/// Normalize a provider response; unusable entries are skipped
pub fn parse_tracks(source: &str, body: Value) -> Result<Vec<Track>> {
    let items = result_list(body)
        .ok_or_else(|| Error::Validation(format!("{}: response has no result list", source)))?;

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawTrack>(item) {
            Ok(raw) => raw.into_track(source),
            Err(e) => {
                tracing::debug!("{}: skipping malformed track: {}", source, e);
                None
            }
        })
        .collect())
}
