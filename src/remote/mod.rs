//! Outbound collaborators: music search providers and a translation endpoint
//!
//! Every provider is untrusted and fails on its own. [`search_all`] queries
//! them concurrently and never lets one failure hide another's results.

pub mod music;
pub mod translate;

pub use music::HttpMusicProvider;
pub use translate::Translator;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use crate::Result;

/// A normalized search result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    /// Cover image URL
    #[serde(default)]
    pub cover: String,
    /// Playable audio URL
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub lyric: String,
    /// Provider that returned the track
    #[serde(default)]
    pub source: String,
}

#[async_trait]
pub trait MusicProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, keyword: &str) -> Result<Vec<Track>>;
}

/// One provider that failed during an aggregate search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
}

/// Merged results of an aggregate search
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    pub tracks: Vec<Track>,
    pub failures: Vec<ProviderFailure>,
}

/// Query every provider concurrently.
///
/// Results keep provider order. Tracks without a playable URL are dropped,
/// as are repeats of the same provider+id.
pub async fn search_all(providers: &[Box<dyn MusicProvider>], keyword: &str) -> AggregateResult {
    let results = join_all(providers.iter().map(|p| p.search(keyword))).await;

    let mut aggregate = AggregateResult::default();
    let mut seen = std::collections::HashSet::new();

    for (provider, result) in providers.iter().zip(results) {
        match result {
            Ok(tracks) => {
                let found = tracks.len();
                for mut track in tracks {
                    if track.url.is_empty() {
                        continue;
                    }
                    if track.source.is_empty() {
                        track.source = provider.name().to_string();
                    }
                    if seen.insert((track.source.clone(), track.id.clone())) {
                        aggregate.tracks.push(track);
                    }
                }
                tracing::debug!("{} returned {} tracks", provider.name(), found);
            }
            Err(e) => {
                tracing::warn!("Music provider {} failed: {}", provider.name(), e);
                aggregate.failures.push(ProviderFailure {
                    provider: provider.name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    aggregate
}
