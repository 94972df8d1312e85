//! Music player state: playlist, current track and play mode

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::remote::Track;
use crate::storage::KeyValueStore;
use crate::{Error, Result};

pub const PLAY_MODE_KEY: &str = "playMode";
pub const PLAYLIST_KEY: &str = "musicPlaylist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// Play in order, wrapping at either end
    #[default]
    Sequence,
    RepeatOne,
    Shuffle,
}

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayMode::Sequence => "sequence",
            PlayMode::RepeatOne => "repeat-one",
            PlayMode::Shuffle => "shuffle",
        }
    }

    /// Sequence -> RepeatOne -> Shuffle -> Sequence
    pub fn cycle(self) -> Self {
        match self {
            PlayMode::Sequence => PlayMode::RepeatOne,
            PlayMode::RepeatOne => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Sequence,
        }
    }
}

impl std::str::FromStr for PlayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequence" | "order" | "list" => Ok(PlayMode::Sequence),
            "repeat-one" | "single" | "loop" => Ok(PlayMode::RepeatOne),
            "shuffle" | "random" => Ok(PlayMode::Shuffle),
            _ => Err(Error::Validation(format!("Unknown play mode: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Player {
    tracks: Vec<Track>,
    current: Option<usize>,
    mode: PlayMode,
}

impl Player {
    pub fn new(tracks: Vec<Track>, mode: PlayMode) -> Self {
        Self { tracks, current: None, mode }
    }

    /// Restore the playlist and mode; unreadable values fall back to defaults
    pub async fn load(kv: &KeyValueStore) -> Result<Self> {
        let mode = match kv.get(PLAY_MODE_KEY).await? {
            Some(Value::String(s)) => s.parse::<PlayMode>().unwrap_or_else(|e| {
                tracing::warn!("{}", e);
                PlayMode::default()
            }),
            _ => PlayMode::default(),
        };

        let tracks = match kv.get_as::<Vec<Track>>(PLAYLIST_KEY).await {
            Ok(tracks) => tracks.unwrap_or_default(),
            Err(Error::Corrupt { reason, .. }) => {
                tracing::warn!("Corrupt playlist ({}), starting empty", reason);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(Self::new(tracks, mode))
    }

    pub async fn save(&self, kv: &KeyValueStore) -> Result<()> {
        kv.set(PLAY_MODE_KEY, Value::String(self.mode.as_str().to_string())).await?;
        kv.set_as(PLAYLIST_KEY, &self.tracks).await
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Jump to `index`
    pub fn play(&mut self, index: usize) -> Option<&Track> {
        if index < self.tracks.len() {
            self.current = Some(index);
        }
        self.current()
    }

    pub fn enqueue(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Remove the track at `index`; `current` keeps pointing at the same
    /// track, or is cleared when that track was removed
    pub fn remove(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }
        let removed = self.tracks.remove(index);
        self.current = match self.current {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        Some(removed)
    }

    pub fn next(&mut self) -> Option<&Track> {
        self.next_with(&mut rand::thread_rng())
    }

    pub fn previous(&mut self) -> Option<&Track> {
        self.previous_with(&mut rand::thread_rng())
    }

    pub fn next_with<R: Rng>(&mut self, rng: &mut R) -> Option<&Track> {
        self.step(rng, true)
    }

    pub fn previous_with<R: Rng>(&mut self, rng: &mut R) -> Option<&Track> {
        self.step(rng, false)
    }

    fn step<R: Rng>(&mut self, rng: &mut R, forward: bool) -> Option<&Track> {
        let len = self.tracks.len();
        if len == 0 {
            self.current = None;
            return None;
        }

        self.current = Some(match (self.mode, self.current) {
            (_, None) => 0,
            (PlayMode::RepeatOne, Some(c)) => c,
            (PlayMode::Shuffle, Some(c)) if len > 1 => {
                // Pick from the other len-1 tracks
                let pick = rng.gen_range(0..len - 1);
                if pick >= c { pick + 1 } else { pick }
            }
            (PlayMode::Shuffle, Some(c)) => c,
            (PlayMode::Sequence, Some(c)) if forward => (c + 1) % len,
            (PlayMode::Sequence, Some(c)) => (c + len - 1) % len,
        });

        self.current()
    }
}
