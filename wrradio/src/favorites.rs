//! Favorites scoreboard
//!
//! Play-count scores per stream URI, persisted as a `[favorites]` document
//! (`uri = score`). [`ScoreTracker`] increments the playing URI once when
//! playback starts and then every interval until it stops.

use crate::document::Document;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, warn};

/// Section holding the scores
pub const FAVORITES_SECTION: &str = "favorites";

/// Interval between two increments of the playing stream
pub const DEFAULT_SCORE_INTERVAL: Duration = Duration::from_secs(300);

/// One scoreboard entry with its score relative to the top score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub uri: String,
    pub score: u64,
    pub relative_score: f64,
}

#[derive(Debug, Default)]
pub struct Scoreboard {
    path: Option<PathBuf>,
    scores: BTreeMap<String, u64>,
    top_score: u64,
}

impl Scoreboard {
    /// Scoreboard without durable storage
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the scoreboard at `path`; a missing file is an empty scoreboard
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut board = Self {
            path: Some(path.clone()),
            ..Self::default()
        };
        if !path.exists() {
            debug!(path = %path.display(), "No favorites yet");
            return Ok(board);
        }

        let doc = Document::read(&path)?;
        if let Some(section) = doc.section(FAVORITES_SECTION) {
            for (uri, value) in section.entries() {
                match value.parse::<u64>() {
                    Ok(score) => {
                        board.top_score = board.top_score.max(score);
                        board.scores.insert(uri.to_string(), score);
                    }
                    Err(_) => warn!(uri, value, "Ignoring bad favorite score"),
                }
            }
        }
        Ok(board)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn score(&self, uri: &str) -> u64 {
        self.scores.get(uri).copied().unwrap_or(0)
    }

    /// Highest score ever reached, never decreases
    pub fn top_score(&self) -> u64 {
        self.top_score
    }

    pub fn relative_score(&self, uri: &str) -> f64 {
        if self.top_score == 0 {
            return 0.0;
        }
        self.score(uri) as f64 / self.top_score as f64
    }

    /// Entries by decreasing score
    pub fn entries(&self) -> Vec<FavoriteEntry> {
        let mut entries: Vec<FavoriteEntry> = self
            .scores
            .iter()
            .map(|(uri, score)| FavoriteEntry {
                uri: uri.clone(),
                score: *score,
                relative_score: self.relative_score(uri),
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
    }

    /// Adds one to the score of `uri` and persists the board
    ///
    /// A failed write is logged and the in-memory score kept; the next
    /// increment writes the whole board again.
    pub fn increment(&mut self, uri: &str) -> u64 {
        let score = self.scores.entry(uri.to_string()).or_insert(0);
        *score += 1;
        let score = *score;
        self.top_score = self.top_score.max(score);
        debug!(uri, score, "Favorite score incremented");

        if let Err(e) = self.save() {
            warn!("Favorites not saved: {}", e);
        }
        score
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut doc = Document::new();
        let section = doc.section_mut(FAVORITES_SECTION);
        for (uri, score) in &self.scores {
            section.set(uri.clone(), score.to_string());
        }
        doc.write_atomic(path)
    }
}

enum TrackerState {
    Idle,
    Tracking {
        uri: String,
        generation: u64,
        timer: JoinHandle<()>,
    },
}

struct TrackerInner {
    state: TrackerState,
    /// Bumped on every start so a late tick of a replaced timer is ignored
    generation: u64,
}

/// Drives scoreboard increments from playback state changes
pub struct ScoreTracker {
    board: Arc<Mutex<Scoreboard>>,
    interval: Duration,
    inner: Arc<Mutex<TrackerInner>>,
}

impl ScoreTracker {
    pub fn new(board: Arc<Mutex<Scoreboard>>, interval: Duration) -> Self {
        Self {
            board,
            interval,
            inner: Arc::new(Mutex::new(TrackerInner {
                state: TrackerState::Idle,
                generation: 0,
            })),
        }
    }

    pub fn board(&self) -> &Arc<Mutex<Scoreboard>> {
        &self.board
    }

    /// URI currently scored, if any
    pub fn tracked_uri(&self) -> Option<String> {
        match &self.inner.lock().unwrap().state {
            TrackerState::Idle => None,
            TrackerState::Tracking { uri, .. } => Some(uri.clone()),
        }
    }

    /// Follows a playback state change
    pub fn on_state(&self, is_playing: bool, uri: &str) {
        if is_playing && !uri.is_empty() {
            self.start(uri);
        } else {
            self.stop();
        }
    }

    /// Starts scoring `uri`; a different tracked URI is stopped first
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, uri: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let TrackerState::Tracking { uri: current, .. } = &inner.state {
            if current == uri {
                return;
            }
        }
        Self::cancel(&mut inner.state);

        self.board.lock().unwrap().increment(uri);

        inner.generation += 1;
        let generation = inner.generation;
        let tracker = Arc::downgrade(&self.inner);
        let board = self.board.clone();
        let period = self.interval;
        let tracked = uri.to_string();
        let first = Instant::now() + period;
        let timer = tokio::spawn(async move {
            let mut ticks = interval_at(first, period);
            loop {
                ticks.tick().await;
                let Some(inner) = tracker.upgrade() else {
                    return;
                };
                if !Self::tick(&inner, &board, generation, &tracked) {
                    return;
                }
            }
        });
        inner.state = TrackerState::Tracking {
            uri: uri.to_string(),
            generation,
            timer,
        };
    }

    /// One timer fire; false once `generation` is no longer the tracked one
    ///
    /// The increment happens under the tracker lock, so a `stop` that
    /// returned before it can never be followed by it.
    fn tick(inner: &Mutex<TrackerInner>, board: &Mutex<Scoreboard>, generation: u64, uri: &str) -> bool {
        let inner = inner.lock().unwrap();
        match &inner.state {
            TrackerState::Tracking { generation: current, .. } if *current == generation => {
                board.lock().unwrap().increment(uri);
                true
            }
            _ => {
                debug!(uri, "Stale score tick ignored");
                false
            }
        }
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::cancel(&mut inner.state);
    }

    fn cancel(state: &mut TrackerState) {
        if let TrackerState::Tracking { timer, .. } = std::mem::replace(state, TrackerState::Idle) {
            timer.abort();
        }
    }
}

impl Drop for ScoreTracker {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            Self::cancel(&mut inner.state);
        }
    }
}
