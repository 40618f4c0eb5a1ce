//! Service facade
//!
//! [`WebRadioService`] owns the catalog, the player seam, the scoreboard
//! tracker and the wishlist, and implements every control operation. The
//! REST layer and the tests call it directly.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::events::{bridge, DataStage, EventBus, WebRadioEvent};
use crate::favorites::{FavoriteEntry, ScoreTracker, Scoreboard, DEFAULT_SCORE_INTERVAL};
use crate::models::{ChannelMatch, StationInfo};
use crate::notify::{LogNotifier, Notifier};
use crate::player::{Player, PlayerEvent};
use crate::wishlist::Wishlist;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// `GetState` answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_uri: String,
}

pub struct WebRadioService {
    catalog: Arc<Catalog>,
    player: Arc<dyn Player>,
    notifier: Arc<dyn Notifier>,
    tracker: ScoreTracker,
    wishlist: Option<Mutex<Wishlist>>,
    stream_tags: Mutex<BTreeMap<String, String>>,
    notification_id: Mutex<u32>,
    shutdown: CancellationToken,
}

impl WebRadioService {
    /// Service with a log notifier, an in-memory scoreboard and no wishlist
    pub fn new(catalog: Arc<Catalog>, player: Arc<dyn Player>) -> Self {
        Self {
            catalog,
            player,
            notifier: Arc::new(LogNotifier::new()),
            tracker: ScoreTracker::new(
                Arc::new(Mutex::new(Scoreboard::in_memory())),
                DEFAULT_SCORE_INTERVAL,
            ),
            wishlist: None,
            stream_tags: Mutex::new(BTreeMap::new()),
            notification_id: Mutex::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_scoreboard(mut self, board: Scoreboard, interval: Duration) -> Self {
        self.tracker = ScoreTracker::new(Arc::new(Mutex::new(board)), interval);
        self
    }

    pub fn with_wishlist(mut self, wishlist: Wishlist) -> Self {
        self.wishlist = Some(Mutex::new(wishlist));
        self
    }

    /// Token cancelled by [`quit`](Self::quit)
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn events(&self) -> &EventBus {
        self.catalog.events()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Forwards player events to [`handle_player_event`](Self::handle_player_event)
    /// until shutdown
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = bridge(self.player.subscribe());

        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = service.shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => service.handle_player_event(event),
                        None => break,
                    },
                }
            }
            debug!("Player event loop stopped");
        })
    }

    pub fn handle_player_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChanged { is_playing, uri } => {
                self.tracker.on_state(is_playing, &uri);
                self.events().broadcast(WebRadioEvent::StateChanged {
                    is_playing,
                    current_uri: uri,
                });
            }
            PlayerEvent::Tags(tags) => {
                self.stream_tags
                    .lock()
                    .unwrap()
                    .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));

                if let Some(title) = tags.get("title") {
                    let body = tags.get("organization").map(String::as_str).unwrap_or("");
                    let mut id = self.notification_id.lock().unwrap();
                    *id = self.notifier.notify(title, body, *id);
                }

                self.events()
                    .broadcast(WebRadioEvent::StreamTagsChanged { tags });
            }
            PlayerEvent::EndOfStream => {
                info!("End of stream");
                self.stop_player();
            }
            PlayerEvent::Error(message) => {
                error!("Player error: {}", message);
                self.stop_player();
            }
        }
    }

    fn stop_player(&self) {
        if let Err(e) = self.player.stop() {
            warn!("Cannot stop player: {}", e);
        }
    }

    pub fn stations(&self) -> Vec<StationInfo> {
        self.catalog.station_infos()
    }

    pub fn find<S: AsRef<str>>(&self, query: &[S]) -> Vec<ChannelMatch> {
        self.catalog.find(query)
    }

    pub fn tags(&self) -> Vec<String> {
        self.catalog.tags()
    }

    pub fn data_stage(&self) -> DataStage {
        self.catalog.data_stage()
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.player.is_playing(),
            current_uri: self.player.uri(),
        }
    }

    pub fn stream_tags(&self) -> BTreeMap<String, String> {
        self.stream_tags.lock().unwrap().clone()
    }

    /// Stops, forgets the stream tags, then plays `uri`
    pub fn play(&self, uri: &str) -> Result<()> {
        if uri.is_empty() {
            return Err(Error::configuration("empty URI"));
        }
        info!(uri, "Play");
        self.player.stop()?;
        self.stream_tags.lock().unwrap().clear();
        self.player.set_uri(uri)?;
        self.player.play()
    }

    pub fn pause(&self) -> Result<()> {
        self.player.pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.player.play()
    }

    /// Stops playback and cancels the shutdown token
    pub fn quit(&self) {
        info!("Quit requested");
        self.stop_player();
        self.tracker.stop();
        self.shutdown.cancel();
    }

    pub fn equalizer_profiles(&self) -> Vec<String> {
        self.player.profile_names()
    }

    pub fn equalizer_profile(&self) -> String {
        self.player.profile()
    }

    pub fn set_equalizer_profile(&self, name: &str) -> Result<()> {
        self.player.set_profile(name)
    }

    pub fn favorites(&self) -> Vec<FavoriteEntry> {
        self.tracker.board().lock().unwrap().entries()
    }

    pub fn wishlist(&self) -> Vec<String> {
        self.wishlist
            .as_ref()
            .map(|w| w.lock().unwrap().titles().to_vec())
            .unwrap_or_default()
    }

    /// Adds or removes `title`; true when it is now wished
    pub fn toggle_wishlist(&self, title: &str) -> Result<bool> {
        let wishlist = self
            .wishlist
            .as_ref()
            .ok_or_else(|| Error::configuration("no wishlist configured"))?;
        wishlist.lock().unwrap().toggle(title)
    }
}
