//! Audio pipeline seam
//!
//! The service drives playback through the [`Player`] trait and listens to
//! its [`PlayerEvent`]s. [`HeadlessPlayer`] keeps the transport state
//! without producing audio.

use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Equalizer band gains, low/mid/high
pub type EqualizerBands = [i32; 3];

/// Built-in equalizer profiles
pub const EQUALIZER_PROFILES: [(&str, EqualizerBands); 2] = [("flat", [0, 0, 0]), ("pop", [8, 0, 8])];

pub const DEFAULT_EQUALIZER_PROFILE: &str = "pop";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    StateChanged { is_playing: bool, uri: String },
    /// Stream metadata, `title`, `organization`...
    Tags(BTreeMap<String, String>),
    EndOfStream,
    Error(String),
}

/// Transport control, equalizer and event stream of an audio pipeline
pub trait Player: Send + Sync {
    fn set_uri(&self, uri: &str) -> Result<()>;

    fn uri(&self) -> String;

    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Position in the current stream, `None` when stopped
    fn position(&self) -> Option<Duration>;

    fn profile_names(&self) -> Vec<String>;

    fn profile(&self) -> String;

    fn set_profile(&self, name: &str) -> Result<()>;

    fn subscribe(&self) -> Receiver<PlayerEvent>;
}

#[derive(Debug, Default)]
struct Transport {
    uri: String,
    playing: bool,
    paused: bool,
    /// Position accumulated before the current play run
    elapsed: Duration,
    started: Option<Instant>,
}

impl Transport {
    fn position(&self) -> Duration {
        self.elapsed + self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// State-only player
pub struct HeadlessPlayer {
    transport: Mutex<Transport>,
    profile: Mutex<String>,
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl HeadlessPlayer {
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(Transport::default()),
            profile: Mutex::new(DEFAULT_EQUALIZER_PROFILE.to_string()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Gains of the active equalizer profile
    pub fn bands(&self) -> EqualizerBands {
        let profile = self.profile.lock().unwrap();
        EQUALIZER_PROFILES
            .iter()
            .find(|(name, _)| *name == profile.as_str())
            .map(|(_, bands)| *bands)
            .unwrap_or_default()
    }

    /// Publishes stream metadata as a pipeline would on a tag message
    pub fn emit_tags(&self, tags: BTreeMap<String, String>) {
        self.emit(PlayerEvent::Tags(tags));
    }

    pub fn emit_end_of_stream(&self) {
        self.emit(PlayerEvent::EndOfStream);
    }

    pub fn emit_error(&self, message: impl Into<String>) {
        self.emit(PlayerEvent::Error(message.into()));
    }

    fn emit(&self, event: PlayerEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn emit_state(&self, transport: &Transport) {
        self.emit(PlayerEvent::StateChanged {
            is_playing: transport.playing,
            uri: transport.uri.clone(),
        });
    }
}

impl Default for HeadlessPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for HeadlessPlayer {
    fn set_uri(&self, uri: &str) -> Result<()> {
        let mut transport = self.transport.lock().unwrap();
        debug!(uri, "Player URI set");
        *transport = Transport {
            uri: uri.to_string(),
            ..Transport::default()
        };
        Ok(())
    }

    fn uri(&self) -> String {
        self.transport.lock().unwrap().uri.clone()
    }

    fn play(&self) -> Result<()> {
        let mut transport = self.transport.lock().unwrap();
        if transport.uri.is_empty() {
            return Err(Error::configuration("no URI to play"));
        }
        if transport.playing {
            return Ok(());
        }
        transport.playing = true;
        transport.paused = false;
        transport.started = Some(Instant::now());
        info!(uri = %transport.uri, "Playing");
        self.emit_state(&transport);
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut transport = self.transport.lock().unwrap();
        if !transport.playing {
            return Ok(());
        }
        transport.elapsed = transport.position();
        transport.started = None;
        transport.playing = false;
        transport.paused = true;
        self.emit_state(&transport);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut transport = self.transport.lock().unwrap();
        let was_active = transport.playing || transport.paused;
        transport.playing = false;
        transport.paused = false;
        transport.elapsed = Duration::ZERO;
        transport.started = None;
        if was_active {
            self.emit_state(&transport);
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.transport.lock().unwrap().playing
    }

    fn position(&self) -> Option<Duration> {
        let transport = self.transport.lock().unwrap();
        (transport.playing || transport.paused).then(|| transport.position())
    }

    fn profile_names(&self) -> Vec<String> {
        EQUALIZER_PROFILES.iter().map(|(n, _)| n.to_string()).collect()
    }

    fn profile(&self) -> String {
        self.profile.lock().unwrap().clone()
    }

    fn set_profile(&self, name: &str) -> Result<()> {
        if !EQUALIZER_PROFILES.iter().any(|(n, _)| *n == name) {
            return Err(Error::UnknownProfile(name.to_string()));
        }
        *self.profile.lock().unwrap() = name.to_string();
        info!(profile = name, "Equalizer profile set");
        Ok(())
    }

    fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_events() {
        let player = HeadlessPlayer::new();
        let events = player.subscribe();

        assert!(player.play().is_err());
        player.set_uri("http://x/s.mp3").unwrap();
        player.play().unwrap();
        player.play().unwrap();
        assert!(player.is_playing());
        assert!(player.position().is_some());

        player.pause().unwrap();
        assert!(!player.is_playing());
        assert!(player.position().is_some());

        player.stop().unwrap();
        assert_eq!(player.position(), None);
        player.stop().unwrap();

        let received: Vec<_> = events.try_iter().collect();
        let state = |is_playing| PlayerEvent::StateChanged {
            is_playing,
            uri: "http://x/s.mp3".to_string(),
        };
        assert_eq!(received, vec![state(true), state(false), state(false)]);
    }

    #[test]
    fn test_equalizer_profiles() {
        let player = HeadlessPlayer::new();
        assert_eq!(player.profile_names(), vec!["flat", "pop"]);
        assert_eq!(player.profile(), "pop");
        assert_eq!(player.bands(), [8, 0, 8]);

        player.set_profile("flat").unwrap();
        assert_eq!(player.bands(), [0, 0, 0]);

        let err = player.set_profile("rock").unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(name) if name == "rock"));
        assert_eq!(player.profile(), "flat");
    }
}
