//! Publication layer
//!
//! Subscribers register for a set of [`EventKind`]s and receive matching
//! events on a crossbeam channel. Each subscriber owns a single channel, so
//! events reach it in emission order.

use crate::models::{Channel, StationInfo};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// How often the bridge checks that the async side is still listening
const BRIDGE_POLL: Duration = Duration::from_millis(200);

/// Progress of the discovery pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum DataStage {
    /// Nothing loaded yet
    #[default]
    Empty = 0,
    /// Every station page has been processed
    StationsLoaded = 1,
    /// Every pending playlist has been crawled
    ChannelsLoaded = 2,
}

impl DataStage {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataStage {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(Self::Empty),
            1 => Ok(Self::StationsLoaded),
            2 => Ok(Self::ChannelsLoaded),
            other => Err(other),
        }
    }
}

impl fmt::Display for DataStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for DataStage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for DataStage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        DataStage::try_from(value)
            .map_err(|v| serde::de::Error::custom(format!("invalid data stage {v}")))
    }
}

/// Events published by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebRadioEvent {
    StationAdded {
        station: StationInfo,
    },
    ChannelAdded {
        station_id: String,
        channel: Channel,
    },
    DataStageChanged {
        stage: DataStage,
    },
    StateChanged {
        is_playing: bool,
        current_uri: String,
    },
    StreamTagsChanged {
        tags: BTreeMap<String, String>,
    },
}

/// Discriminant of [`WebRadioEvent`], used as subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StationAdded,
    ChannelAdded,
    DataStageChanged,
    StateChanged,
    StreamTagsChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::StationAdded,
        EventKind::ChannelAdded,
        EventKind::DataStageChanged,
        EventKind::StateChanged,
        EventKind::StreamTagsChanged,
    ];
}

impl WebRadioEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WebRadioEvent::StationAdded { .. } => EventKind::StationAdded,
            WebRadioEvent::ChannelAdded { .. } => EventKind::ChannelAdded,
            WebRadioEvent::DataStageChanged { .. } => EventKind::DataStageChanged,
            WebRadioEvent::StateChanged { .. } => EventKind::StateChanged,
            WebRadioEvent::StreamTagsChanged { .. } => EventKind::StreamTagsChanged,
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<HashMap<EventKind, Vec<Sender<WebRadioEvent>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the given kinds on one channel
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Receiver<WebRadioEvent> {
        let (tx, rx) = unbounded::<WebRadioEvent>();
        {
            let mut subscribers = self.subscribers.lock().unwrap();
            for kind in kinds {
                subscribers.entry(*kind).or_default().push(tx.clone());
            }
        }
        rx
    }

    /// Subscribes to every kind
    pub fn subscribe(&self) -> Receiver<WebRadioEvent> {
        self.subscribe_to(&EventKind::ALL)
    }

    /// Delivers `event` to the subscribers of its kind, dropping closed ones
    pub fn broadcast(&self, event: WebRadioEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(senders) = subscribers.get_mut(&event.kind()) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Forwards a crossbeam receiver to a tokio channel from a blocking task
///
/// The task ends when either side is dropped. Must be called from within
/// a tokio runtime.
pub fn bridge<T: Send + 'static>(rx: Receiver<T>) -> mpsc::UnboundedReceiver<T> {
    let (tx, out) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || loop {
        match rx.recv_timeout(BRIDGE_POLL) {
            Ok(item) => {
                if tx.send(item).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) if !tx.is_closed() => {}
            Err(_) => break,
        }
    });
    out
}
