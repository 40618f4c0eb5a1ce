//! Live catalog and query engine
//!
//! The catalog is the single owner of discovered stations. The crawler
//! appends to it; queries scan a snapshot of the append-only lists, so they
//! never block discovery and never see a half-built channel.

use crate::events::{DataStage, EventBus, WebRadioEvent};
use crate::models::{Channel, ChannelMatch, Station, StationInfo};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

pub struct Catalog {
    stations: RwLock<Vec<Arc<Station>>>,
    stage: Mutex<DataStage>,
    events: EventBus,
}

impl Catalog {
    pub fn new(events: EventBus) -> Self {
        Self {
            stations: RwLock::new(Vec::new()),
            stage: Mutex::new(DataStage::Empty),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Appends a station and publishes `StationAdded`
    pub fn add_station(&self, station: Station) -> Arc<Station> {
        let station = Arc::new(station);
        let mut stations = self.stations.write().unwrap();
        stations.push(station.clone());
        // Published under the lock so that snapshot and events agree
        self.events.broadcast(WebRadioEvent::StationAdded {
            station: station.info(),
        });
        station
    }

    /// Appends a fully built channel to `station` and publishes `ChannelAdded`
    pub fn add_channel(&self, station: &Station, channel: Channel) -> Arc<Channel> {
        let _guard = self.stations.read().unwrap();
        let channel = station.push_channel(channel);
        self.events.broadcast(WebRadioEvent::ChannelAdded {
            station_id: station.id().to_string(),
            channel: channel.as_ref().clone(),
        });
        channel
    }

    /// Moves the data stage forward; lower or equal stages are ignored
    pub fn advance_stage(&self, stage: DataStage) -> bool {
        let mut current = self.stage.lock().unwrap();
        if stage <= *current {
            return false;
        }
        *current = stage;
        info!(stage = stage.as_u8(), "Data stage reached");
        self.events
            .broadcast(WebRadioEvent::DataStageChanged { stage });
        true
    }

    pub fn data_stage(&self) -> DataStage {
        *self.stage.lock().unwrap()
    }

    /// Snapshot of the stations in announcement order
    pub fn stations(&self) -> Vec<Arc<Station>> {
        self.stations.read().unwrap().clone()
    }

    pub fn station(&self, id: &str) -> Option<Arc<Station>> {
        self.stations
            .read()
            .unwrap()
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    pub fn station_infos(&self) -> Vec<StationInfo> {
        self.stations().iter().map(|s| s.info()).collect()
    }

    /// Channels matching every token of `query`, station then channel order
    pub fn find<S: AsRef<str>>(&self, query: &[S]) -> Vec<ChannelMatch> {
        let mut result = Vec::new();
        for station in self.stations() {
            for channel in station.channels() {
                if station.channel_matches(&channel, query) {
                    result.push(ChannelMatch {
                        station_id: station.id().to_string(),
                        channel: channel.as_ref().clone(),
                    });
                }
            }
        }
        result
    }

    /// Every channel tag and station id, sorted and de-duplicated
    pub fn tags(&self) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for station in self.stations() {
            for channel in station.channels() {
                tags.extend(channel.tags.iter().cloned());
            }
            tags.insert(station.id().to_string());
        }
        tags.into_iter().collect()
    }

    /// Channel whose playlist or one of whose streams is `uri`
    pub fn channel_for_uri(&self, uri: &str) -> Option<ChannelMatch> {
        self.stations().iter().find_map(|station| {
            station
                .channels()
                .into_iter()
                .find(|c| c.contains_uri(uri))
                .map(|c| ChannelMatch {
                    station_id: station.id().to_string(),
                    channel: c.as_ref().clone(),
                })
        })
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::models::{Stream, UNKNOWN_LENGTH};

    fn catalog_with_channels() -> Catalog {
        let catalog = Catalog::default();
        let x = catalog.add_station(Station::new("radioX", "Radio X", "http://x/").unwrap());
        let jazz = catalog.add_station(Station::new("jazz", "Jazz FM", "http://j/").unwrap());

        let mut live = Channel::new(&x, "http://x/rock/live.pls");
        live.streams.push(Stream::new("http://x/live.mp3", "Live", UNKNOWN_LENGTH));
        catalog.add_channel(&x, live);
        catalog.add_channel(&x, Channel::new(&x, "http://x/news.pls"));
        catalog.add_channel(&jazz, Channel::new(&jazz, "http://j/rock/smooth.pls"));
        catalog
    }

    fn uris(matches: &[ChannelMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.channel.uri.as_str()).collect()
    }

    #[test]
    fn test_find_in_discovery_order() {
        let catalog = catalog_with_channels();
        let empty: [&str; 0] = [];

        let all = catalog.find(&empty);
        assert_eq!(
            uris(&all),
            vec!["http://x/rock/live.pls", "http://x/news.pls", "http://j/rock/smooth.pls"]
        );
        assert_eq!(all, catalog.find(&empty));

        let rock = catalog.find(&["rock"]);
        assert_eq!(rock[0].station_id, "radioX");
        assert_eq!(rock[1].station_id, "jazz");

        assert_eq!(uris(&catalog.find(&["radioX", "Live"])), vec!["http://x/rock/live.pls"]);
        assert!(catalog.find(&["classical"]).is_empty());
    }

    #[test]
    fn test_tags_sorted_and_unique() {
        let catalog = catalog_with_channels();
        assert_eq!(
            catalog.tags(),
            vec!["jazz", "live", "news", "radioX", "rock", "smooth"]
        );
    }

    #[test]
    fn test_stage_is_monotonic_and_published() {
        let catalog = Catalog::default();
        let rx = catalog.events().subscribe_to(&[EventKind::DataStageChanged]);

        assert!(catalog.advance_stage(DataStage::StationsLoaded));
        assert!(!catalog.advance_stage(DataStage::StationsLoaded));
        assert!(catalog.advance_stage(DataStage::ChannelsLoaded));
        assert!(!catalog.advance_stage(DataStage::Empty));
        assert_eq!(catalog.data_stage(), DataStage::ChannelsLoaded);

        let stages: Vec<_> = rx.try_iter().collect();
        assert_eq!(stages.len(), 2);
    }

    #[test]
    fn test_events_follow_appends() {
        let catalog = Catalog::default();
        let rx = catalog.events().subscribe();
        let x = catalog.add_station(Station::new("radioX", "Radio X", "http://x/").unwrap());
        catalog.add_channel(&x, Channel::new(&x, "http://x/a.pls"));

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(&events[0], WebRadioEvent::StationAdded { station } if station.id == "radioX"));
        assert!(matches!(
            &events[1],
            WebRadioEvent::ChannelAdded { station_id, channel }
                if station_id == "radioX" && channel.uri == "http://x/a.pls"
        ));
    }

    #[test]
    fn test_channel_for_uri() {
        let catalog = catalog_with_channels();
        let found = catalog.channel_for_uri("http://x/live.mp3").unwrap();
        assert_eq!(found.station_id, "radioX");
        assert_eq!(found.channel.uri, "http://x/rock/live.pls");
        assert!(catalog.channel_for_uri("http://nowhere/").is_none());
    }

    #[test]
    fn test_queries_see_consistent_prefix_during_appends() {
        const STATIONS: usize = 20;
        const CHANNELS: usize = 25;
        let catalog = Catalog::default();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for s in 0..STATIONS {
                    let station = catalog
                        .add_station(Station::new(format!("s{s:02}"), "S", format!("http://s{s}/")).unwrap());
                    for c in 0..CHANNELS {
                        let mut channel = Channel::new(&station, format!("http://s{s}/c{c:02}.pls"));
                        channel
                            .streams
                            .push(Stream::new(format!("http://s{s}/{c}.mp3"), "T", UNKNOWN_LENGTH));
                        catalog.add_channel(&station, channel);
                    }
                }
            });

            for _ in 0..3 {
                scope.spawn(|| {
                    let empty: [&str; 0] = [];
                    let mut seen = 0;
                    while seen < STATIONS * CHANNELS {
                        let all = catalog.find(&empty);
                        assert!(all.len() >= seen, "catalog shrank");
                        seen = all.len();

                        // Station then channel discovery order, no torn channel
                        let keys: Vec<(&str, &str)> = all
                            .iter()
                            .map(|m| (m.station_id.as_str(), m.channel.uri.as_str()))
                            .collect();
                        let mut sorted = keys.clone();
                        sorted.sort();
                        sorted.dedup();
                        assert_eq!(keys, sorted);
                        assert!(all.iter().all(|m| m.channel.streams.len() == 1));

                        let tags = catalog.tags();
                        assert!(tags.windows(2).all(|w| w[0] < w[1]));
                    }
                });
            }
        });

        assert_eq!(catalog.find(&["s07"]).len(), CHANNELS);
    }
}
