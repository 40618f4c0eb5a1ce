//! Discovery crawler
//!
//! Runs once at startup on a background task, in two sequential phases:
//!
//! 1. every station page is fetched in list order, its `.pls` links are
//!    extracted and queued, then the station is announced;
//! 2. every queued playlist is fetched and parsed into a channel.
//!
//! The data stage reaches 1 after phase 1 and 2 after phase 2. Fetch and
//! parse failures only drop the offending station page or playlist.

use crate::catalog::Catalog;
use crate::client::Fetch;
use crate::error::{Error, Result};
use crate::events::DataStage;
use crate::models::Station;
use crate::playlist::parse_playlist;
use regex::Regex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Playlist links as they appear in station pages
const PLAYLIST_LINK_PATTERN: &str = r#"href="([^"]+\.pls)""#;

/// A playlist link waiting for phase 2
#[derive(Debug, Clone)]
struct PendingPlaylist {
    station: Arc<Station>,
    uri: String,
}

pub struct Crawler {
    catalog: Arc<Catalog>,
    fetcher: Arc<dyn Fetch>,
    link_pattern: Regex,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(catalog: Arc<Catalog>, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        Ok(Self {
            catalog,
            fetcher,
            link_pattern: Regex::new(PLAYLIST_LINK_PATTERN)?,
            cancel: CancellationToken::new(),
        })
    }

    /// Abandons the crawl when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Runs the crawl on a tokio task
    pub fn spawn(self, stations: Vec<Station>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(stations).await })
    }

    pub async fn run(&self, stations: Vec<Station>) {
        info!(stations = stations.len(), "Crawling station pages");
        let mut pending = Vec::new();
        for station in stations {
            if self.cancel.is_cancelled() {
                info!("Crawl abandoned");
                return;
            }
            let links = self.crawl_station(&station).await;
            let station = self.catalog.add_station(station);
            pending.extend(links.into_iter().map(|uri| PendingPlaylist {
                station: station.clone(),
                uri,
            }));
        }
        self.catalog.advance_stage(DataStage::StationsLoaded);

        info!(playlists = pending.len(), "Crawling playlists");
        for item in pending {
            if self.cancel.is_cancelled() {
                info!("Crawl abandoned");
                return;
            }
            self.crawl_playlist(&item).await;
        }
        self.catalog.advance_stage(DataStage::ChannelsLoaded);
    }

    /// Fetches `uri`, turning a non-success status into a fetch error
    async fn fetch_body(&self, uri: &str) -> Result<String> {
        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(Error::fetch(uri, 0)),
            response = self.fetcher.fetch(uri) => response?,
        };
        if !response.is_success() {
            return Err(Error::fetch(uri, response.status));
        }
        Ok(response.body)
    }

    /// Accepted playlist links of the station page, de-duplicated in page order
    async fn crawl_station(&self, station: &Station) -> Vec<String> {
        let body = match self.fetch_body(station.uri()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(station = %station.id(), "Station page skipped: {}", e);
                return Vec::new();
            }
        };

        match extract_playlist_links(&self.link_pattern, station.uri(), &body) {
            Ok(links) => {
                let accepted: Vec<String> = links
                    .into_iter()
                    .filter(|uri| {
                        let ok = station.accept_stream(uri);
                        if !ok {
                            debug!(station = %station.id(), uri = %uri, "Link rejected");
                        }
                        ok
                    })
                    .collect();
                info!(station = %station.id(), playlists = accepted.len(), "Station page crawled");
                accepted
            }
            Err(e) => {
                warn!(station = %station.id(), "Cannot resolve links: {}", e);
                Vec::new()
            }
        }
    }

    async fn crawl_playlist(&self, item: &PendingPlaylist) {
        let station = &item.station;
        let body = match self.fetch_body(&item.uri).await {
            Ok(body) => body,
            Err(e) => {
                warn!(station = %station.id(), "Playlist skipped: {}", e);
                return;
            }
        };

        match parse_playlist(station, &item.uri, &body) {
            Ok(channel) => {
                debug!(station = %station.id(), uri = %item.uri, streams = channel.streams.len(), "Channel discovered");
                self.catalog.add_channel(station, channel);
            }
            Err(e) => warn!(station = %station.id(), uri = %item.uri, "Playlist skipped: {}", e),
        }
    }
}

/// Extracts the `href="...pls"` links of `body`, resolved against `base`
fn extract_playlist_links(pattern: &Regex, base: &str, body: &str) -> Result<Vec<String>> {
    let base = Url::parse(base)?;
    let mut links: Vec<String> = Vec::new();
    for captures in pattern.captures_iter(body) {
        let href = &captures[1];
        match base.join(href) {
            Ok(url) => {
                let url = url.to_string();
                if !links.contains(&url) {
                    links.push(url);
                }
            }
            Err(e) => debug!(href, "Unresolvable link: {}", e),
        }
    }
    Ok(links)
}
