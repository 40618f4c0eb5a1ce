//! Internet radio catalog for WebRadio
//!
//! This crate discovers the channels of a fixed list of radio stations and
//! answers tag/text queries against them while discovery is still running.
//!
//! # Features
//!
//! - **Station list**: sectioned document with URIs, noise filters and tag aliases
//! - **Discovery**: background crawl of station pages then `.pls` playlists,
//!   with incremental `StationAdded` / `ChannelAdded` events
//! - **Queries**: conjunctive `find` over tags, station ids and titles; `tags`
//! - **Favorites**: persistent play-count scoreboard driven by playback
//! - **Control surface**: axum router and matching [`RemoteClient`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wrradio::{Catalog, Crawler, HttpFetcher, parse_station_list};
//!
//! #[tokio::main]
//! async fn main() -> wrradio::Result<()> {
//!     let stations = parse_station_list("stations", "[radioX]\nuri=http://x/\ntitle=Radio X\n")?;
//!     let catalog = Arc::new(Catalog::default());
//!     let fetcher = Arc::new(HttpFetcher::new()?);
//!
//!     Crawler::new(catalog.clone(), fetcher)?.run(stations).await;
//!
//!     for found in catalog.find(&["Live"]) {
//!         println!("{}: {}", found.station_id, found.channel.title());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Configuration Extension
//!
//! [`WebRadioConfigExt`] adds the `webradio.*` keys to `wrconfig::Config`:
//! station list location, fetch settings, favorites, preferences and
//! wishlist files.

pub mod api_rest;
pub mod catalog;
pub mod client;
pub mod config_ext;
pub mod crawler;
pub mod document;
pub mod error;
pub mod events;
pub mod favorites;
pub mod models;
pub mod notify;
pub mod player;
pub mod playlist;
pub mod remote;
pub mod service;
pub mod stations;
pub mod wishlist;

pub use api_rest::create_router;
pub use catalog::Catalog;
pub use client::{Fetch, FetchResponse, FetcherBuilder, HttpFetcher};
pub use config_ext::WebRadioConfigExt;
pub use crawler::Crawler;
pub use document::{Document, Section};
pub use error::{Error, Result};
pub use events::{DataStage, EventBus, EventKind, WebRadioEvent};
pub use favorites::{FavoriteEntry, ScoreTracker, Scoreboard};
pub use models::{Channel, ChannelMatch, Station, StationInfo, Stream};
pub use notify::{LogNotifier, Notifier};
pub use player::{HeadlessPlayer, Player, PlayerEvent};
pub use playlist::parse_playlist;
pub use remote::{RemoteClient, WaitOutcome};
pub use service::{PlaybackState, WebRadioService};
pub use stations::{load_station_list, parse_station_list};
pub use wishlist::Wishlist;
