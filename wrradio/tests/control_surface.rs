//! Control surface served by axum and driven through RemoteClient

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use wrradio::models::{Stream, UNKNOWN_LENGTH};
use wrradio::{
    create_router, Catalog, Channel, DataStage, HeadlessPlayer, RemoteClient, Station,
    WaitOutcome, WebRadioService, Wishlist,
};

struct Fixture {
    service: Arc<WebRadioService>,
    client: RemoteClient,
    _dir: tempfile::TempDir,
}

async fn start() -> Fixture {
    let catalog = Arc::new(Catalog::default());
    let station = catalog.add_station(Station::new("radioX", "Radio X", "http://x/").unwrap());
    let mut channel = Channel::new(&station, "http://x/rock/live.pls");
    channel
        .streams
        .push(Stream::new("http://x/live.mp3", "Live", UNKNOWN_LENGTH));
    catalog.add_channel(&station, channel);
    catalog.advance_stage(DataStage::StationsLoaded);

    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(
        WebRadioService::new(catalog, Arc::new(HeadlessPlayer::new()))
            .with_wishlist(Wishlist::load(dir.path().join("wishlist")).unwrap()),
    );
    service.start();

    let app = Router::new().nest("/api/webradio", create_router(service.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = service.shutdown_token();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .unwrap();
    });

    Fixture {
        service,
        client: RemoteClient::new(format!("http://{addr}")).unwrap(),
        _dir: dir,
    }
}

#[tokio::test]
async fn test_catalog_queries() {
    let f = start().await;

    let stations = f.client.stations().await.unwrap();
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].channels.len(), 1);

    let found = f.client.find(&["rock", "Live"]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].station_id, "radioX");
    assert!(f.client.find(&["jazz"]).await.unwrap().is_empty());

    assert_eq!(f.client.tags().await.unwrap(), vec!["live", "radioX", "rock"]);

    let station = f.client.station("radioX").await.unwrap().unwrap();
    assert_eq!(station.title, "Radio X");
    assert_eq!(f.client.station("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_wait_distinguishes_loading_from_loaded() {
    let f = start().await;

    let outcome = f
        .client
        .wait(DataStage::ChannelsLoaded, Duration::from_millis(300))
        .await
        .unwrap();
    assert_eq!(outcome, WaitOutcome::StillLoading(DataStage::StationsLoaded));

    f.service.catalog().advance_stage(DataStage::ChannelsLoaded);
    let outcome = f
        .client
        .wait(DataStage::ChannelsLoaded, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(outcome, WaitOutcome::Reached(DataStage::ChannelsLoaded));
}

#[tokio::test]
async fn test_playback_and_current_channel() {
    let f = start().await;
    assert_eq!(f.client.current_channel().await.unwrap(), None);

    f.client.play("http://x/live.mp3").await.unwrap();
    let state = f.client.state().await.unwrap();
    assert!(state.is_playing);
    assert_eq!(state.current_uri, "http://x/live.mp3");

    let current = f.client.current_channel().await.unwrap().unwrap();
    assert_eq!(current.channel.uri, "http://x/rock/live.pls");

    let by_playlist = f
        .client
        .channel_containing("http://x/rock/live.pls")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_playlist.station_id, "radioX");
    assert_eq!(f.client.channel_containing("http://x/gone.pls").await.unwrap(), None);

    f.client.pause().await.unwrap();
    assert!(!f.client.state().await.unwrap().is_playing);
    f.client.resume().await.unwrap();
    assert!(f.client.state().await.unwrap().is_playing);
    assert!(f.client.stream_tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_equalizer_and_wishlist() {
    let f = start().await;

    let eq = f.client.equalizer().await.unwrap();
    assert_eq!(eq.profiles, vec!["flat", "pop"]);
    assert_eq!(eq.current, "pop");

    f.client.set_equalizer_profile("flat").await.unwrap();
    assert_eq!(f.client.equalizer().await.unwrap().current, "flat");
    assert!(f.client.set_equalizer_profile("metal").await.is_err());

    assert!(f.client.toggle_wishlist("Live").await.unwrap());
    assert_eq!(f.client.wishlist().await.unwrap(), vec!["Live"]);
    assert!(!f.client.toggle_wishlist("Live").await.unwrap());
}

#[tokio::test]
async fn test_quit_cancels_shutdown_token() {
    let f = start().await;
    f.client.quit().await.unwrap();
    assert!(f.service.shutdown_token().is_cancelled());
}
