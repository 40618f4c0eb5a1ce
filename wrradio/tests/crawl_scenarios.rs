//! End-to-end discovery against mock station servers

use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wrcache::ResponseCache;
use wrradio::{
    parse_station_list, Catalog, Crawler, DataStage, EventKind, Fetch, HttpFetcher, WebRadioEvent,
};

async fn serve(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn station_list(id: &str, title: &str, uri: &str) -> String {
    format!("[{id}]\nuri = {uri}\ntitle = {title}\n")
}

#[tokio::test]
async fn test_single_station_is_discovered_and_searchable() {
    let server = MockServer::start().await;
    let base = format!("{}/", server.uri());

    serve(
        &server,
        "/",
        format!(r#"<html><a href="{}/a.pls">Listen</a></html>"#, server.uri()),
    )
    .await;
    serve(
        &server,
        "/a.pls",
        "[playlist]\nnumberofentries=1\nfile1=http://x/stream.mp3\ntitle1=Radio X - Live\n".to_string(),
    )
    .await;

    let stations = parse_station_list("stations", &station_list("radioX", "Radio X", &base)).unwrap();
    let catalog = Arc::new(Catalog::default());
    let events = catalog.events().subscribe();
    let fetcher = Arc::new(HttpFetcher::new().unwrap());

    Crawler::new(catalog.clone(), fetcher)
        .unwrap()
        .spawn(stations)
        .await
        .unwrap();

    assert_eq!(catalog.data_stage(), DataStage::ChannelsLoaded);

    for query in [["radioX"], ["Live"]] {
        let found = catalog.find(&query);
        assert_eq!(found.len(), 1, "query {query:?}");
        assert_eq!(found[0].station_id, "radioX");
        let channel = &found[0].channel;
        assert_eq!(channel.uri, format!("{}/a.pls", server.uri()));
        assert_eq!(channel.streams.len(), 1);
        assert_eq!(channel.streams[0].title, "Live");
        assert_eq!(channel.streams[0].uri, "http://x/stream.mp3");
        assert_eq!(channel.streams[0].length, -1);
    }
    assert_eq!(catalog.tags(), vec!["a", "radioX"]);

    let received: Vec<WebRadioEvent> = events.try_iter().collect();
    assert!(matches!(&received[0], WebRadioEvent::StationAdded { station } if station.id == "radioX"));
    assert!(received.contains(&WebRadioEvent::DataStageChanged {
        stage: DataStage::ChannelsLoaded
    }));
}

#[tokio::test]
async fn test_missing_station_page_still_announces_and_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let base = format!("{}/", server.uri());
    let stations = parse_station_list("stations", &station_list("gone", "Gone FM", &base)).unwrap();
    let catalog = Arc::new(Catalog::default());
    let events = catalog.events().subscribe();

    Crawler::new(catalog.clone(), Arc::new(HttpFetcher::new().unwrap()))
        .unwrap()
        .run(stations)
        .await;

    let kinds: Vec<EventKind> = events.try_iter().map(|e| e.kind()).collect();
    assert_eq!(kinds.first(), Some(&EventKind::StationAdded));
    assert!(!kinds.contains(&EventKind::ChannelAdded));
    assert_eq!(catalog.data_stage(), DataStage::ChannelsLoaded);
    assert_eq!(catalog.stations().len(), 1);
    assert!(catalog.find(&[] as &[&str]).is_empty());
}

#[tokio::test]
async fn test_links_outside_station_are_rejected() {
    let server = MockServer::start().await;
    let base = format!("{}/radio/", server.uri());

    serve(
        &server,
        "/radio/",
        r#"<a href="jazz/smooth.pls"></a><a href="/elsewhere/x.pls"></a><a href="jazz/smooth.pls"></a>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/radio/jazz/smooth.pls"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[playlist]\nnumberofentries=1\nfile1=http://s/1.mp3\ntitle1=Smooth\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let stations = parse_station_list("stations", &station_list("jazz", "Jazz", &base)).unwrap();
    let catalog = Arc::new(Catalog::default());
    Crawler::new(catalog.clone(), Arc::new(HttpFetcher::new().unwrap()))
        .unwrap()
        .run(stations)
        .await;

    let found = catalog.find(&["smooth"]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].channel.tags, vec!["radio", "jazz", "smooth"]);
}

#[tokio::test]
async fn test_fresh_cache_avoids_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(
        ResponseCache::new(dir.path().to_str().unwrap(), 10, Duration::from_secs(3600)).unwrap(),
    );
    let fetcher = HttpFetcher::builder().cache(cache).build().unwrap();
    let uri = format!("{}/page", server.uri());

    let first = fetcher.fetch(&uri).await.unwrap();
    assert!(!first.from_cache);
    let second = fetcher.fetch(&uri).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.body, "hello");
    assert_eq!(second.status, 200);
}

#[tokio::test]
async fn test_stale_cache_is_revalidated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"v1\"")
                .set_body_string("original"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(ResponseCache::new(dir.path().to_str().unwrap(), 10, Duration::ZERO).unwrap());
    let fetcher = HttpFetcher::builder().cache(cache).build().unwrap();
    let uri = format!("{}/page", server.uri());

    fetcher.fetch(&uri).await.unwrap();
    let revalidated = fetcher.fetch(&uri).await.unwrap();
    assert!(revalidated.from_cache);
    assert_eq!(revalidated.body, "original");
}

#[tokio::test]
async fn test_error_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let response = fetcher.fetch(&format!("{}/x.pls", server.uri())).await.unwrap();
    assert_eq!(response.status, 503);
    assert!(!response.is_success());
}

/// Second station served next to a failing one; its crawl must still happen
async fn mount_good_station(server: &MockServer) -> String {
    serve(server, "/good/", r#"<a href="live.pls">live</a>"#.to_string()).await;
    serve(
        server,
        "/good/live.pls",
        "[playlist]\nnumberofentries=1\nfile1=http://g/live.mp3\ntitle1=Good Live\n".to_string(),
    )
    .await;
    station_list("good", "Good", &format!("{}/good/", server.uri()))
}

fn assert_failure_contained(catalog: &Catalog, events: Vec<WebRadioEvent>, failing: &str) {
    let announced: Vec<String> = events
        .into_iter()
        .filter_map(|e| match e {
            WebRadioEvent::StationAdded { station } => Some(station.id),
            _ => None,
        })
        .collect();
    assert_eq!(announced, vec![failing.to_string(), "good".to_string()]);
    assert_eq!(catalog.station(failing).unwrap().channel_count(), 0);
    assert_eq!(catalog.station("good").unwrap().channel_count(), 1);
    assert_eq!(catalog.find(&["Good", "Live"]).len(), 1);
    assert_eq!(catalog.data_stage(), DataStage::ChannelsLoaded);
}

#[tokio::test]
async fn test_timed_out_station_page_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="a.pls"></a>"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let good = mount_good_station(&server).await;

    let list = station_list("slow", "Slow FM", &format!("{}/slow/", server.uri())) + &good;
    let stations = parse_station_list("stations", &list).unwrap();
    let fetcher = HttpFetcher::builder()
        .timeout(Duration::from_millis(200))
        .retries(1)
        .retry_delay(Duration::from_millis(10))
        .build()
        .unwrap();
    let catalog = Arc::new(Catalog::default());
    let events = catalog.events().subscribe();

    Crawler::new(catalog.clone(), Arc::new(fetcher))
        .unwrap()
        .run(stations)
        .await;

    assert_failure_contained(&catalog, events.try_iter().collect(), "slow");
}

#[tokio::test]
async fn test_unreachable_station_is_skipped() {
    // A port nobody listens on once the listener is dropped
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}/", closed.local_addr().unwrap());
    drop(closed);

    let server = MockServer::start().await;
    let good = mount_good_station(&server).await;

    let list = station_list("dead", "Dead FM", &dead) + &good;
    let stations = parse_station_list("stations", &list).unwrap();
    let fetcher = HttpFetcher::builder()
        .retries(2)
        .retry_delay(Duration::from_millis(10))
        .build()
        .unwrap();
    let catalog = Arc::new(Catalog::default());
    let events = catalog.events().subscribe();

    Crawler::new(catalog.clone(), Arc::new(fetcher))
        .unwrap()
        .run(stations)
        .await;

    assert_failure_contained(&catalog, events.try_iter().collect(), "dead");
}

#[tokio::test]
async fn test_transport_error_surfaces_after_retries() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}/x.pls", closed.local_addr().unwrap());
    drop(closed);

    let fetcher = HttpFetcher::builder()
        .retries(2)
        .retry_delay(Duration::from_millis(1))
        .build()
        .unwrap();
    assert!(matches!(fetcher.fetch(&uri).await, Err(wrradio::Error::Http(_))));
}
