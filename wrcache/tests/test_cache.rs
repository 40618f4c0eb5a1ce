use std::time::Duration;
use wrcache::{pk_from_url, ResponseCache};
use tempfile::TempDir;

fn create_test_cache(limit: usize) -> (TempDir, ResponseCache) {
    let temp_dir = tempfile::tempdir().unwrap();
    let cache = ResponseCache::new(
        temp_dir.path().to_str().unwrap(),
        limit,
        Duration::from_secs(3600),
    )
    .unwrap();
    (temp_dir, cache)
}

#[tokio::test]
async fn test_cache_creation() {
    let (temp_dir, cache) = create_test_cache(10);
    assert_eq!(cache.dir(), temp_dir.path());
    assert!(temp_dir.path().join("cache.db").exists());
    assert_eq!(cache.count().unwrap(), 0);
}

#[tokio::test]
async fn test_put_and_get() {
    let (temp_dir, cache) = create_test_cache(10);
    let url = "http://radio.example/a.pls";

    cache
        .put(url, 200, Some("\"v1\""), None, b"[playlist]\nnumberofentries=0\n")
        .await
        .unwrap();

    let body_file = temp_dir.path().join(format!("{}.body", pk_from_url(url)));
    assert!(body_file.exists());

    let response = cache.get(url).await.unwrap().unwrap();
    assert_eq!(response.url, url);
    assert_eq!(response.status, 200);
    assert_eq!(response.etag.as_deref(), Some("\"v1\""));
    assert_eq!(response.body, b"[playlist]\nnumberofentries=0\n");
    assert!(response.is_fresh(cache.max_age()));
    assert!(response.has_validator());
}

#[tokio::test]
async fn test_get_unknown_url() {
    let (_temp_dir, cache) = create_test_cache(10);
    assert!(cache.get("http://nowhere/").await.unwrap().is_none());
}

#[tokio::test]
async fn test_zero_max_age_is_stale() {
    let (_temp_dir, cache) = create_test_cache(10);
    cache.put("http://x/", 200, None, None, b"x").await.unwrap();

    let response = cache.get("http://x/").await.unwrap().unwrap();
    assert!(!response.is_fresh(Duration::ZERO));
    assert!(!response.has_validator());
}

#[tokio::test]
async fn test_missing_body_drops_entry() {
    let (temp_dir, cache) = create_test_cache(10);
    let url = "http://x/gone";
    cache.put(url, 200, None, None, b"x").await.unwrap();

    std::fs::remove_file(temp_dir.path().join(format!("{}.body", pk_from_url(url)))).unwrap();

    assert!(cache.get(url).await.unwrap().is_none());
    assert_eq!(cache.count().unwrap(), 0);
}

#[tokio::test]
async fn test_lru_eviction() {
    let (_temp_dir, cache) = create_test_cache(2);

    cache.put("http://x/1", 200, None, None, b"1").await.unwrap();
    cache.put("http://x/2", 200, None, None, b"2").await.unwrap();

    // Accéder à la première réponse la rend plus récente que la seconde
    cache.get("http://x/1").await.unwrap();

    cache.put("http://x/3", 200, None, None, b"3").await.unwrap();

    assert_eq!(cache.count().unwrap(), 2);
    assert!(cache.get("http://x/1").await.unwrap().is_some());
    assert!(cache.get("http://x/2").await.unwrap().is_none());
    assert!(cache.get("http://x/3").await.unwrap().is_some());
}

#[tokio::test]
async fn test_refresh_keeps_body() {
    let (_temp_dir, cache) = create_test_cache(10);
    let url = "http://x/refresh";
    cache.put(url, 200, None, Some("Mon, 01 Jan 2024 00:00:00 GMT"), b"body").await.unwrap();
    let before = cache.get(url).await.unwrap().unwrap().fetched_at;

    cache.refresh(url).unwrap();

    let after = cache.get(url).await.unwrap().unwrap();
    assert!(after.fetched_at >= before);
    assert_eq!(after.body, b"body");
}

#[tokio::test]
async fn test_purge() {
    let (temp_dir, cache) = create_test_cache(10);
    cache.put("http://x/1", 200, None, None, b"1").await.unwrap();
    cache.put("http://x/2", 404, None, None, b"").await.unwrap();

    cache.purge().await.unwrap();

    assert_eq!(cache.count().unwrap(), 0);
    let leftovers = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".body"))
        .count();
    assert_eq!(leftovers, 0);
}
