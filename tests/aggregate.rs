//! End-to-end tests for the aggregation pipeline: multiple mock feed
//! sources in, one deduplicated, recency-sorted, cached item sequence out.
//!
//! Each test stands up its own `wiremock` servers so the aggregator talks
//! real HTTP, exercising the fetcher, parser, normalizer, merge, and cache
//! together.

use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use newsmux::{Aggregator, AggregatorOptions, MergeRequest};

/// Builds an RSS 2.0 document from (title, link, pubDate) triples.
/// An empty pubDate omits the element entirely.
fn rss(feed_title: &str, items: &[(&str, &str, &str)]) -> String {
    let mut body = format!(
        "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>{feed_title}</title>"
    );
    for (title, link, pub_date) in items {
        body.push_str("<item>");
        body.push_str(&format!("<title>{title}</title><link>{link}</link>"));
        if !pub_date.is_empty() {
            body.push_str(&format!("<pubDate>{pub_date}</pubDate>"));
        }
        body.push_str("</item>");
    }
    body.push_str("</channel></rss>");
    body
}

async fn serve_feed(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(&server)
        .await;
    server
}

async fn serve_status(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn aggregator() -> Aggregator {
    Aggregator::new(AggregatorOptions {
        fetch_timeout: Duration::from_secs(5),
        ..AggregatorOptions::default()
    })
    .unwrap()
}

fn request(sources: Vec<String>, total_limit: usize, ttl: Duration) -> MergeRequest {
    MergeRequest {
        sources,
        per_feed_limit: 20,
        total_limit,
        ttl,
    }
}

#[tokio::test]
async fn test_merges_sources_sorted_newest_first() {
    let a = serve_feed(rss(
        "Feed A",
        &[
            ("Old story", "https://x/old", "Mon, 03 Aug 2026 08:00:00 GMT"),
            ("Undated story", "https://x/undated", ""),
        ],
    ))
    .await;
    let b = serve_feed(rss(
        "Feed B",
        &[("New story", "https://x/new", "Mon, 03 Aug 2026 12:00:00 GMT")],
    ))
    .await;

    let items = aggregator()
        .fetch_combined(&request(
            vec![a.uri(), b.uri()],
            40,
            Duration::from_secs(300),
        ))
        .await;

    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["New story", "Old story", "Undated story"]);
    assert_eq!(items[0].source_label, "Feed B");
    assert_eq!(items[1].source_label, "Feed A");
    assert!(items[2].published_at.is_none());
}

#[tokio::test]
async fn test_duplicate_link_keeps_later_timestamp() {
    // A and B both carry https://x/1; B's copy is more recent
    let a = serve_feed(rss(
        "Feed A",
        &[("Shared story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
    ))
    .await;
    let b = serve_feed(rss(
        "Feed B",
        &[("Shared story", "https://x/1", "Mon, 03 Aug 2026 12:00:00 GMT")],
    ))
    .await;

    let items = aggregator()
        .fetch_combined(&request(
            vec![a.uri(), b.uri()],
            40,
            Duration::from_secs(300),
        ))
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].link, "https://x/1");
    assert_eq!(items[0].source_label, "Feed B");
    assert_eq!(
        items[0].published_at.unwrap().to_rfc3339(),
        "2026-08-03T12:00:00+00:00"
    );
}

#[tokio::test]
async fn test_total_cap_respected() {
    let entries: Vec<(String, String)> = (0..10)
        .map(|i| (format!("Story {i}"), format!("https://x/{i}")))
        .collect();
    let triples: Vec<(&str, &str, &str)> = entries
        .iter()
        .map(|(t, l)| (t.as_str(), l.as_str(), "Mon, 03 Aug 2026 08:00:00 GMT"))
        .collect();
    let server = serve_feed(rss("Feed", &triples)).await;

    let items = aggregator()
        .fetch_combined(&request(vec![server.uri()], 3, Duration::from_secs(300)))
        .await;

    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_failed_source_is_skipped() {
    let good_body = rss(
        "Feed A",
        &[("Only story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
    );
    let good = serve_feed(good_body.clone()).await;
    let bad = serve_status(404).await;

    let with_bad = aggregator()
        .fetch_combined(&request(
            vec![good.uri(), bad.uri()],
            40,
            Duration::from_secs(300),
        ))
        .await;

    // Same result as aggregating the healthy source alone
    let good_again = serve_feed(good_body).await;
    let without_bad = aggregator()
        .fetch_combined(&request(
            vec![good_again.uri()],
            40,
            Duration::from_secs(300),
        ))
        .await;

    assert_eq!(*with_bad, *without_bad);
    assert_eq!(with_bad.len(), 1);
}

#[tokio::test]
async fn test_all_sources_failing_yields_empty() {
    let a = serve_status(404).await;
    let b = serve_status(403).await;

    let items = aggregator()
        .fetch_combined(&request(
            vec![a.uri(), b.uri()],
            40,
            Duration::from_secs(300),
        ))
        .await;

    assert!(items.is_empty());
}

#[tokio::test]
async fn test_cached_within_ttl_serves_without_refetch() {
    let server = serve_feed(rss(
        "Feed",
        &[("Story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
    ))
    .await;

    let agg = aggregator();
    let req = request(vec![server.uri()], 40, Duration::from_secs(300));

    let first = agg.fetch_combined(&req).await;
    let second = agg.fetch_combined(&req).await;

    assert_eq!(*first, *second);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_zero_ttl_forces_refetch() {
    let server = serve_feed(rss(
        "Feed",
        &[("Story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
    ))
    .await;

    let agg = aggregator();
    let cached = request(vec![server.uri()], 40, Duration::from_secs(300));
    let forced = request(vec![server.uri()], 40, Duration::ZERO);

    agg.fetch_combined(&cached).await;
    agg.fetch_combined(&forced).await;

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_ttl_refetches() {
    let server = serve_feed(rss(
        "Feed",
        &[("Story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
    ))
    .await;

    let agg = aggregator();
    let req = request(vec![server.uri()], 40, Duration::from_millis(150));

    agg.fetch_combined(&req).await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    agg.fetch_combined(&req).await;

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_refetch_replaces_cached_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(rss(
                "Feed",
                &[("First", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
            )),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(rss(
                "Feed",
                &[("Second", "https://x/2", "Mon, 03 Aug 2026 09:00:00 GMT")],
            )),
        )
        .mount(&server)
        .await;

    let agg = aggregator();
    let cached = request(vec![server.uri()], 40, Duration::from_secs(300));
    let forced = request(vec![server.uri()], 40, Duration::ZERO);

    let first = agg.fetch_combined(&cached).await;
    assert_eq!(first[0].title, "First");

    // Forced refresh re-stores; the next cached read sees the new items
    let refreshed = agg.fetch_combined(&forced).await;
    assert_eq!(refreshed[0].title, "Second");

    let after = agg.fetch_combined(&cached).await;
    assert_eq!(after[0].title, "Second");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_misses_fetch_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(
                    "Feed",
                    &[("Story", "https://x/1", "Mon, 03 Aug 2026 08:00:00 GMT")],
                ))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let agg = aggregator();
    let req = request(vec![server.uri()], 40, Duration::from_secs(300));

    let (first, second) = tokio::join!(agg.fetch_combined(&req), agg.fetch_combined(&req));

    assert_eq!(*first, *second);
    // The loser of the refresh race waits on the guard and reuses the
    // winner's result instead of fetching again
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_per_feed_limit_applies_before_merge() {
    let entries: Vec<(String, String)> = (0..5)
        .map(|i| (format!("Story {i}"), format!("https://x/{i}")))
        .collect();
    let triples: Vec<(&str, &str, &str)> = entries
        .iter()
        .map(|(t, l)| (t.as_str(), l.as_str(), ""))
        .collect();
    let server = serve_feed(rss("Feed", &triples)).await;

    let agg = aggregator();
    let items = agg
        .fetch_combined(&MergeRequest {
            sources: vec![server.uri()],
            per_feed_limit: 2,
            total_limit: 40,
            ttl: Duration::from_secs(300),
        })
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Story 0");
    assert_eq!(items[1].title, "Story 1");
}

#[tokio::test]
async fn test_entries_without_title_or_link_are_dropped() {
    let body = concat!(
        "<?xml version=\"1.0\"?>\n",
        "<rss version=\"2.0\"><channel><title>Feed</title>",
        "<item><title>Kept</title><link>https://x/kept</link></item>",
        "<item><title>No link here</title></item>",
        "<item><link>https://x/no-title</link></item>",
        "</channel></rss>"
    )
    .to_string();
    let server = serve_feed(body).await;

    let items = aggregator()
        .fetch_combined(&request(vec![server.uri()], 40, Duration::from_secs(300)))
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Kept");
}
