mod common;

use chrono::{Local, TimeZone, Utc};
use common::*;
use news_collector::{identity_hash, Article, Collector, ErrorReport, ExtractedArticle, Source};
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn read_log(path: &std::path::Path) -> Vec<Article> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn same_entry_is_collected_once_across_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let log_a = dir.path().join("a.log");
    let log_b = dir.path().join("b.log");
    fs::write(
        &harness.config.listeners_path,
        format!("{}\n{}\n", log_a.display(), log_b.display()),
    )
    .unwrap();

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let source = Source::parse(FEED_URL).unwrap();

    // cycle 1
    let first = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(first.accepted(), 1);
    assert_eq!(first.sources[0].deliveries, 2);

    let seen = collector.dedup().load(&source).unwrap();
    assert_eq!(
        seen.hashes(),
        &[identity_hash("https://example.com/a1"), identity_hash("First Post")]
    );

    let archived = collector.archive().load_articles(&source).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].feed, FEED_URL);
    assert!(collector
        .archive()
        .path_for(&source, Local::now().date_naive())
        .exists());

    for log in [&log_a, &log_b] {
        let lines = read_log(log);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].title, "First Post");
        assert!(!lines[0].entities.is_empty());
    }

    // cycle 2, same payload
    let second = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(second.accepted(), 0);
    assert_eq!(second.sources[0].already_seen, 1);
    assert_eq!(harness.extractor.calls(), 1);

    assert_eq!(collector.dedup().load(&source).unwrap(), seen);
    assert_eq!(collector.archive().load_articles(&source).unwrap().len(), 1);
    assert_eq!(read_log(&log_a).len(), 1);
    assert_eq!(read_log(&log_b).len(), 1);
}

#[tokio::test]
async fn matching_title_alone_marks_an_entry_seen() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());
    harness
        .extractor
        .page("https://example.com/a1-amp", "First Post", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );
    collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1-amp", "First Post")])),
    );
    let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();

    assert_eq!(report.accepted(), 0);
    assert_eq!(harness.extractor.calls(), 1);
}

#[tokio::test]
async fn untitled_entries_do_not_shadow_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness
        .extractor
        .page("https://example.com/p1", "", &long_body());
    harness
        .extractor
        .page("https://example.com/p2", "", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/p1", "")])),
    );
    let first = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(first.accepted(), 1);

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/p2", "")])),
    );
    let second = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(second.accepted(), 1);
    assert_eq!(second.sources[0].already_seen, 0);

    let seen = collector.dedup().load(&Source::parse(FEED_URL).unwrap()).unwrap();
    assert_eq!(
        seen.hashes(),
        &[identity_hash("https://example.com/p1"), identity_hash("https://example.com/p2")]
    );
}

#[tokio::test]
async fn extracted_url_and_title_are_recorded_as_seen() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1?utm=rss", "First Post (updated)")])),
    );
    // the page reports its canonical url and a shorter headline
    harness.extractor.insert_for(
        "https://example.com/a1?utm=rss",
        ExtractedArticle {
            url: "https://example.com/a1".into(),
            title: "First Post".into(),
            text: long_body(),
            ..ExtractedArticle::default()
        },
    );

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let source = Source::parse(FEED_URL).unwrap();

    let first = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(first.accepted(), 1);

    let archived = collector.archive().load_articles(&source).unwrap();
    assert_eq!(archived[0].url, "https://example.com/a1");

    let seen = collector.dedup().load(&source).unwrap();
    assert!(seen.contains("https://example.com/a1", "Other"));
    assert!(seen.contains("https://example.com/other", "First Post"));
    assert!(seen.contains("https://example.com/a1?utm=rss", "Other"));
    assert!(seen.contains("https://example.com/other", "First Post (updated)"));

    // a different link carrying the article's real title is a repeat
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1-amp", "First Post")])),
    );
    let second = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(second.accepted(), 0);
    assert_eq!(second.sources[0].already_seen, 1);
}

#[tokio::test]
async fn tolerated_feed_anomalies_still_yield_articles() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Served {
            body: rss(&[("https://example.com/a1", "First Post")]),
            content_type: "text/html; charset=utf-8".into(),
        },
    );
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.accepted(), 1);
    assert_eq!(
        collector
            .archive()
            .load_articles(&Source::parse(FEED_URL).unwrap())
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn hostless_feed_url_only_skips_itself() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let hostless = "mailto:desk@example.com";
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let report = collector
        .run_cycle(&[hostless.to_string(), FEED_URL.to_string()])
        .await
        .unwrap();

    assert_eq!(report.failed, vec![hostless.to_string()]);
    assert_eq!(report.accepted(), 1);
}

#[tokio::test]
async fn short_bodies_are_rejected_and_retried() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let log = dir.path().join("out.log");
    fs::write(&harness.config.listeners_path, format!("{}\n", log.display())).unwrap();

    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/gone", "Missing Page")])),
    );
    harness
        .extractor
        .page("https://example.com/gone", "404 Not Found", "Sorry, that page does not exist.");

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let source = Source::parse(FEED_URL).unwrap();

    for cycle in 1..=2 {
        let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
        assert_eq!(report.sources[0].too_short, 1);
        assert_eq!(report.accepted(), 0);
        assert_eq!(harness.extractor.calls(), cycle);
    }

    assert!(collector.dedup().load(&source).unwrap().is_empty());
    assert!(collector.dedup().path_for(&source).exists());
    assert!(collector.archive().load_articles(&source).unwrap().is_empty());
    assert!(!log.exists());
}

#[tokio::test]
async fn extraction_misses_stay_unseen() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/flaky", "Flaky")])),
    );

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );

    let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(report.sources[0].extraction_misses, 1);

    // the page comes back on the next cycle
    harness
        .extractor
        .page("https://example.com/flaky", "Flaky", &long_body());
    let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();
    assert_eq!(report.accepted(), 1);
}

#[tokio::test]
async fn feed_timestamp_wins_and_images_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let feed = r#"<?xml version="1.0" encoding="utf-8"?><rss version="2.0"><channel><title>Example</title><link>https://example.com/</link><description>d</description>
<item><title>Dated</title><link>https://example.com/dated</link><pubDate>Tue, 03 Jun 2025 09:39:21 GMT</pubDate></item>
</channel></rss>"#;
    harness
        .fetcher
        .serve(FEED_URL, StubResponse::Feed(feed.to_string()));
    harness.extractor.insert(ExtractedArticle {
        url: "https://example.com/dated".into(),
        title: "Dated".into(),
        text: long_body(),
        image: Some("https://example.com/lead.jpg".into()),
        published: Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()),
        ..ExtractedArticle::default()
    });

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();

    let source = Source::parse(FEED_URL).unwrap();
    let archived = collector.archive().load_articles(&source).unwrap();
    assert_eq!(
        archived[0].published,
        Some(Utc.with_ymd_and_hms(2025, 6, 3, 9, 39, 21).unwrap())
    );

    assert_eq!(harness.fetcher.image_fetches.load(Ordering::SeqCst), 1);
    let image = harness
        .config
        .data_dir
        .join("_images")
        .join(identity_hash("https://example.com/lead.jpg"));
    assert!(image.exists());
}

#[tokio::test]
async fn unparseable_feed_only_skips_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let broken = "https://broken.org/feed";
    harness
        .fetcher
        .serve(broken, StubResponse::Feed("<html><body>Not a feed</body></html>".into()));
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());

    let reporter = Arc::new(RecordingReporter::default());
    let collector = Collector::new(
        harness.config.clone(),
        harness.services(Some(reporter.clone() as Arc<dyn ErrorReport>)),
        CancellationToken::new(),
    );

    let report = collector
        .run_cycle(&[broken.to_string(), FEED_URL.to_string()])
        .await
        .unwrap();

    assert_eq!(report.failed, vec![broken.to_string()]);
    assert_eq!(report.accepted(), 1);
    assert_eq!(reporter.reports.lock().unwrap().len(), 1);
    assert!(!collector
        .dedup()
        .path_for(&Source::parse(broken).unwrap())
        .exists());
}

#[tokio::test]
async fn fetch_timeout_skips_source_but_still_persists_seen_set() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    harness.fetcher.serve(FEED_URL, StubResponse::Timeout);

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let report = collector.run_cycle(&[FEED_URL.to_string()]).await.unwrap();

    assert_eq!(report.sources[0].entries, 0);
    assert!(report.failed.is_empty());
    assert!(collector
        .dedup()
        .path_for(&Source::parse(FEED_URL).unwrap())
        .exists());
}

#[tokio::test]
async fn storage_failure_reaches_the_cycle_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let mut harness = Harness::new(dir.path());
    // a plain file where the data directory should be
    let blocked = dir.path().join("not-a-dir");
    fs::write(&blocked, "x").unwrap();
    harness.config.data_dir = blocked;
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let err = collector
        .run_cycle(&[FEED_URL.to_string()])
        .await
        .unwrap_err();

    assert!(!err.is_source_local());
}

#[tokio::test]
async fn run_without_reporter_surfaces_unclassified_errors() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );

    // missing feed list
    let err = collector
        .run(&dir.path().join("feeds.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, news_collector::CollectorError::Io { .. }));
}

#[tokio::test]
async fn run_with_reporter_keeps_going_until_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let cancel = CancellationToken::new();
    let reporter = Arc::new(RecordingReporter {
        cancel_on_report: Some(cancel.clone()),
        ..RecordingReporter::default()
    });
    let collector = Collector::new(
        harness.config.clone(),
        harness.services(Some(reporter.clone() as Arc<dyn ErrorReport>)),
        cancel,
    );

    collector
        .run(&dir.path().join("feeds.txt"))
        .await
        .unwrap();

    assert_eq!(reporter.reports.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn run_once_reads_the_feed_list() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path());
    let feeds = dir.path().join("feeds.txt");
    fs::write(&feeds, format!("# news\n\n{}\n", FEED_URL)).unwrap();
    harness.fetcher.serve(
        FEED_URL,
        StubResponse::Feed(rss(&[("https://example.com/a1", "First Post")])),
    );
    harness
        .extractor
        .page("https://example.com/a1", "First Post", &long_body());

    let collector = Collector::new(
        harness.config.clone(),
        harness.services(None),
        CancellationToken::new(),
    );
    let report = collector.run_once(&feeds).await.unwrap().unwrap();

    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.accepted(), 1);
}
