//! End-to-end pipeline tests.
//!
//! Catalog phase and detail phase together, over mock pages:
//! - Tracks, metadata and images land on the right albums
//! - Summary fields survive the detail phase
//! - Re-running keeps track counts stable
//! - Queue overflow batching and per-album failures

use std::sync::Arc;

use ostcat_core::{
    config::QueueConfig,
    testing::{fixtures, MockFetcher},
    FetchError, Pipeline, RecordStore, RetryPolicy, SqliteStore,
};
use url::Url;

fn pipeline(fetcher: &Arc<MockFetcher>, store: &Arc<SqliteStore>, capacity: usize) -> Pipeline {
    Pipeline::new(
        fetcher.clone(),
        store.clone(),
        fixtures::site(),
        Url::parse(fixtures::FIRST_PAGE).unwrap(),
        QueueConfig {
            workers: 2,
            capacity,
        },
        RetryPolicy::none(),
    )
}

fn seed_site(fetcher: &MockFetcher) {
    fetcher.set_page(
        fixtures::FIRST_PAGE,
        &fixtures::index_page(
            &[
                fixtures::index_row("foo", "Foo OST", &["PC"], "Soundtrack", "2012"),
                fixtures::index_row("bar", "Bar OST", &["PS2"], "Arrangement", "2004"),
            ],
            Some("/game-soundtracks?page=2"),
        ),
    );
    fetcher.set_page(
        &fixtures::index_page_url(2),
        &fixtures::index_page(
            &[fixtures::index_row("baz", "Baz OST", &["PC", "Mac"], "Soundtrack", "2020")],
            None,
        ),
    );

    fetcher.set_page(
        &fixtures::album_url("foo"),
        &fixtures::detail_page_full(
            &["", "#", "CD", "Song Name", "", "MP3", "FLAC"],
            &[
                "<tr><td></td><td>1.</td><td>1</td><td>Title Theme</td><td class=\"clickable-row\" align=\"right\">2:31</td><td><a href=\"/game-soundtracks/album/foo/01.mp3\">3.2 MB</a></td><td><a href=\"/game-soundtracks/album/foo/01.flac\">20 MB</a></td></tr>".to_string(),
                "<tr><td></td><td>2.</td><td>1</td><td>Stage 1</td><td class=\"clickable-row\" align=\"right\">3:05</td><td><a href=\"/game-soundtracks/album/foo/02.mp3\">4.1 MB</a></td><td><a href=\"/game-soundtracks/album/foo/02.flac\">26 MB</a></td></tr>".to_string(),
                "<tr id=\"songlist_footer\"><th colspan=\"4\">Total:</th><th>5m 36s</th><th>7.3 MB</th><th>46 MB</th></tr>".to_string(),
            ],
            Some(&fixtures::album_info(2, "7.3 MB", "46 MB", "Jan 1st, 2013")),
            &["/images/foo/cover.jpg"],
        ),
    );
    // Formats swapped and one unnumbered track
    fetcher.set_page(
        &fixtures::album_url("bar"),
        &fixtures::detail_page(
            &["", "#", "Song Name", "FLAC", "MP3"],
            &[
                fixtures::track_row(&["", "N/A", "Prologue", "<a href=\"/bar/0.flac\">10 MB</a>", "<a href=\"/bar/0.mp3\">1 MB</a>"]),
                fixtures::track_row(&["", "N/A", "Epilogue", "<a href=\"/bar/9.flac\">12 MB</a>", "<a href=\"/bar/9.mp3\">2 MB</a>"]),
            ],
        ),
    );
    // baz detail page is missing and fails with 404
}

#[tokio::test]
async fn test_full_run_builds_catalog() {
    let fetcher = Arc::new(MockFetcher::new());
    seed_site(&fetcher);
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let report = pipeline(&fetcher, &store, 100).run().await;

    assert!(report.is_complete());
    let catalog = report.catalog.as_ref().unwrap();
    assert_eq!(catalog.pages_visited, 2);
    assert_eq!(catalog.albums_upserted, 3);

    let details = report.details.as_ref().unwrap();
    assert_eq!(details.albums, 3);
    assert_eq!(details.queue.completed, 2);
    assert_eq!(details.queue.fetch_failures.len(), 1);
    assert_eq!(details.queue.fetch_failures[0].url, fixtures::album_url("baz"));

    let foo = store.get_album("foo").unwrap();
    assert_eq!(foo.title, "Foo OST");
    assert_eq!(foo.year, "2012");
    assert_eq!(foo.album_type, "Soundtrack");
    assert_eq!(foo.platform_names(), vec!["PC"]);
    assert_eq!(foo.runtime.as_deref(), Some("5m 36s"));
    assert_eq!(foo.file_count, Some(2));
    assert_eq!(foo.date_added.as_deref(), Some("Jan 1st, 2013"));
    assert_eq!(foo.filesize_flac_bytes, Some(46 * 1024 * 1024));
    assert_eq!(foo.images.len(), 1);
    assert_eq!(foo.tracks.len(), 2);

    let theme = &foo.tracks[0];
    assert_eq!(theme.track_number, 1);
    assert_eq!(theme.disc_number, 1);
    assert_eq!(theme.title, "Title Theme");
    assert_eq!(theme.runtime, "2:31");
    assert_eq!(theme.filesize_mp3, "3.2 MB");
    assert_eq!(
        theme.url.as_deref(),
        Some("https://downloads.khinsider.com/game-soundtracks/album/foo/01.flac")
    );

    let bar = store.get_album("bar").unwrap();
    assert_eq!(bar.tracks.len(), 2);
    assert!(bar.tracks.iter().all(|t| t.track_number == 0));
    assert_eq!(
        bar.tracks[0].mp3_url.as_deref(),
        Some("https://downloads.khinsider.com/bar/0.mp3")
    );
    assert_eq!(bar.tracks[0].filesize_flac, "10 MB");

    let baz = store.get_album("baz").unwrap();
    assert!(baz.tracks.is_empty());
    assert_eq!(baz.platform_names().len(), 2);
}

#[tokio::test]
async fn test_second_run_keeps_counts_stable() {
    let fetcher = Arc::new(MockFetcher::new());
    seed_site(&fetcher);
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    pipeline(&fetcher, &store, 100).run().await;
    let first = store.stats().unwrap();
    pipeline(&fetcher, &store, 100).run().await;
    let second = store.stats().unwrap();

    assert_eq!(first.total_albums, second.total_albums);
    assert_eq!(first.total_tracks, 4);
    assert_eq!(second.total_tracks, 4);
    assert_eq!(second.total_images, 1);
    assert_eq!(second.albums_with_tracks, 2);
}

#[tokio::test]
async fn test_small_queue_processes_every_album() {
    let fetcher = Arc::new(MockFetcher::new());
    seed_site(&fetcher);
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let report = pipeline(&fetcher, &store, 1).run().await;

    let details = report.details.unwrap();
    assert_eq!(details.submitted, 3);
    assert_eq!(details.overflows, 2);
    assert_eq!(details.batches, 3);
    assert_eq!(details.queue.processed(), 3);
    assert_eq!(store.stats().unwrap().total_tracks, 4);
}

#[tokio::test]
async fn test_transient_detail_failure_does_not_stop_others() {
    let fetcher = Arc::new(MockFetcher::new());
    seed_site(&fetcher);
    fetcher.fail_next(
        &fixtures::album_url("foo"),
        FetchError::Timeout {
            url: fixtures::album_url("foo"),
        },
    );
    let store = Arc::new(SqliteStore::in_memory().unwrap());

    let report = pipeline(&fetcher, &store, 100).run().await;
    let details = report.details.unwrap();

    assert_eq!(details.queue.completed, 1);
    assert_eq!(details.queue.fetch_failures.len(), 2);
    assert!(store.get_album("foo").unwrap().tracks.is_empty());
    assert_eq!(store.get_album("bar").unwrap().tracks.len(), 2);

    // The next run picks the album up
    let report = pipeline(&fetcher, &store, 100).run().await;
    assert_eq!(report.details.unwrap().queue.completed, 2);
    assert_eq!(store.get_album("foo").unwrap().tracks.len(), 2);
}
