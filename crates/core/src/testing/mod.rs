//! Testing utilities and mock implementations.
//!
//! Lets the crawler, queue and pipeline run end to end against in-memory
//! pages and an in-memory SQLite store.
//!
//! # Example
//!
//! ```rust,ignore
//! use ostcat_core::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_page(
//!     fixtures::FIRST_PAGE,
//!     &fixtures::index_page(&[fixtures::index_row("foo", "Foo OST", &["PC"], "Soundtrack", "2012")], None),
//! );
//! ```

mod flaky_store;
mod mock_fetcher;

pub use flaky_store::FlakyStore;
pub use mock_fetcher::MockFetcher;

/// HTML fixtures shaped like the catalog site.
pub mod fixtures {
    use url::Url;

    use crate::extract::SiteLayout;

    pub const BASE_URL: &str = "https://downloads.khinsider.com";
    pub const FIRST_PAGE: &str = "https://downloads.khinsider.com/game-soundtracks?page=1";
    pub const ALBUM_PREFIX: &str = "/game-soundtracks/album/";

    pub fn site() -> SiteLayout {
        SiteLayout::new(
            Url::parse(BASE_URL).expect("fixture base URL is valid"),
            ALBUM_PREFIX,
        )
    }

    pub fn album_url(slug: &str) -> String {
        format!("{}{}{}", BASE_URL, ALBUM_PREFIX, slug)
    }

    pub fn index_page_url(page: u32) -> String {
        format!("{}/game-soundtracks?page={}", BASE_URL, page)
    }

    /// One `table.albumList` data row.
    pub fn index_row(
        slug: &str,
        title: &str,
        platforms: &[&str],
        album_type: &str,
        year: &str,
    ) -> String {
        let platforms: Vec<String> = platforms
            .iter()
            .map(|p| format!("<a href=\"/game-soundtracks/{}\">{}</a>", p.to_lowercase(), p))
            .collect();
        format!(
            "<tr><td><img src=\"/icon.png\"></td><td><a href=\"{}{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            ALBUM_PREFIX,
            slug,
            title,
            platforms.join(", "),
            album_type,
            year
        )
    }

    /// An index page with a header row, `rows`, and an optional next link.
    pub fn index_page(rows: &[String], next: Option<&str>) -> String {
        let pagination = next
            .map(|href| {
                format!(
                    "<div class=\"pagination\"><ul><li class=\"pagination-next\"><a href=\"{}\">Next</a></li></ul></div>",
                    href
                )
            })
            .unwrap_or_default();
        format!(
            "<html><body><div id=\"pageContent\">\
             <table class=\"albumList\">\
             <tr><th></th><th>Album</th><th>Platform</th><th>Type</th><th>Year</th></tr>\
             {}</table>{}</div></body></html>",
            rows.concat(),
            pagination
        )
    }

    /// One `table#songlist` data row; cells are raw inner HTML.
    pub fn track_row(cells: &[&str]) -> String {
        let cells: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tr>{}</tr>", cells)
    }

    /// A detail page with a track table only.
    pub fn detail_page(headers: &[&str], rows: &[String]) -> String {
        detail_page_full(headers, rows, None, &[])
    }

    /// A detail page with an optional info paragraph and album images.
    pub fn detail_page_full(
        headers: &[&str],
        rows: &[String],
        info: Option<&str>,
        images: &[&str],
    ) -> String {
        let header: String = headers.iter().map(|h| format!("<th>{}</th>", h)).collect();
        let images: String = images
            .iter()
            .map(|href| {
                format!(
                    "<div class=\"albumImage\"><a href=\"{}\"><img src=\"{}\"></a></div>",
                    href, href
                )
            })
            .collect();
        let info = info
            .map(|body| format!("<p align=\"left\">{}</p>", body))
            .unwrap_or_default();
        format!(
            "<html><body><div id=\"pageContent\">{}{}\
             <table id=\"songlist\"><tr id=\"songlist_header\">{}</tr>{}</table>\
             </div></body></html>",
            images,
            info,
            header,
            rows.concat()
        )
    }

    /// Body of the album info paragraph.
    pub fn album_info(file_count: u32, mp3_size: &str, flac_size: &str, date_added: &str) -> String {
        format!(
            "Number of Files: <b>{}</b><br>\
             Total Filesize: <b>{}</b> (MP3), <b>{}</b> (FLAC)<br>\
             Date Added: <b>{}</b><br>",
            file_count, mp3_size, flac_size, date_added
        )
    }
}
