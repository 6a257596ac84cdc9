//! HTML extraction for index and detail pages.
//!
//! Everything here is pure: a parsed [`scraper::Html`] goes in, typed records
//! come out. Fetching and persistence live in the crawler.

mod columns;
mod detail;
mod index;
mod text;

pub use columns::{Column, ColumnMap};
pub use detail::{parse_detail_page, AlbumDetail};
pub use index::{parse_index_page, IndexPage, SkippedRow};
pub use text::{element_text, parse_size_bytes, parse_track_number};

use url::Url;

use crate::config::{ConfigError, SiteConfig};

/// Resolved site layout shared by the extractors.
#[derive(Debug, Clone)]
pub struct SiteLayout {
    /// Origin that relative links are resolved against.
    pub base: Url,
    /// Path prefix in front of every album slug, e.g. `/game-soundtracks/album/`.
    pub album_prefix: String,
}

impl SiteLayout {
    pub fn new(base: Url, album_prefix: impl Into<String>) -> Self {
        Self {
            base,
            album_prefix: album_prefix.into(),
        }
    }

    pub fn from_config(site: &SiteConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(site.base()?, site.album_path_prefix.clone()))
    }

    /// Resolve an href against the site base.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base.join(href).ok()
    }

    pub fn album_id(&self, url: &Url) -> Option<String> {
        album_id_from_url(url, &self.album_prefix)
    }
}

/// Derive an album's slug from its detail-page URL.
///
/// This is the only place album ids are computed; index rows and detail
/// requests both go through it so an album keeps one id.
pub fn album_id_from_url(url: &Url, prefix: &str) -> Option<String> {
    let rest = url.path().strip_prefix(prefix)?;
    let slug = rest.split('/').next()?.trim();
    if slug.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(slug)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| slug.to_string());
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/game-soundtracks/album/";

    #[test]
    fn test_album_id_from_url() {
        let url = Url::parse("https://downloads.khinsider.com/game-soundtracks/album/foo").unwrap();
        assert_eq!(album_id_from_url(&url, PREFIX), Some("foo".to_string()));
    }

    #[test]
    fn test_album_id_ignores_trailing_segments_and_query() {
        let url = Url::parse(
            "https://downloads.khinsider.com/game-soundtracks/album/foo/01.mp3?x=1",
        )
        .unwrap();
        assert_eq!(album_id_from_url(&url, PREFIX), Some("foo".to_string()));
    }

    #[test]
    fn test_album_id_decodes_percent_escapes() {
        let url = Url::parse("https://example.com/game-soundtracks/album/foo%20bar").unwrap();
        assert_eq!(album_id_from_url(&url, PREFIX), Some("foo bar".to_string()));
    }

    #[test]
    fn test_album_id_outside_prefix() {
        let url = Url::parse("https://example.com/game-soundtracks?page=2").unwrap();
        assert_eq!(album_id_from_url(&url, PREFIX), None);

        let url = Url::parse("https://example.com/game-soundtracks/album/").unwrap();
        assert_eq!(album_id_from_url(&url, PREFIX), None);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let site = SiteLayout::new(Url::parse("https://example.com").unwrap(), PREFIX);
        assert_eq!(
            site.resolve("/game-soundtracks/album/foo").unwrap().as_str(),
            "https://example.com/game-soundtracks/album/foo"
        );
        assert_eq!(
            site.resolve("https://cdn.example.com/x.jpg").unwrap().as_str(),
            "https://cdn.example.com/x.jpg"
        );
        assert!(site.resolve("   ").is_none());
    }

    #[test]
    fn test_layout_from_config() {
        let site = SiteLayout::from_config(&SiteConfig::default()).unwrap();
        assert_eq!(site.base.host_str(), Some("downloads.khinsider.com"));
        assert_eq!(site.album_prefix, PREFIX);
    }
}
