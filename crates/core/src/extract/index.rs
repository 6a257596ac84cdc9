//! Album index (listing) page extraction.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{element_text, SiteLayout};
use crate::catalog::{Album, Platform};

static ALBUM_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.albumList tr").expect("album row selector is valid"));
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector is valid"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("anchor selector is valid"));
static NEXT_PAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.pagination > ul > li.pagination-next > a[href]")
        .expect("next page selector is valid")
});

// Fixed cell positions in an index row.
const TITLE_CELL: usize = 1;
const PLATFORM_CELL: usize = 2;
const TYPE_CELL: usize = 3;
const YEAR_CELL: usize = 4;

/// Everything extracted from one index page.
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    /// One album stub per usable data row, in page order.
    pub albums: Vec<Album>,
    /// Data rows that could not yield an album id.
    pub skipped_rows: Vec<SkippedRow>,
    /// Absolute URL of the next index page, if the page links one.
    pub next_page: Option<Url>,
}

/// A data row that was not turned into an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Row index within the table, header included.
    pub row: usize,
    pub reason: String,
}

/// Extract album stubs and the next-page link from an index page.
///
/// Row 0 is the header. Cells are read by position: title link, platform
/// links, type, year.
pub fn parse_index_page(doc: &Html, page_url: &Url, site: &SiteLayout) -> IndexPage {
    let mut page = IndexPage::default();

    for (index, row) in doc.select(&ALBUM_ROW).enumerate() {
        if index == 0 {
            continue;
        }
        match parse_album_row(row, site) {
            Ok(album) => page.albums.push(album),
            Err(reason) => page.skipped_rows.push(SkippedRow { row: index, reason }),
        }
    }

    page.next_page = doc
        .select(&NEXT_PAGE)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok());

    page
}

fn child_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .collect()
}

fn parse_album_row(row: ElementRef, site: &SiteLayout) -> Result<Album, String> {
    let cells = child_cells(row);

    let title_cell = cells
        .get(TITLE_CELL)
        .ok_or_else(|| format!("expected at least {} cells, found {}", TITLE_CELL + 1, cells.len()))?;
    let href = title_cell
        .select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| "title cell has no link".to_string())?;
    let url = site
        .resolve(href)
        .ok_or_else(|| format!("unresolvable link {:?}", href))?;
    let id = site
        .album_id(&url)
        .ok_or_else(|| format!("link {} is not an album page", url))?;

    let platforms = cells
        .get(PLATFORM_CELL)
        .map(|cell| {
            cell.select(&ANCHOR)
                .map(|a| element_text(&a))
                .filter(|name| !name.is_empty())
                .map(Platform::new)
                .collect()
        })
        .unwrap_or_default();

    let text_at = |index: usize| cells.get(index).map(element_text).unwrap_or_default();

    Ok(Album {
        title: element_text(title_cell),
        album_type: text_at(TYPE_CELL),
        year: text_at(YEAR_CELL),
        platforms,
        ..Album::new(id, url.to_string())
    })
}
