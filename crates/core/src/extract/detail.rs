//! Album detail page extraction: track table, images and album metadata.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{element_text, parse_size_bytes, parse_track_number, Column, ColumnMap, SiteLayout};
use crate::catalog::{Album, Image, Track};

static SONG_ROW: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#songlist tr").expect("song row selector is valid"));
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("link selector is valid"));
static ALBUM_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.albumImage a[href]").expect("album image selector is valid")
});
static INFO_PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#pageContent p").expect("info selector is valid"));

static MP3_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([\d.,]+\s*[KMGT]?B)\s*\(MP3\)").expect("mp3 total pattern is valid")
});
static FLAC_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([\d.,]+\s*[KMGT]?B)\s*\(FLAC\)").expect("flac total pattern is valid")
});

/// Everything extracted from one album detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumDetail {
    /// One track per data row of the song table, in page order.
    pub tracks: Vec<Track>,
    pub images: Vec<Image>,
    /// Total runtime from the table footer.
    pub runtime: Option<String>,
    pub file_count: Option<u32>,
    pub filesize_mp3_bytes: Option<u64>,
    pub filesize_flac_bytes: Option<u64>,
    pub date_added: Option<String>,
}

impl AlbumDetail {
    /// Merge this detail into a stored album.
    ///
    /// Summary fields are left alone; detail fields are only replaced when the
    /// page supplied a value.
    pub fn apply_to(self, album: &mut Album) {
        album.tracks = self
            .tracks
            .into_iter()
            .map(|track| Track {
                album_id: album.id.clone(),
                ..track
            })
            .collect();

        for image in self.images {
            if !album.images.contains(&image) {
                album.images.push(image);
            }
        }

        if self.runtime.is_some() {
            album.runtime = self.runtime;
        }
        if self.file_count.is_some() {
            album.file_count = self.file_count;
        }
        if self.filesize_mp3_bytes.is_some() {
            album.filesize_mp3_bytes = self.filesize_mp3_bytes;
        }
        if self.filesize_flac_bytes.is_some() {
            album.filesize_flac_bytes = self.filesize_flac_bytes;
        }
        if self.date_added.is_some() {
            album.date_added = self.date_added;
        }
    }
}

/// Extract the track table and album metadata from a detail page.
///
/// The first header row fixes the column meanings for every following row of
/// the same table. Header rows after it are footers.
pub fn parse_detail_page(doc: &Html, site: &SiteLayout) -> AlbumDetail {
    let mut detail = AlbumDetail::default();
    let mut columns: Option<ColumnMap> = None;

    for row in doc.select(&SONG_ROW) {
        let data = child_cells(row, "td");
        if !data.is_empty() {
            let Some(map) = columns.as_ref() else {
                debug!("Skipping song row before header row");
                continue;
            };
            let position = detail.tracks.len() as u32 + 1;
            detail.tracks.push(parse_track_row(&data, map, site, position));
            continue;
        }

        let headers = child_cells(row, "th");
        if headers.is_empty() {
            continue;
        }
        if columns.is_none() {
            columns = Some(ColumnMap::from_labels(headers.iter().map(element_text)));
        } else if let Some(total) = footer_total(&headers) {
            detail.runtime = Some(total);
        }
    }

    detail.images = album_images(doc, site);
    parse_album_info(doc, &mut detail);

    detail
}

fn child_cells<'a>(row: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == name)
        .collect()
}

fn cell_link(cell: &ElementRef, site: &SiteLayout) -> Option<String> {
    cell.select(&LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| site.resolve(href))
        .map(|url| url.to_string())
}

fn parse_track_row(
    cells: &[ElementRef],
    columns: &ColumnMap,
    site: &SiteLayout,
    position: u32,
) -> Track {
    let mut track = Track {
        position,
        ..Track::default()
    };

    // Column 0 holds the row's play/select control.
    for (index, cell) in cells.iter().enumerate().skip(1) {
        let text = element_text(cell);
        match columns.get(index) {
            Column::Number => match parse_track_number(&text) {
                Some(number) => track.track_number = number,
                None => debug!(text = %text, position, "Unparseable track number"),
            },
            Column::Disc => match text.parse::<u32>() {
                Ok(disc) => track.disc_number = disc,
                Err(_) => debug!(text = %text, position, "Unparseable disc number"),
            },
            Column::Title => track.title = text,
            Column::Mp3 => {
                track.mp3_url = cell_link(cell, site);
                track.mp3_available = true;
                track.filesize_mp3 = text;
            }
            Column::Flac => {
                track.flac_url = cell_link(cell, site);
                track.flac_available = true;
                track.filesize_flac = text;
            }
            Column::Other => {
                if cell.value().attr("align") == Some("right") && !text.is_empty() {
                    track.runtime = text;
                }
            }
        }
    }

    // FLAC is the preferred download when both formats exist.
    track.url = track.flac_url.clone().or_else(|| track.mp3_url.clone());
    track
}

/// The value cell following a `Total:` label in a footer row.
fn footer_total(cells: &[ElementRef]) -> Option<String> {
    let texts: Vec<String> = cells.iter().map(element_text).collect();
    let label = texts
        .iter()
        .position(|t| t.trim_end_matches(':').eq_ignore_ascii_case("total"))?;
    texts
        .into_iter()
        .skip(label + 1)
        .find(|t| !t.is_empty())
}

fn album_images(doc: &Html, site: &SiteLayout) -> Vec<Image> {
    let mut images: Vec<Image> = Vec::new();
    for link in doc.select(&ALBUM_IMAGE) {
        let Some(url) = link.value().attr("href").and_then(|href| site.resolve(href)) else {
            continue;
        };
        let image = Image::new(url.to_string());
        if !images.contains(&image) {
            images.push(image);
        }
    }
    images
}

/// Read `Label: value` pairs from the album info paragraph.
fn parse_album_info(doc: &Html, detail: &mut AlbumDetail) {
    let Some(info) = doc
        .select(&INFO_PARAGRAPH)
        .find(|p| element_text(p).contains("Number of Files"))
    else {
        return;
    };

    let parts: Vec<&str> = info
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    detail.file_count = value_after(&parts, "Number of Files").and_then(|v| v.parse().ok());
    detail.date_added = value_after(&parts, "Date Added").map(str::to_string);

    let joined = parts.join(" ");
    detail.filesize_mp3_bytes = MP3_TOTAL
        .captures(&joined)
        .and_then(|c| parse_size_bytes(&c[1]));
    detail.filesize_flac_bytes = FLAC_TOTAL
        .captures(&joined)
        .and_then(|c| parse_size_bytes(&c[1]));
}

fn value_after<'a>(parts: &[&'a str], label: &str) -> Option<&'a str> {
    let at = parts
        .iter()
        .position(|p| p.trim_end_matches(':').trim().eq_ignore_ascii_case(label))?;
    parts.get(at + 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn site() -> SiteLayout {
        SiteLayout::new(
            Url::parse("https://downloads.khinsider.com").unwrap(),
            "/game-soundtracks/album/",
        )
    }

    fn header(labels: &[&str]) -> String {
        let cells: String = labels.iter().map(|l| format!("<th>{}</th>", l)).collect();
        format!(r#"<tr id="songlist_header">{}</tr>"#, cells)
    }

    fn row(cells: &[&str]) -> String {
        let cells: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tr>{}</tr>", cells)
    }

    fn page(rows: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div id="pageContent"><table id="songlist">{}</table></div></body></html>"#,
            rows
        ))
    }

    #[test]
    fn test_title_theme_row() {
        let doc = page(&format!(
            "{}{}",
            header(&["", "#", "CD", "Song Name", "MP3", "FLAC"]),
            row(&[
                "",
                "1.",
                "1",
                "Title Theme",
                r#"<a href="/x.mp3">3.2 MB</a>"#,
                r#"<a href="/x.flac">20 MB</a>"#,
            ])
        ));
        let detail = parse_detail_page(&doc, &site());

        assert_eq!(detail.tracks.len(), 1);
        let track = &detail.tracks[0];
        assert_eq!(track.track_number, 1);
        assert_eq!(track.disc_number, 1);
        assert_eq!(track.position, 1);
        assert_eq!(track.title, "Title Theme");
        assert!(track.mp3_available);
        assert!(track.flac_available);
        assert_eq!(track.filesize_mp3, "3.2 MB");
        assert_eq!(track.filesize_flac, "20 MB");
        assert_eq!(
            track.mp3_url.as_deref(),
            Some("https://downloads.khinsider.com/x.mp3")
        );
        assert_eq!(
            track.flac_url.as_deref(),
            Some("https://downloads.khinsider.com/x.flac")
        );
        // FLAC wins the shared field
        assert_eq!(track.url, track.flac_url);
    }

    #[test]
    fn test_swapped_format_columns_route_by_header() {
        let doc = page(&format!(
            "{}{}",
            header(&["", "#", "Song Name", "FLAC", "MP3"]),
            row(&[
                "",
                "2.",
                "Stage 1",
                r#"<a href="/s1.flac">30 MB</a>"#,
                r#"<a href="/s1.mp3">4 MB</a>"#,
            ])
        ));
        let track = &parse_detail_page(&doc, &site()).tracks[0];
        assert_eq!(
            track.mp3_url.as_deref(),
            Some("https://downloads.khinsider.com/s1.mp3")
        );
        assert_eq!(
            track.flac_url.as_deref(),
            Some("https://downloads.khinsider.com/s1.flac")
        );
        assert_eq!(track.filesize_mp3, "4 MB");
        assert_eq!(track.filesize_flac, "30 MB");
        assert_eq!(track.url, track.flac_url);
    }

    #[test]
    fn test_mp3_only_uses_mp3_url() {
        let doc = page(&format!(
            "{}{}",
            header(&["", "#", "Song Name", "MP3"]),
            row(&["", "1.", "Intro", r#"<a href="/i.mp3">1 MB</a>"#])
        ));
        let track = &parse_detail_page(&doc, &site()).tracks[0];
        assert!(track.mp3_available);
        assert!(!track.flac_available);
        assert_eq!(track.url, track.mp3_url);
        assert!(track.flac_url.is_none());
    }

    #[test]
    fn test_malformed_numbers_default_to_zero() {
        let doc = page(&format!(
            "{}{}{}",
            header(&["", "#", "CD", "Song Name"]),
            row(&["", "N/A", "N/A", "Mystery Track"]),
            row(&["", "2.", "1", "Known Track"])
        ));
        let detail = parse_detail_page(&doc, &site());
        assert_eq!(detail.tracks.len(), 2);
        assert_eq!(detail.tracks[0].track_number, 0);
        assert_eq!(detail.tracks[0].disc_number, 0);
        assert_eq!(detail.tracks[0].title, "Mystery Track");
        assert_eq!(detail.tracks[1].track_number, 2);
        assert_eq!(detail.tracks[1].position, 2);
    }

    #[test]
    fn test_unknown_columns_are_ignored() {
        let doc = page(&format!(
            "{}{}",
            header(&["", "Song Name", "OGG", "#"]),
            row(&["", "Theme", r#"<a href="/t.ogg">2 MB</a>"#, "5"])
        ));
        let track = &parse_detail_page(&doc, &site()).tracks[0];
        assert_eq!(track.title, "Theme");
        assert_eq!(track.track_number, 5);
        assert!(track.url.is_none());
        assert!(track.runtime.is_empty());
    }

    #[test]
    fn test_first_column_is_always_skipped() {
        let doc = page(&format!(
            "{}{}",
            header(&["Song Name", "#"]),
            row(&["Checkbox", "3"])
        ));
        let track = &parse_detail_page(&doc, &site()).tracks[0];
        assert!(track.title.is_empty());
        assert_eq!(track.track_number, 3);
    }

    #[test]
    fn test_runtime_from_right_aligned_cell_and_footer() {
        let doc = page(&format!(
            r#"{}<tr><td></td><td>1.</td><td>Intro</td><td class="clickable-row" align="right">2:31</td><td align="right"><a href="/i.mp3">3 MB</a></td></tr><tr id="songlist_footer"><th colspan="3">Total:</th><th>2m 31s</th><th>3 MB</th></tr>"#,
            header(&["", "#", "Song Name", "", "MP3"])
        ));
        let detail = parse_detail_page(&doc, &site());
        assert_eq!(detail.tracks.len(), 1);
        assert_eq!(detail.tracks[0].runtime, "2:31");
        assert_eq!(detail.tracks[0].filesize_mp3, "3 MB");
        assert_eq!(detail.runtime.as_deref(), Some("2m 31s"));
    }

    #[test]
    fn test_rows_before_header_are_ignored() {
        let doc = page(&format!(
            "{}{}{}",
            row(&["", "1", "Orphan"]),
            header(&["", "#", "Song Name"]),
            row(&["", "1", "Intro"])
        ));
        let detail = parse_detail_page(&doc, &site());
        assert_eq!(detail.tracks.len(), 1);
        assert_eq!(detail.tracks[0].title, "Intro");
    }

    #[test]
    fn test_page_without_table() {
        let doc = Html::parse_document("<html><body><p>Not found</p></body></html>");
        let detail = parse_detail_page(&doc, &site());
        assert_eq!(detail, AlbumDetail::default());
    }

    #[test]
    fn test_album_info_and_images() {
        let doc = Html::parse_document(
            r#"<html><body><div id="pageContent">
                <div class="albumImage"><a href="/img/cover.jpg"><img src="/thumb.jpg"></a></div>
                <div class="albumImage"><a href="/img/back.jpg"><img></a></div>
                <div class="albumImage"><a href="/img/cover.jpg"><img></a></div>
                <p align="left">
                    Platforms: <a href="/p/pc">PC</a><br>
                    Number of Files: <b>25</b><br>
                    Total Filesize: <b>88 MB</b> (MP3), <b>1.5 GB</b> (FLAC)<br>
                    Date Added: <b>Jan 1st, 2013</b><br>
                </p>
                <table id="songlist"></table>
            </div></body></html>"#,
        );
        let detail = parse_detail_page(&doc, &site());
        assert_eq!(detail.file_count, Some(25));
        assert_eq!(detail.filesize_mp3_bytes, Some(88 * 1024 * 1024));
        assert_eq!(detail.filesize_flac_bytes, Some(1_610_612_736));
        assert_eq!(detail.date_added.as_deref(), Some("Jan 1st, 2013"));
        assert_eq!(
            detail.images,
            vec![
                Image::new("https://downloads.khinsider.com/img/cover.jpg"),
                Image::new("https://downloads.khinsider.com/img/back.jpg"),
            ]
        );
    }

    #[test]
    fn test_apply_to_preserves_summary() {
        let mut album = Album {
            title: "Foo OST".to_string(),
            year: "2012".to_string(),
            file_count: Some(3),
            runtime: Some("10m".to_string()),
            images: vec![Image::new("https://example.com/a.jpg")],
            ..Album::new("foo", "https://example.com/game-soundtracks/album/foo")
        };
        let detail = AlbumDetail {
            tracks: vec![Track {
                track_number: 1,
                title: "Intro".to_string(),
                ..Track::default()
            }],
            images: vec![
                Image::new("https://example.com/a.jpg"),
                Image::new("https://example.com/b.jpg"),
            ],
            file_count: Some(12),
            ..AlbumDetail::default()
        };

        detail.apply_to(&mut album);

        assert_eq!(album.title, "Foo OST");
        assert_eq!(album.year, "2012");
        assert_eq!(album.file_count, Some(12));
        assert_eq!(album.runtime.as_deref(), Some("10m"));
        assert_eq!(album.images.len(), 2);
        assert_eq!(album.tracks.len(), 1);
        assert_eq!(album.tracks[0].album_id, "foo");
    }
}
