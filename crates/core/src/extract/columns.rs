//! Header-driven column map for the track table.

/// Meaning of a track table column, taken from its header label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// `#`
    Number,
    /// `CD`
    Disc,
    /// `Song Name`
    Title,
    /// `MP3`
    Mp3,
    /// `FLAC`
    Flac,
    /// Anything else, including unlabeled columns.
    Other,
}

impl Column {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label == "#" {
            Column::Number
        } else if label.eq_ignore_ascii_case("CD") {
            Column::Disc
        } else if label.eq_ignore_ascii_case("Song Name") {
            Column::Title
        } else if label.eq_ignore_ascii_case("MP3") {
            Column::Mp3
        } else if label.eq_ignore_ascii_case("FLAC") {
            Column::Flac
        } else {
            Column::Other
        }
    }
}

/// Column position to meaning, built from one page's header row.
///
/// A map belongs to a single parse call and is never shared between pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<Column>,
}

impl ColumnMap {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            columns: labels
                .into_iter()
                .map(|label| Column::from_label(label.as_ref()))
                .collect(),
        }
    }

    /// Meaning of the column at `index`; positions past the header are `Other`.
    pub fn get(&self, index: usize) -> Column {
        self.columns.get(index).copied().unwrap_or(Column::Other)
    }

    pub fn position_of(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
