//! Table Loader
//!
//! Reads the two fixed table shapes into polars frames. Every column is read
//! as text; typed extraction happens in the stage that owns the table.

use crate::error::{LoadFailureKind, PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker the catalog tables use for an unknown value.
pub const UNKNOWN_SENTINEL: &str = "\\N";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// Tab-separated, header row, no quoting.
    Catalog,
    /// Comma-separated with `skip_rows` leading lines before the header.
    Macro { skip_rows: usize },
}

impl TableShape {
    pub fn separator(&self) -> u8 {
        match self {
            TableShape::Catalog => b'\t',
            TableShape::Macro { .. } => b',',
        }
    }

    pub fn skip_rows(&self) -> usize {
        match self {
            TableShape::Catalog => 0,
            TableShape::Macro { skip_rows } => *skip_rows,
        }
    }

    fn quote_char(&self) -> Option<u8> {
        match self {
            // catalog titles contain bare quotes
            TableShape::Catalog => None,
            TableShape::Macro { .. } => Some(b'"'),
        }
    }

    /// Writer counterpart of `quote_char`.
    pub fn quote_style(&self) -> QuoteStyle {
        match self {
            TableShape::Catalog => QuoteStyle::Never,
            TableShape::Macro { .. } => QuoteStyle::Necessary,
        }
    }
}

/// A loaded table together with where it came from.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    source: PathBuf,
    shape: TableShape,
    index: Option<String>,
    frame: DataFrame,
}

impl Table {
    /// Read `path` in the declared shape.
    ///
    /// When `index` is given the column must be present; a missing index is a
    /// malformed-structure failure.
    pub fn load(name: &str, path: &Path, shape: TableShape, index: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::load(name, path, LoadFailureKind::NotFound));
        }

        let file_len = std::fs::metadata(path)
            .map_err(|e| PipelineError::load(name, path, LoadFailureKind::Other(e.to_string())))?
            .len();
        if file_len == 0 {
            return Err(PipelineError::load(name, path, LoadFailureKind::Empty));
        }

        debug!("Reading {} from {} ({:?})", name, path.display(), shape);
        let frame = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(shape.separator())
            .with_skip_rows(shape.skip_rows())
            .with_quote_char(shape.quote_char())
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lf| lf.collect())
            .map_err(|e| PipelineError::load(name, path, classify_polars_error(e)))?;

        let table = Self::from_frame(name, path, shape, index, frame)?;
        info!(
            "Loaded {}: {} rows, {} columns",
            name,
            table.height(),
            table.frame.width()
        );
        Ok(table)
    }

    /// Wrap an in-memory frame, applying the same structural checks as `load`.
    pub fn from_frame(
        name: &str,
        source: &Path,
        shape: TableShape,
        index: Option<&str>,
        frame: DataFrame,
    ) -> Result<Self> {
        if frame.width() == 0 {
            return Err(PipelineError::load(name, source, LoadFailureKind::Empty));
        }

        let table = Self {
            name: name.to_string(),
            source: source.to_path_buf(),
            shape,
            index: index.map(|s| s.to_string()),
            frame,
        };
        if let Some(index) = index {
            table.require_columns(&[index])?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn shape(&self) -> TableShape {
        self.shape
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.frame.column(column).is_ok()
    }

    /// Fail with a malformed-structure error naming the first absent column.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(self.malformed(format!("missing column '{}'", missing))),
            None => Ok(()),
        }
    }

    /// A column as text, whatever type it was stored with.
    pub fn text_column(&self, column: &str) -> Result<StringChunked> {
        let series = self
            .frame
            .column(column)
            .map_err(|_| self.malformed(format!("missing column '{}'", column)))?;
        let series = series
            .cast(&DataType::String)
            .map_err(|e| self.malformed(format!("column '{}' is not text: {}", column, e)))?;
        let chunked = series
            .str()
            .map_err(|e| self.malformed(format!("column '{}' is not text: {}", column, e)))?;
        Ok(chunked.clone())
    }

    /// Like `text_column`, but an absent column reads as all-missing.
    pub fn optional_text_column(&self, column: &str) -> Result<Option<StringChunked>> {
        if self.has_column(column) {
            self.text_column(column).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write the table back out in its declared shape.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        let mut frame = self.frame.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(self.shape.separator())
            .with_quote_style(self.shape.quote_style())
            .finish(&mut frame)?;
        Ok(())
    }

    fn malformed(&self, reason: String) -> PipelineError {
        PipelineError::load(&self.name, &self.source, LoadFailureKind::Malformed(reason))
    }
}

fn classify_polars_error(err: PolarsError) -> LoadFailureKind {
    match err {
        PolarsError::Context { error, .. } => classify_polars_error(*error),
        PolarsError::NoData(_) => LoadFailureKind::Empty,
        PolarsError::ComputeError(msg)
        | PolarsError::ShapeMismatch(msg)
        | PolarsError::SchemaMismatch(msg) => LoadFailureKind::Malformed(msg.to_string()),
        other => LoadFailureKind::Other(other.to_string()),
    }
}

/// A cell with the empty string and the unknown sentinel both read as missing.
pub fn known(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty() && *s != UNKNOWN_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Table::load(
            "title.akas",
            &dir.path().join("nope.tsv"),
            TableShape::Catalog,
            Some("titleId"),
        )
        .unwrap_err();

        assert_eq!(err.load_kind(), Some(&LoadFailureKind::NotFound));
        assert!(err.to_string().contains("title.akas"));
    }

    #[test]
    fn test_empty_file_is_empty_content() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.tsv", "");
        let err = Table::load("title.ratings", &path, TableShape::Catalog, None).unwrap_err();

        assert_eq!(err.load_kind(), Some(&LoadFailureKind::Empty));
    }

    #[test]
    fn test_missing_index_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ratings.tsv", "id\taverageRating\n1\t8.0\n");
        let err = Table::load("title.ratings", &path, TableShape::Catalog, Some("tconst"))
            .unwrap_err();

        assert!(matches!(
            err.load_kind(),
            Some(LoadFailureKind::Malformed(reason)) if reason.contains("tconst")
        ));
    }

    #[test]
    fn test_catalog_reads_everything_as_text() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "basics.tsv",
            "tconst\ttitleType\tstartYear\ntt1\tmovie\t2001\ntt2\t\"short\"\t\\N\n",
        );
        let table = Table::load("title.basics", &path, TableShape::Catalog, Some("tconst")).unwrap();

        assert_eq!(table.height(), 2);
        let years = table.text_column("startYear").unwrap();
        assert_eq!(years.get(0), Some("2001"));
        assert_eq!(known(years.get(1)), None);
        let types = table.text_column("titleType").unwrap();
        assert_eq!(types.get(1), Some("\"short\""));
    }

    #[test]
    fn test_macro_skips_preamble() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "gdp.csv",
            "\"Data Source\",\"World Development Indicators\"\n\
             \"Last Updated Date\",\"2024-06-28\"\n\
             \"Note\",\"none\"\n\
             \"Note\",\"none\"\n\
             \"Country Name\",\"Country Code\",\"2022\"\n\
             \"Poland\",\"POL\",\"60\"\n",
        );
        let table = Table::load("gdp", &path, TableShape::Macro { skip_rows: 4 }, None).unwrap();

        assert_eq!(table.column_names(), vec!["Country Name", "Country Code", "2022"]);
        assert_eq!(table.text_column("2022").unwrap().get(0), Some("60"));
    }

    #[test]
    fn test_catalog_round_trip_keeps_columns_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "akas.tsv",
            "titleId\tordering\ttitle\tregion\tisOriginalTitle\n\
             tt1\t1\tTitle1\t\\N\t1\n\
             tt1\t2\tThe \"Best\" Movie\tGB\t0\n\
             tt2\t1\tTitle2, Part \"2\"\tDE\t0\n",
        );
        let table = Table::load("title.akas", &path, TableShape::Catalog, Some("titleId")).unwrap();

        let copy = dir.path().join("copy.tsv");
        table.write(&copy).unwrap();
        let reloaded =
            Table::load("title.akas", &copy, TableShape::Catalog, Some("titleId")).unwrap();

        assert_eq!(reloaded.column_names(), table.column_names());
        assert_eq!(reloaded.height(), table.height());
        for column in table.column_names() {
            let before: Vec<Option<String>> = table
                .text_column(&column)
                .unwrap()
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect();
            let after: Vec<Option<String>> = reloaded
                .text_column(&column)
                .unwrap()
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect();
            assert_eq!(before, after, "column {} changed on round trip", column);
        }
        let titles = reloaded.text_column("title").unwrap();
        assert_eq!(titles.get(1), Some("The \"Best\" Movie"));
    }

    #[test]
    fn test_blank_lines_only_is_empty_content() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "blank.tsv", "\n\n");
        let err = Table::load("title.akas", &path, TableShape::Catalog, None).unwrap_err();

        assert_eq!(err.load_kind(), Some(&LoadFailureKind::Empty));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "ratings.tsv",
            "tconst\taverageRating\ntt1\t8.0\ntt2\t7.5\t1200\textra\n",
        );
        let err = Table::load("title.ratings", &path, TableShape::Catalog, Some("tconst"))
            .unwrap_err();

        assert!(matches!(err.load_kind(), Some(LoadFailureKind::Malformed(_))));
    }

    #[test]
    fn test_context_errors_are_unwrapped() {
        let err = PolarsError::Context {
            error: Box::new(PolarsError::NoData("empty CSV".into())),
            msg: "'csv scan' failed".into(),
        };
        assert_eq!(classify_polars_error(err), LoadFailureKind::Empty);
    }

    #[test]
    fn test_text_column_casts_numeric_frames() {
        let frame = df![
            "tconst" => ["1", "2"],
            "numVotes" => [1000i64, 500]
        ]
        .unwrap();
        let table = Table::from_frame(
            "title.ratings",
            Path::new("memory"),
            TableShape::Catalog,
            Some("tconst"),
            frame,
        )
        .unwrap();

        assert_eq!(table.text_column("numVotes").unwrap().get(1), Some("500"));
        assert!(table.optional_text_column("genres").unwrap().is_none());
    }
}
