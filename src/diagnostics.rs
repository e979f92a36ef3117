//! Data-quality notices
//!
//! Non-fatal findings recorded while the pipeline runs. They never halt a
//! stage; they are kept for inspection and logged as they are recorded.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Number of offending values kept as a sample inside a notice.
pub const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityNotice {
    /// Titles whose localized alternates gave zero or several regions.
    AmbiguousRegions { count: usize, sample: Vec<String> },

    /// `startYear` cells that are not a whole-number year (text, or a
    /// number with a fractional part).
    InvalidStartYear { count: usize, sample: Vec<String> },

    /// `end_year < start_year` on input; the range was collapsed to `start_year`.
    CollapsedYearRange { start_year: i32, end_year: i32 },

    /// Macro rows whose 3-letter country code has no 2-letter cross-reference.
    UnmappedCountries { count: usize, sample: Vec<String> },
}

impl fmt::Display for DataQualityNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityNotice::AmbiguousRegions { count, sample } => write!(
                f,
                "The region for {} titles was not found (e.g. {})",
                count,
                sample.join(", ")
            ),
            DataQualityNotice::InvalidStartYear { count, sample } => write!(
                f,
                "{} startYear values are not whole-number years and were treated as missing (e.g. {})",
                count,
                sample.join(", ")
            ),
            DataQualityNotice::CollapsedYearRange { start_year, end_year } => write!(
                f,
                "End year {} is smaller than start year {}; using {} only",
                end_year, start_year, start_year
            ),
            DataQualityNotice::UnmappedCountries { count, sample } => write!(
                f,
                "{} macro rows have no country-code cross-reference and were skipped (e.g. {})",
                count,
                sample.join(", ")
            ),
        }
    }
}

/// Collected notices for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    notices: Vec<DataQualityNotice>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, notice: DataQualityNotice) {
        warn!("{}", notice);
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[DataQualityNotice] {
        &self.notices
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataQualityNotice> {
        self.notices.iter()
    }
}

/// First `SAMPLE_SIZE` values of an iterator, owned.
pub fn sample<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .take(SAMPLE_SIZE)
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.record(DataQualityNotice::CollapsedYearRange {
            start_year: 2010,
            end_year: 2000,
        });
        diagnostics.record(DataQualityNotice::AmbiguousRegions {
            count: 1,
            sample: vec!["tt1".to_string()],
        });

        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(
            diagnostics.notices()[0],
            DataQualityNotice::CollapsedYearRange { .. }
        ));
    }

    #[test]
    fn test_sample_is_bounded() {
        let values = ["a", "b", "c", "d", "e", "f", "g"];
        assert_eq!(sample(values.iter().copied()).len(), SAMPLE_SIZE);
    }

    #[test]
    fn test_display_mentions_years() {
        let notice = DataQualityNotice::CollapsedYearRange {
            start_year: 2010,
            end_year: 2000,
        };
        let text = notice.to_string();
        assert!(text.contains("2010"));
        assert!(text.contains("2000"));
    }
}
