//! Join Engine
//!
//! Resolved regions drive the join: ratings and basics attach by title id
//! (left join), macro records attach by region (inner join), and the result
//! is restricted to the requested release-year window.

use crate::diagnostics::{sample, DataQualityNotice, Diagnostics};
use crate::error::Result;
use crate::loader::{known, Table, UNKNOWN_SENTINEL};
use crate::macro_data::MacroTable;
use crate::region_resolver::ResolvedRegion;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

pub const TITLE_INDEX: &str = "tconst";

/// Inclusive release-year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    /// Build the window, collapsing it to `start` when `end < start`.
    pub fn normalized(start: i32, end: i32, diagnostics: &mut Diagnostics) -> Self {
        if end < start {
            diagnostics.record(DataQualityNotice::CollapsedYearRange {
                start_year: start,
                end_year: end,
            });
            return Self { start, end: start };
        }
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub title_id: String,
    pub average_rating: Option<f64>,
    pub num_votes: Option<u64>,
}

impl RatingRecord {
    pub fn from_table(table: &Table) -> Result<Vec<Self>> {
        table.require_columns(&[TITLE_INDEX, "averageRating", "numVotes"])?;
        let ids = table.text_column(TITLE_INDEX)?;
        let ratings = table.text_column("averageRating")?;
        let votes = table.text_column("numVotes")?;

        let records = ids
            .into_iter()
            .zip(ratings.into_iter())
            .zip(votes.into_iter())
            .filter_map(|((id, rating), votes)| {
                Some(Self {
                    title_id: known(id)?.to_string(),
                    average_rating: known(rating).and_then(|v| v.parse().ok()),
                    num_votes: known(votes).and_then(parse_count),
                })
            })
            .collect();
        Ok(records)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicsRecord {
    pub title_id: String,
    pub title_type: Option<String>,
    pub primary_title: Option<String>,
    pub original_title: Option<String>,
    pub is_adult: Option<bool>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

impl BasicsRecord {
    /// Read the basics table. `startYear` values that are not whole-number
    /// years are treated as missing and reported.
    pub fn from_table(table: &Table, diagnostics: &mut Diagnostics) -> Result<Vec<Self>> {
        table.require_columns(&[TITLE_INDEX, "titleType", "startYear"])?;
        let ids = table.text_column(TITLE_INDEX)?;
        let title_types = table.text_column("titleType")?;
        let start_years = table.text_column("startYear")?;
        let primary_titles = table.optional_text_column("primaryTitle")?;
        let original_titles = table.optional_text_column("originalTitle")?;
        let adult_flags = table.optional_text_column("isAdult")?;
        let end_years = table.optional_text_column("endYear")?;
        let runtimes = table.optional_text_column("runtimeMinutes")?;
        let genres = table.optional_text_column("genres")?;

        let cell = |column: &Option<StringChunked>, row: usize| -> Option<String> {
            column
                .as_ref()
                .and_then(|c| known(c.get(row)))
                .map(|s| s.to_string())
        };

        let mut unparseable: Vec<String> = Vec::new();
        let mut records = Vec::with_capacity(ids.len());
        for row in 0..ids.len() {
            let Some(title_id) = known(ids.get(row)) else {
                continue;
            };

            let raw_year = known(start_years.get(row));
            let start_year = raw_year.and_then(parse_year);
            if let (Some(raw), None) = (raw_year, start_year) {
                unparseable.push(raw.to_string());
            }

            records.push(Self {
                title_id: title_id.to_string(),
                title_type: known(title_types.get(row)).map(|s| s.to_string()),
                primary_title: cell(&primary_titles, row),
                original_title: cell(&original_titles, row),
                is_adult: cell(&adult_flags, row).map(|s| s == "1"),
                start_year,
                end_year: cell(&end_years, row).as_deref().and_then(parse_year),
                runtime_minutes: cell(&runtimes, row).and_then(|s| s.parse().ok()),
                genres: cell(&genres, row)
                    .map(|s| s.split(',').map(|g| g.trim().to_string()).collect())
                    .unwrap_or_default(),
            });
        }

        if !unparseable.is_empty() {
            diagnostics.record(DataQualityNotice::InvalidStartYear {
                count: unparseable.len(),
                sample: sample(unparseable.iter().map(String::as_str)),
            });
        }
        Ok(records)
    }
}

/// Year coercion: an integer, or a decimal with no fractional part
/// (`"1999.0"`). Anything else, `"1999.5"` included, is not a year.
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i32)
}

fn parse_count(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as u64)
    })
}

/// One title with its region, macro indicators, rating and metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedTitleRecord {
    pub title_id: String,
    pub region: String,
    pub display_name: String,
    pub gdp_total: f64,
    pub population_total: f64,
    pub gdp_per_capita: Option<f64>,
    pub average_rating: Option<f64>,
    pub num_votes: Option<u64>,
    pub title_type: Option<String>,
    pub primary_title: Option<String>,
    pub original_title: Option<String>,
    pub is_adult: Option<bool>,
    pub start_year: i32,
    pub end_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

/// The joined dataset handed to reporting, ordered by title id.
#[derive(Debug, Clone, Default)]
pub struct JoinedTitles {
    records: Vec<JoinedTitleRecord>,
}

impl JoinedTitles {
    pub fn new(records: Vec<JoinedTitleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[JoinedTitleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<JoinedTitleRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinedTitleRecord> {
        self.records.iter()
    }

    pub fn regions(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.region.as_str()).collect()
    }

    /// Columnar form of the dataset, using the catalog column names.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let r = &self.records;

        let frame = DataFrame::new(vec![
            Series::new("titleId", r.iter().map(|x| x.title_id.as_str()).collect::<Vec<_>>()),
            Series::new("region", r.iter().map(|x| x.region.as_str()).collect::<Vec<_>>()),
            Series::new(
                "regionName",
                r.iter().map(|x| x.display_name.as_str()).collect::<Vec<_>>(),
            ),
            Series::new("gdp", r.iter().map(|x| x.gdp_total).collect::<Vec<_>>()),
            Series::new(
                "population",
                r.iter().map(|x| x.population_total).collect::<Vec<_>>(),
            ),
            Series::new("gdp_pc", r.iter().map(|x| x.gdp_per_capita).collect::<Vec<_>>()),
            Series::new(
                "averageRating",
                r.iter().map(|x| x.average_rating).collect::<Vec<_>>(),
            ),
            Series::new("numVotes", r.iter().map(|x| x.num_votes).collect::<Vec<_>>()),
            Series::new("titleType", text_values(r, |x| x.title_type.as_deref())),
            Series::new("primaryTitle", text_values(r, |x| x.primary_title.as_deref())),
            Series::new("originalTitle", text_values(r, |x| x.original_title.as_deref())),
            Series::new("isAdult", r.iter().map(|x| x.is_adult).collect::<Vec<_>>()),
            Series::new("startYear", r.iter().map(|x| x.start_year).collect::<Vec<_>>()),
            Series::new("endYear", r.iter().map(|x| x.end_year).collect::<Vec<_>>()),
            Series::new(
                "runtimeMinutes",
                r.iter().map(|x| x.runtime_minutes).collect::<Vec<_>>(),
            ),
            Series::new(
                "genres",
                r.iter()
                    .map(|x| (!x.genres.is_empty()).then(|| x.genres.join(",")))
                    .collect::<Vec<_>>(),
            ),
        ])?;
        Ok(frame)
    }
}

pub struct JoinEngine {
    range: YearRange,
}

impl JoinEngine {
    pub fn new(range: YearRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> YearRange {
        self.range
    }

    pub fn join(
        &self,
        resolved: &[ResolvedRegion],
        macro_table: &MacroTable,
        ratings: &[RatingRecord],
        basics: &[BasicsRecord],
    ) -> JoinedTitles {
        let ratings_by_id = first_by_id(ratings, |r| r.title_id.as_str());
        let basics_by_id = first_by_id(basics, |b| b.title_id.as_str());

        let mut without_macro = 0usize;
        let mut outside_range = 0usize;
        let mut records = Vec::new();
        for title in resolved {
            let Some(macro_record) = macro_table.get(&title.region) else {
                without_macro += 1;
                continue;
            };
            let rating = ratings_by_id.get(title.title_id.as_str()).copied();
            let basics = basics_by_id.get(title.title_id.as_str()).copied();

            let Some(start_year) = basics
                .and_then(|b| b.start_year)
                .filter(|year| self.range.contains(*year))
            else {
                outside_range += 1;
                continue;
            };

            records.push(JoinedTitleRecord {
                title_id: title.title_id.clone(),
                region: title.region.clone(),
                display_name: macro_record.display_name.clone(),
                gdp_total: macro_record.gdp_total,
                population_total: macro_record.population_total,
                gdp_per_capita: macro_record.gdp_per_capita,
                average_rating: rating.and_then(|r| r.average_rating),
                num_votes: rating.and_then(|r| r.num_votes),
                title_type: basics.and_then(|b| b.title_type.clone()),
                primary_title: basics.and_then(|b| b.primary_title.clone()),
                original_title: basics.and_then(|b| b.original_title.clone()),
                is_adult: basics.and_then(|b| b.is_adult),
                start_year,
                end_year: basics.and_then(|b| b.end_year),
                runtime_minutes: basics.and_then(|b| b.runtime_minutes),
                genres: basics.map(|b| b.genres.clone()).unwrap_or_default(),
            });
        }

        debug!(
            "{} titles dropped without macro data, {} outside {}..={} or without a start year",
            without_macro, outside_range, self.range.start, self.range.end
        );
        info!("Joined {} titles", records.len());
        JoinedTitles::new(records)
    }
}

fn text_values<'a, F>(records: &'a [JoinedTitleRecord], field: F) -> Vec<Option<&'a str>>
where
    F: Fn(&'a JoinedTitleRecord) -> Option<&'a str>,
{
    records.iter().map(field).collect()
}

fn first_by_id<'a, T, F>(rows: &'a [T], key: F) -> HashMap<&'a str, &'a T>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut by_id = HashMap::with_capacity(rows.len());
    for row in rows {
        let id = key(row);
        if id != UNKNOWN_SENTINEL {
            by_id.entry(id).or_insert(row);
        }
    }
    by_id
}
