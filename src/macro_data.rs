//! Macro Aggregator
//!
//! Collapses per-country GDP and population figures for one year into one
//! record per region group.

use crate::diagnostics::{sample, DataQualityNotice, Diagnostics};
use crate::error::{PipelineError, Result};
use crate::loader::{known, Table};
use crate::region_map::{RegionMapper, WORLD_ALPHA3, WORLD_REGION};
use polars::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

pub const COUNTRY_CODE: &str = "Country Code";
pub const COUNTRY_NAME: &str = "Country Name";
pub const ALPHA3: &str = "alpha-3";
pub const ALPHA2: &str = "alpha-2";

/// One country's value for the selected year.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryIndicator {
    pub country_code: String,
    pub country_name: String,
    pub value: Option<f64>,
}

impl CountryIndicator {
    pub fn new(country_code: &str, country_name: &str, value: Option<f64>) -> Self {
        Self {
            country_code: country_code.to_string(),
            country_name: country_name.to_string(),
            value,
        }
    }

    /// Project an indicator table onto `{code, name, year}`.
    ///
    /// The year column must exist; its absence is a configuration failure,
    /// since no result for that year can be produced.
    pub fn from_table(table: &Table, year: &str) -> Result<Vec<Self>> {
        require_year(table, year)?;
        table.require_columns(&[COUNTRY_CODE, COUNTRY_NAME])?;

        let codes = table.text_column(COUNTRY_CODE)?;
        let names = table.text_column(COUNTRY_NAME)?;
        let values = table.text_column(year)?;

        let rows = codes
            .into_iter()
            .zip(names.into_iter())
            .zip(values.into_iter())
            .filter_map(|((code, name), value)| {
                let code = known(code)?;
                Some(Self {
                    country_code: code.to_string(),
                    country_name: name.unwrap_or(code).to_string(),
                    value: known(value).and_then(|v| v.parse::<f64>().ok()),
                })
            })
            .collect();
        Ok(rows)
    }
}

/// 3-letter to 2-letter country code cross-reference.
#[derive(Debug, Clone, Default)]
pub struct CountryCodes {
    alpha3_to_alpha2: HashMap<String, String>,
}

impl CountryCodes {
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut alpha3_to_alpha2 = HashMap::new();
        for (alpha3, alpha2) in pairs {
            alpha3_to_alpha2.entry(alpha3).or_insert(alpha2);
        }
        Self { alpha3_to_alpha2 }
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        table.require_columns(&[ALPHA3, ALPHA2])?;
        let alpha3 = table.text_column(ALPHA3)?;
        let alpha2 = table.text_column(ALPHA2)?;

        let pairs: Vec<(String, String)> = alpha3
            .into_iter()
            .zip(alpha2.into_iter())
            .filter_map(|(a3, a2)| Some((known(a3)?.to_string(), known(a2)?.to_string())))
            .collect();
        Ok(Self::new(pairs))
    }

    /// The 2-letter code for `alpha3`; the world aggregate always maps to the
    /// reserved world region.
    pub fn alpha2(&self, alpha3: &str) -> Option<&str> {
        if alpha3 == WORLD_ALPHA3 {
            return Some(WORLD_REGION);
        }
        self.alpha3_to_alpha2.get(alpha3).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.alpha3_to_alpha2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha3_to_alpha2.is_empty()
    }
}

/// Economic indicators for one region group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroRecord {
    pub region: String,
    pub display_name: String,
    pub gdp_total: f64,
    pub population_total: f64,
    /// Undefined when the population total is zero.
    pub gdp_per_capita: Option<f64>,
}

/// Macro records ordered by region code.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    records: Vec<MacroRecord>,
    index: HashMap<String, usize>,
}

impl MacroTable {
    pub fn new(mut records: Vec<MacroRecord>) -> Self {
        records.sort_by(|a, b| a.region.cmp(&b.region));
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.region.clone(), i))
            .collect();
        Self { records, index }
    }

    pub fn get(&self, region: &str) -> Option<&MacroRecord> {
        self.index.get(region).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[MacroRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.region.as_str())
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let frame = DataFrame::new(vec![
            Series::new(
                "region",
                self.records.iter().map(|r| r.region.as_str()).collect::<Vec<_>>(),
            ),
            Series::new(
                "regionName",
                self.records
                    .iter()
                    .map(|r| r.display_name.as_str())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "gdp",
                self.records.iter().map(|r| r.gdp_total).collect::<Vec<_>>(),
            ),
            Series::new(
                "population",
                self.records
                    .iter()
                    .map(|r| r.population_total)
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "gdp_pc",
                self.records
                    .iter()
                    .map(|r| r.gdp_per_capita)
                    .collect::<Vec<_>>(),
            ),
        ])?;
        Ok(frame)
    }
}

struct RegionTotals {
    region: String,
    first_country_name: String,
    gdp: f64,
    population: f64,
}

pub struct MacroAggregator {
    mapper: RegionMapper,
}

impl MacroAggregator {
    pub fn new(mapper: RegionMapper) -> Self {
        Self { mapper }
    }

    /// Join GDP with population by country code, attach the 2-letter code,
    /// map it to its region group and sum per group.
    ///
    /// GDP rows drive the join; a missing value contributes nothing to a sum.
    pub fn aggregate(
        &self,
        gdp: &[CountryIndicator],
        population: &[CountryIndicator],
        codes: &CountryCodes,
        diagnostics: &mut Diagnostics,
    ) -> MacroTable {
        let mut population_by_code: HashMap<&str, Option<f64>> = HashMap::new();
        for row in population {
            population_by_code
                .entry(row.country_code.as_str())
                .or_insert(row.value);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut unmapped: Vec<&str> = Vec::new();
        let mut totals: Vec<RegionTotals> = Vec::new();
        let mut slot_of: HashMap<String, usize> = HashMap::new();

        for row in gdp {
            if !seen.insert(row.country_code.as_str()) {
                continue;
            }
            let Some(alpha2) = codes.alpha2(&row.country_code) else {
                unmapped.push(row.country_code.as_str());
                continue;
            };
            let region = self.mapper.canonical(alpha2);
            let population = population_by_code
                .get(row.country_code.as_str())
                .copied()
                .flatten();

            let slot = match slot_of.get(region) {
                Some(&slot) => slot,
                None => {
                    slot_of.insert(region.to_string(), totals.len());
                    totals.push(RegionTotals {
                        region: region.to_string(),
                        first_country_name: row.country_name.clone(),
                        gdp: 0.0,
                        population: 0.0,
                    });
                    totals.len() - 1
                }
            };
            let entry = &mut totals[slot];
            entry.gdp += row.value.unwrap_or(0.0);
            entry.population += population.unwrap_or(0.0);
        }

        if !unmapped.is_empty() {
            debug!("{} macro rows without a 2-letter code", unmapped.len());
            diagnostics.record(DataQualityNotice::UnmappedCountries {
                count: unmapped.len(),
                sample: sample(unmapped.iter().copied()),
            });
        }

        let records: Vec<MacroRecord> = totals
            .into_iter()
            .map(|t| {
                let display_name = self
                    .mapper
                    .display_name(&t.region)
                    .map(|s| s.to_string())
                    .unwrap_or(t.first_country_name);
                MacroRecord {
                    gdp_per_capita: per_capita(t.gdp, t.population),
                    region: t.region,
                    display_name,
                    gdp_total: t.gdp,
                    population_total: t.population,
                }
            })
            .collect();

        info!("Aggregated macro data into {} regions", records.len());
        MacroTable::new(records)
    }

    /// Validate `year` in both indicator tables before projecting either.
    pub fn aggregate_tables(
        &self,
        gdp: &Table,
        population: &Table,
        codes: &Table,
        year: &str,
        diagnostics: &mut Diagnostics,
    ) -> Result<MacroTable> {
        require_year(gdp, year)?;
        require_year(population, year)?;

        let gdp = CountryIndicator::from_table(gdp, year)?;
        let population = CountryIndicator::from_table(population, year)?;
        let codes = CountryCodes::from_table(codes)?;
        Ok(self.aggregate(&gdp, &population, &codes, diagnostics))
    }
}

fn require_year(table: &Table, year: &str) -> Result<()> {
    if table.has_column(year) {
        return Ok(());
    }
    Err(PipelineError::Configuration(format!(
        "There is no data for year {} in table {} ({})",
        year,
        table.name(),
        table.source().display()
    )))
}

fn per_capita(gdp: f64, population: f64) -> Option<f64> {
    if population > 0.0 {
        Some(gdp / population)
    } else {
        None
    }
}
