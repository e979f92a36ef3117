//! Region Resolver
//!
//! Attributes one region to each title from its alternate-title records.
//! A localized alternate counts as evidence only when its text equals one of
//! the title's original-title texts and it carries a region tag; renamed or
//! translated alternates say nothing about where the work comes from.

use crate::diagnostics::{sample, DataQualityNotice, Diagnostics};
use crate::error::Result;
use crate::loader::{known, Table, UNKNOWN_SENTINEL};
use crate::region_map::{RegionMapper, WORLD_REGION};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

pub const AKAS_INDEX: &str = "titleId";
const AKAS_COLUMNS: &[&str] = &["titleId", "isOriginalTitle", "region", "title"];

/// One alternate-title row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawAkaRecord {
    pub title_id: String,
    pub is_original_title: bool,
    /// Raw region tag; `None` or the unknown sentinel both mean "no region".
    pub region: Option<String>,
    pub title: String,
}

impl RawAkaRecord {
    pub fn new(title_id: &str, is_original_title: bool, region: Option<&str>, title: &str) -> Self {
        Self {
            title_id: title_id.to_string(),
            is_original_title,
            region: region.map(|r| r.to_string()),
            title: title.to_string(),
        }
    }

    /// Read every row of the alternate-titles table.
    pub fn from_table(table: &Table) -> Result<Vec<Self>> {
        table.require_columns(AKAS_COLUMNS)?;
        let ids = table.text_column("titleId")?;
        let originals = table.text_column("isOriginalTitle")?;
        let regions = table.text_column("region")?;
        let titles = table.text_column("title")?;

        let records = ids
            .into_iter()
            .zip(originals.into_iter())
            .zip(regions.into_iter())
            .zip(titles.into_iter())
            .filter_map(|(((id, original), region), title)| {
                let id = id?;
                Some(Self {
                    title_id: id.to_string(),
                    is_original_title: parse_flag(original),
                    region: region.map(|r| r.to_string()),
                    title: title.unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(records)
    }
}

fn parse_flag(cell: Option<&str>) -> bool {
    matches!(
        cell.map(str::trim),
        Some("1") | Some("1.0") | Some("true") | Some("True")
    )
}

/// The region attributed to one title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRegion {
    pub title_id: String,
    pub region: String,
}

/// A title whose localized alternates gave zero or several regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousTitle {
    pub title_id: String,
    /// Distinct regions among text-matched alternates, in lexical order.
    pub candidates: BTreeSet<String>,
    pub has_original: bool,
    /// Whether the title was kept under the world region.
    pub world_fallback: bool,
}

/// Output of one resolution run.
#[derive(Debug, Clone, Default)]
pub struct RegionResolution {
    /// Resolved titles ordered by title id.
    pub resolved: Vec<ResolvedRegion>,
    /// Titles without a single region, in first-seen order.
    pub ambiguous: Vec<AmbiguousTitle>,
    /// Records after sentinel normalization, region mapping and deduplication.
    pub records: Vec<RawAkaRecord>,
    /// Distinct title ids in the input.
    pub title_count: usize,
}

impl RegionResolution {
    pub fn lost_region_count(&self) -> usize {
        self.ambiguous.len()
    }

    pub fn region_of(&self, title_id: &str) -> Option<&str> {
        self.resolved
            .binary_search_by(|r| r.title_id.as_str().cmp(title_id))
            .ok()
            .map(|i| self.resolved[i].region.as_str())
    }

    pub fn is_ambiguous(&self, title_id: &str) -> bool {
        self.ambiguous.iter().any(|a| a.title_id == title_id)
    }

    /// Every normalized record of the ambiguous titles, for manual inspection.
    pub fn ambiguous_records(&self) -> Vec<&RawAkaRecord> {
        let ids: HashSet<&str> = self.ambiguous.iter().map(|a| a.title_id.as_str()).collect();
        self.records
            .iter()
            .filter(|r| ids.contains(r.title_id.as_str()))
            .collect()
    }

    /// Log how many titles were left without a region and a few of their records.
    pub fn log_ambiguous(&self, limit: usize) {
        info!(
            "The region for {} titles was not found; inspect them with ambiguous_records()",
            self.lost_region_count()
        );
        for record in self.ambiguous_records().into_iter().take(limit) {
            info!(
                "  {} original={} region={} title={}",
                record.title_id,
                record.is_original_title,
                record.region.as_deref().unwrap_or(UNKNOWN_SENTINEL),
                record.title
            );
        }
    }
}

pub struct RegionResolver {
    mapper: RegionMapper,
    include_world_fallback: bool,
}

impl RegionResolver {
    pub fn new(mapper: RegionMapper, include_world_fallback: bool) -> Self {
        Self {
            mapper,
            include_world_fallback,
        }
    }

    pub fn resolve(&self, records: &[RawAkaRecord], diagnostics: &mut Diagnostics) -> RegionResolution {
        // Missing regions become None, the rest are mapped to their group,
        // then exact duplicates are dropped keeping the first occurrence.
        let records: Vec<RawAkaRecord> = records
            .iter()
            .map(|r| RawAkaRecord {
                title_id: r.title_id.clone(),
                is_original_title: r.is_original_title,
                region: known(r.region.as_deref()).map(|c| self.mapper.canonical(c).to_string()),
                title: r.title.clone(),
            })
            .unique()
            .collect();
        debug!("{} alternate-title records after deduplication", records.len());

        let mut order: Vec<&str> = Vec::new();
        let mut by_title: HashMap<&str, Vec<&RawAkaRecord>> = HashMap::new();
        for record in &records {
            by_title
                .entry(record.title_id.as_str())
                .or_insert_with(|| {
                    order.push(record.title_id.as_str());
                    Vec::new()
                })
                .push(record);
        }

        let mut resolved = Vec::new();
        let mut ambiguous = Vec::new();
        for title_id in &order {
            let group = &by_title[title_id];
            let original_texts: HashSet<&str> = group
                .iter()
                .filter(|r| r.is_original_title)
                .map(|r| r.title.as_str())
                .collect();

            let mut candidates: BTreeSet<&str> = BTreeSet::new();
            let mut last: Option<&str> = None;
            for record in group.iter().filter(|r| !r.is_original_title) {
                if let Some(region) = record.region.as_deref() {
                    if original_texts.contains(record.title.as_str()) {
                        candidates.insert(region);
                        last = Some(region);
                    }
                }
            }

            match (candidates.len(), last) {
                (1, Some(region)) => resolved.push(ResolvedRegion {
                    title_id: title_id.to_string(),
                    region: region.to_string(),
                }),
                _ => {
                    let has_original = !original_texts.is_empty();
                    let world_fallback = self.include_world_fallback && has_original;
                    if world_fallback {
                        resolved.push(ResolvedRegion {
                            title_id: title_id.to_string(),
                            region: WORLD_REGION.to_string(),
                        });
                    }
                    ambiguous.push(AmbiguousTitle {
                        title_id: title_id.to_string(),
                        candidates: candidates.iter().map(|c| c.to_string()).collect(),
                        has_original,
                        world_fallback,
                    });
                }
            }
        }

        resolved.sort_by(|a, b| a.title_id.cmp(&b.title_id));
        let title_count = order.len();

        info!(
            "Resolved regions for {} of {} titles ({} ambiguous)",
            resolved.len(),
            title_count,
            ambiguous.len()
        );
        if !ambiguous.is_empty() {
            diagnostics.record(DataQualityNotice::AmbiguousRegions {
                count: ambiguous.len(),
                sample: sample(ambiguous.iter().map(|a: &AmbiguousTitle| a.title_id.as_str())),
            });
        }

        RegionResolution {
            resolved,
            ambiguous,
            records,
            title_count,
        }
    }

    pub fn resolve_table(&self, table: &Table, diagnostics: &mut Diagnostics) -> Result<RegionResolution> {
        let records = RawAkaRecord::from_table(table)?;
        Ok(self.resolve(&records, diagnostics))
    }
}
