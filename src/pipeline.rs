//! Pipeline orchestration
//!
//! Loads the inputs and runs the stages in order: region resolution and
//! macro aggregation (independent of each other), then the join. Stages are
//! computed on first use and cached, so `join` can be called directly.

use crate::config::PipelineConfig;
use crate::diagnostics::{Diagnostics, SAMPLE_SIZE};
use crate::error::{PipelineError, Result};
use crate::join::{
    BasicsRecord, JoinEngine, JoinedTitles, RatingRecord, YearRange, TITLE_INDEX,
};
use crate::loader::{Table, TableShape};
use crate::macro_data::{MacroAggregator, MacroTable, ALPHA3};
use crate::region_map::{RegionGroupMap, RegionMapper};
use crate::region_resolver::{RegionResolution, RegionResolver, AKAS_INDEX};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Row counts describing how much of the input survived each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub akas_rows: usize,
    pub distinct_titles: usize,
    pub resolved_titles: usize,
    pub ambiguous_titles: usize,
    pub macro_regions: usize,
    pub ratings_rows: usize,
    pub basics_rows: usize,
    pub joined_rows: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    mapper: RegionMapper,
    range: YearRange,
    diagnostics: Diagnostics,
    summary: PipelineSummary,
    resolution: Option<RegionResolution>,
    macro_table: Option<MacroTable>,
}

impl Pipeline {
    /// Uses the config's region groups, or the built-in table without them.
    pub fn new(config: PipelineConfig) -> Self {
        let region_map = config.region_groups.clone().unwrap_or_default();
        Self::with_region_map(config, Arc::new(region_map))
    }

    pub fn with_region_map(config: PipelineConfig, region_map: Arc<RegionGroupMap>) -> Self {
        let mut diagnostics = Diagnostics::new();
        let range = YearRange::normalized(config.start_year, config.end_year, &mut diagnostics);
        Self {
            config,
            mapper: RegionMapper::new(region_map),
            range,
            diagnostics,
            summary: PipelineSummary::default(),
            resolution: None,
            macro_table: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn range(&self) -> YearRange {
        self.range
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn summary(&self) -> &PipelineSummary {
        &self.summary
    }

    pub fn resolve_regions(&mut self) -> Result<&RegionResolution> {
        let resolution = match self.resolution.take() {
            Some(resolution) => resolution,
            None => self.compute_resolution()?,
        };
        Ok(&*self.resolution.insert(resolution))
    }

    pub fn aggregate_macro(&mut self) -> Result<&MacroTable> {
        let macro_table = match self.macro_table.take() {
            Some(macro_table) => macro_table,
            None => self.compute_macro()?,
        };
        Ok(&*self.macro_table.insert(macro_table))
    }

    /// Run whatever stages are still missing, then join.
    pub fn join(&mut self) -> Result<JoinedTitles> {
        self.resolve_regions()?;
        self.aggregate_macro()?;

        let paths = &self.config.paths;
        let ratings = Table::load(
            "title.ratings",
            &paths.title_ratings,
            TableShape::Catalog,
            Some(TITLE_INDEX),
        )?;
        let basics = Table::load(
            "title.basics",
            &paths.title_basics,
            TableShape::Catalog,
            Some(TITLE_INDEX),
        )?;
        self.summary.ratings_rows = ratings.height();
        self.summary.basics_rows = basics.height();

        let ratings = RatingRecord::from_table(&ratings)?;
        let basics = BasicsRecord::from_table(&basics, &mut self.diagnostics)?;

        let joined = match (&self.resolution, &self.macro_table) {
            (Some(resolution), Some(macro_table)) => JoinEngine::new(self.range).join(
                &resolution.resolved,
                macro_table,
                &ratings,
                &basics,
            ),
            _ => {
                return Err(PipelineError::Configuration(
                    "region and macro stages must run before the join".to_string(),
                ))
            }
        };

        self.summary.joined_rows = joined.len();
        info!(
            "Pipeline finished: {} joined titles ({} notices)",
            joined.len(),
            self.diagnostics.len()
        );
        Ok(joined)
    }

    fn compute_resolution(&mut self) -> Result<RegionResolution> {
        let akas = Table::load(
            "title.akas",
            &self.config.paths.title_akas,
            TableShape::Catalog,
            Some(AKAS_INDEX),
        )?;
        let resolver = RegionResolver::new(self.mapper.clone(), self.config.include_world_fallback);
        let resolution = resolver.resolve_table(&akas, &mut self.diagnostics)?;
        if resolution.lost_region_count() > 0 {
            resolution.log_ambiguous(SAMPLE_SIZE);
        }

        self.summary.akas_rows = akas.height();
        self.summary.distinct_titles = resolution.title_count;
        self.summary.resolved_titles = resolution.resolved.len();
        self.summary.ambiguous_titles = resolution.lost_region_count();
        Ok(resolution)
    }

    fn compute_macro(&mut self) -> Result<MacroTable> {
        let paths = &self.config.paths;
        let shape = TableShape::Macro {
            skip_rows: self.config.macro_skip_rows,
        };
        let gdp = Table::load("gdp", &paths.gdp, shape, None)?;
        let population = Table::load("population", &paths.population, shape, None)?;
        let codes = Table::load(
            "country codes",
            &paths.country_codes,
            TableShape::Macro { skip_rows: 0 },
            Some(ALPHA3),
        )?;

        let aggregator = MacroAggregator::new(self.mapper.clone());
        let macro_table = aggregator.aggregate_tables(
            &gdp,
            &population,
            &codes,
            &self.config.macro_year,
            &mut self.diagnostics,
        )?;
        self.summary.macro_regions = macro_table.len();
        Ok(macro_table)
    }
}
