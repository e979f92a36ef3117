pub mod config;
pub mod diagnostics;
pub mod error;
pub mod join;
pub mod loader;
pub mod macro_data;
pub mod pipeline;
pub mod region_map;
pub mod region_resolver;

pub use config::{DataPaths, PipelineConfig};
pub use diagnostics::{DataQualityNotice, Diagnostics};
pub use error::{LoadFailureKind, PipelineError, Result};
pub use join::{JoinEngine, JoinedTitleRecord, JoinedTitles, YearRange};
pub use loader::{Table, TableShape};
pub use macro_data::{MacroAggregator, MacroRecord, MacroTable};
pub use pipeline::{Pipeline, PipelineSummary};
pub use region_map::{RegionGroupMap, RegionMapper, WORLD_REGION};
pub use region_resolver::{RawAkaRecord, RegionResolution, RegionResolver, ResolvedRegion};
