use crate::error::{PipelineError, Result};
use crate::region_map::RegionGroupMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Locations of every input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    pub title_akas: PathBuf,
    pub title_ratings: PathBuf,
    pub title_basics: PathBuf,
    #[serde(default = "default_gdp_path")]
    pub gdp: PathBuf,
    #[serde(default = "default_population_path")]
    pub population: PathBuf,
    #[serde(default = "default_country_codes_path")]
    pub country_codes: PathBuf,
}

impl DataPaths {
    /// Catalog tables at the given paths, macro tables at their default locations.
    pub fn new(title_akas: PathBuf, title_ratings: PathBuf, title_basics: PathBuf) -> Self {
        Self {
            title_akas,
            title_ratings,
            title_basics,
            gdp: default_gdp_path(),
            population: default_population_path(),
            country_codes: default_country_codes_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub paths: DataPaths,
    pub start_year: i32,
    pub end_year: i32,
    /// Year column selected from the macro tables.
    #[serde(default = "default_macro_year")]
    pub macro_year: String,
    /// Keep ambiguous titles that have an original-title record under "WD".
    #[serde(default = "default_include_world_fallback")]
    pub include_world_fallback: bool,
    /// Lines before the header row in the macro tables.
    #[serde(default = "default_macro_skip_rows")]
    pub macro_skip_rows: usize,
    /// Replaces the built-in region-group table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_groups: Option<RegionGroupMap>,
}

impl PipelineConfig {
    pub fn new(paths: DataPaths, start_year: i32, end_year: i32) -> Self {
        Self {
            paths,
            start_year,
            end_year,
            macro_year: default_macro_year(),
            include_world_fallback: default_include_world_fallback(),
            macro_skip_rows: default_macro_skip_rows(),
            region_groups: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.macro_year.trim().is_empty() {
            return Err(PipelineError::Configuration(
                "macro_year must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_gdp_path() -> PathBuf {
    PathBuf::from("World_Bank_Data/gdp.csv")
}

fn default_population_path() -> PathBuf {
    PathBuf::from("World_Bank_Data/population.csv")
}

fn default_country_codes_path() -> PathBuf {
    PathBuf::from("World_Bank_Data/code_mapping.csv")
}

fn default_macro_year() -> String {
    "2022".to_string()
}

fn default_include_world_fallback() -> bool {
    true
}

fn default_macro_skip_rows() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "paths": {
                    "title_akas": "data/title.akas.tsv",
                    "title_ratings": "data/title.ratings.tsv",
                    "title_basics": "data/title.basics.tsv"
                },
                "start_year": 1990,
                "end_year": 2020
            }"#,
        )
        .unwrap();

        assert_eq!(config.macro_year, "2022");
        assert!(config.include_world_fallback);
        assert_eq!(config.macro_skip_rows, 4);
        assert_eq!(config.paths.gdp, PathBuf::from("World_Bank_Data/gdp.csv"));
        assert!(config.region_groups.is_none());
    }

    #[test]
    fn test_json_region_groups() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "paths": {
                    "title_akas": "a",
                    "title_ratings": "r",
                    "title_basics": "b"
                },
                "start_year": 1990,
                "end_year": 2020,
                "region_groups": {
                    "groups": { "FR": "FR", "BE": "FR" },
                    "display_names": { "FR": "International French" }
                }
            }"#,
        )
        .unwrap();

        let groups = config.region_groups.unwrap();
        assert_eq!(groups.group_of("BE"), Some("FR"));
        assert_eq!(groups.group_of("GB"), None);
        assert_eq!(groups.display_name("FR"), Some("International French"));
    }

    #[test]
    fn test_empty_macro_year_is_rejected() {
        let mut config = PipelineConfig::new(
            DataPaths::new("a".into(), "r".into(), "b".into()),
            2000,
            2010,
        );
        config.macro_year = " ".to_string();

        assert!(matches!(config.validate(), Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let err = PipelineConfig::from_json_file(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
