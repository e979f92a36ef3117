//! Region Mapper
//!
//! Raw country codes collapse into language/market groups ("US", "GB", ...
//! become "EN"). Codes the table does not know pass through unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved code for titles and aggregates that belong to no single region.
pub const WORLD_REGION: &str = "WD";

/// 3-letter code the macro tables use for the world aggregate.
pub const WORLD_ALPHA3: &str = "WLD";

const DEFAULT_GROUPS: &[(&str, &str)] = &[
    ("US", "EN"),
    ("GB", "EN"),
    ("CA", "EN"),
    ("NZ", "EN"),
    ("AU", "EN"),
    ("IE", "EN"),
    ("ZA", "EN"),
    ("IN", "EN"),
    ("ES", "ES"),
    ("MX", "ES"),
    ("EC", "ES"),
    ("CL", "ES"),
    ("AR", "ES"),
    ("PE", "ES"),
    ("BR", "PT"),
    ("PT", "PT"),
    ("DE", "DE"),
    ("AT", "DE"),
    ("CH", "DE"),
];

const DEFAULT_GROUP_NAMES: &[(&str, &str)] = &[
    ("EN", "International English"),
    ("ES", "International Spanish"),
    ("PT", "International Portuguese"),
    ("DE", "International German"),
];

/// Raw code -> region-group code, plus display names for the groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionGroupMap {
    groups: HashMap<String, String>,
    #[serde(default)]
    display_names: HashMap<String, String>,
}

impl Default for RegionGroupMap {
    fn default() -> Self {
        Self::new(
            DEFAULT_GROUPS.iter().map(|(c, g)| (c.to_string(), g.to_string())),
            DEFAULT_GROUP_NAMES.iter().map(|(g, n)| (g.to_string(), n.to_string())),
        )
    }
}

impl RegionGroupMap {
    pub fn new<G, N>(groups: G, display_names: N) -> Self
    where
        G: IntoIterator<Item = (String, String)>,
        N: IntoIterator<Item = (String, String)>,
    {
        Self {
            groups: groups.into_iter().collect(),
            display_names: display_names.into_iter().collect(),
        }
    }

    /// A map with no groups; every code maps to itself.
    pub fn identity() -> Self {
        Self::new(
            Vec::<(String, String)>::new(),
            Vec::<(String, String)>::new(),
        )
    }

    pub fn with_group(mut self, code: &str, group: &str) -> Self {
        self.groups.insert(code.to_string(), group.to_string());
        self
    }

    pub fn with_display_name(mut self, group: &str, name: &str) -> Self {
        self.display_names.insert(group.to_string(), name.to_string());
        self
    }

    pub fn group_of(&self, code: &str) -> Option<&str> {
        self.groups.get(code).map(String::as_str)
    }

    pub fn display_name(&self, group: &str) -> Option<&str> {
        self.display_names.get(group).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Shared, read-only view over a `RegionGroupMap`.
#[derive(Debug, Clone)]
pub struct RegionMapper {
    map: Arc<RegionGroupMap>,
}

impl Default for RegionMapper {
    fn default() -> Self {
        Self::new(Arc::new(RegionGroupMap::default()))
    }
}

impl RegionMapper {
    pub fn new(map: Arc<RegionGroupMap>) -> Self {
        Self { map }
    }

    /// Canonical region-group code for `code`, or `code` itself when unmapped.
    pub fn canonical<'a>(&'a self, code: &'a str) -> &'a str {
        self.map.group_of(code).unwrap_or(code)
    }

    pub fn display_name(&self, group: &str) -> Option<&str> {
        self.map.display_name(group)
    }

    pub fn map(&self) -> &RegionGroupMap {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_markets_collapse() {
        let mapper = RegionMapper::default();
        for code in ["US", "GB", "CA", "NZ", "AU", "IE", "ZA", "IN"] {
            assert_eq!(mapper.canonical(code), "EN", "{} should map to EN", code);
        }
        assert_eq!(mapper.canonical("AT"), "DE");
        assert_eq!(mapper.canonical("BR"), "PT");
        assert_eq!(mapper.canonical("MX"), "ES");
    }

    #[test]
    fn test_unmapped_codes_pass_through() {
        let mapper = RegionMapper::default();
        assert_eq!(mapper.canonical("PL"), "PL");
        assert_eq!(mapper.canonical(WORLD_REGION), WORLD_REGION);
        assert_eq!(mapper.canonical(""), "");
    }

    #[test]
    fn test_mapping_is_stable() {
        let mapper = RegionMapper::default();
        let first: Vec<&str> = ["GB", "PL", "CH"].iter().map(|c| mapper.canonical(*c)).collect();
        let second: Vec<&str> = ["GB", "PL", "CH"].iter().map(|c| mapper.canonical(*c)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_names() {
        let mapper = RegionMapper::default();
        assert_eq!(mapper.display_name("EN"), Some("International English"));
        assert_eq!(mapper.display_name("PL"), None);
    }

    #[test]
    fn test_custom_map() {
        let map = RegionGroupMap::identity()
            .with_group("FR", "FR")
            .with_group("BE", "FR")
            .with_display_name("FR", "International French");
        let mapper = RegionMapper::new(Arc::new(map));

        assert_eq!(mapper.canonical("BE"), "FR");
        assert_eq!(mapper.canonical("US"), "US");
        assert_eq!(mapper.display_name("FR"), Some("International French"));
    }
}
