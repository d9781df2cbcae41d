use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Retailer-assigned identifier of a pickup/delivery address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub i64);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A catalog scope whose availability and pricing may differ from others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
}

/// Optional operator-maintained restriction on which regions get synced.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionAllowlist {
    pub regions: Vec<Region>,
}

impl RegionAllowlist {
    /// Keeps only the enumerated regions whose id appears in the allowlist,
    /// preserving enumeration order.
    #[must_use]
    pub fn filter(&self, enumerated: Vec<Region>) -> Vec<Region> {
        let allowed: HashSet<RegionId> = self.regions.iter().map(|r| r.id).collect();
        enumerated
            .into_iter()
            .filter(|r| allowed.contains(&r.id))
            .collect()
    }
}

/// Load and validate a region allowlist from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_region_allowlist(path: &Path) -> Result<RegionAllowlist, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RegionsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_region_allowlist(&content)
}

fn parse_region_allowlist(content: &str) -> Result<RegionAllowlist, ConfigError> {
    let allowlist: RegionAllowlist = serde_yaml::from_str(content)?;
    validate_allowlist(&allowlist)?;
    Ok(allowlist)
}

fn validate_allowlist(allowlist: &RegionAllowlist) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for region in &allowlist.regions {
        if region.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "region {} must have a non-empty name",
                region.id
            )));
        }

        if !seen.insert(region.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate region id: {}",
                region.id
            )));
        }
    }

    Ok(())
}
