//! Administrative hierarchy types for region resolution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Adcode of the single country-level region.
pub const COUNTRY_ADCODE: &str = "000000";

/// Name of the single country-level region.
pub const COUNTRY_NAME: &str = "中华人民共和国";

/// Administrative levels, ordered from the top of the hierarchy down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    Country,
    Province,
    City,
    County,
    Township,
    Village,
}

impl AdminLevel {
    /// Get all admin levels in hierarchical order (country first)
    pub fn all() -> &'static [AdminLevel] {
        &[
            AdminLevel::Country,
            AdminLevel::Province,
            AdminLevel::City,
            AdminLevel::County,
            AdminLevel::Township,
            AdminLevel::Village,
        ]
    }

    /// Levels that are backed by tile directories (everything below country)
    pub fn tiled() -> &'static [AdminLevel] {
        &AdminLevel::all()[1..]
    }

    /// The level directly above this one. Country has no parent.
    pub fn parent(&self) -> Option<AdminLevel> {
        match self {
            AdminLevel::Country => None,
            AdminLevel::Province => Some(AdminLevel::Country),
            AdminLevel::City => Some(AdminLevel::Province),
            AdminLevel::County => Some(AdminLevel::City),
            AdminLevel::Township => Some(AdminLevel::County),
            AdminLevel::Village => Some(AdminLevel::Township),
        }
    }

    /// The level directly below this one.
    pub fn child(&self) -> Option<AdminLevel> {
        match self {
            AdminLevel::Country => Some(AdminLevel::Province),
            AdminLevel::Province => Some(AdminLevel::City),
            AdminLevel::City => Some(AdminLevel::County),
            AdminLevel::County => Some(AdminLevel::Township),
            AdminLevel::Township => Some(AdminLevel::Village),
            AdminLevel::Village => None,
        }
    }

    /// Get the field name for this level. Doubles as the tile subdirectory name.
    pub fn field_name(&self) -> &'static str {
        match self {
            AdminLevel::Country => "country",
            AdminLevel::Province => "province",
            AdminLevel::City => "city",
            AdminLevel::County => "county",
            AdminLevel::Township => "township",
            AdminLevel::Village => "village",
        }
    }

    /// Number of significant adcode digits that identify a region at this level.
    pub fn significant_digits(&self) -> usize {
        match self {
            AdminLevel::Country => 0,
            AdminLevel::Province => 2,
            AdminLevel::City => 4,
            AdminLevel::County => 6,
            AdminLevel::Township => 9,
            AdminLevel::Village => 12,
        }
    }

    pub fn from_significant_digits(digits: usize) -> Option<Self> {
        AdminLevel::all()
            .iter()
            .copied()
            .find(|l| l.significant_digits() == digits)
    }
}

impl std::fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// A resolved region at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub name: String,
    pub adcode: String,

    /// `[lng, lat]` of the region's centroid, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_point: Option<[f64; 2]>,
}

impl RegionInfo {
    pub fn new(name: impl Into<String>, adcode: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adcode: adcode.into(),
            center_point: None,
        }
    }

    pub fn country() -> Self {
        Self::new(COUNTRY_NAME, COUNTRY_ADCODE)
    }
}

/// Partial top-down mapping from level to resolved region for one point.
///
/// A level is only ever stored once its parent level is present, so the
/// chain never has gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<RegionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<RegionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<RegionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<RegionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub township: Option<RegionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub village: Option<RegionInfo>,
}

impl ResolvedChain {
    /// A chain with only the fixed country level set.
    pub fn with_country() -> Self {
        Self {
            country: Some(RegionInfo::country()),
            ..Default::default()
        }
    }

    /// Set the region for a level.
    ///
    /// Returns `false` and leaves the chain untouched if the parent level is
    /// not resolved yet.
    pub fn set(&mut self, level: AdminLevel, info: RegionInfo) -> bool {
        if let Some(parent) = level.parent() {
            if self.get(parent).is_none() {
                return false;
            }
        }
        *self.slot(level) = Some(info);
        true
    }

    /// Get the region for a level
    pub fn get(&self, level: AdminLevel) -> Option<&RegionInfo> {
        match level {
            AdminLevel::Country => self.country.as_ref(),
            AdminLevel::Province => self.province.as_ref(),
            AdminLevel::City => self.city.as_ref(),
            AdminLevel::County => self.county.as_ref(),
            AdminLevel::Township => self.township.as_ref(),
            AdminLevel::Village => self.village.as_ref(),
        }
    }

    fn slot(&mut self, level: AdminLevel) -> &mut Option<RegionInfo> {
        match level {
            AdminLevel::Country => &mut self.country,
            AdminLevel::Province => &mut self.province,
            AdminLevel::City => &mut self.city,
            AdminLevel::County => &mut self.county,
            AdminLevel::Township => &mut self.township,
            AdminLevel::Village => &mut self.village,
        }
    }

    /// Deepest level that has a region, if any.
    pub fn deepest(&self) -> Option<AdminLevel> {
        AdminLevel::all()
            .iter()
            .rev()
            .copied()
            .find(|l| self.get(*l).is_some())
    }

    /// True when every resolved level also has its parent resolved.
    pub fn is_contiguous(&self) -> bool {
        AdminLevel::all().iter().all(|level| match level.parent() {
            Some(parent) => self.get(*level).is_none() || self.get(parent).is_some(),
            None => true,
        })
    }

    /// Write `<level>Name`, `<level>Adcode` and `<level>CenterPoint` fields
    /// into an output record.
    pub fn write_into(&self, record: &mut Map<String, Value>) {
        for level in AdminLevel::all() {
            let Some(info) = self.get(*level) else {
                continue;
            };
            let prefix = level.field_name();
            record.insert(format!("{prefix}Name"), Value::String(info.name.clone()));
            record.insert(
                format!("{prefix}Adcode"),
                Value::String(info.adcode.clone()),
            );
            if let Some([x, y]) = info.center_point {
                record.insert(format!("{prefix}CenterPoint"), serde_json::json!([x, y]));
            }
        }
    }
}
