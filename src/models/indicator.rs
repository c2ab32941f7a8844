//! Sustainability indicator identifiers and their display catalog
//!
//! Indicators are the 17 Sustainable Development Goals. Each has a display
//! name and a color used for its note heads.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color used for indicators without a catalog entry
pub const FALLBACK_COLOR: &str = "#667eea";

/// Identifier of one indicator (SDG 1-17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndicatorId(pub u8);

impl IndicatorId {
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Key used in the indicator data set, e.g. "sdg7"
    pub fn data_key(&self) -> String {
        format!("sdg{}", self.0)
    }

    pub fn is_known(&self) -> bool {
        (1..=17).contains(&self.0)
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SDG {}", self.0)
    }
}

impl FromStr for IndicatorId {
    type Err = String;

    /// Accepts "7", "sdg7" and "SDG 7"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let digits = lower.trim_start_matches("sdg").trim();
        digits
            .parse::<u8>()
            .map(IndicatorId)
            .map_err(|_| format!("Invalid indicator id: '{}'", s))
    }
}

/// One catalog row
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorInfo {
    pub id: IndicatorId,
    pub name: &'static str,
    pub color: &'static str,
}

/// Static table of indicator names and colors
#[derive(Debug)]
pub struct IndicatorCatalog {
    entries: Vec<IndicatorInfo>,
}

static CATALOG: Lazy<IndicatorCatalog> = Lazy::new(|| {
    let rows: [(&'static str, &'static str); 17] = [
        ("No Poverty", "#e5243b"),
        ("Zero Hunger", "#DDA63A"),
        ("Good Health and Well-being", "#4C9F38"),
        ("Quality Education", "#C5192D"),
        ("Gender Equality", "#FF3A21"),
        ("Clean Water and Sanitation", "#26BDE2"),
        ("Affordable and Clean Energy", "#FCC30B"),
        ("Decent Work and Economic Growth", "#A21942"),
        ("Industry, Innovation and Infrastructure", "#FD6925"),
        ("Reduced Inequalities", "#DD1367"),
        ("Sustainable Cities and Communities", "#FD9D24"),
        ("Responsible Consumption and Production", "#BF8B2E"),
        ("Climate Action", "#3F7E44"),
        ("Life Below Water", "#0A97D9"),
        ("Life on Land", "#56C02B"),
        ("Peace, Justice and Strong Institutions", "#00689D"),
        ("Partnerships for the Goals", "#19486A"),
    ];
    IndicatorCatalog {
        entries: rows
            .iter()
            .enumerate()
            .map(|(i, &(name, color))| IndicatorInfo {
                id: IndicatorId(i as u8 + 1),
                name,
                color,
            })
            .collect(),
    }
});

impl IndicatorCatalog {
    /// The shared catalog
    pub fn global() -> &'static IndicatorCatalog {
        &CATALOG
    }

    pub fn get(&self, id: IndicatorId) -> Option<&IndicatorInfo> {
        self.entries.iter().find(|info| info.id == id)
    }

    pub fn name(&self, id: IndicatorId) -> &'static str {
        self.get(id).map(|info| info.name).unwrap_or("")
    }

    pub fn color(&self, id: IndicatorId) -> &'static str {
        self.get(id).map(|info| info.color).unwrap_or(FALLBACK_COLOR)
    }

    pub fn all(&self) -> &[IndicatorInfo] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!("7".parse::<IndicatorId>().unwrap(), IndicatorId(7));
        assert_eq!("sdg13".parse::<IndicatorId>().unwrap(), IndicatorId(13));
        assert_eq!("SDG 16".parse::<IndicatorId>().unwrap(), IndicatorId(16));
        assert!("poverty".parse::<IndicatorId>().is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = IndicatorCatalog::global();
        assert_eq!(catalog.all().len(), 17);
        assert_eq!(catalog.name(IndicatorId(13)), "Climate Action");
        assert_eq!(catalog.color(IndicatorId(1)), "#e5243b");
        assert_eq!(catalog.color(IndicatorId(42)), FALLBACK_COLOR);
    }

    #[test]
    fn test_display_and_key() {
        assert_eq!(IndicatorId(3).to_string(), "SDG 3");
        assert_eq!(IndicatorId(3).data_key(), "sdg3");
        assert!(!IndicatorId(0).is_known());
    }
}
