use serde::{Deserialize, Serialize};
use std::fmt;

/// Store families an attribute can be routed to.
///
/// Declaration order is the fixed application order for multi-store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreCategory {
    /// Structured / relational facts
    Structured,
    /// Free-text search index
    Search,
    /// Timestamped metrics
    #[serde(rename = "timeseries")]
    TimeSeries,
    /// Binary documents and images
    Blob,
}

impl StoreCategory {
    pub const ALL: [StoreCategory; 4] = [
        StoreCategory::Structured,
        StoreCategory::Search,
        StoreCategory::TimeSeries,
        StoreCategory::Blob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Search => "search",
            Self::TimeSeries => "timeseries",
            Self::Blob => "blob",
        }
    }
}

impl fmt::Display for StoreCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structured" => Ok(Self::Structured),
            "search" => Ok(Self::Search),
            "timeseries" | "time_series" => Ok(Self::TimeSeries),
            "blob" => Ok(Self::Blob),
            _ => Err(format!("Invalid store category: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_order() {
        let mut shuffled = vec![
            StoreCategory::Blob,
            StoreCategory::Structured,
            StoreCategory::TimeSeries,
            StoreCategory::Search,
        ];
        shuffled.sort();
        assert_eq!(shuffled, StoreCategory::ALL.to_vec());
    }

    #[test]
    fn test_parse_and_display_agree() {
        for category in StoreCategory::ALL {
            assert_eq!(category.to_string().parse::<StoreCategory>().unwrap(), category);
        }
        assert!("graph".parse::<StoreCategory>().is_err());
    }
}
