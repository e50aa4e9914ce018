//! Chart and dimension attribute types.

use std::fmt;

/// Chart type supported by Netdata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartType {
    #[default]
    Line,
    Area,
    Stacked,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Area => "area",
            ChartType::Stacked => "stacked",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimension algorithm for value processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DimensionAlgorithm {
    /// Store the value as-is
    #[default]
    Absolute,
    /// Calculate difference from previous value (for counters)
    Incremental,
    /// Calculate percentage of dimension relative to row total
    PercentageOfAbsoluteRow,
    /// Calculate percentage of dimension relative to incremental row
    PercentageOfIncrementalRow,
}

impl DimensionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionAlgorithm::Absolute => "absolute",
            DimensionAlgorithm::Incremental => "incremental",
            DimensionAlgorithm::PercentageOfAbsoluteRow => "percentage-of-absolute-row",
            DimensionAlgorithm::PercentageOfIncrementalRow => "percentage-of-incremental-row",
        }
    }
}

impl fmt::Display for DimensionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart options, written as the space separated options field of `CHART`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChartOptions {
    pub obsolete: bool,
    pub detail: bool,
    pub store_first: bool,
    pub hidden: bool,
}

impl fmt::Display for ChartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.obsolete, "obsolete"),
            (self.detail, "detail"),
            (self.store_first, "store_first"),
            (self.hidden, "hidden"),
        ];

        let mut first = true;
        for (_, name) in flags.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_rendering() {
        assert_eq!(ChartOptions::default().to_string(), "");

        let opts = ChartOptions {
            detail: true,
            hidden: true,
            ..Default::default()
        };
        assert_eq!(opts.to_string(), "detail hidden");
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(
            DimensionAlgorithm::PercentageOfIncrementalRow.as_str(),
            "percentage-of-incremental-row"
        );
        assert_eq!(ChartType::Stacked.to_string(), "stacked");
    }
}
