//! Per-stage and per-run counters.

/// What one stage did with its input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageReport {
    /// Stage name (the filter token name).
    pub name: String,
    /// Records taken from the input stream.
    pub received: u64,
    /// Records forwarded downstream.
    pub emitted: u64,
    /// Records dropped because they could not be processed.
    pub skipped: u64,
}

impl StageReport {
    pub fn new(name: &str) -> Self {
        StageReport {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Records intentionally filtered out (not counting skipped rows).
    pub fn dropped(&self) -> u64 {
        self.received - self.emitted - self.skipped
    }
}

/// Outcome of a complete pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub rows_read: u64,
    pub rows_written: u64,
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    /// Total rows skipped across all stages.
    pub fn rows_skipped(&self) -> u64 {
        self.stages.iter().map(|s| s.skipped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_excludes_skipped() {
        let report = StageReport {
            name: "re".to_string(),
            received: 10,
            emitted: 6,
            skipped: 1,
        };
        assert_eq!(report.dropped(), 3);
    }

    #[test]
    fn test_rows_skipped_sums_stages() {
        let summary = RunSummary {
            rows_read: 5,
            rows_written: 2,
            stages: vec![
                StageReport {
                    skipped: 1,
                    ..StageReport::new("cols")
                },
                StageReport {
                    skipped: 2,
                    ..StageReport::new("uniq")
                },
            ],
        };
        assert_eq!(summary.rows_skipped(), 3);
    }
}
