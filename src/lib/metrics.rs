//! Run-level metrics for a calling pass over many sites.

use serde::Serialize;

use crate::caller::{SiteOutcome, SkipReason};

/// Counters accumulated over one calling run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunMetrics {
    /// Sites consumed from the ingester
    pub total_sites: u64,
    /// Sites that reached the Bayesian pipeline
    pub processed_sites: u64,
    /// Sites reported as variant
    pub called_sites: u64,
    /// Sites scored below the variant threshold
    pub below_threshold_sites: u64,
    /// Sites skipped before scoring, by filter
    pub skipped_out_of_target: u64,
    /// Sites skipped for missing or insufficient coverage
    pub skipped_low_coverage: u64,
    /// Sites skipped for lack of alternate evidence or candidates
    pub skipped_no_alternates: u64,
    /// Sites skipped for malformed input or a non-ACGT reference
    pub skipped_invalid: u64,
}

impl RunMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one site outcome into the counters.
    pub fn record(&mut self, outcome: &SiteOutcome) {
        self.total_sites += 1;
        match outcome {
            SiteOutcome::Variant(_) => {
                self.processed_sites += 1;
                self.called_sites += 1;
            }
            SiteOutcome::NoVariant { .. } => {
                self.processed_sites += 1;
                self.below_threshold_sites += 1;
            }
            SiteOutcome::Skipped(reason) => match reason {
                SkipReason::OutsideTargets => self.skipped_out_of_target += 1,
                SkipReason::NoCoverage | SkipReason::LowCoverage(_) => {
                    self.skipped_low_coverage += 1;
                }
                SkipReason::InsufficientAlternates
                | SkipReason::NoCandidateAlleles
                | SkipReason::NoScorableSamples => self.skipped_no_alternates += 1,
                SkipReason::NonAcgtReference | SkipReason::MalformedInput(_) => {
                    self.skipped_invalid += 1;
                }
            },
        }
    }

    /// Fraction of consumed sites that reached the pipeline.
    #[must_use]
    pub fn processed_ratio(&self) -> f64 {
        if self.total_sites == 0 {
            return 0.0;
        }
        self.processed_sites as f64 / self.total_sites as f64
    }
}

/// Logs the end-of-run summary.
pub fn log_run_summary(metrics: &RunMetrics) {
    log::info!("Calling summary:");
    log::info!("  Total sites: {}", crate::logging::format_count(metrics.total_sites));
    log::info!(
        "  Processed sites: {}",
        crate::logging::format_count(metrics.processed_sites)
    );
    log::info!("  Called sites: {}", crate::logging::format_count(metrics.called_sites));
    log::info!(
        "  Processed ratio: {}",
        crate::logging::format_percent(metrics.processed_ratio(), 2)
    );
    if metrics.below_threshold_sites > 0 {
        log::info!(
            "  Below threshold: {}",
            crate::logging::format_count(metrics.below_threshold_sites)
        );
    }
    let skipped = metrics.skipped_out_of_target
        + metrics.skipped_low_coverage
        + metrics.skipped_no_alternates
        + metrics.skipped_invalid;
    if skipped > 0 {
        log::info!("  Skipped: {} (targets {}, coverage {}, alternates {}, invalid {})",
            crate::logging::format_count(skipped),
            metrics.skipped_out_of_target,
            metrics.skipped_low_coverage,
            metrics.skipped_no_alternates,
            metrics.skipped_invalid,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FailedAllele;

    #[test]
    fn test_record_outcomes() {
        let mut metrics = RunMetrics::new();
        metrics.record(&SiteOutcome::Skipped(SkipReason::OutsideTargets));
        metrics.record(&SiteOutcome::Skipped(SkipReason::NoCoverage));
        metrics.record(&SiteOutcome::Skipped(SkipReason::InsufficientAlternates));
        metrics.record(&SiteOutcome::NoVariant { p_variant: 0.1, failed: Vec::<FailedAllele>::new() });

        assert_eq!(metrics.total_sites, 4);
        assert_eq!(metrics.processed_sites, 1);
        assert_eq!(metrics.called_sites, 0);
        assert_eq!(metrics.skipped_out_of_target, 1);
        assert_eq!(metrics.skipped_low_coverage, 1);
        assert_eq!(metrics.skipped_no_alternates, 1);
        assert!((metrics.processed_ratio() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_of_empty_run() {
        assert_eq!(RunMetrics::new().processed_ratio(), 0.0);
    }

    #[test]
    fn test_serializes_to_json() {
        let metrics = RunMetrics::new();
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"total_sites\":0"));
    }
}
