//! Caller configuration: every knob the per-site decision pipeline honors.

use log::warn;
use serde::Serialize;

use crate::errors::{FgvarError, Result};

/// Configuration for the per-site Bayesian decision pipeline.
///
/// Defaults follow the genotyping behavior the engine was tuned with:
/// SNP/MNP/indel candidates on, HWE and binomial observation priors on,
/// banded posterior integration, marginal genotype qualities on.
#[derive(Debug, Clone, Serialize)]
pub struct CallerConfig {
    /// Consider SNP alleles as genotype candidates
    pub allow_snps: bool,
    /// Consider insertion/deletion alleles as genotype candidates
    pub allow_indels: bool,
    /// Consider MNP alleles as genotype candidates
    pub allow_mnps: bool,
    /// Add the reference as a synthetic high-quality sample
    pub use_ref_allele: bool,

    /// Skip sites with total coverage below this
    pub min_coverage: u32,
    /// An alternate needs at least this many supporting observations
    pub min_alt_count: u32,
    /// ... and at least this fraction of site coverage
    pub min_alt_fraction: f64,

    /// Read-dependence factor: down-weights repeat observations from the
    /// same read-group cluster (1.0 = fully independent)
    pub read_dependence_factor: f64,
    /// Fold mapping quality into per-observation error probability
    pub use_mapping_quality: bool,

    /// Score only genotypes whose alleles all have sample support
    pub exclude_partially_observed_genotypes: bool,
    /// Score only genotypes with at least one supported allele
    pub exclude_unobserved_genotypes: bool,
    /// Phred likelihood gap below which a sample is flagged as a
    /// variant candidate for banded search (0 = flag every sample)
    pub genotype_variant_threshold: f64,

    /// Treat all samples as one pool for the genotype-frequency prior
    pub pooled: bool,
    /// Let any sample vary in banded search, not only variant candidates
    pub permute: bool,
    /// Hardy-Weinberg genotype prior term
    pub hwe_priors: bool,
    /// Binomial observation-count prior term
    pub obs_binomial_priors: bool,
    /// Strand allele-balance prior term
    pub allele_balance_priors: bool,
    /// θ in the neutral-diffusion allele-frequency prior
    pub diffusion_prior_scalar: f64,

    /// Banded search: maximum number of samples varied per combination
    pub bandwidth: usize,
    /// Banded search: per-sample genotype depth for varied samples
    pub band_depth: usize,
    /// Cap on generated combinations per search step
    pub genotype_combo_step_max: usize,
    /// Per-sample depth bound applied when reseeding and enumerating
    /// local combinations
    pub local_depth: usize,

    /// Use expectation-maximization search instead of one banded pass
    pub expectation_maximization: bool,
    /// Iteration cap for the EM search
    pub expectation_maximization_max_iterations: usize,

    /// Compute per-sample marginal genotype posteriors
    pub calculate_marginals: bool,
    /// Iteration cap for the marginalization pass
    pub genotyping_max_iterations: usize,

    /// Report the site as variant iff p(variant) >= this threshold
    pub p_variant_threshold: f64,
    /// Emit one record per alternate allele instead of one combined record
    pub report_all_alternates: bool,
    /// Attach reference motif repeat counts to emitted records
    pub show_reference_repeats: bool,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            allow_snps: true,
            allow_indels: true,
            allow_mnps: true,
            use_ref_allele: false,
            min_coverage: 0,
            min_alt_count: 2,
            min_alt_fraction: 0.0,
            read_dependence_factor: 0.9,
            use_mapping_quality: false,
            exclude_partially_observed_genotypes: false,
            exclude_unobserved_genotypes: false,
            genotype_variant_threshold: 0.0,
            pooled: false,
            permute: false,
            hwe_priors: true,
            obs_binomial_priors: true,
            allele_balance_priors: false,
            diffusion_prior_scalar: 0.001,
            bandwidth: 2,
            band_depth: 2,
            genotype_combo_step_max: 10_000,
            local_depth: 6,
            expectation_maximization: false,
            expectation_maximization_max_iterations: 3,
            calculate_marginals: true,
            genotyping_max_iterations: 10,
            p_variant_threshold: 0.0001,
            report_all_alternates: false,
            show_reference_repeats: false,
        }
    }
}

impl CallerConfig {
    /// Validates parameter ranges and resolves option conflicts.
    ///
    /// The two genotype observation filters are incompatible when both set:
    /// the partially-observed filter subsumes the unobserved filter, so it
    /// takes precedence and the weaker flag is cleared here, before any site
    /// is processed.
    pub fn validate(&mut self) -> Result<()> {
        if self.exclude_partially_observed_genotypes && self.exclude_unobserved_genotypes {
            warn!(
                "both genotype observation filters set; \
                 excluding partially observed genotypes takes precedence"
            );
            self.exclude_unobserved_genotypes = false;
        }

        if !(0.0..=1.0).contains(&self.min_alt_fraction) {
            return Err(invalid("min-alt-fraction", "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.p_variant_threshold) {
            return Err(invalid("pvar", "must be within [0, 1]"));
        }
        if self.read_dependence_factor <= 0.0 || self.read_dependence_factor > 1.0 {
            return Err(invalid("read-dependence-factor", "must be within (0, 1]"));
        }
        if self.diffusion_prior_scalar <= 0.0 {
            return Err(invalid("theta", "must be positive"));
        }
        if self.band_depth == 0 {
            return Err(invalid("band-depth", "must be at least 1"));
        }
        if self.local_depth == 0 {
            return Err(invalid("local-depth", "must be at least 1"));
        }
        if self.genotype_combo_step_max == 0 {
            return Err(invalid("combo-step-max", "must be at least 1"));
        }
        if self.expectation_maximization && self.expectation_maximization_max_iterations == 0 {
            return Err(invalid("em-max-iterations", "must be at least 1"));
        }
        if self.calculate_marginals && self.genotyping_max_iterations == 0 {
            return Err(invalid("genotyping-max-iterations", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(parameter: &str, reason: &str) -> FgvarError {
    FgvarError::InvalidParameter {
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}
