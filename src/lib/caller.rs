//! The per-site Bayesian decision pipeline.
//!
//! Data flows strictly downstream: observations → grouped alleles →
//! candidate genotype alleles → per-sample data likelihoods → joint combos
//! with priors → posterior-normalized combo distribution → site decision and
//! marginals. Everything is owned by the call frame; no state crosses sites.

use std::fmt;

use log::{debug, warn};

use crate::allele::Allele;
use crate::combo::GenotypeCombo;
use crate::config::CallerConfig;
use crate::errors::Result;
use crate::genotype::GenotypePool;
use crate::likelihood::SampleLikelihoods;
use crate::marginals::marginalize;
use crate::phred::{ln_one_minus_exp, ln_prob_to_phred, ln_sum_exp_all};
use crate::priors::{ObservedCounts, PriorOptions};
use crate::reference::MAX_REPEAT_MOTIF;
use crate::report::{FailedAllele, SampleCall, SiteCall};
use crate::sample::{
    candidate_alleles, group_alleles, reference_sample, sufficient_alternate_observations,
    SampleObservations, SamplePileup, SitePileup,
};
use crate::search::{banded_search, em_search, SearchBounds};

/// Why a site was skipped without scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Reference base is not one of A/C/G/T
    NonAcgtReference,
    /// Position lies outside the configured target regions
    OutsideTargets,
    /// No observations at the site
    NoCoverage,
    /// Coverage below the configured minimum
    LowCoverage(u32),
    /// No alternate allele cleared the presence thresholds
    InsufficientAlternates,
    /// Candidate selection left only the reference allele
    NoCandidateAlleles,
    /// Every sample's genotype list was filtered empty
    NoScorableSamples,
    /// Input violated the ingester contract; reported once, site dropped
    MalformedInput(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonAcgtReference => write!(f, "reference base is not A/C/G/T"),
            SkipReason::OutsideTargets => write!(f, "outside target regions"),
            SkipReason::NoCoverage => write!(f, "no coverage"),
            SkipReason::LowCoverage(coverage) => {
                write!(f, "coverage {coverage} below minimum")
            }
            SkipReason::InsufficientAlternates => {
                write!(f, "insufficient alternate observations")
            }
            SkipReason::NoCandidateAlleles => {
                write!(f, "no candidate alleles passed filters")
            }
            SkipReason::NoScorableSamples => write!(f, "no scorable samples"),
            SkipReason::MalformedInput(message) => write!(f, "malformed input: {message}"),
        }
    }
}

/// The core's decision for one site.
#[derive(Debug)]
pub enum SiteOutcome {
    /// The site was rejected before scoring
    Skipped(SkipReason),
    /// p(variant) cleared the threshold; a full decision record follows
    Variant(Box<SiteCall>),
    /// The site was scored but p(variant) fell below the threshold
    NoVariant {
        /// The sub-threshold variation probability
        p_variant: f64,
        /// One record per non-reference candidate for the failed-site sink
        failed: Vec<FailedAllele>,
    },
}

/// The per-site caller. Holds only validated configuration; every data
/// structure it builds is per-site and released on return, so sites may be
/// processed in parallel by the host with one caller per worker or a shared
/// reference.
#[derive(Debug)]
pub struct SiteCaller {
    config: CallerConfig,
}

impl SiteCaller {
    /// Creates a caller from a configuration, validating it first.
    pub fn new(mut config: CallerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration in effect.
    #[must_use]
    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// Runs the full decision pipeline for one site.
    ///
    /// Never panics or errors across the site boundary: every recoverable
    /// condition resolves to a skip or to a best-available decision.
    #[must_use]
    pub fn call_site(&self, site: &SitePileup) -> SiteOutcome {
        if let Err(error) = site.validate() {
            warn!("{error}");
            return SiteOutcome::Skipped(SkipReason::MalformedInput(error.to_string()));
        }
        if !matches!(site.reference_base, 'A' | 'C' | 'G' | 'T') {
            return SiteOutcome::Skipped(SkipReason::NonAcgtReference);
        }
        if !site.in_target {
            debug!(
                "{}:{} is not inside any targets, skipping",
                site.sequence,
                site.position + 1
            );
            return SiteOutcome::Skipped(SkipReason::OutsideTargets);
        }

        let coverage = site.coverage();
        debug!("{}:{} coverage: {coverage}", site.sequence, site.position + 1);
        if coverage == 0 {
            return SiteOutcome::Skipped(SkipReason::NoCoverage);
        }
        if coverage < self.config.min_coverage {
            return SiteOutcome::Skipped(SkipReason::LowCoverage(coverage));
        }

        let reference_allele = site.reference_allele();

        // the reference pseudo-sample, when enabled, joins inference like
        // any other sample but contributes nothing to site coverage checks;
        // its observation weight tracks the mean per-sample coverage
        let ref_pileup: Option<SamplePileup> = self.config.use_ref_allele.then(|| {
            let mean_coverage = coverage / site.samples.len().max(1) as u32;
            reference_sample(&site.sequence, &reference_allele, mean_coverage)
        });
        let pileups: Vec<&SamplePileup> =
            site.samples.iter().chain(ref_pileup.iter()).collect();

        let grouped: Vec<SampleObservations<'_>> = pileups
            .iter()
            .map(|p| SampleObservations::from_pileup(p))
            .collect();

        let groups = group_alleles(&grouped);
        if !sufficient_alternate_observations(
            &groups,
            coverage,
            self.config.min_alt_count,
            self.config.min_alt_fraction,
        ) {
            return SiteOutcome::Skipped(SkipReason::InsufficientAlternates);
        }

        let Some(candidates) =
            candidate_alleles(&groups, coverage, &reference_allele, &self.config)
        else {
            return SiteOutcome::Skipped(SkipReason::NoCandidateAlleles);
        };
        debug!(
            "{}:{} candidate alleles: {}",
            site.sequence,
            site.position + 1,
            candidates.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        );

        let allele_group_counts: Vec<(Allele, u32)> =
            groups.iter().map(|(allele, count)| ((*allele).clone(), *count)).collect();

        // per-sample data likelihoods over cached per-ploidy genotype lists;
        // samples with no scorable genotype drop out of joint inference
        let mut pool = GenotypePool::new();
        let mut samples: Vec<SampleLikelihoods> = Vec::with_capacity(grouped.len());
        let mut sample_coverage: Vec<u32> = Vec::with_capacity(grouped.len());
        for sample in &grouped {
            let genotypes = pool.genotypes(sample.ploidy, &candidates);
            if let Some(likelihoods) =
                SampleLikelihoods::build(sample, genotypes, &self.config)
            {
                samples.push(likelihoods);
                sample_coverage.push(sample.coverage());
            }
        }
        if samples.is_empty() {
            return SiteOutcome::Skipped(SkipReason::NoScorableSamples);
        }

        let observed = ObservedCounts::tally(&grouped, &candidates);
        let priors = PriorOptions::from_config(&self.config);
        let bounds = SearchBounds::from_config(&self.config);

        let combos = if self.config.expectation_maximization {
            em_search(
                &mut samples,
                &candidates,
                &observed,
                &priors,
                &bounds,
                self.config.permute,
                self.config.expectation_maximization_max_iterations,
            )
        } else {
            banded_search(
                &samples,
                &candidates,
                &observed,
                &priors,
                &bounds,
                self.config.permute,
            )
        };

        let failed = || -> Vec<FailedAllele> {
            candidates
                .iter()
                .filter(|a| !a.is_reference())
                .map(|allele| FailedAllele {
                    sequence: site.sequence.clone(),
                    position: site.position,
                    allele: allele.clone(),
                })
                .collect()
        };

        let posteriors: Vec<f64> = combos.iter().map(GenotypeCombo::ln_posterior).collect();
        let normalizer = ln_sum_exp_all(&posteriors);
        if normalizer.is_infinite() {
            // every posterior underflowed to log(0): report non-variant
            return SiteOutcome::NoVariant { p_variant: 0.0, failed: failed() };
        }

        let p_no_variant: f64 = combos
            .iter()
            .filter(|c| c.is_monomorphic(&samples))
            .map(|c| (c.ln_posterior() - normalizer).exp())
            .sum();
        let p_variant = (1.0 - p_no_variant).clamp(0.0, 1.0);
        debug!(
            "{}:{} p(variant) = {p_variant:.6}",
            site.sequence,
            site.position + 1
        );

        if p_variant < self.config.p_variant_threshold {
            return SiteOutcome::NoVariant { p_variant, failed: failed() };
        }

        // the reported combo is the best heterozygous-containing combo; the
        // overall argmax may itself be monomorphic, which the record flags
        let best_overall_is_het = !combos[0].is_monomorphic(&samples);
        let best_het = combos
            .iter()
            .find(|c| !c.is_monomorphic(&samples))
            .unwrap_or(&combos[0]);

        let (reported, qualities) = if self.config.calculate_marginals {
            let marginal_priors = PriorOptions::for_marginalization(&self.config);
            marginalize(
                &mut samples,
                &combos[0],
                &observed,
                &marginal_priors,
                &bounds,
                self.config.genotyping_max_iterations,
            );
            let choices: Vec<usize> = samples.iter().map(SampleLikelihoods::top).collect();
            let reported =
                GenotypeCombo::from_choices(choices, &samples, &observed, &priors);
            let qualities: Vec<Option<f64>> = samples
                .iter()
                .map(|s| {
                    Some(ln_prob_to_phred(ln_one_minus_exp(s.top_entry().marginal)))
                })
                .collect();
            (reported, qualities)
        } else {
            (best_het.clone(), vec![None; samples.len()])
        };

        let mut alternates: Vec<(Allele, u32)> = reported
            .allele_counts(&samples)
            .into_iter()
            .filter(|(allele, _)| !allele.is_reference())
            .collect();
        alternates.sort_by(|a, b| b.1.cmp(&a.1));
        if alternates.is_empty() {
            // reported combo is monomorphic reference but the site cleared
            // the threshold: fall back to observed alternate support
            alternates = allele_group_counts
                .iter()
                .filter(|(allele, _)| !allele.is_reference())
                .cloned()
                .collect();
            alternates.sort_by(|a, b| b.1.cmp(&a.1));
        }

        let sample_calls: Vec<SampleCall> = samples
            .iter()
            .enumerate()
            .map(|(index, sample)| SampleCall {
                name: sample.name.clone(),
                genotype: reported.genotype(&samples, index).clone(),
                genotype_quality: qualities[index],
                coverage: sample_coverage[index],
            })
            .collect();

        let repeats = if self.config.show_reference_repeats {
            site.reference_context
                .as_ref()
                .map(|context| context.repeat_counts(MAX_REPEAT_MOTIF))
                .unwrap_or_default()
        } else {
            std::collections::BTreeMap::new()
        };

        SiteOutcome::Variant(Box::new(SiteCall {
            sequence: site.sequence.clone(),
            position: site.position,
            reference_base: site.reference_base,
            alternates,
            p_variant,
            coverage,
            best_overall_is_het,
            samples: sample_calls,
            allele_groups: allele_group_counts,
            repeats,
        }))
    }
}
