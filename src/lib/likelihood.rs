//! Per-sample data likelihoods: log P(reads | genotype).
//!
//! For a genotype g = {a₁,…,a_p} with multiplicities mᵢ, each observation o
//! contributes the mixture Σᵢ (mᵢ/p)·P(o | aᵢ), where an observation
//! matching aᵢ contributes (1 − ε) and a mismatching one ε/3, with ε derived
//! from the observation's base quality (optionally folded with its mapping
//! quality). The sample log-likelihood is the sum of per-observation log
//! mixtures.

use ahash::AHashMap;

use crate::allele::{Allele, Observation};
use crate::config::CallerConfig;
use crate::genotype::Genotype;
use crate::phred::{ln_error_prob_either, phred_to_ln_error_prob, prob_to_phred};
use crate::sample::SampleObservations;

/// Log probability of one observation's base call being wrong.
///
/// With `use_mapping_quality` set, the read may also be mismapped; the two
/// error processes are combined as a union of independent events.
fn ln_observation_error(obs: &Observation, config: &CallerConfig) -> f64 {
    let ln_base_error = phred_to_ln_error_prob(obs.base_quality);
    if config.use_mapping_quality {
        let ln_map_error = phred_to_ln_error_prob(obs.mapping_quality);
        ln_error_prob_either(ln_base_error, ln_map_error)
    } else {
        ln_base_error
    }
}

/// Computes log P(observations | genotype) for one sample.
///
/// The read-dependence factor scales the log contribution of the k-th
/// repeat observation of the same allele from the same read-group cluster
/// by RDF^k, discounting evidence that is unlikely to be independent.
#[must_use]
pub fn genotype_log_likelihood(
    sample: &SampleObservations<'_>,
    genotype: &Genotype,
    config: &CallerConfig,
) -> f64 {
    let ploidy = f64::from(genotype.ploidy());
    let rdf = config.read_dependence_factor;
    let mut repeats: AHashMap<(&str, &Allele), i32> = AHashMap::new();
    let mut total = 0.0_f64;

    for obs in sample.observations() {
        let error = ln_observation_error(obs, config).exp();
        let mut mixture = 0.0_f64;
        for (allele, mult) in genotype.alleles() {
            let weight = f64::from(mult) / ploidy;
            let p = if *allele == obs.allele { 1.0 - error } else { error / 3.0 };
            mixture += weight * p;
        }
        let mut ln_p = mixture.ln();
        if rdf < 1.0 {
            let seen = repeats.entry((obs.read_group.as_str(), &obs.allele)).or_insert(0);
            if *seen > 0 {
                ln_p *= rdf.powi(*seen);
            }
            *seen += 1;
        }
        total += ln_p;
    }
    total
}

/// One sample's likelihood for one genotype, with a mutable slot for the
/// marginal log-posterior written during the marginalization pass.
#[derive(Debug, Clone)]
pub struct SampleDataLikelihood {
    /// The genotype being scored
    pub genotype: Genotype,
    /// log P(reads | genotype)
    pub log_likelihood: f64,
    /// Marginal log-posterior for this (sample, genotype) pair; −∞ until a
    /// marginalization pass has run
    pub marginal: f64,
}

/// A sample's full list of scored genotypes.
///
/// Entry positions are fixed once built (combinations reference entries by
/// index); the `order` ranking tracks whichever field is currently
/// authoritative — data likelihood after construction, marginal posterior
/// after a marginalization pass.
#[derive(Debug)]
pub struct SampleLikelihoods {
    /// Sample name
    pub name: String,
    /// Sample ploidy
    pub ploidy: u32,
    /// Whether the likelihood-gap criterion flags this sample as a variant
    /// candidate for banded search
    pub variant_candidate: bool,
    entries: Vec<SampleDataLikelihood>,
    order: Vec<usize>,
}

impl SampleLikelihoods {
    /// Scores every eligible genotype for the sample and ranks the result.
    ///
    /// Eligibility applies the configured observation pre-filters; a sample
    /// whose filtered list is empty produces `None` and is dropped from
    /// joint inference.
    #[must_use]
    pub fn build(
        sample: &SampleObservations<'_>,
        genotypes: &[Genotype],
        config: &CallerConfig,
    ) -> Option<Self> {
        let mut entries: Vec<SampleDataLikelihood> = genotypes
            .iter()
            .filter(|g| {
                if config.exclude_partially_observed_genotypes {
                    g.has_full_support(sample)
                } else if config.exclude_unobserved_genotypes {
                    g.has_any_support(sample)
                } else {
                    true
                }
            })
            .map(|g| SampleDataLikelihood {
                genotype: g.clone(),
                log_likelihood: genotype_log_likelihood(sample, g, config),
                marginal: f64::NEG_INFINITY,
            })
            .collect();
        if entries.is_empty() {
            return None;
        }

        entries.sort_by(|a, b| b.log_likelihood.total_cmp(&a.log_likelihood));
        let order: Vec<usize> = (0..entries.len()).collect();

        let variant_candidate = if config.genotype_variant_threshold > 0.0 {
            entries.len() > 1
                && likelihood_gap_phred(&entries) < config.genotype_variant_threshold
        } else {
            true
        };

        Some(Self {
            name: sample.name.to_string(),
            ploidy: sample.ploidy,
            variant_candidate,
            entries,
            order,
        })
    }

    /// Number of scored genotypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no genotype was scored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at a stable index.
    #[must_use]
    pub fn entry(&self, index: usize) -> &SampleDataLikelihood {
        &self.entries[index]
    }

    /// All entries in stable order.
    #[must_use]
    pub fn entries(&self) -> &[SampleDataLikelihood] {
        &self.entries
    }

    /// Entry indices in the current authoritative ranking.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Index of the top-ranked entry.
    #[must_use]
    pub fn top(&self) -> usize {
        self.order[0]
    }

    /// The top-ranked entry.
    #[must_use]
    pub fn top_entry(&self) -> &SampleDataLikelihood {
        &self.entries[self.top()]
    }

    /// The first `depth` entry indices in ranked order.
    pub fn ranked(&self, depth: usize) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().take(depth).copied()
    }

    /// Writes a marginal log-posterior into the entry at `index`.
    pub fn set_marginal(&mut self, index: usize, marginal: f64) {
        self.entries[index].marginal = marginal;
    }

    /// Re-ranks by marginal log-posterior (descending). Returns `true` when
    /// the top entry changed, which is the marginalizer's convergence test.
    pub fn sort_by_marginal(&mut self) -> bool {
        let previous_top = self.top();
        let entries = &self.entries;
        self.order
            .sort_by(|&a, &b| entries[b].marginal.total_cmp(&entries[a].marginal));
        self.top() != previous_top
    }

    /// Restores the data-likelihood ranking.
    pub fn sort_by_likelihood(&mut self) {
        let entries = &self.entries;
        self.order
            .sort_by(|&a, &b| entries[b].log_likelihood.total_cmp(&entries[a].log_likelihood));
    }

    /// Re-ranks by externally supplied per-entry scores (descending); used
    /// by the EM search to fold re-estimated allele frequencies into the
    /// ranking without touching the stored likelihoods.
    pub fn rank_by_scores(&mut self, scores: &[f64]) {
        debug_assert_eq!(scores.len(), self.entries.len());
        self.order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    }

    /// Stable index of the homozygote for `allele`, if that genotype was
    /// scored for this sample.
    #[must_use]
    pub fn homozygous_entry(&self, allele: &Allele) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.genotype.is_homozygous() && e.genotype.first_allele() == allele)
    }
}

/// Phred-scale gap between the top two likelihoods, as used by the
/// variant-candidate criterion: small gaps mean the genotype is uncertain
/// and the sample is worth varying in the banded search.
fn likelihood_gap_phred(entries: &[SampleDataLikelihood]) -> f64 {
    let top = entries[0].log_likelihood.exp();
    let second = entries[1].log_likelihood.exp();
    prob_to_phred(1.0 - (top - second))
}
