//! Search over the joint genotype-combination space.
//!
//! Two strategies cover the combinatorial space without enumerating it in
//! full: banded enumeration around the best-likelihood assignment, and an
//! expectation-maximization loop that re-estimates allele frequencies
//! between banded passes. Both always include every attainable monomorphic
//! combination so that p(no-variant) is computable from the result.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::allele::Allele;
use crate::combo::{sort_and_dedup, GenotypeCombo};
use crate::config::CallerConfig;
use crate::likelihood::SampleLikelihoods;
use crate::priors::{
    ln_genotype_given_allele_frequencies, ObservedCounts, PriorOptions,
};

/// Pseudocount used when re-estimating allele frequencies between EM
/// passes, so that alleles absent from the current best combo stay
/// reachable in the next one.
const EM_FREQUENCY_PSEUDOCOUNT: f64 = 0.5;

/// Bounds on the banded enumeration.
#[derive(Debug, Clone, Copy)]
pub struct SearchBounds {
    /// Maximum number of samples varied away from the seed per combination
    pub bandwidth: usize,
    /// Per-sample genotype depth for varied samples
    pub band_depth: usize,
    /// Cap on generated combinations per search step
    pub step_max: usize,
    /// Per-sample depth bound for local (single-sample-change) enumeration
    pub local_depth: usize,
}

impl SearchBounds {
    /// Extracts the banded-search bounds from the configuration.
    #[must_use]
    pub fn from_config(config: &CallerConfig) -> Self {
        Self {
            bandwidth: config.bandwidth,
            band_depth: config.band_depth,
            step_max: config.genotype_combo_step_max,
            local_depth: config.local_depth,
        }
    }
}

/// The seed assignment: every sample takes its top-ranked genotype.
#[must_use]
pub fn best_ranked_combo(
    samples: &[SampleLikelihoods],
    observed: &ObservedCounts,
    priors: &PriorOptions,
) -> GenotypeCombo {
    let choices: Vec<usize> = samples.iter().map(SampleLikelihoods::top).collect();
    GenotypeCombo::from_choices(choices, samples, observed, priors)
}

/// One monomorphic combo per candidate allele whose homozygote every sample
/// has scored. Samples missing the homozygote (under the observation
/// pre-filters) make that allele's combo unattainable.
#[must_use]
pub fn monomorphic_combos(
    samples: &[SampleLikelihoods],
    candidates: &[Allele],
    observed: &ObservedCounts,
    priors: &PriorOptions,
) -> Vec<GenotypeCombo> {
    let mut combos = Vec::with_capacity(candidates.len());
    'allele: for allele in candidates {
        let mut choices = Vec::with_capacity(samples.len());
        for sample in samples {
            match sample.homozygous_entry(allele) {
                Some(entry) => choices.push(entry),
                None => continue 'allele,
            }
        }
        combos.push(GenotypeCombo::from_choices(choices, samples, observed, priors));
    }
    combos
}

/// Banded enumeration around a seed: all combos reachable by changing the
/// chosen genotype of at most `bandwidth` eligible samples to any of their
/// top `band_depth` genotypes, capped at `step_max` generated combos.
fn banded_combos(
    seed: &GenotypeCombo,
    samples: &[SampleLikelihoods],
    eligible: &[usize],
    observed: &ObservedCounts,
    priors: &PriorOptions,
    bounds: &SearchBounds,
) -> Vec<GenotypeCombo> {
    let mut combos = vec![seed.clone()];
    let max_varied = bounds.bandwidth.min(eligible.len());
    for varied in 1..=max_varied {
        for subset in eligible.iter().copied().combinations(varied) {
            let choice_lists: Vec<Vec<usize>> = subset
                .iter()
                .map(|&s| samples[s].ranked(bounds.band_depth).collect())
                .collect();
            for assignment in choice_lists.into_iter().multi_cartesian_product() {
                let mut choices = seed.choices().to_vec();
                for (&sample_index, &entry) in subset.iter().zip(assignment.iter()) {
                    choices[sample_index] = entry;
                }
                combos.push(GenotypeCombo::from_choices(choices, samples, observed, priors));
                if combos.len() >= bounds.step_max {
                    return combos;
                }
            }
        }
    }
    combos
}

/// Which samples the banded search may vary: all of them under `permute`,
/// otherwise only those flagged as variant candidates by the likelihood-gap
/// criterion.
fn eligible_samples(samples: &[SampleLikelihoods], permute: bool) -> Vec<usize> {
    samples
        .iter()
        .enumerate()
        .filter(|(_, s)| permute || s.variant_candidate)
        .map(|(index, _)| index)
        .collect()
}

/// One full banded search pass: seed, band, and the monomorphic anchor
/// combos, sorted by posterior and deduplicated.
#[must_use]
pub fn banded_search(
    samples: &[SampleLikelihoods],
    candidates: &[Allele],
    observed: &ObservedCounts,
    priors: &PriorOptions,
    bounds: &SearchBounds,
    permute: bool,
) -> Vec<GenotypeCombo> {
    let seed = best_ranked_combo(samples, observed, priors);
    let eligible = eligible_samples(samples, permute);
    let mut combos = banded_combos(&seed, samples, &eligible, observed, priors, bounds);
    combos.extend(monomorphic_combos(samples, candidates, observed, priors));
    sort_and_dedup(&mut combos);
    combos
}

/// All combos reachable from `seed` by changing a single sample's genotype,
/// over every sample (variant-flagged or not), bounded per sample by
/// `local_depth` and overall by the step cap. The seed itself leads the
/// result. This is the neighborhood the marginalization pass integrates
/// over.
#[must_use]
pub fn local_combos(
    seed: &GenotypeCombo,
    samples: &[SampleLikelihoods],
    observed: &ObservedCounts,
    priors: &PriorOptions,
    bounds: &SearchBounds,
) -> Vec<GenotypeCombo> {
    let mut combos = vec![seed.clone()];
    'outer: for (sample_index, sample) in samples.iter().enumerate() {
        for entry in sample.ranked(bounds.local_depth) {
            if entry == seed.choices()[sample_index] {
                continue;
            }
            let mut choices = seed.choices().to_vec();
            choices[sample_index] = entry;
            combos.push(GenotypeCombo::from_choices(choices, samples, observed, priors));
            if combos.len() >= bounds.step_max {
                break 'outer;
            }
        }
    }
    combos
}

/// Expectation-maximization search: alternate between re-estimating allele
/// frequencies from the current best combo and re-searching combos under
/// per-sample rankings that fold those frequencies in, until the top combo
/// is stable or the iteration cap is reached.
///
/// Sample rankings are restored to data-likelihood order on return.
#[must_use]
pub fn em_search(
    samples: &mut [SampleLikelihoods],
    candidates: &[Allele],
    observed: &ObservedCounts,
    priors: &PriorOptions,
    bounds: &SearchBounds,
    permute: bool,
    max_iterations: usize,
) -> Vec<GenotypeCombo> {
    let mut combos = banded_search(samples, candidates, observed, priors, bounds, permute);
    for _ in 1..max_iterations {
        let frequencies = smoothed_frequencies(&combos[0], samples, candidates);
        for sample in samples.iter_mut() {
            let scores: Vec<f64> = sample
                .entries()
                .iter()
                .map(|entry| {
                    entry.log_likelihood
                        + ln_genotype_given_allele_frequencies(&entry.genotype, &frequencies)
                })
                .collect();
            sample.rank_by_scores(&scores);
        }
        let next = banded_search(samples, candidates, observed, priors, bounds, permute);
        let converged = next[0] == combos[0];
        combos = next;
        if converged {
            break;
        }
    }
    for sample in samples.iter_mut() {
        sample.sort_by_likelihood();
    }
    combos
}

/// Allele frequencies from the combo's counts, smoothed with a pseudocount
/// over the full candidate set.
fn smoothed_frequencies(
    combo: &GenotypeCombo,
    samples: &[SampleLikelihoods],
    candidates: &[Allele],
) -> BTreeMap<Allele, f64> {
    let counts = combo.allele_counts(samples);
    let total: f64 = counts.iter().map(|(_, n)| f64::from(*n)).sum::<f64>()
        + EM_FREQUENCY_PSEUDOCOUNT * candidates.len() as f64;
    let mut frequencies: BTreeMap<Allele, f64> = candidates
        .iter()
        .map(|a| (a.clone(), EM_FREQUENCY_PSEUDOCOUNT / total))
        .collect();
    for (allele, count) in counts {
        if let Some(f) = frequencies.get_mut(&allele) {
            *f = (f64::from(count) + EM_FREQUENCY_PSEUDOCOUNT) / total;
        }
    }
    frequencies
}
